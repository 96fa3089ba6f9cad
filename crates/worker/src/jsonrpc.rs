//! JSON-RPC 2.0 over HTTP to the wallet SDK sidecar.
//!
//! The sidecar exposes the SDK's exported functions under their own names and
//! takes positional params in the SDK's argument order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shade_log::{log_debug, log_warn};
use shade_models::{
    EncryptionKey, Erc20Amount, Erc20AmountRecipient, FeeTokenDetails, NetworkName,
    NftAmountRecipient, RailgunPopulateTransactionResponse, RailgunTransactionGasEstimateResponse,
    TransactionGasDetails, TxidVersion, UnshieldToOriginRecipients, U256,
};

use crate::call::BridgeCallEvent;
use crate::sdk::{SdkError, SdkReply, UnshieldSdk};

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
const SLOW_CALL_MS: u128 = 5_000;

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

pub fn encode_request(id: u64, method: &str, params: &[Value]) -> Vec<u8> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    });
    body.to_string().into_bytes()
}

/// Turns an HTTP reply into the call's result. A JSON-RPC error object wins
/// over the HTTP status, since some servers send errors with a 500.
pub fn decode_response(status_code: i32, body: &[u8]) -> Result<Value, SdkError> {
    match serde_json::from_slice::<RpcResponse>(body) {
        Ok(RpcResponse {
            error: Some(error), ..
        }) => Err(SdkError::with_code(error.message, error.code)),
        Ok(RpcResponse { result, .. }) if status_code == 200 => Ok(result.unwrap_or(Value::Null)),
        Ok(_) => Err(SdkError::new(format!("sidecar returned HTTP {status_code}"))),
        Err(err) if status_code == 200 => {
            Err(SdkError::new(format!("invalid sidecar response: {err}")))
        }
        Err(_) => Err(SdkError::new(format!("sidecar returned HTTP {status_code}"))),
    }
}

pub struct JsonRpcClient {
    endpoint: String,
    timeout_secs: u64,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_secs,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Runs the request on the blocking pool.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, SdkError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let endpoint = self.endpoint.clone();
        let timeout_secs = self.timeout_secs;
        let method = method.to_string();
        tokio::task::spawn_blocking(move || post(&endpoint, timeout_secs, id, &method, &params))
            .await
            .map_err(|err| SdkError::new(format!("sidecar request task failed: {err}")))?
    }

    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, SdkError> {
        let value = self.call(method, params).await?;
        decode_result(method, value)
    }
}

fn post(
    endpoint: &str,
    timeout_secs: u64,
    id: u64,
    method: &str,
    params: &[Value],
) -> Result<Value, SdkError> {
    let started = Instant::now();
    let response = minreq::post(endpoint)
        .with_header("Content-Type", "application/json")
        .with_body(encode_request(id, method, params))
        .with_timeout(timeout_secs)
        .send()
        .map_err(|err| SdkError::new(format!("sidecar request failed: {endpoint} ({err})")))?;
    let elapsed_ms = started.elapsed().as_millis();
    if elapsed_ms >= SLOW_CALL_MS {
        log_warn!("slow sidecar call {method}: {elapsed_ms}ms");
    } else {
        log_debug!("sidecar call {method}: {elapsed_ms}ms");
    }
    decode_response(response.status_code, response.as_bytes())
}

pub fn arg<T: Serialize>(value: T) -> Result<Value, SdkError> {
    serde_json::to_value(value).map_err(|err| SdkError::new(format!("encode argument: {err}")))
}

fn decode_result<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, SdkError> {
    serde_json::from_value(value)
        .map_err(|err| SdkError::new(format!("unexpected {method} result: {err}")))
}

/// [`UnshieldSdk`] backed by the sidecar.
pub struct JsonRpcSdk {
    client: JsonRpcClient,
}

impl JsonRpcSdk {
    pub fn new(client: JsonRpcClient) -> Self {
        Self { client }
    }

    async fn invoke<T>(
        &self,
        event: BridgeCallEvent,
        params: Vec<Value>,
    ) -> Result<SdkReply<T>, SdkError> {
        self.client
            .call(event.sdk_function(), params)
            .await
            .map(SdkReply::new)
    }
}

#[async_trait]
impl UnshieldSdk for JsonRpcSdk {
    async fn populate_proved_unshield(
        &self,
        txid_version: TxidVersion,
        network_name: NetworkName,
        railgun_wallet_id: String,
        erc20_amount_recipients: Vec<Erc20AmountRecipient>,
        nft_amount_recipients: Vec<NftAmountRecipient>,
        broadcaster_fee_erc20_amount_recipient: Option<Erc20AmountRecipient>,
        send_with_public_wallet: bool,
        overall_batch_min_gas_price: Option<U256>,
        transaction_gas_details: TransactionGasDetails,
    ) -> Result<SdkReply<RailgunPopulateTransactionResponse>, SdkError> {
        let params = vec![
            arg(txid_version)?,
            arg(network_name)?,
            arg(railgun_wallet_id)?,
            arg(erc20_amount_recipients)?,
            arg(nft_amount_recipients)?,
            arg(broadcaster_fee_erc20_amount_recipient)?,
            arg(send_with_public_wallet)?,
            arg(overall_batch_min_gas_price)?,
            arg(transaction_gas_details)?,
        ];
        self.invoke(BridgeCallEvent::PopulateProvedUnshield, params)
            .await
    }

    async fn populate_proved_unshield_base_token(
        &self,
        txid_version: TxidVersion,
        network_name: NetworkName,
        public_wallet_address: String,
        railgun_wallet_id: String,
        wrapped_token_amount: Erc20Amount,
        broadcaster_fee_erc20_amount_recipient: Option<Erc20AmountRecipient>,
        send_with_public_wallet: bool,
        overall_batch_min_gas_price: Option<U256>,
        transaction_gas_details: TransactionGasDetails,
    ) -> Result<SdkReply<RailgunPopulateTransactionResponse>, SdkError> {
        let params = vec![
            arg(txid_version)?,
            arg(network_name)?,
            arg(public_wallet_address)?,
            arg(railgun_wallet_id)?,
            arg(wrapped_token_amount)?,
            arg(broadcaster_fee_erc20_amount_recipient)?,
            arg(send_with_public_wallet)?,
            arg(overall_batch_min_gas_price)?,
            arg(transaction_gas_details)?,
        ];
        self.invoke(BridgeCallEvent::PopulateProvedUnshieldBaseToken, params)
            .await
    }

    async fn populate_proved_unshield_to_origin(
        &self,
        txid_version: TxidVersion,
        network_name: NetworkName,
        railgun_wallet_id: String,
        erc20_amount_recipients: Vec<Erc20AmountRecipient>,
        nft_amount_recipients: Vec<NftAmountRecipient>,
        transaction_gas_details: TransactionGasDetails,
    ) -> Result<SdkReply<RailgunPopulateTransactionResponse>, SdkError> {
        let params = vec![
            arg(txid_version)?,
            arg(network_name)?,
            arg(railgun_wallet_id)?,
            arg(erc20_amount_recipients)?,
            arg(nft_amount_recipients)?,
            arg(transaction_gas_details)?,
        ];
        self.invoke(BridgeCallEvent::PopulateProvedUnshieldToOrigin, params)
            .await
    }

    async fn gas_estimate_for_unproven_unshield(
        &self,
        txid_version: TxidVersion,
        network_name: NetworkName,
        railgun_wallet_id: String,
        encryption_key: EncryptionKey,
        erc20_amount_recipients: Vec<Erc20AmountRecipient>,
        nft_amount_recipients: Vec<NftAmountRecipient>,
        original_gas_details: TransactionGasDetails,
        fee_token_details: Option<FeeTokenDetails>,
        send_with_public_wallet: bool,
    ) -> Result<SdkReply<RailgunTransactionGasEstimateResponse>, SdkError> {
        let params = vec![
            arg(txid_version)?,
            arg(network_name)?,
            arg(railgun_wallet_id)?,
            arg(&encryption_key)?,
            arg(erc20_amount_recipients)?,
            arg(nft_amount_recipients)?,
            arg(original_gas_details)?,
            arg(fee_token_details)?,
            arg(send_with_public_wallet)?,
        ];
        self.invoke(BridgeCallEvent::GasEstimateForUnprovenUnshield, params)
            .await
    }

    async fn gas_estimate_for_unproven_unshield_base_token(
        &self,
        txid_version: TxidVersion,
        network_name: NetworkName,
        public_wallet_address: String,
        railgun_wallet_id: String,
        encryption_key: EncryptionKey,
        wrapped_token_amount: Erc20Amount,
        original_gas_details: TransactionGasDetails,
        fee_token_details: Option<FeeTokenDetails>,
        send_with_public_wallet: bool,
    ) -> Result<SdkReply<RailgunTransactionGasEstimateResponse>, SdkError> {
        let params = vec![
            arg(txid_version)?,
            arg(network_name)?,
            arg(public_wallet_address)?,
            arg(railgun_wallet_id)?,
            arg(&encryption_key)?,
            arg(wrapped_token_amount)?,
            arg(original_gas_details)?,
            arg(fee_token_details)?,
            arg(send_with_public_wallet)?,
        ];
        self.invoke(BridgeCallEvent::GasEstimateForUnprovenUnshieldBaseToken, params)
            .await
    }

    async fn gas_estimate_for_unproven_unshield_to_origin(
        &self,
        original_shield_txid: String,
        txid_version: TxidVersion,
        network_name: NetworkName,
        railgun_wallet_id: String,
        encryption_key: EncryptionKey,
        erc20_amount_recipients: Vec<Erc20AmountRecipient>,
        nft_amount_recipients: Vec<NftAmountRecipient>,
    ) -> Result<SdkReply<RailgunTransactionGasEstimateResponse>, SdkError> {
        let params = vec![
            arg(original_shield_txid)?,
            arg(txid_version)?,
            arg(network_name)?,
            arg(railgun_wallet_id)?,
            arg(&encryption_key)?,
            arg(erc20_amount_recipients)?,
            arg(nft_amount_recipients)?,
        ];
        self.invoke(BridgeCallEvent::GasEstimateForUnprovenUnshieldToOrigin, params)
            .await
    }

    async fn get_erc20_and_nft_amount_recipients_for_unshield_to_origin(
        &self,
        txid_version: TxidVersion,
        network_name: NetworkName,
        railgun_wallet_id: String,
        original_shield_txid: String,
    ) -> Result<SdkReply<UnshieldToOriginRecipients>, SdkError> {
        let params = vec![
            arg(txid_version)?,
            arg(network_name)?,
            arg(railgun_wallet_id)?,
            arg(original_shield_txid)?,
        ];
        self.invoke(
            BridgeCallEvent::GetErc20AndNftAmountRecipientsForUnshieldToOrigin,
            params,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_positional_json_rpc() {
        let body = encode_request(3, "populateProvedUnshield", &[json!("a"), json!(true)]);
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": 3, "method": "populateProvedUnshield", "params": ["a", true]})
        );
    }

    #[test]
    fn response_decoding() {
        assert_eq!(
            decode_response(200, br#"{"jsonrpc":"2.0","id":1,"result":{"gasEstimate":"0x5208"}}"#)
                .unwrap(),
            json!({"gasEstimate": "0x5208"})
        );
        assert_eq!(
            decode_response(200, br#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap(),
            Value::Null
        );
        assert_eq!(
            decode_response(
                500,
                br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"Wallet not found"}}"#
            )
            .unwrap_err(),
            SdkError::with_code("Wallet not found", -32000)
        );
        assert_eq!(
            decode_response(502, b"Bad Gateway").unwrap_err(),
            SdkError::new("sidecar returned HTTP 502")
        );
        assert!(decode_response(200, b"<html>")
            .unwrap_err()
            .message
            .starts_with("invalid sidecar response"));
    }
}
