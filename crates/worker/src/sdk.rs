use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shade_models::{
    EncryptionKey, Erc20Amount, Erc20AmountRecipient, FeeTokenDetails, NetworkName,
    NftAmountRecipient, RailgunPopulateTransactionResponse, RailgunTransactionGasEstimateResponse,
    TransactionGasDetails, TxidVersion, UnshieldToOriginRecipients, U256,
};

/// Failure reported by the wallet SDK. Carried to the bridge caller as is.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SdkError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

impl SdkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: i64) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for SdkError {}

/// A result exactly as the SDK produced it.
///
/// `T` is the shape the SDK documents for the result. The worker relays the
/// raw JSON and only the bridge caller decodes it, so fields the model does
/// not know, explicit nulls and quantity spellings all survive the trip.
pub struct SdkReply<T> {
    raw: Value,
    _shape: PhantomData<fn() -> T>,
}

impl<T> SdkReply<T> {
    pub fn new(raw: Value) -> Self {
        Self {
            raw,
            _shape: PhantomData,
        }
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}

impl<T: Serialize> SdkReply<T> {
    /// Reply built from an already typed result.
    pub fn encode(value: &T) -> Result<Self, SdkError> {
        serde_json::to_value(value)
            .map(Self::new)
            .map_err(|err| SdkError::new(format!("encode sdk result: {err}")))
    }
}

impl<T> Clone for SdkReply<T> {
    fn clone(&self) -> Self {
        Self::new(self.raw.clone())
    }
}

impl<T> fmt::Debug for SdkReply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SdkReply").field(&self.raw).finish()
    }
}

/// The unshield surface of the external wallet SDK.
///
/// Argument order mirrors the SDK's exported functions one for one; adapters
/// must not reorder, default or validate anything.
#[async_trait]
#[allow(clippy::too_many_arguments)]
pub trait UnshieldSdk: Send + Sync {
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
    ) -> Result<SdkReply<RailgunPopulateTransactionResponse>, SdkError>;

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
    ) -> Result<SdkReply<RailgunPopulateTransactionResponse>, SdkError>;

    async fn populate_proved_unshield_to_origin(
        &self,
        txid_version: TxidVersion,
        network_name: NetworkName,
        railgun_wallet_id: String,
        erc20_amount_recipients: Vec<Erc20AmountRecipient>,
        nft_amount_recipients: Vec<NftAmountRecipient>,
        transaction_gas_details: TransactionGasDetails,
    ) -> Result<SdkReply<RailgunPopulateTransactionResponse>, SdkError>;

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
    ) -> Result<SdkReply<RailgunTransactionGasEstimateResponse>, SdkError>;

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
    ) -> Result<SdkReply<RailgunTransactionGasEstimateResponse>, SdkError>;

    async fn gas_estimate_for_unproven_unshield_to_origin(
        &self,
        original_shield_txid: String,
        txid_version: TxidVersion,
        network_name: NetworkName,
        railgun_wallet_id: String,
        encryption_key: EncryptionKey,
        erc20_amount_recipients: Vec<Erc20AmountRecipient>,
        nft_amount_recipients: Vec<NftAmountRecipient>,
    ) -> Result<SdkReply<RailgunTransactionGasEstimateResponse>, SdkError>;

    async fn get_erc20_and_nft_amount_recipients_for_unshield_to_origin(
        &self,
        txid_version: TxidVersion,
        network_name: NetworkName,
        railgun_wallet_id: String,
        original_shield_txid: String,
    ) -> Result<SdkReply<UnshieldToOriginRecipients>, SdkError>;
}
