//! The closed set of bridge operations.
//!
//! Each params struct names its event and its response type through
//! [`BridgeOperation`], so a caller can only ever decode the response shape
//! that belongs to the request it sent. On the wire a call is
//! `{"event": "<name>", "params": {...}}`.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shade_models::{
    EncryptionKey, Erc20Amount, Erc20AmountRecipient, FeeTokenDetails, NetworkName,
    NftAmountRecipient, RailgunPopulateTransactionResponse, RailgunTransactionGasEstimateResponse,
    TransactionGasDetails, TxidVersion, UnshieldToOriginRecipients, U256,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum BridgeCallEvent {
    PopulateProvedUnshield,
    PopulateProvedUnshieldBaseToken,
    PopulateProvedUnshieldToOrigin,
    GasEstimateForUnprovenUnshield,
    GasEstimateForUnprovenUnshieldBaseToken,
    GasEstimateForUnprovenUnshieldToOrigin,
    #[serde(rename = "GetERC20AndNFTAmountRecipientsForUnshieldToOrigin")]
    GetErc20AndNftAmountRecipientsForUnshieldToOrigin,
}

impl BridgeCallEvent {
    pub const ALL: [BridgeCallEvent; 7] = [
        BridgeCallEvent::PopulateProvedUnshield,
        BridgeCallEvent::PopulateProvedUnshieldBaseToken,
        BridgeCallEvent::PopulateProvedUnshieldToOrigin,
        BridgeCallEvent::GasEstimateForUnprovenUnshield,
        BridgeCallEvent::GasEstimateForUnprovenUnshieldBaseToken,
        BridgeCallEvent::GasEstimateForUnprovenUnshieldToOrigin,
        BridgeCallEvent::GetErc20AndNftAmountRecipientsForUnshieldToOrigin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BridgeCallEvent::PopulateProvedUnshield => "PopulateProvedUnshield",
            BridgeCallEvent::PopulateProvedUnshieldBaseToken => "PopulateProvedUnshieldBaseToken",
            BridgeCallEvent::PopulateProvedUnshieldToOrigin => "PopulateProvedUnshieldToOrigin",
            BridgeCallEvent::GasEstimateForUnprovenUnshield => "GasEstimateForUnprovenUnshield",
            BridgeCallEvent::GasEstimateForUnprovenUnshieldBaseToken => {
                "GasEstimateForUnprovenUnshieldBaseToken"
            }
            BridgeCallEvent::GasEstimateForUnprovenUnshieldToOrigin => {
                "GasEstimateForUnprovenUnshieldToOrigin"
            }
            BridgeCallEvent::GetErc20AndNftAmountRecipientsForUnshieldToOrigin => {
                "GetERC20AndNFTAmountRecipientsForUnshieldToOrigin"
            }
        }
    }

    /// Name of the SDK export this event forwards to.
    pub fn sdk_function(self) -> &'static str {
        match self {
            BridgeCallEvent::PopulateProvedUnshield => "populateProvedUnshield",
            BridgeCallEvent::PopulateProvedUnshieldBaseToken => "populateProvedUnshieldBaseToken",
            BridgeCallEvent::PopulateProvedUnshieldToOrigin => "populateProvedUnshieldToOrigin",
            BridgeCallEvent::GasEstimateForUnprovenUnshield => "gasEstimateForUnprovenUnshield",
            BridgeCallEvent::GasEstimateForUnprovenUnshieldBaseToken => {
                "gasEstimateForUnprovenUnshieldBaseToken"
            }
            BridgeCallEvent::GasEstimateForUnprovenUnshieldToOrigin => {
                "gasEstimateForUnprovenUnshieldToOrigin"
            }
            BridgeCallEvent::GetErc20AndNftAmountRecipientsForUnshieldToOrigin => {
                "getERC20AndNFTAmountRecipientsForUnshieldToOrigin"
            }
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == raw.trim())
    }
}

impl fmt::Display for BridgeCallEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulateProvedUnshieldParams {
    pub txid_version: TxidVersion,
    pub network_name: NetworkName,
    #[serde(rename = "railWalletID")]
    pub rail_wallet_id: String,
    pub erc20_amount_recipients: Vec<Erc20AmountRecipient>,
    pub nft_amount_recipients: Vec<NftAmountRecipient>,
    #[serde(rename = "broadcasterFeeERC20AmountRecipient")]
    pub broadcaster_fee_erc20_amount_recipient: Option<Erc20AmountRecipient>,
    pub send_with_public_wallet: bool,
    pub overall_batch_min_gas_price: Option<U256>,
    pub transaction_gas_details: TransactionGasDetails,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulateProvedUnshieldBaseTokenParams {
    pub txid_version: TxidVersion,
    pub network_name: NetworkName,
    pub public_wallet_address: String,
    #[serde(rename = "railWalletID")]
    pub rail_wallet_id: String,
    pub wrapped_token_amount: Erc20Amount,
    #[serde(rename = "broadcasterFeeERC20AmountRecipient")]
    pub broadcaster_fee_erc20_amount_recipient: Option<Erc20AmountRecipient>,
    pub send_with_public_wallet: bool,
    pub overall_batch_min_gas_price: Option<U256>,
    pub transaction_gas_details: TransactionGasDetails,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulateProvedUnshieldToOriginParams {
    pub txid_version: TxidVersion,
    pub network_name: NetworkName,
    #[serde(rename = "railWalletID")]
    pub rail_wallet_id: String,
    pub erc20_amount_recipients: Vec<Erc20AmountRecipient>,
    pub nft_amount_recipients: Vec<NftAmountRecipient>,
    pub transaction_gas_details: TransactionGasDetails,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimateForUnprovenUnshieldParams {
    pub txid_version: TxidVersion,
    pub network_name: NetworkName,
    #[serde(rename = "railWalletID")]
    pub rail_wallet_id: String,
    pub encryption_key: EncryptionKey,
    pub erc20_amount_recipients: Vec<Erc20AmountRecipient>,
    pub nft_amount_recipients: Vec<NftAmountRecipient>,
    pub original_gas_details: TransactionGasDetails,
    pub fee_token_details: Option<FeeTokenDetails>,
    pub send_with_public_wallet: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimateForUnprovenUnshieldBaseTokenParams {
    pub txid_version: TxidVersion,
    pub network_name: NetworkName,
    pub public_wallet_address: String,
    #[serde(rename = "railWalletID")]
    pub rail_wallet_id: String,
    pub encryption_key: EncryptionKey,
    pub wrapped_token_amount: Erc20Amount,
    pub original_gas_details: TransactionGasDetails,
    pub fee_token_details: Option<FeeTokenDetails>,
    pub send_with_public_wallet: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimateForUnprovenUnshieldToOriginParams {
    pub original_shield_txid: String,
    pub txid_version: TxidVersion,
    pub network_name: NetworkName,
    #[serde(rename = "railWalletID")]
    pub rail_wallet_id: String,
    pub encryption_key: EncryptionKey,
    pub erc20_amount_recipients: Vec<Erc20AmountRecipient>,
    pub nft_amount_recipients: Vec<NftAmountRecipient>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetErc20AndNftAmountRecipientsForUnshieldToOriginParams {
    pub txid_version: TxidVersion,
    pub network_name: NetworkName,
    #[serde(rename = "railgunWalletID")]
    pub railgun_wallet_id: String,
    pub original_shield_txid: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "params")]
pub enum BridgeCall {
    PopulateProvedUnshield(PopulateProvedUnshieldParams),
    PopulateProvedUnshieldBaseToken(PopulateProvedUnshieldBaseTokenParams),
    PopulateProvedUnshieldToOrigin(PopulateProvedUnshieldToOriginParams),
    GasEstimateForUnprovenUnshield(GasEstimateForUnprovenUnshieldParams),
    GasEstimateForUnprovenUnshieldBaseToken(GasEstimateForUnprovenUnshieldBaseTokenParams),
    GasEstimateForUnprovenUnshieldToOrigin(GasEstimateForUnprovenUnshieldToOriginParams),
    #[serde(rename = "GetERC20AndNFTAmountRecipientsForUnshieldToOrigin")]
    GetErc20AndNftAmountRecipientsForUnshieldToOrigin(
        GetErc20AndNftAmountRecipientsForUnshieldToOriginParams,
    ),
}

/// A typed request: its params, the event it travels under and what the
/// handler answers with.
pub trait BridgeOperation:
    Into<BridgeCall> + TryFrom<BridgeCall, Error = BridgeCall> + Send + 'static
{
    const EVENT: BridgeCallEvent;
    type Response: Serialize + DeserializeOwned + Send + 'static;
}

macro_rules! bridge_operation {
    ($variant:ident, $params:ty, $response:ty) => {
        impl From<$params> for BridgeCall {
            fn from(params: $params) -> Self {
                BridgeCall::$variant(params)
            }
        }

        impl TryFrom<BridgeCall> for $params {
            type Error = BridgeCall;

            fn try_from(call: BridgeCall) -> Result<Self, BridgeCall> {
                match call {
                    BridgeCall::$variant(params) => Ok(params),
                    other => Err(other),
                }
            }
        }

        impl BridgeOperation for $params {
            const EVENT: BridgeCallEvent = BridgeCallEvent::$variant;
            type Response = $response;
        }
    };
}

bridge_operation!(
    PopulateProvedUnshield,
    PopulateProvedUnshieldParams,
    RailgunPopulateTransactionResponse
);
bridge_operation!(
    PopulateProvedUnshieldBaseToken,
    PopulateProvedUnshieldBaseTokenParams,
    RailgunPopulateTransactionResponse
);
bridge_operation!(
    PopulateProvedUnshieldToOrigin,
    PopulateProvedUnshieldToOriginParams,
    RailgunPopulateTransactionResponse
);
bridge_operation!(
    GasEstimateForUnprovenUnshield,
    GasEstimateForUnprovenUnshieldParams,
    RailgunTransactionGasEstimateResponse
);
bridge_operation!(
    GasEstimateForUnprovenUnshieldBaseToken,
    GasEstimateForUnprovenUnshieldBaseTokenParams,
    RailgunTransactionGasEstimateResponse
);
bridge_operation!(
    GasEstimateForUnprovenUnshieldToOrigin,
    GasEstimateForUnprovenUnshieldToOriginParams,
    RailgunTransactionGasEstimateResponse
);
bridge_operation!(
    GetErc20AndNftAmountRecipientsForUnshieldToOrigin,
    GetErc20AndNftAmountRecipientsForUnshieldToOriginParams,
    UnshieldToOriginRecipients
);

impl BridgeCall {
    pub fn event(&self) -> BridgeCallEvent {
        match self {
            BridgeCall::PopulateProvedUnshield(_) => BridgeCallEvent::PopulateProvedUnshield,
            BridgeCall::PopulateProvedUnshieldBaseToken(_) => {
                BridgeCallEvent::PopulateProvedUnshieldBaseToken
            }
            BridgeCall::PopulateProvedUnshieldToOrigin(_) => {
                BridgeCallEvent::PopulateProvedUnshieldToOrigin
            }
            BridgeCall::GasEstimateForUnprovenUnshield(_) => {
                BridgeCallEvent::GasEstimateForUnprovenUnshield
            }
            BridgeCall::GasEstimateForUnprovenUnshieldBaseToken(_) => {
                BridgeCallEvent::GasEstimateForUnprovenUnshieldBaseToken
            }
            BridgeCall::GasEstimateForUnprovenUnshieldToOrigin(_) => {
                BridgeCallEvent::GasEstimateForUnprovenUnshieldToOrigin
            }
            BridgeCall::GetErc20AndNftAmountRecipientsForUnshieldToOrigin(_) => {
                BridgeCallEvent::GetErc20AndNftAmountRecipientsForUnshieldToOrigin
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_names_round_trip() {
        for event in BridgeCallEvent::ALL {
            let encoded = serde_json::to_value(event).unwrap();
            assert_eq!(encoded, json!(event.as_str()));
            assert_eq!(BridgeCallEvent::parse(event.as_str()), Some(event));
        }
        assert_eq!(BridgeCallEvent::parse("PopulateProvedShield"), None);
    }

    #[test]
    fn call_wire_shape_uses_sdk_field_names() {
        let call = BridgeCall::from(GetErc20AndNftAmountRecipientsForUnshieldToOriginParams {
            txid_version: TxidVersion::V2PoseidonMerkle,
            network_name: NetworkName::Polygon,
            railgun_wallet_id: "wallet-1".to_string(),
            original_shield_txid: "0xfeed".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&call).unwrap(),
            json!({
                "event": "GetERC20AndNFTAmountRecipientsForUnshieldToOrigin",
                "params": {
                    "txidVersion": "V2_PoseidonMerkle",
                    "networkName": "Polygon",
                    "railgunWalletID": "wallet-1",
                    "originalShieldTxid": "0xfeed",
                }
            })
        );
        assert_eq!(
            call.event(),
            BridgeCallEvent::GetErc20AndNftAmountRecipientsForUnshieldToOrigin
        );
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let call: BridgeCall = serde_json::from_value(json!({
            "event": "PopulateProvedUnshieldToOrigin",
            "params": {
                "txidVersion": "V2_PoseidonMerkle",
                "networkName": "Ethereum",
                "railWalletID": "w",
                "erc20AmountRecipients": [],
                "nftAmountRecipients": [],
                "transactionGasDetails": {"evmGasType": 0, "gasEstimate": "0x1", "gasPrice": "0x2"},
            }
        }))
        .unwrap();
        let params = PopulateProvedUnshieldToOriginParams::try_from(call).unwrap();
        assert_eq!(params.rail_wallet_id, "w");
    }

    #[test]
    fn try_from_rejects_other_variants() {
        let call = BridgeCall::from(GetErc20AndNftAmountRecipientsForUnshieldToOriginParams {
            txid_version: TxidVersion::V2PoseidonMerkle,
            network_name: NetworkName::Ethereum,
            railgun_wallet_id: "w".to_string(),
            original_shield_txid: "0x1".to_string(),
        });
        let back = PopulateProvedUnshieldParams::try_from(call.clone()).unwrap_err();
        assert_eq!(back, call);
    }
}
