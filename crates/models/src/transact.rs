//! Argument and result shapes exchanged with the wallet SDK when building or
//! estimating unshield transactions.
//!
//! Quantities are `U256` and travel as `0x`-prefixed hex strings. Result
//! structs keep any field they do not model in `extra`, so a response relayed
//! through the bridge reaches the caller with every field it left the SDK
//! with.

use std::collections::BTreeMap;
use std::fmt;

use primitive_types::U256;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use zeroize::Zeroize;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Erc20Amount {
    pub token_address: String,
    pub amount: U256,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Erc20AmountRecipient {
    pub token_address: String,
    pub amount: U256,
    pub recipient_address: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NftTokenType {
    Erc721,
    Erc1155,
}

impl Serialize for NftTokenType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            NftTokenType::Erc721 => 1,
            NftTokenType::Erc1155 => 2,
        })
    }
}

impl<'de> Deserialize<'de> for NftTokenType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            1 => Ok(NftTokenType::Erc721),
            2 => Ok(NftTokenType::Erc1155),
            other => Err(de::Error::custom(format!("unknown nft token type {other}"))),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftAmountRecipient {
    pub nft_address: String,
    pub nft_token_type: NftTokenType,
    #[serde(rename = "tokenSubID")]
    pub token_sub_id: String,
    pub amount: U256,
    pub recipient_address: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeTokenDetails {
    pub token_address: String,
    pub fee_per_unit_gas: U256,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EvmGasType {
    Type0,
    Type1,
    Type2,
}

impl EvmGasType {
    pub fn as_u8(self) -> u8 {
        match self {
            EvmGasType::Type0 => 0,
            EvmGasType::Type1 => 1,
            EvmGasType::Type2 => 2,
        }
    }
}

impl Serialize for EvmGasType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for EvmGasType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(EvmGasType::Type0),
            1 => Ok(EvmGasType::Type1),
            2 => Ok(EvmGasType::Type2),
            other => Err(de::Error::custom(format!("unknown evm gas type {other}"))),
        }
    }
}

/// Gas parameters. Legacy types carry `gas_price`; type 2 carries the two
/// EIP-1559 fee fields. Which combination is valid is for the SDK to decide.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionGasDetails {
    pub evm_gas_type: EvmGasType,
    pub gas_estimate: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
}

/// Wallet encryption key handed to the SDK for unproven estimates. Wiped on
/// drop and never printed.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptionKey(String);

impl EncryptionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractTransaction {
    pub to: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tx_type: Option<u8>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RailgunPopulateTransactionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullifiers: Option<Vec<String>>,
    pub transaction: ContractTransaction,
    #[serde(
        rename = "preTransactionPOIsPerTxidLeafPerList",
        default,
        skip_serializing_if = "Value::is_null"
    )]
    pub pre_transaction_pois_per_txid_leaf_per_list: Value,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentSummary {
    pub commitment_ciphertext: Value,
    pub commitment_hash: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RailgunTransactionGasEstimateResponse {
    pub gas_estimate: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcaster_fee_commitment: Option<CommitmentSummary>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Recipients reconstructed from an earlier shield, used to send funds back to
/// the address that shielded them.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnshieldToOriginRecipients {
    pub erc20_amount_recipients: Vec<Erc20AmountRecipient>,
    pub nft_amount_recipients: Vec<NftAmountRecipient>,
}
