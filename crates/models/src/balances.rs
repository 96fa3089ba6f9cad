use std::collections::BTreeMap;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum RailgunWalletBalanceBucket {
    Spendable,
    ShieldBlocked,
    ShieldPending,
    ProofSubmitted,
    #[serde(rename = "MissingInternalPOI")]
    MissingInternalPoi,
    #[serde(rename = "MissingExternalPOI")]
    MissingExternalPoi,
    Spent,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRef {
    pub address: String,
    pub symbol: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub token_address: String,
    pub symbol: String,
    pub decimals: u8,
    pub amount: U256,
    pub balance_bucket: RailgunWalletBalanceBucket,
}

impl TokenBalance {
    /// Decimal rendering with at most `max_fraction` fractional digits,
    /// truncated, trailing zeros dropped.
    pub fn format_amount(&self, max_fraction: usize) -> String {
        format_units(self.amount, self.decimals, max_fraction)
    }
}

pub fn format_units(amount: U256, decimals: u8, max_fraction: usize) -> String {
    let digits = amount.to_string();
    let decimals = usize::from(decimals);
    let (whole, fraction) = if digits.len() > decimals {
        let split = digits.len() - decimals;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{digits:0>decimals$}"))
    };
    let fraction: String = fraction.chars().take(max_fraction).collect();
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole
    } else {
        format!("{whole}.{fraction}")
    }
}

/// USD prices keyed by lowercase token address.
pub type TokenPrices = BTreeMap<String, f64>;
