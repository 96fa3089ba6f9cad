use std::fmt;

use serde::{Deserialize, Serialize};

/// Networks the private wallet can operate on. The serialized names are the
/// ones the wallet SDK keys its state by.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum NetworkName {
    #[serde(rename = "Ethereum")]
    Ethereum,
    #[serde(rename = "BNB_Chain")]
    BnbChain,
    #[serde(rename = "Polygon")]
    Polygon,
    #[serde(rename = "Arbitrum")]
    Arbitrum,
    #[serde(rename = "Ethereum_Sepolia")]
    EthereumSepolia,
    #[serde(rename = "Polygon_Amoy")]
    PolygonAmoy,
    #[serde(rename = "Hardhat")]
    Hardhat,
}

impl NetworkName {
    pub const ALL: [NetworkName; 7] = [
        NetworkName::Ethereum,
        NetworkName::BnbChain,
        NetworkName::Polygon,
        NetworkName::Arbitrum,
        NetworkName::EthereumSepolia,
        NetworkName::PolygonAmoy,
        NetworkName::Hardhat,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkName::Ethereum => "Ethereum",
            NetworkName::BnbChain => "BNB_Chain",
            NetworkName::Polygon => "Polygon",
            NetworkName::Arbitrum => "Arbitrum",
            NetworkName::EthereumSepolia => "Ethereum_Sepolia",
            NetworkName::PolygonAmoy => "Polygon_Amoy",
            NetworkName::Hardhat => "Hardhat",
        }
    }

    pub fn public_name(self) -> &'static str {
        match self {
            NetworkName::Ethereum => "Ethereum",
            NetworkName::BnbChain => "BNB Chain",
            NetworkName::Polygon => "Polygon PoS",
            NetworkName::Arbitrum => "Arbitrum",
            NetworkName::EthereumSepolia => "Sepolia Testnet",
            NetworkName::PolygonAmoy => "Polygon Amoy Testnet",
            NetworkName::Hardhat => "Hardhat Testnet",
        }
    }

    pub fn is_testnet(self) -> bool {
        matches!(
            self,
            NetworkName::EthereumSepolia | NetworkName::PolygonAmoy | NetworkName::Hardhat
        )
    }

    /// Accepts the wire name or a few common lowercase spellings.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Some(found) = Self::ALL.into_iter().find(|n| n.as_str() == trimmed) {
            return Some(found);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "ethereum" | "mainnet" => Some(NetworkName::Ethereum),
            "bnb" | "bsc" | "bnb_chain" => Some(NetworkName::BnbChain),
            "polygon" => Some(NetworkName::Polygon),
            "arbitrum" => Some(NetworkName::Arbitrum),
            "sepolia" | "ethereum_sepolia" => Some(NetworkName::EthereumSepolia),
            "amoy" | "polygon_amoy" => Some(NetworkName::PolygonAmoy),
            "hardhat" => Some(NetworkName::Hardhat),
            _ => None,
        }
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction-identifier commitment scheme version.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TxidVersion {
    #[serde(rename = "V2_PoseidonMerkle")]
    V2PoseidonMerkle,
    #[serde(rename = "V3_PoseidonMerkle")]
    V3PoseidonMerkle,
}

impl TxidVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            TxidVersion::V2PoseidonMerkle => "V2_PoseidonMerkle",
            TxidVersion::V3PoseidonMerkle => "V3_PoseidonMerkle",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "V2_PoseidonMerkle" | "v2" | "V2" => Some(TxidVersion::V2PoseidonMerkle),
            "V3_PoseidonMerkle" | "v3" | "V3" => Some(TxidVersion::V3PoseidonMerkle),
            _ => None,
        }
    }
}

impl Default for TxidVersion {
    fn default() -> Self {
        TxidVersion::V2PoseidonMerkle
    }
}

impl fmt::Display for TxidVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
