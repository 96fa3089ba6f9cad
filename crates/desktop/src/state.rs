//! Application state shared between the services that write it and the
//! screens that read it.
//!
//! Readers take an [`AppSnapshot`] by value; nothing here is global.

use std::collections::HashMap;

use serde::Deserialize;
use shade_models::{
    MerkletreeScanCurrentStatus, MerkletreeType, NetworkName, ProofBatcherState, TokenBalance,
    TokenPrices, TokenRef, TxidVersion,
};
use tokio::sync::watch;

/// Settings key holding the persisted discreet-mode flag.
pub const DISCREET_MODE_KEY: &str = "DISCREET_MODE";

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveWallet {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "isViewOnlyWallet")]
    pub is_view_only: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WalletsState {
    pub active: Option<ActiveWallet>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OmittedPrivateTokensState {
    pub omitted_private_tokens: Vec<TokenRef>,
    pub should_show_omitted_private_tokens_modal: bool,
}

/// App-wide notice shown over the main screen until dismissed.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainScreenAlert {
    pub title: String,
    pub message: String,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DiscreetMode {
    pub enabled: bool,
}

/// Latest scan status per network and tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MerkletreeHistoryScan {
    pub for_network: HashMap<NetworkName, HashMap<MerkletreeType, MerkletreeScanCurrentStatus>>,
}

impl MerkletreeHistoryScan {
    pub fn status(
        &self,
        network: NetworkName,
        tree: MerkletreeType,
    ) -> Option<MerkletreeScanCurrentStatus> {
        self.for_network
            .get(&network)
            .and_then(|for_type| for_type.get(&tree))
            .copied()
    }

    pub fn set(
        &mut self,
        network: NetworkName,
        tree: MerkletreeType,
        status: MerkletreeScanCurrentStatus,
    ) {
        self.for_network
            .entry(network)
            .or_default()
            .insert(tree, status);
    }
}

/// Balances per network, then per wallet id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BalancesState {
    pub railgun: HashMap<NetworkName, HashMap<String, Vec<TokenBalance>>>,
    pub public: HashMap<NetworkName, HashMap<String, Vec<TokenBalance>>>,
}

impl BalancesState {
    pub fn railgun_for(&self, network: NetworkName, wallet_id: &str) -> &[TokenBalance] {
        lookup(&self.railgun, network, wallet_id)
    }

    pub fn public_for(&self, network: NetworkName, wallet_id: &str) -> &[TokenBalance] {
        lookup(&self.public, network, wallet_id)
    }
}

fn lookup<'a>(
    map: &'a HashMap<NetworkName, HashMap<String, Vec<TokenBalance>>>,
    network: NetworkName,
    wallet_id: &str,
) -> &'a [TokenBalance] {
    map.get(&network)
        .and_then(|wallets| wallets.get(wallet_id))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppSnapshot {
    pub wallets: WalletsState,
    pub network: NetworkName,
    pub txid_version: TxidVersion,
    pub omitted_private_tokens: OmittedPrivateTokensState,
    pub proof_batcher: ProofBatcherState,
    pub merkletree_history_scan: MerkletreeHistoryScan,
    pub broadcaster_status: Option<String>,
    pub main_screen_alert: Option<MainScreenAlert>,
    pub discreet_mode: DiscreetMode,
    pub balances: BalancesState,
    pub prices: HashMap<NetworkName, TokenPrices>,
}

impl AppSnapshot {
    pub fn new(network: NetworkName, txid_version: TxidVersion) -> Self {
        Self {
            wallets: WalletsState::default(),
            network,
            txid_version,
            omitted_private_tokens: OmittedPrivateTokensState::default(),
            proof_batcher: ProofBatcherState::default(),
            merkletree_history_scan: MerkletreeHistoryScan::default(),
            broadcaster_status: None,
            main_screen_alert: None,
            discreet_mode: DiscreetMode::default(),
            balances: BalancesState::default(),
            prices: HashMap::new(),
        }
    }

    pub fn active_wallet(&self) -> Option<&ActiveWallet> {
        self.wallets.active.as_ref()
    }

    pub fn token_price(&self, token_address: &str) -> Option<f64> {
        self.prices
            .get(&self.network)?
            .get(&token_address.to_ascii_lowercase())
            .copied()
    }
}

/// Single-writer-at-a-time store. Every update is published to subscribers.
pub struct StateStore {
    tx: watch::Sender<AppSnapshot>,
}

impl StateStore {
    pub fn new(initial: AppSnapshot) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn snapshot(&self) -> AppSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppSnapshot> {
        self.tx.subscribe()
    }

    pub fn update(&self, apply: impl FnOnce(&mut AppSnapshot)) {
        self.tx.send_modify(apply);
    }

    pub fn set_network(&self, network: NetworkName) {
        self.update(|state| state.network = network);
    }

    pub fn set_active_wallet(&self, wallet: Option<ActiveWallet>) {
        self.update(|state| state.wallets.active = wallet);
    }

    pub fn set_discreet(&self, enabled: bool) {
        self.update(|state| state.discreet_mode.enabled = enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shade_models::MerkletreeScanStatus;

    #[test]
    fn updates_reach_subscribers() {
        let store = StateStore::new(AppSnapshot::new(
            NetworkName::Ethereum,
            TxidVersion::V2PoseidonMerkle,
        ));
        let mut rx = store.subscribe();
        store.set_network(NetworkName::Polygon);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().network, NetworkName::Polygon);
        assert_eq!(store.snapshot().network, NetworkName::Polygon);
    }

    #[test]
    fn scan_status_lookup_is_per_network() {
        let mut scan = MerkletreeHistoryScan::default();
        let status = MerkletreeScanCurrentStatus::new(MerkletreeScanStatus::Updated, 40.0);
        scan.set(NetworkName::Ethereum, MerkletreeType::Utxo, status);
        assert_eq!(
            scan.status(NetworkName::Ethereum, MerkletreeType::Utxo),
            Some(status)
        );
        assert_eq!(scan.status(NetworkName::Ethereum, MerkletreeType::Txid), None);
        assert_eq!(scan.status(NetworkName::Polygon, MerkletreeType::Utxo), None);
    }

    #[test]
    fn missing_balances_are_empty() {
        let balances = BalancesState::default();
        assert!(balances.railgun_for(NetworkName::Ethereum, "w").is_empty());
    }
}
