//! Wallet data services the screens call into, and the background status
//! poll that keeps scan progress fresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use shade_log::{log_debug, log_info, log_warn};
use shade_models::{
    MerkletreeScanCurrentStatus, MerkletreeType, NetworkName, ProofBatcherState, TokenBalance,
    TokenPrices,
};
use shade_worker::jsonrpc::arg;
use shade_worker::{JsonRpcClient, SdkError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::state::{ActiveWallet, MainScreenAlert, OmittedPrivateTokensState, StateStore};

/// Scan and batch progress for one network.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    #[serde(default)]
    pub merkletree: HashMap<MerkletreeType, MerkletreeScanCurrentStatus>,
    #[serde(default)]
    pub proof_batcher: ProofBatcherState,
    #[serde(default)]
    pub broadcaster_status: Option<String>,
    #[serde(default)]
    pub main_screen_alert: Option<MainScreenAlert>,
    /// Absent when the SDK has nothing new to say; the stored value is kept.
    #[serde(default)]
    pub omitted_private_tokens: Option<OmittedPrivateTokensState>,
}

#[async_trait]
pub trait WalletServices: Send + Sync {
    /// Fetches token prices for `network` into the state store.
    async fn pull_prices(&self, network: NetworkName) -> Result<(), SdkError>;

    /// Rescans and stores balances of `wallet_id` on `network`.
    async fn refresh_railgun_balances(
        &self,
        network: NetworkName,
        wallet_id: &str,
    ) -> Result<(), SdkError>;

    async fn sync_railgun_transactions_v2(&self, network: NetworkName) -> Result<(), SdkError>;

    /// Every wallet the SDK has loaded, view-only ones included.
    async fn list_wallets(&self) -> Result<Vec<ActiveWallet>, SdkError>;

    /// Makes `wallet_id` the SDK's active wallet.
    async fn activate_wallet(&self, wallet_id: &str) -> Result<(), SdkError>;

    async fn poll_status(&self, network: NetworkName) -> Result<StatusReport, SdkError>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalancesReply {
    #[serde(default)]
    railgun: Vec<TokenBalance>,
    #[serde(default)]
    public: Vec<TokenBalance>,
}

/// [`WalletServices`] backed by the wallet SDK sidecar.
pub struct SidecarServices {
    client: JsonRpcClient,
    state: Arc<StateStore>,
}

impl SidecarServices {
    pub fn new(client: JsonRpcClient, state: Arc<StateStore>) -> Self {
        Self { client, state }
    }

    /// Active wallet as the SDK reports it, if any.
    pub async fn load_active_wallet(&self) -> Result<Option<ActiveWallet>, SdkError> {
        self.client.call_as("getActiveWallet", Vec::new()).await
    }
}

#[async_trait]
impl WalletServices for SidecarServices {
    async fn pull_prices(&self, network: NetworkName) -> Result<(), SdkError> {
        let prices: TokenPrices = self
            .client
            .call_as("pullPrices", vec![arg(network)?])
            .await?;
        let prices: TokenPrices = prices
            .into_iter()
            .map(|(address, price)| (address.to_ascii_lowercase(), price))
            .collect();
        log_debug!("pulled {} prices on {network}", prices.len());
        self.state.update(|state| {
            state.prices.insert(network, prices);
        });
        Ok(())
    }

    async fn refresh_railgun_balances(
        &self,
        network: NetworkName,
        wallet_id: &str,
    ) -> Result<(), SdkError> {
        let reply: BalancesReply = self
            .client
            .call_as("refreshRailgunBalances", vec![arg(network)?, arg(wallet_id)?])
            .await?;
        log_debug!(
            "refreshed balances on {network}: {} private, {} public",
            reply.railgun.len(),
            reply.public.len()
        );
        let wallet_id = wallet_id.to_string();
        self.state.update(|state| {
            state
                .balances
                .railgun
                .entry(network)
                .or_default()
                .insert(wallet_id.clone(), reply.railgun);
            state
                .balances
                .public
                .entry(network)
                .or_default()
                .insert(wallet_id, reply.public);
        });
        Ok(())
    }

    async fn sync_railgun_transactions_v2(&self, network: NetworkName) -> Result<(), SdkError> {
        let _: Value = self
            .client
            .call_as("syncRailgunTransactionsV2", vec![arg(network)?])
            .await?;
        Ok(())
    }

    async fn list_wallets(&self) -> Result<Vec<ActiveWallet>, SdkError> {
        self.client.call_as("listWallets", Vec::new()).await
    }

    async fn activate_wallet(&self, wallet_id: &str) -> Result<(), SdkError> {
        let _: Value = self
            .client
            .call_as("setActiveWallet", vec![arg(wallet_id)?])
            .await?;
        Ok(())
    }

    async fn poll_status(&self, network: NetworkName) -> Result<StatusReport, SdkError> {
        self.client
            .call_as("getScanStatus", vec![arg(network)?])
            .await
    }
}

/// Copies `report` into the store for `network`.
pub fn apply_status_report(state: &StateStore, network: NetworkName, report: StatusReport) {
    state.update(|snapshot| {
        for (tree, status) in report.merkletree {
            snapshot.merkletree_history_scan.set(network, tree, status);
        }
        snapshot.proof_batcher = report.proof_batcher;
        snapshot.broadcaster_status = report.broadcaster_status;
        snapshot.main_screen_alert = report.main_screen_alert;
        if let Some(omitted) = report.omitted_private_tokens {
            snapshot.omitted_private_tokens = omitted;
        }
    });
}

/// Polls scan status for the currently selected network until `shutdown`
/// flips to true.
pub fn spawn_status_poll(
    services: Arc<dyn WalletServices>,
    state: Arc<StateStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut failures = 0u32;
        loop {
            if *shutdown.borrow() {
                break;
            }
            let network = state.snapshot().network;
            match services.poll_status(network).await {
                Ok(report) => {
                    if failures > 0 {
                        log_info!("status poll recovered after {failures} failures");
                    }
                    failures = 0;
                    apply_status_report(&state, network, report);
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    if failures == 1 {
                        log_warn!("status poll failed on {network}: {err}");
                    } else {
                        log_debug!("status poll failed on {network}: {err}");
                    }
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppSnapshot;
    use serde_json::json;
    use shade_models::{MerkletreeScanStatus, TxidVersion};

    #[test]
    fn status_report_decodes_sdk_shape() {
        let report: StatusReport = serde_json::from_value(json!({
            "merkletree": {
                "UTXO": {"status": "Updated", "progress": 12.5},
                "TXID": {"status": "Complete"},
            },
            "proofBatcher": {"status": "Proving 1/4 (25.00%)"},
        }))
        .unwrap();
        assert_eq!(
            report.merkletree.get(&MerkletreeType::Utxo),
            Some(&MerkletreeScanCurrentStatus::new(
                MerkletreeScanStatus::Updated,
                12.5
            ))
        );
        assert_eq!(
            report.merkletree.get(&MerkletreeType::Txid).map(|s| s.progress),
            Some(0.0)
        );
        assert!(report.proof_batcher.is_updating());
        assert_eq!(report.omitted_private_tokens, None);
    }

    #[test]
    fn omitted_private_tokens_reach_the_store() {
        let state = StateStore::new(AppSnapshot::new(
            NetworkName::Ethereum,
            TxidVersion::V2PoseidonMerkle,
        ));
        let report: StatusReport = serde_json::from_value(json!({
            "omittedPrivateTokens": {
                "omittedPrivateTokens": [
                    {"address": "0x6b175474e89094c44da98b954eedeac495271d0f", "symbol": "DAI"},
                ],
                "shouldShowOmittedPrivateTokensModal": true,
            },
        }))
        .unwrap();
        apply_status_report(&state, NetworkName::Ethereum, report);
        let omitted = state.snapshot().omitted_private_tokens;
        assert!(omitted.should_show_omitted_private_tokens_modal);
        assert_eq!(omitted.omitted_private_tokens.len(), 1);
        assert_eq!(omitted.omitted_private_tokens[0].symbol, "DAI");

        // A report without the section leaves the stored list alone.
        apply_status_report(&state, NetworkName::Ethereum, StatusReport::default());
        assert!(
            state
                .snapshot()
                .omitted_private_tokens
                .should_show_omitted_private_tokens_modal
        );

        let cleared: StatusReport = serde_json::from_value(json!({
            "omittedPrivateTokens": {"omittedPrivateTokens": []},
        }))
        .unwrap();
        apply_status_report(&state, NetworkName::Ethereum, cleared);
        let omitted = state.snapshot().omitted_private_tokens;
        assert!(!omitted.should_show_omitted_private_tokens_modal);
        assert!(omitted.omitted_private_tokens.is_empty());
    }

    #[test]
    fn apply_status_report_writes_network_entry() {
        let state = StateStore::new(AppSnapshot::new(
            NetworkName::Arbitrum,
            TxidVersion::V2PoseidonMerkle,
        ));
        let mut report = StatusReport::default();
        report.merkletree.insert(
            MerkletreeType::Txid,
            MerkletreeScanCurrentStatus::new(MerkletreeScanStatus::Started, 3.0),
        );
        apply_status_report(&state, NetworkName::Arbitrum, report);
        let snapshot = state.snapshot();
        assert_eq!(
            snapshot
                .merkletree_history_scan
                .status(NetworkName::Arbitrum, MerkletreeType::Txid)
                .map(|s| s.status),
            Some(MerkletreeScanStatus::Started)
        );
    }
}
