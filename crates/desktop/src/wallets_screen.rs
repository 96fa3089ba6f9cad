//! View-model for the wallet balances screen.
//!
//! The screen owns only transient UI state. Everything it displays comes from
//! an [`AppSnapshot`] passed in by the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shade_log::{log_debug, log_info, log_warn};
use shade_models::{
    MerkletreeType, NetworkName, RailgunWalletBalanceBucket, TokenBalance, TxidVersion,
};
use shade_storage::{StorageService, StoreError};
use shade_worker::SdkError;
use tokio::task::JoinHandle;

use crate::services::WalletServices;
use crate::state::{ActiveWallet, AppSnapshot, MainScreenAlert, StateStore};

pub const HAS_SEEN_RPC_SET_UP: &str = "HAS_SEEN_RPC_SET_UP";

/// Buckets shown in the balances list.
pub const BALANCE_BUCKET_FILTER: [RailgunWalletBalanceBucket; 1] =
    [RailgunWalletBalanceBucket::Spendable];

pub fn rpc_set_up_key(network: NetworkName) -> String {
    format!("{HAS_SEEN_RPC_SET_UP}_{}", network.as_str())
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TokenActionType {
    SendTokens,
    ReceiveTokens,
    ShieldTokens,
    UnshieldTokens,
    ImportWallet,
    CreateWallet,
    MintTestTokens,
}

impl TokenActionType {
    pub fn label(self) -> &'static str {
        match self {
            TokenActionType::SendTokens => "Send",
            TokenActionType::ReceiveTokens => "Receive",
            TokenActionType::ShieldTokens => "Shield",
            TokenActionType::UnshieldTokens => "Unshield",
            TokenActionType::ImportWallet => "Import wallet",
            TokenActionType::CreateWallet => "Create wallet",
            TokenActionType::MintTestTokens => "Mint test tokens",
        }
    }
}

/// Which wallet card is showing: the private balances or the public ones.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Slide {
    #[default]
    Railgun,
    Public,
}

impl Slide {
    pub fn is_railgun(self) -> bool {
        matches!(self, Slide::Railgun)
    }

    pub fn toggled(self) -> Self {
        match self {
            Slide::Railgun => Slide::Public,
            Slide::Public => Slide::Railgun,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WalletCreationModal {
    CreatePassword,
    CreateWallet,
    ImportWallet,
    SeedPhraseCallout,
    ViewingKeyCallout,
    NewWalletSuccess,
}

impl WalletCreationModal {
    /// Step that follows once this one is confirmed. `None` ends the flow.
    pub fn next(self) -> Option<Self> {
        match self {
            WalletCreationModal::CreatePassword => Some(WalletCreationModal::CreateWallet),
            WalletCreationModal::CreateWallet => Some(WalletCreationModal::SeedPhraseCallout),
            WalletCreationModal::SeedPhraseCallout => Some(WalletCreationModal::ViewingKeyCallout),
            WalletCreationModal::ViewingKeyCallout | WalletCreationModal::ImportWallet => {
                Some(WalletCreationModal::NewWalletSuccess)
            }
            WalletCreationModal::NewWalletSuccess => None,
        }
    }
}

/// Wallet picker opened from the status bar.
#[derive(Clone, Debug, PartialEq)]
pub struct WalletSelector {
    pub wallets: Vec<ActiveWallet>,
    pub selected: usize,
}

impl WalletSelector {
    pub fn selected_wallet(&self) -> Option<&ActiveWallet> {
        self.wallets.get(self.selected)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ErrorDetails {
    pub message: String,
    pub code: Option<i64>,
}

impl From<SdkError> for ErrorDetails {
    fn from(err: SdkError) -> Self {
        Self {
            message: err.message,
            code: err.code,
        }
    }
}

/// The one loading banner shown above the token list, if any.
#[derive(Clone, Debug, PartialEq)]
pub enum Banner {
    BalancesUpdating { progress: f64 },
    TxidsUpdating { progress: f64 },
    BatchUpdating { status: String },
}

impl Banner {
    pub fn title(&self) -> &str {
        match self {
            Banner::BalancesUpdating { .. } => "RAILGUN balances updating",
            Banner::TxidsUpdating { .. } => "RAILGUN TXIDs updating",
            Banner::BatchUpdating { status } => status,
        }
    }

    pub fn progress(&self) -> Option<f64> {
        match self {
            Banner::BalancesUpdating { progress } | Banner::TxidsUpdating { progress } => {
                Some(*progress)
            }
            Banner::BatchUpdating { .. } => None,
        }
    }
}

/// Handle to a history sync started by a refresh. Dropping it detaches the
/// task.
pub struct SyncTask {
    network: NetworkName,
    handle: JoinHandle<()>,
}

impl SyncTask {
    pub fn network(&self) -> NetworkName {
        self.network
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the sync to end. Sync failures are not reported here.
    pub async fn wait(self) {
        if let Err(err) = self.handle.await {
            log_debug!("history sync task ended abnormally: {err}");
        }
    }
}

pub enum RefreshOutcome {
    AlreadyRefreshing,
    Refreshed { sync: Option<SyncTask> },
}

impl RefreshOutcome {
    pub fn was_skipped(&self) -> bool {
        matches!(self, RefreshOutcome::AlreadyRefreshing)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScreenState {
    pub token_search_text: String,
    pub show_omitted_private_tokens_modal: bool,
    pub show_rpcs_set_up_modal: bool,
    pub error_modal: Option<ErrorDetails>,
    pub wallet_creation_modal: Option<WalletCreationModal>,
    pub wallet_selector: Option<WalletSelector>,
    pub alert: Option<MainScreenAlert>,
    pub slide: Slide,
}

/// Clears the refresh flag when a refresh ends, however it ends.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct WalletsScreen {
    services: Arc<dyn WalletServices>,
    storage: StorageService,
    refreshing: AtomicBool,
    state: Mutex<ScreenState>,
}

impl WalletsScreen {
    pub fn new(services: Arc<dyn WalletServices>, storage: StorageService) -> Self {
        Self {
            services,
            storage,
            refreshing: AtomicBool::new(false),
            state: Mutex::new(ScreenState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScreenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn view(&self) -> ScreenState {
        self.lock().clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    fn report_error(&self, what: &str, err: SdkError) {
        log_warn!("{what} failed: {err}");
        self.lock().error_modal = Some(err.into());
    }

    /// Pulls prices, then balances when a wallet is active. With a V2 TXID
    /// version and an active wallet, a history sync is started afterwards and
    /// handed back without being awaited.
    pub async fn refresh_balances(&self, snapshot: &AppSnapshot) -> RefreshOutcome {
        if self.refreshing.swap(true, Ordering::AcqRel) {
            return RefreshOutcome::AlreadyRefreshing;
        }
        let network = snapshot.network;
        {
            let _guard = RefreshGuard(&self.refreshing);
            if let Err(err) = self.services.pull_prices(network).await {
                self.report_error("price refresh", err);
            }
            if let Some(wallet) = snapshot.active_wallet() {
                if let Err(err) = self
                    .services
                    .refresh_railgun_balances(network, &wallet.id)
                    .await
                {
                    self.report_error("balance refresh", err);
                }
            }
        }

        let sync = if snapshot.txid_version == TxidVersion::V2PoseidonMerkle
            && snapshot.active_wallet().is_some()
        {
            let services = Arc::clone(&self.services);
            let handle = tokio::spawn(async move {
                if let Err(err) = services.sync_railgun_transactions_v2(network).await {
                    log_debug!("history sync on {network} failed: {err}");
                }
            });
            Some(SyncTask { network, handle })
        } else {
            None
        };
        RefreshOutcome::Refreshed { sync }
    }

    /// Shows the RPC setup modal the first time `network` is seen and records
    /// that it was shown. Returns whether the modal was opened.
    pub fn check_rpc_set_up_modal(&self, network: NetworkName) -> Result<bool, StoreError> {
        let key = rpc_set_up_key(network);
        if self.storage.get_item(&key)?.is_some() {
            return Ok(false);
        }
        self.lock().show_rpcs_set_up_modal = true;
        self.storage.set_item(&key, "1")?;
        Ok(true)
    }

    pub fn on_omitted_tokens_changed(&self, snapshot: &AppSnapshot) {
        self.lock().show_omitted_private_tokens_modal = snapshot
            .omitted_private_tokens
            .should_show_omitted_private_tokens_modal;
    }

    pub fn on_main_screen_alert_changed(&self, snapshot: &AppSnapshot) {
        self.lock().alert = snapshot.main_screen_alert.clone();
    }

    /// Lists the SDK's wallets and opens the selector on the active one.
    /// A failed listing shows the error modal instead.
    pub async fn open_wallet_selector(&self, snapshot: &AppSnapshot) -> bool {
        match self.services.list_wallets().await {
            Ok(wallets) => {
                let selected = snapshot
                    .active_wallet()
                    .and_then(|active| wallets.iter().position(|wallet| wallet.id == active.id))
                    .unwrap_or(0);
                self.lock().wallet_selector = Some(WalletSelector { wallets, selected });
                true
            }
            Err(err) => {
                self.report_error("wallet listing", err);
                false
            }
        }
    }

    /// Moves the selector highlight, wrapping at both ends.
    pub fn move_wallet_selection(&self, forward: bool) {
        let mut state = self.lock();
        let Some(selector) = state.wallet_selector.as_mut() else {
            return;
        };
        let len = selector.wallets.len();
        if len == 0 {
            return;
        }
        selector.selected = if forward {
            (selector.selected + 1) % len
        } else {
            (selector.selected + len - 1) % len
        };
    }

    /// Closes the selector and hands back the highlighted wallet.
    pub fn take_selected_wallet(&self) -> Option<ActiveWallet> {
        let selector = self.lock().wallet_selector.take()?;
        selector.wallets.into_iter().nth(selector.selected)
    }

    /// Switches the SDK to `wallet`, then the store. The store keeps the
    /// previous wallet when the SDK refuses.
    pub async fn activate_wallet(&self, store: &StateStore, wallet: ActiveWallet) -> bool {
        match self.services.activate_wallet(&wallet.id).await {
            Ok(()) => {
                log_info!("active wallet is now {}", wallet.name);
                store.set_active_wallet(Some(wallet));
                true
            }
            Err(err) => {
                self.report_error("wallet switch", err);
                false
            }
        }
    }

    pub fn banner(&self, snapshot: &AppSnapshot) -> Option<Banner> {
        select_banner(snapshot, self.lock().slide)
    }

    pub fn hide_broadcaster_status(snapshot: &AppSnapshot) -> bool {
        snapshot
            .active_wallet()
            .is_some_and(|wallet| wallet.is_view_only)
    }

    pub fn visible_tokens(&self, snapshot: &AppSnapshot) -> Vec<TokenBalance> {
        let (slide, search) = {
            let state = self.lock();
            (state.slide, state.token_search_text.clone())
        };
        filter_tokens(snapshot, slide, &search)
    }

    pub fn available_actions(&self, snapshot: &AppSnapshot) -> Vec<TokenActionType> {
        let slide = self.lock().slide;
        let Some(wallet) = snapshot.active_wallet() else {
            return vec![TokenActionType::CreateWallet, TokenActionType::ImportWallet];
        };
        if wallet.is_view_only {
            return vec![TokenActionType::ReceiveTokens];
        }
        let mut actions = vec![TokenActionType::SendTokens, TokenActionType::ReceiveTokens];
        match slide {
            Slide::Railgun => actions.push(TokenActionType::UnshieldTokens),
            Slide::Public => {
                actions.push(TokenActionType::ShieldTokens);
                if snapshot.network.is_testnet() {
                    actions.push(TokenActionType::MintTestTokens);
                }
            }
        }
        actions
    }

    pub fn set_token_search_text(&self, text: impl Into<String>) {
        self.lock().token_search_text = text.into();
    }

    pub fn set_slide(&self, slide: Slide) {
        self.lock().slide = slide;
    }

    pub fn toggle_slide(&self) -> Slide {
        let mut state = self.lock();
        state.slide = state.slide.toggled();
        state.slide
    }

    pub fn dismiss_error_modal(&self) {
        self.lock().error_modal = None;
    }

    pub fn close_omitted_private_tokens_modal(&self) {
        self.lock().show_omitted_private_tokens_modal = false;
    }

    pub fn close_rpcs_set_up_modal(&self) {
        self.lock().show_rpcs_set_up_modal = false;
    }

    pub fn show_create_password(&self) {
        self.lock().wallet_creation_modal = Some(WalletCreationModal::CreatePassword);
    }

    pub fn show_create_wallet(&self) {
        self.lock().wallet_creation_modal = Some(WalletCreationModal::CreateWallet);
    }

    pub fn show_import_wallet(&self) {
        self.lock().wallet_creation_modal = Some(WalletCreationModal::ImportWallet);
    }

    pub fn close_wallet_creation_modal(&self) {
        self.lock().wallet_creation_modal = None;
    }

    /// Confirms the current wallet creation step and shows the next one.
    pub fn advance_wallet_creation(&self) -> Option<WalletCreationModal> {
        let mut state = self.lock();
        state.wallet_creation_modal = state
            .wallet_creation_modal
            .and_then(WalletCreationModal::next);
        state.wallet_creation_modal
    }

    pub fn dismiss_alert(&self) {
        self.lock().alert = None;
    }

    pub fn close_wallet_selector(&self) {
        self.lock().wallet_selector = None;
    }

    /// Closes whichever modal is on top. Returns false if none was open.
    pub fn close_top_modal(&self) -> bool {
        let mut state = self.lock();
        if state.error_modal.take().is_some() {
            return true;
        }
        if state.show_rpcs_set_up_modal {
            state.show_rpcs_set_up_modal = false;
            return true;
        }
        if state.show_omitted_private_tokens_modal {
            state.show_omitted_private_tokens_modal = false;
            return true;
        }
        if state.alert.take().is_some() || state.wallet_selector.take().is_some() {
            return true;
        }
        state.wallet_creation_modal.take().is_some()
    }
}

fn scan_updating(snapshot: &AppSnapshot, tree: MerkletreeType) -> Option<f64> {
    let status = snapshot
        .merkletree_history_scan
        .status(snapshot.network, tree)?;
    status.status.is_in_progress().then_some(status.progress)
}

/// Balances > TXIDs > batch. The first two only show on the private slide.
pub fn select_banner(snapshot: &AppSnapshot, slide: Slide) -> Option<Banner> {
    let balances = scan_updating(snapshot, MerkletreeType::Utxo);
    let txids = scan_updating(snapshot, MerkletreeType::Txid);
    if let Some(progress) = balances {
        return slide
            .is_railgun()
            .then_some(Banner::BalancesUpdating { progress });
    }
    if let Some(progress) = txids {
        return slide
            .is_railgun()
            .then_some(Banner::TxidsUpdating { progress });
    }
    if snapshot.proof_batcher.is_updating() {
        return Some(Banner::BatchUpdating {
            status: snapshot.proof_batcher.progress_text().to_string(),
        });
    }
    None
}

pub fn filter_tokens(snapshot: &AppSnapshot, slide: Slide, search: &str) -> Vec<TokenBalance> {
    let Some(wallet) = snapshot.active_wallet() else {
        return Vec::new();
    };
    let balances = match slide {
        Slide::Railgun => snapshot.balances.railgun_for(snapshot.network, &wallet.id),
        Slide::Public => snapshot.balances.public_for(snapshot.network, &wallet.id),
    };
    let needle = search.trim().to_lowercase();
    balances
        .iter()
        .filter(|balance| {
            !slide.is_railgun() || BALANCE_BUCKET_FILTER.contains(&balance.balance_bucket)
        })
        .filter(|balance| {
            needle.is_empty()
                || balance.symbol.to_lowercase().contains(&needle)
                || balance.token_address.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}
