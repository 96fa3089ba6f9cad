use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Sender, TryRecvError};
use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use tokio::runtime::Handle;
use tokio::sync::watch;

use shade_log as logging;
use shade_log::{log_debug, log_warn};
use shade_models::{NetworkName, TokenBalance};
use shade_storage::StorageService;
use shade_worker::BridgeClient;

use crate::state::{ActiveWallet, AppSnapshot, MainScreenAlert, StateStore, DISCREET_MODE_KEY};
use crate::wallets_screen::{
    Banner, RefreshOutcome, ScreenState, SyncTask, TokenActionType, WalletCreationModal,
    WalletsScreen,
};

const UI_TICK: Duration = Duration::from_millis(100);
const LOG_PANEL_LIMIT: usize = 200;
const AMOUNT_FRACTION_DIGITS: usize = 6;
const DISCREET_MASK: &str = "***";

#[derive(Clone, Copy, Debug)]
struct Theme {
    bg: Color,
    panel: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    accent_alt: Color,
    warning: Color,
    danger: Color,
    success: Color,
}

const THEME: Theme = Theme {
    bg: Color::Rgb(0, 0, 0),
    panel: Color::Rgb(10, 10, 10),
    border: Color::Rgb(40, 40, 40),
    text: Color::Rgb(230, 230, 230),
    muted: Color::Rgb(100, 100, 100),
    accent: Color::Rgb(0, 122, 204),
    accent_alt: Color::Rgb(50, 168, 82),
    warning: Color::Rgb(255, 180, 0),
    danger: Color::Rgb(255, 60, 60),
    success: Color::Rgb(80, 200, 80),
};

fn style_base() -> Style {
    Style::default().fg(THEME.text).bg(THEME.bg)
}

fn style_panel() -> Style {
    Style::default().fg(THEME.text).bg(THEME.panel)
}

fn style_muted() -> Style {
    Style::default().fg(THEME.muted).bg(THEME.panel)
}

fn style_key() -> Style {
    Style::default()
        .fg(THEME.accent)
        .bg(THEME.panel)
        .add_modifier(Modifier::BOLD)
}

fn style_border() -> Style {
    Style::default().fg(THEME.border).bg(THEME.panel)
}

fn style_title() -> Style {
    Style::default()
        .fg(THEME.text)
        .bg(THEME.panel)
        .add_modifier(Modifier::BOLD)
}

fn style_error() -> Style {
    Style::default()
        .fg(THEME.danger)
        .bg(THEME.panel)
        .add_modifier(Modifier::BOLD)
}

fn style_warn() -> Style {
    Style::default()
        .fg(THEME.warning)
        .bg(THEME.panel)
        .add_modifier(Modifier::BOLD)
}

fn style_ok() -> Style {
    Style::default().fg(THEME.success).bg(THEME.panel)
}

fn panel_block(title: impl Into<String>) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
        .border_style(style_border())
        .style(Style::default().bg(THEME.panel))
        .title(Span::styled(title.into(), style_title()))
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self, String> {
        enable_raw_mode().map_err(|err| err.to_string())?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide).map_err(|err| err.to_string())?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, Show, LeaveAlternateScreen);
    }
}

/// Everything the TUI thread needs. Async work is spawned onto `runtime`.
pub struct TuiContext {
    pub runtime: Handle,
    pub state: Arc<StateStore>,
    pub screen: Arc<WalletsScreen>,
    pub storage: StorageService,
    pub worker: Option<Arc<BridgeClient>>,
    pub shutdown_rx: watch::Receiver<bool>,
    pub shutdown_tx: watch::Sender<bool>,
}

enum UiEvent {
    Refreshed(RefreshOutcome),
    WalletSelectorOpened(bool),
    WalletActivated(Option<String>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum KeyAction {
    Continue,
    Refresh,
    OpenWalletSelector,
    ActivateWallet(ActiveWallet),
    Quit,
}

/// Modals in drawing order; the first one present is on top.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TopModal {
    Error,
    RpcSetUp,
    OmittedTokens,
    Alert,
    WalletSelector,
    WalletCreation(WalletCreationModal),
}

fn top_modal(view: &ScreenState) -> Option<TopModal> {
    if view.error_modal.is_some() {
        Some(TopModal::Error)
    } else if view.show_rpcs_set_up_modal {
        Some(TopModal::RpcSetUp)
    } else if view.show_omitted_private_tokens_modal {
        Some(TopModal::OmittedTokens)
    } else if view.alert.is_some() {
        Some(TopModal::Alert)
    } else if view.wallet_selector.is_some() {
        Some(TopModal::WalletSelector)
    } else {
        view.wallet_creation_modal.map(TopModal::WalletCreation)
    }
}

struct TuiState {
    search_editing: bool,
    last_network: Option<NetworkName>,
    last_omitted: bool,
    last_alert: Option<MainScreenAlert>,
    status_line: Option<String>,
    show_logs: bool,
    syncs: Vec<SyncTask>,
}

impl TuiState {
    fn new() -> Self {
        Self {
            search_editing: false,
            last_network: None,
            last_omitted: false,
            last_alert: None,
            status_line: None,
            show_logs: false,
            syncs: Vec::new(),
        }
    }

    /// Returns true when the event calls for a balance refresh.
    fn apply_event(&mut self, event: UiEvent) -> bool {
        match event {
            UiEvent::Refreshed(outcome) => match outcome {
                RefreshOutcome::AlreadyRefreshing => {
                    self.status_line = Some("Refresh already running".to_string());
                }
                RefreshOutcome::Refreshed { sync } => {
                    self.status_line = Some("Balances refreshed".to_string());
                    if let Some(sync) = sync {
                        self.status_line =
                            Some(format!("Balances refreshed, syncing history on {}", sync.network()));
                        self.syncs.push(sync);
                    }
                }
            },
            UiEvent::WalletSelectorOpened(opened) => {
                if !opened {
                    self.status_line = Some("Wallet list unavailable".to_string());
                }
            }
            UiEvent::WalletActivated(Some(name)) => {
                self.status_line = Some(format!("Switched to {name}"));
                return true;
            }
            UiEvent::WalletActivated(None) => {
                self.status_line = Some("Wallet switch failed".to_string());
            }
        }
        false
    }

    fn prune_syncs(&mut self) {
        let before = self.syncs.len();
        self.syncs.retain(|sync| !sync.is_finished());
        if before > 0 && self.syncs.is_empty() {
            self.status_line = Some("History sync finished".to_string());
        }
    }
}

/// What one frame shows, captured before drawing so the screen lock is not
/// held while rendering.
struct ScreenFrame {
    snapshot: AppSnapshot,
    view: ScreenState,
    banner: Option<Banner>,
    tokens: Vec<TokenBalance>,
    actions: Vec<TokenActionType>,
    refreshing: bool,
    worker: &'static str,
}

impl ScreenFrame {
    fn capture(screen: &WalletsScreen, snapshot: AppSnapshot, worker: Option<&BridgeClient>) -> Self {
        Self {
            view: screen.view(),
            banner: screen.banner(&snapshot),
            tokens: screen.visible_tokens(&snapshot),
            actions: screen.available_actions(&snapshot),
            refreshing: screen.is_refreshing(),
            worker: worker_label(worker),
            snapshot,
        }
    }
}

fn worker_label(worker: Option<&BridgeClient>) -> &'static str {
    match worker {
        None => "off",
        Some(client) if client.is_closed() => "exited",
        Some(_) => "ready",
    }
}

pub fn run_tui(ctx: TuiContext) -> Result<(), String> {
    logging::set_stderr_enabled(false);
    let _guard = match TerminalGuard::enter() {
        Ok(guard) => guard,
        Err(err) => {
            logging::set_stderr_enabled(true);
            return Err(err);
        }
    };
    let result = run_loop(&ctx);
    logging::set_stderr_enabled(true);
    let _ = ctx.shutdown_tx.send(true);
    result
}

fn run_loop(ctx: &TuiContext) -> Result<(), String> {
    let stdout = io::stdout();
    let term_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(term_backend).map_err(|err| err.to_string())?;
    terminal.clear().map_err(|err| err.to_string())?;

    let (events_tx, events_rx) = crossbeam_channel::unbounded::<UiEvent>();
    let mut state = TuiState::new();

    loop {
        if *ctx.shutdown_rx.borrow() {
            break;
        }

        let mut refresh_needed = false;
        loop {
            match events_rx.try_recv() {
                Ok(event) => refresh_needed |= state.apply_event(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        state.prune_syncs();
        if refresh_needed {
            request_refresh(ctx, &mut state, &events_tx);
        }

        let snapshot = ctx.state.snapshot();
        if state.last_network != Some(snapshot.network) {
            state.last_network = Some(snapshot.network);
            match ctx.screen.check_rpc_set_up_modal(snapshot.network) {
                Ok(shown) => {
                    if shown {
                        log_debug!("first visit to {}, showing RPC setup", snapshot.network);
                    }
                }
                Err(err) => {
                    log_warn!("failed to read RPC setup marker: {err}");
                    state.status_line = Some(format!("Settings unavailable: {err}"));
                }
            }
            request_refresh(ctx, &mut state, &events_tx);
        }
        let omitted = snapshot
            .omitted_private_tokens
            .should_show_omitted_private_tokens_modal;
        if omitted != state.last_omitted {
            state.last_omitted = omitted;
            ctx.screen.on_omitted_tokens_changed(&snapshot);
        }
        if snapshot.main_screen_alert != state.last_alert {
            state.last_alert = snapshot.main_screen_alert.clone();
            ctx.screen.on_main_screen_alert_changed(&snapshot);
        }

        let frame = ScreenFrame::capture(&ctx.screen, snapshot, ctx.worker.as_deref());
        terminal
            .draw(|f| draw(f, &frame, &state))
            .map_err(|err| err.to_string())?;

        if !event::poll(UI_TICK).map_err(|err| err.to_string())? {
            continue;
        }
        match event::read().map_err(|err| err.to_string())? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                match handle_key(key, &mut state, &ctx.screen, &ctx.state, &ctx.storage) {
                    KeyAction::Quit => break,
                    KeyAction::Refresh => request_refresh(ctx, &mut state, &events_tx),
                    KeyAction::OpenWalletSelector => {
                        request_wallet_selector(ctx, &mut state, &events_tx)
                    }
                    KeyAction::ActivateWallet(wallet) => {
                        request_wallet_switch(ctx, &mut state, &events_tx, wallet)
                    }
                    KeyAction::Continue => {}
                }
            }
            Event::Resize(_, _) => {
                terminal.clear().map_err(|err| err.to_string())?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn request_refresh(ctx: &TuiContext, state: &mut TuiState, events: &Sender<UiEvent>) {
    if ctx.screen.is_refreshing() {
        state.status_line = Some("Refresh already running".to_string());
        return;
    }
    state.status_line = Some("Refreshing balances...".to_string());
    let screen = Arc::clone(&ctx.screen);
    let snapshot = ctx.state.snapshot();
    let events = events.clone();
    ctx.runtime.spawn(async move {
        let outcome = screen.refresh_balances(&snapshot).await;
        let _ = events.send(UiEvent::Refreshed(outcome));
    });
}

fn request_wallet_selector(ctx: &TuiContext, state: &mut TuiState, events: &Sender<UiEvent>) {
    state.status_line = Some("Loading wallets...".to_string());
    let screen = Arc::clone(&ctx.screen);
    let snapshot = ctx.state.snapshot();
    let events = events.clone();
    ctx.runtime.spawn(async move {
        let opened = screen.open_wallet_selector(&snapshot).await;
        let _ = events.send(UiEvent::WalletSelectorOpened(opened));
    });
}

fn request_wallet_switch(
    ctx: &TuiContext,
    state: &mut TuiState,
    events: &Sender<UiEvent>,
    wallet: ActiveWallet,
) {
    if ctx.state.snapshot().active_wallet() == Some(&wallet) {
        return;
    }
    state.status_line = Some(format!("Switching to {}...", wallet.name));
    let screen = Arc::clone(&ctx.screen);
    let store = Arc::clone(&ctx.state);
    let events = events.clone();
    ctx.runtime.spawn(async move {
        let name = wallet.name.clone();
        let switched = screen.activate_wallet(&store, wallet).await;
        let _ = events.send(UiEvent::WalletActivated(switched.then_some(name)));
    });
}

fn next_network(current: NetworkName) -> NetworkName {
    let all = NetworkName::ALL;
    let idx = all.iter().position(|n| *n == current).unwrap_or(0);
    all[(idx + 1) % all.len()]
}

fn has_modal(view: &ScreenState) -> bool {
    top_modal(view).is_some()
}

fn handle_key(
    key: KeyEvent,
    state: &mut TuiState,
    screen: &WalletsScreen,
    store: &StateStore,
    storage: &StorageService,
) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }

    if state.search_editing {
        let mut text = screen.view().token_search_text;
        match key.code {
            KeyCode::Esc | KeyCode::Enter => state.search_editing = false,
            KeyCode::Backspace => {
                text.pop();
                screen.set_token_search_text(text);
            }
            KeyCode::Char(ch) => {
                text.push(ch);
                screen.set_token_search_text(text);
            }
            _ => {}
        }
        return KeyAction::Continue;
    }

    if let Some(top) = top_modal(&screen.view()) {
        match (top, key.code) {
            (_, KeyCode::Char('q')) => return KeyAction::Quit,
            (TopModal::WalletSelector, KeyCode::Up | KeyCode::Char('k')) => {
                screen.move_wallet_selection(false);
            }
            (TopModal::WalletSelector, KeyCode::Down | KeyCode::Char('j')) => {
                screen.move_wallet_selection(true);
            }
            (TopModal::WalletSelector, KeyCode::Enter) => {
                if let Some(wallet) = screen.take_selected_wallet() {
                    return KeyAction::ActivateWallet(wallet);
                }
            }
            (TopModal::WalletCreation(_), KeyCode::Enter) => {
                screen.advance_wallet_creation();
            }
            (_, KeyCode::Esc | KeyCode::Enter | KeyCode::Char(' ')) => {
                screen.close_top_modal();
            }
            _ => {}
        }
        return KeyAction::Continue;
    }

    match key.code {
        KeyCode::Char('q') => return KeyAction::Quit,
        KeyCode::Char('r') => return KeyAction::Refresh,
        KeyCode::Char('/') => state.search_editing = true,
        KeyCode::Esc => {
            if !screen.view().token_search_text.is_empty() {
                screen.set_token_search_text("");
            }
        }
        KeyCode::Tab | KeyCode::BackTab => {
            screen.toggle_slide();
        }
        KeyCode::Char('d') => {
            let enabled = !store.snapshot().discreet_mode.enabled;
            store.set_discreet(enabled);
            let value = if enabled { "1" } else { "0" };
            if let Err(err) = storage.set_item(DISCREET_MODE_KEY, value) {
                log_warn!("failed to persist discreet mode: {err}");
                state.status_line = Some(format!("Discreet mode not saved: {err}"));
            }
        }
        KeyCode::Char('p') => screen.show_create_password(),
        KeyCode::Char('c') => screen.show_create_wallet(),
        KeyCode::Char('i') => screen.show_import_wallet(),
        KeyCode::Char('n') => {
            let next = next_network(store.snapshot().network);
            store.set_network(next);
        }
        KeyCode::Char('l') => state.show_logs = !state.show_logs,
        KeyCode::Char('w') => return KeyAction::OpenWalletSelector,
        _ => {}
    }
    KeyAction::Continue
}

fn draw(f: &mut Frame<'_>, frame: &ScreenFrame, state: &TuiState) {
    let area = f.area();
    f.render_widget(Block::default().style(style_base()), area);

    let (main, logs) = if state.show_logs {
        let split = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(10), Constraint::Length(10)])
            .split(area);
        (split[0], Some(split[1]))
    } else {
        (area, None)
    };

    let banner_height = if frame.banner.is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(banner_height),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(main);

    draw_status(f, chunks[0], frame);
    draw_actions(f, chunks[1], frame);
    if let Some(banner) = frame.banner.as_ref() {
        draw_banner(f, chunks[2], banner);
    }
    draw_search(f, chunks[3], frame, state);
    draw_tokens(f, chunks[4], frame);
    draw_footer(f, chunks[5], state);
    if let Some(logs) = logs {
        draw_logs(f, logs);
    }
    draw_modal(f, area, frame);
}

fn draw_status(f: &mut Frame<'_>, area: Rect, frame: &ScreenFrame) {
    let snapshot = &frame.snapshot;
    let wallet = match snapshot.active_wallet() {
        Some(wallet) if wallet.is_view_only => format!("{} (view-only)", wallet.name),
        Some(wallet) => wallet.name.clone(),
        None => "none".to_string(),
    };
    let slide = if frame.view.slide.is_railgun() {
        "Private"
    } else {
        "Public"
    };
    let mut spans = vec![
        Span::styled("Network ", style_muted()),
        Span::styled(snapshot.network.public_name(), style_panel()),
        Span::styled("  Wallet ", style_muted()),
        Span::styled(shorten(&wallet, 32), style_panel()),
        Span::styled("  View ", style_muted()),
        Span::styled(slide, style_key()),
        Span::styled("  TXID ", style_muted()),
        Span::styled(snapshot.txid_version.as_str(), style_panel()),
        Span::styled("  Worker ", style_muted()),
        Span::styled(
            frame.worker,
            if frame.worker == "exited" {
                style_error()
            } else {
                style_ok()
            },
        ),
    ];
    if frame.refreshing {
        spans.push(Span::styled("  refreshing", style_warn()));
    }
    let paragraph = Paragraph::new(Line::from(spans)).block(panel_block("Shade"));
    f.render_widget(paragraph, area);
}

fn draw_actions(f: &mut Frame<'_>, area: Rect, frame: &ScreenFrame) {
    let mut spans = Vec::new();
    for (idx, action) in frame.actions.iter().enumerate() {
        if idx > 0 {
            spans.push(Span::styled("  ", style_panel()));
        }
        spans.push(Span::styled(format!("[{}]", action.label()), style_key()));
    }
    if !WalletsScreen::hide_broadcaster_status(&frame.snapshot) {
        let status = frame
            .snapshot
            .broadcaster_status
            .as_deref()
            .unwrap_or("searching");
        spans.push(Span::styled("   Broadcasters ", style_muted()));
        spans.push(Span::styled(shorten(status, 40), style_panel()));
    }
    let paragraph = Paragraph::new(Line::from(spans)).block(panel_block("Actions"));
    f.render_widget(paragraph, area);
}

fn draw_banner(f: &mut Frame<'_>, area: Rect, banner: &Banner) {
    match banner.progress() {
        Some(progress) => {
            let ratio = (progress / 100.0).clamp(0.0, 1.0);
            let gauge = Gauge::default()
                .block(panel_block(banner.title().to_string()))
                .gauge_style(Style::default().fg(THEME.accent_alt).bg(THEME.panel))
                .ratio(ratio)
                .label(format!("{progress:.1}%"));
            f.render_widget(gauge, area);
        }
        None => {
            let paragraph = Paragraph::new(Line::from(Span::styled(
                banner.title().to_string(),
                style_warn(),
            )))
            .block(panel_block("Proof batch"));
            f.render_widget(paragraph, area);
        }
    }
}

fn draw_search(f: &mut Frame<'_>, area: Rect, frame: &ScreenFrame, state: &TuiState) {
    let text = &frame.view.token_search_text;
    let line = if state.search_editing {
        Line::from(vec![
            Span::styled(text.clone(), style_panel()),
            Span::styled("_", style_key()),
        ])
    } else if text.is_empty() {
        Line::from(Span::styled("press / to search tokens", style_muted()))
    } else {
        Line::from(Span::styled(text.clone(), style_panel()))
    };
    f.render_widget(Paragraph::new(line).block(panel_block("Search")), area);
}

fn amount_text(balance: &TokenBalance, discreet: bool) -> String {
    if discreet {
        return DISCREET_MASK.to_string();
    }
    balance.format_amount(AMOUNT_FRACTION_DIGITS)
}

fn value_text(balance: &TokenBalance, price: Option<f64>, discreet: bool) -> String {
    let Some(price) = price else {
        return "-".to_string();
    };
    if discreet {
        return DISCREET_MASK.to_string();
    }
    match balance.format_amount(usize::from(balance.decimals)).parse::<f64>() {
        Ok(amount) => format!("${:.2}", amount * price),
        Err(_) => "-".to_string(),
    }
}

fn draw_tokens(f: &mut Frame<'_>, area: Rect, frame: &ScreenFrame) {
    let snapshot = &frame.snapshot;
    let title = if frame.view.slide.is_railgun() {
        "Private balances"
    } else {
        "Public balances"
    };
    if snapshot.active_wallet().is_none() {
        let paragraph = Paragraph::new(vec![
            Line::from(Span::styled("No wallet loaded.", style_panel())),
            Line::from(Span::styled(
                "Press c to create a wallet or i to import one.",
                style_muted(),
            )),
        ])
        .block(panel_block(title))
        .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    }
    if frame.tokens.is_empty() {
        let message = if frame.view.token_search_text.trim().is_empty() {
            "No tokens yet."
        } else {
            "No tokens match the search."
        };
        let paragraph = Paragraph::new(Line::from(Span::styled(message, style_muted())))
            .block(panel_block(title));
        f.render_widget(paragraph, area);
        return;
    }

    let discreet = snapshot.discreet_mode.enabled;
    let items: Vec<ListItem> = frame
        .tokens
        .iter()
        .map(|balance| {
            let price = snapshot.token_price(&balance.token_address);
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<10}", shorten(&balance.symbol, 10)), style_key()),
                Span::styled(
                    format!("{:>24}", amount_text(balance, discreet)),
                    style_panel(),
                ),
                Span::styled(
                    format!("{:>16}", value_text(balance, price, discreet)),
                    style_panel(),
                ),
                Span::styled(
                    format!("  {}", shorten(&balance.token_address, 14)),
                    style_muted(),
                ),
            ]))
        })
        .collect();
    f.render_widget(List::new(items).block(panel_block(title)), area);
}

fn draw_footer(f: &mut Frame<'_>, area: Rect, state: &TuiState) {
    let keys = [
        ("r", "refresh"),
        ("/", "search"),
        ("Tab", "private/public"),
        ("n", "network"),
        ("w", "wallets"),
        ("d", "discreet"),
        ("l", "logs"),
        ("q", "quit"),
    ];
    let mut spans = Vec::new();
    for (key, label) in keys {
        spans.push(Span::styled(format!(" {key} "), style_key()));
        spans.push(Span::styled(label, style_muted()));
    }
    if let Some(status) = state.status_line.as_deref() {
        spans.push(Span::styled(format!("   {status}"), style_panel()));
    }
    f.render_widget(Paragraph::new(Line::from(spans)).style(style_panel()), area);
}

fn draw_logs(f: &mut Frame<'_>, area: Rect) {
    let visible = usize::from(area.height.saturating_sub(2));
    let records = logging::captured(LOG_PANEL_LIMIT);
    let start = records.len().saturating_sub(visible);
    let lines: Vec<Line> = records[start..]
        .iter()
        .map(|record| {
            let style = match record.level {
                logging::Level::Error => style_error(),
                logging::Level::Warn => style_warn(),
                _ => style_muted(),
            };
            Line::from(vec![
                Span::styled(format!("{:<5} ", record.level.as_str()), style),
                Span::styled(record.msg.clone(), style_panel()),
            ])
        })
        .collect();
    let title = format!("Logs ({})", logging::max_level().as_str());
    f.render_widget(Paragraph::new(lines).block(panel_block(title)), area);
}

fn draw_modal(f: &mut Frame<'_>, area: Rect, frame: &ScreenFrame) {
    let view = &frame.view;
    let Some(top) = top_modal(view) else {
        return;
    };
    let (title, mut lines, style, hint) = match top {
        TopModal::Error => {
            let Some(error) = view.error_modal.as_ref() else {
                return;
            };
            let mut lines = vec![Line::from(Span::styled(error.message.clone(), style_panel()))];
            if let Some(code) = error.code {
                lines.push(Line::from(Span::styled(format!("code {code}"), style_muted())));
            }
            ("Error".to_string(), lines, style_error(), "Esc to close")
        }
        TopModal::RpcSetUp => (
            "RPC setup".to_string(),
            vec![
                Line::from(Span::styled(
                    format!(
                        "Balances on {} are read through the configured RPC providers.",
                        frame.snapshot.network.public_name()
                    ),
                    style_panel(),
                )),
                Line::from(Span::styled(
                    "Custom RPCs can be set in the wallet SDK settings.",
                    style_muted(),
                )),
            ],
            style_title(),
            "Esc to close",
        ),
        TopModal::OmittedTokens => {
            let omitted = &frame.snapshot.omitted_private_tokens.omitted_private_tokens;
            let mut lines = vec![Line::from(Span::styled(
                format!(
                    "{} private token(s) are hidden because they are not in your token list:",
                    omitted.len()
                ),
                style_panel(),
            ))];
            for token in omitted {
                lines.push(Line::from(Span::styled(
                    format!("  {} {}", token.symbol, shorten(&token.address, 14)),
                    style_muted(),
                )));
            }
            ("Hidden tokens".to_string(), lines, style_warn(), "Esc to close")
        }
        TopModal::Alert => {
            let Some(alert) = view.alert.as_ref() else {
                return;
            };
            (
                alert.title.clone(),
                vec![Line::from(Span::styled(alert.message.clone(), style_panel()))],
                style_warn(),
                "Esc to dismiss",
            )
        }
        TopModal::WalletSelector => {
            let Some(selector) = view.wallet_selector.as_ref() else {
                return;
            };
            let active_id = frame.snapshot.active_wallet().map(|wallet| wallet.id.as_str());
            let mut lines = Vec::new();
            if selector.wallets.is_empty() {
                lines.push(Line::from(Span::styled("No wallets yet.", style_muted())));
            }
            for (idx, wallet) in selector.wallets.iter().enumerate() {
                let marker = if idx == selector.selected { "> " } else { "  " };
                let mut label = shorten(&wallet.name, 32);
                if wallet.is_view_only {
                    label.push_str(" (view-only)");
                }
                if Some(wallet.id.as_str()) == active_id {
                    label.push_str(" *");
                }
                let style = if idx == selector.selected {
                    style_key()
                } else {
                    style_panel()
                };
                lines.push(Line::from(Span::styled(format!("{marker}{label}"), style)));
            }
            (
                "Wallets".to_string(),
                lines,
                style_title(),
                "Up/Down to move, Enter to select, Esc to close",
            )
        }
        TopModal::WalletCreation(modal) => {
            let text = match modal {
                WalletCreationModal::CreatePassword => {
                    "Create a password to encrypt your wallets."
                }
                WalletCreationModal::CreateWallet => "Create a new private wallet.",
                WalletCreationModal::ImportWallet => "Import a wallet from its mnemonic.",
                WalletCreationModal::SeedPhraseCallout => {
                    "Write down your seed phrase and keep it offline."
                }
                WalletCreationModal::ViewingKeyCallout => {
                    "Your viewing key shares read-only access to this wallet."
                }
                WalletCreationModal::NewWalletSuccess => "Your wallet is ready.",
            };
            (
                "Wallet".to_string(),
                vec![Line::from(Span::styled(text, style_panel()))],
                style_title(),
                "Enter to continue, Esc to close",
            )
        }
    };

    let modal = centered_rect(60, 40, area);
    f.render_widget(Clear, modal);
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(hint, style_muted())));
    let block = panel_block(title).border_style(style);
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        modal,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

fn shorten(value: &str, max: usize) -> String {
    let trimmed = value.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let end = trimmed
        .char_indices()
        .nth(max.saturating_sub(1))
        .map(|(idx, _)| idx)
        .unwrap_or(trimmed.len());
    format!("{}…", trimmed[..end].trim_end())
}
