use shade_log as logging;

pub mod services;
pub mod state;
pub mod tui;
pub mod wallets_screen;

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fs2::FileExt;
use serde_json::{json, Value};
use shade_log::{log_error, log_info, log_warn};
use shade_models::{NetworkName, TxidVersion};
use shade_storage::fjall::FjallStore;
use shade_storage::StorageService;
use shade_worker::jsonrpc::DEFAULT_TIMEOUT_SECS;
use shade_worker::{
    serve, unshield_registry, BridgeCall, BridgeCallEvent, BridgeClient, JsonRpcClient,
    JsonRpcSdk,
};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::services::{spawn_status_poll, SidecarServices, WalletServices};
use crate::state::{AppSnapshot, StateStore, DISCREET_MODE_KEY};
use crate::wallets_screen::{RefreshOutcome, WalletsScreen};

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_SDK_ENDPOINT: &str = "http://127.0.0.1:7765";
const DEFAULT_STATUS_INTERVAL_SECS: u64 = 5;
const CONF_FILE_NAME: &str = "shade.conf";
const SETTINGS_DIR_NAME: &str = "settings";
const DATA_DIR_LOCK_FILE_NAME: &str = ".lock";
const LOG_CAPTURE_CAPACITY: usize = 4096;
const WORKER_BIN_NAME: &str = "shade-worker";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Backend {
    Memory,
    Fjall,
}

impl Backend {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "memory" => Some(Self::Memory),
            "fjall" => Some(Self::Fjall),
            _ => None,
        }
    }
}

/// Where unshield calls are served.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum WorkerMode {
    Off,
    Inline,
    Process,
}

impl WorkerMode {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(Self::Off),
            "inline" => Some(Self::Inline),
            "process" => Some(Self::Process),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Config {
    backend: Backend,
    data_dir: PathBuf,
    conf_path: PathBuf,
    network: NetworkName,
    txid_version: TxidVersion,
    sdk_endpoint: String,
    sdk_timeout_secs: u64,
    worker: WorkerMode,
    worker_path: Option<PathBuf>,
    log_level: logging::Level,
    log_format: logging::Format,
    log_timestamps: bool,
    status_interval_secs: u64,
    discreet: Option<bool>,
    tui: bool,
}

#[derive(Debug)]
enum CliAction {
    Run(Config),
    BridgeCall {
        config: Config,
        event: BridgeCallEvent,
        params_path: PathBuf,
    },
    PrintHelp,
    PrintVersion,
}

#[derive(Debug, PartialEq)]
struct WorkerConfig {
    sdk_endpoint: String,
    timeout_secs: u64,
    log_level: logging::Level,
    log_format: logging::Format,
    log_timestamps: bool,
}

#[derive(Debug, PartialEq)]
enum WorkerAction {
    Serve(WorkerConfig),
    PrintHelp,
    PrintVersion,
}

struct DataDirLock {
    _file: File,
}

struct TuiThreadGuard {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TuiThreadGuard {
    fn new(shutdown_tx: watch::Sender<bool>) -> Self {
        Self {
            shutdown_tx,
            handle: None,
        }
    }
}

impl Drop for TuiThreadGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.shutdown_tx.send(true);
        let _ = handle.join();
    }
}

fn lock_data_dir(data_dir: &Path) -> Result<DataDirLock, String> {
    let lock_path = data_dir.join(DATA_DIR_LOCK_FILE_NAME);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|err| format!("failed to open lock file {}: {err}", lock_path.display()))?;

    match file.try_lock_exclusive() {
        Ok(()) => {
            let pid = std::process::id();
            let _ = file.set_len(0);
            let _ = file.seek(SeekFrom::Start(0));
            let _ = writeln!(file, "pid={pid}");
            let _ = file.flush();
            Ok(DataDirLock { _file: file })
        }
        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
            let mut holder = String::new();
            let _ =
                File::open(&lock_path).and_then(|mut reader| reader.read_to_string(&mut holder));
            let holder = holder.trim();
            if holder.is_empty() {
                Err(format!(
                    "data dir {} is already locked (another shade instance may be running); lock file {}",
                    data_dir.display(),
                    lock_path.display()
                ))
            } else {
                Err(format!(
                    "data dir {} is already locked (another shade instance may be running); lock file {} ({holder})",
                    data_dir.display(),
                    lock_path.display()
                ))
            }
        }
        Err(err) => Err(format!(
            "failed to lock data dir {} (lock file {}): {err}",
            data_dir.display(),
            lock_path.display()
        )),
    }
}

pub async fn run_entry(default_tui: bool) -> Result<(), String> {
    let cli = parse_args(default_tui)?;
    match cli {
        CliAction::PrintHelp => {
            println!("{}", usage());
            Ok(())
        }
        CliAction::PrintVersion => {
            println!("shade {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliAction::BridgeCall {
            config,
            event,
            params_path,
        } => run_bridge_call(config, event, &params_path).await,
        CliAction::Run(config) => run_with_config(config).await,
    }
}

fn init_logging(level: logging::Level, format: logging::Format, timestamps: bool) {
    logging::init(logging::LogConfig {
        level,
        format,
        timestamps,
        stderr: true,
    });
}

fn open_storage(config: &Config) -> Result<(StorageService, Option<DataDirLock>), String> {
    match config.backend {
        Backend::Memory => Ok((StorageService::in_memory(), None)),
        Backend::Fjall => {
            fs::create_dir_all(&config.data_dir).map_err(|err| {
                format!(
                    "failed to create data dir {}: {err}",
                    config.data_dir.display()
                )
            })?;
            let lock = lock_data_dir(&config.data_dir)?;
            let path = config.data_dir.join(SETTINGS_DIR_NAME);
            let store = FjallStore::open(&path)
                .map_err(|err| format!("failed to open settings at {}: {err}", path.display()))?;
            Ok((StorageService::new(Arc::new(store)), Some(lock)))
        }
    }
}

fn resolve_discreet(config: &Config, storage: &StorageService) -> bool {
    if let Some(enabled) = config.discreet {
        return enabled;
    }
    match storage.get_item(DISCREET_MODE_KEY) {
        Ok(Some(value)) => parse_conf_bool(&value).unwrap_or(false),
        Ok(None) => false,
        Err(err) => {
            log_warn!("failed to read discreet mode setting: {err}");
            false
        }
    }
}

fn resolve_worker_path(config: &Config) -> Result<PathBuf, String> {
    if let Some(path) = config.worker_path.as_ref() {
        return Ok(path.clone());
    }
    let exe = std::env::current_exe().map_err(|err| format!("failed to locate executable: {err}"))?;
    let dir = exe
        .parent()
        .ok_or_else(|| format!("executable {} has no parent directory", exe.display()))?;
    Ok(dir.join(format!("{WORKER_BIN_NAME}{}", std::env::consts::EXE_SUFFIX)))
}

fn worker_args(config: &Config) -> Vec<String> {
    let mut args = vec![
        "--sdk-endpoint".to_string(),
        config.sdk_endpoint.clone(),
        "--timeout-secs".to_string(),
        config.sdk_timeout_secs.to_string(),
        "--log-level".to_string(),
        config.log_level.as_str().to_string(),
        "--log-format".to_string(),
        config.log_format.as_str().to_string(),
    ];
    if !config.log_timestamps {
        args.push("--no-log-timestamps".to_string());
    }
    args
}

fn start_worker(config: &Config, inherit_stderr: bool) -> Result<Option<Arc<BridgeClient>>, String> {
    match config.worker {
        WorkerMode::Off => Ok(None),
        WorkerMode::Inline => {
            let client = JsonRpcClient::new(config.sdk_endpoint.clone(), config.sdk_timeout_secs);
            let registry = Arc::new(unshield_registry(Arc::new(JsonRpcSdk::new(client))));
            log_info!("unshield worker running in-process");
            Ok(Some(Arc::new(BridgeClient::in_process(registry))))
        }
        WorkerMode::Process => {
            let path = resolve_worker_path(config)?;
            let client = BridgeClient::spawn_worker(&path, &worker_args(config), inherit_stderr)
                .map_err(|err| format!("failed to start worker {}: {err}", path.display()))?;
            log_info!("unshield worker started from {}", path.display());
            Ok(Some(Arc::new(client)))
        }
    }
}

async fn run_with_config(config: Config) -> Result<(), String> {
    init_logging(config.log_level, config.log_format, config.log_timestamps);
    if config.tui {
        logging::enable_capture(LOG_CAPTURE_CAPACITY);
    }

    log_info!(
        "Startup: begin (tui={}, backend={:?}, network={}, data_dir={}, conf={})",
        config.tui,
        config.backend,
        config.network,
        config.data_dir.display(),
        config.conf_path.display()
    );

    let (storage, _data_dir_lock) = open_storage(&config)?;
    let state = Arc::new(StateStore::new(AppSnapshot::new(
        config.network,
        config.txid_version,
    )));
    state.set_discreet(resolve_discreet(&config, &storage));

    let sidecar = Arc::new(SidecarServices::new(
        JsonRpcClient::new(config.sdk_endpoint.clone(), config.sdk_timeout_secs),
        Arc::clone(&state),
    ));
    match sidecar.load_active_wallet().await {
        Ok(wallet) => {
            if let Some(wallet) = wallet.as_ref() {
                log_info!("active wallet {} ({})", wallet.name, wallet.id);
            }
            state.set_active_wallet(wallet);
        }
        Err(err) => log_warn!("could not load active wallet from {}: {err}", config.sdk_endpoint),
    }
    let services: Arc<dyn WalletServices> = sidecar;
    let screen = Arc::new(WalletsScreen::new(Arc::clone(&services), storage.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poll = spawn_status_poll(
        Arc::clone(&services),
        Arc::clone(&state),
        Duration::from_secs(config.status_interval_secs.max(1)),
        shutdown_rx.clone(),
    );

    if !config.tui {
        let result = run_headless(&screen, &state).await;
        let _ = shutdown_tx.send(true);
        let _ = poll.await;
        return result;
    }

    let worker = match start_worker(&config, false) {
        Ok(worker) => worker,
        Err(err) => {
            log_warn!("{err}; continuing without unshield worker");
            None
        }
    };

    let mut tui_thread = TuiThreadGuard::new(shutdown_tx.clone());
    let ctx = tui::TuiContext {
        runtime: Handle::current(),
        state: Arc::clone(&state),
        screen: Arc::clone(&screen),
        storage,
        worker,
        shutdown_rx: shutdown_rx.clone(),
        shutdown_tx: shutdown_tx.clone(),
    };
    tui_thread.handle = Some(thread::spawn(move || {
        if let Err(err) = tui::run_tui(ctx) {
            log_error!("{err}");
        }
    }));

    let mut shutdown_wait = shutdown_rx.clone();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log_info!("Shutdown requested");
        }
        _ = shutdown_wait.wait_for(|stop| *stop) => {}
    }
    let _ = shutdown_tx.send(true);
    drop(tui_thread);
    let _ = poll.await;
    log_info!("Shutdown complete");
    Ok(())
}

/// One refresh without a terminal UI; prints the visible balances.
async fn run_headless(screen: &WalletsScreen, state: &StateStore) -> Result<(), String> {
    if let RefreshOutcome::Refreshed { sync: Some(sync) } =
        screen.refresh_balances(&state.snapshot()).await
    {
        sync.wait().await;
    }
    let snapshot = state.snapshot();
    match snapshot.active_wallet() {
        Some(wallet) => println!("{} on {}", wallet.name, snapshot.network.public_name()),
        None => println!("No wallet loaded on {}", snapshot.network.public_name()),
    }
    for balance in screen.visible_tokens(&snapshot) {
        let amount = if snapshot.discreet_mode.enabled {
            "***".to_string()
        } else {
            balance.format_amount(6)
        };
        println!("{}\t{}\t{}", balance.symbol, amount, balance.token_address);
    }
    match screen.view().error_modal {
        Some(error) => Err(format!("refresh failed: {}", error.message)),
        None => Ok(()),
    }
}

async fn run_bridge_call(
    config: Config,
    event: BridgeCallEvent,
    params_path: &Path,
) -> Result<(), String> {
    init_logging(config.log_level, config.log_format, config.log_timestamps);
    let raw = fs::read_to_string(params_path)
        .map_err(|err| format!("failed to read {}: {err}", params_path.display()))?;
    let params: Value = serde_json::from_str(&raw)
        .map_err(|err| format!("invalid JSON in {}: {err}", params_path.display()))?;
    let call = build_bridge_call(event, params)?;
    let client = start_worker(&config, true)?
        .ok_or_else(|| "bridge-call needs a worker (--worker inline|process)".to_string())?;
    let value = client.call_raw(call).await.map_err(|err| err.to_string())?;
    let pretty = serde_json::to_string_pretty(&value).map_err(|err| err.to_string())?;
    println!("{pretty}");
    Ok(())
}

fn build_bridge_call(event: BridgeCallEvent, params: Value) -> Result<BridgeCall, String> {
    serde_json::from_value(json!({ "event": event.as_str(), "params": params }))
        .map_err(|err| format!("params do not match {event}: {err}"))
}

pub async fn run_worker_entry() -> Result<(), String> {
    let config = match parse_worker_args_from(std::env::args().skip(1))? {
        WorkerAction::PrintHelp => {
            println!("{}", worker_usage());
            return Ok(());
        }
        WorkerAction::PrintVersion => {
            println!("shade-worker {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        WorkerAction::Serve(config) => config,
    };
    init_logging(config.log_level, config.log_format, config.log_timestamps);

    let client = JsonRpcClient::new(config.sdk_endpoint.clone(), config.timeout_secs);
    let registry = Arc::new(unshield_registry(Arc::new(JsonRpcSdk::new(client))));
    log_info!(
        "worker ready: {} events, sdk {}",
        registry.events().len(),
        config.sdk_endpoint
    );
    tokio::select! {
        result = serve(tokio::io::stdin(), tokio::io::stdout(), registry) => {
            result.map_err(|err| format!("worker io failed: {err}"))?;
            log_info!("worker input closed");
        }
        _ = tokio::signal::ctrl_c() => {
            log_info!("worker interrupted");
        }
    }
    Ok(())
}

fn parse_args(default_tui: bool) -> Result<CliAction, String> {
    parse_args_from(std::env::args().skip(1), default_tui)
}

fn next_value<I>(args: &mut I, flag: &str, usage: fn() -> String) -> Result<String, String>
where
    I: Iterator<Item = String>,
{
    args.next()
        .ok_or_else(|| format!("missing value for {flag}\n{}", usage()))
}

fn parse_u64(value: &str, flag: &str, usage: fn() -> String) -> Result<u64, String> {
    value
        .parse::<u64>()
        .map_err(|_| format!("invalid {flag} '{value}'\n{}", usage()))
}

fn parse_args_from<I>(raw_args: I, default_tui: bool) -> Result<CliAction, String>
where
    I: IntoIterator<Item = String>,
{
    let mut backend = Backend::Fjall;
    let mut backend_set = false;
    let mut data_dir: Option<PathBuf> = None;
    let mut conf_path: Option<PathBuf> = None;
    let mut network = NetworkName::Ethereum;
    let mut network_set = false;
    let mut txid_version = TxidVersion::default();
    let mut txid_version_set = false;
    let mut sdk_endpoint = DEFAULT_SDK_ENDPOINT.to_string();
    let mut sdk_endpoint_set = false;
    let mut sdk_timeout_secs = DEFAULT_TIMEOUT_SECS;
    let mut sdk_timeout_set = false;
    let mut worker = WorkerMode::Process;
    let mut worker_set = false;
    let mut worker_path: Option<PathBuf> = None;
    let mut log_level = logging::Level::Info;
    let mut log_level_set = false;
    let mut log_format = logging::Format::Text;
    let mut log_format_set = false;
    let mut log_timestamps = true;
    let mut log_timestamps_set = false;
    let mut status_interval_secs = DEFAULT_STATUS_INTERVAL_SECS;
    let mut status_interval_set = false;
    let mut discreet: Option<bool> = None;
    let mut tui = default_tui;
    let mut bridge_call: Option<(BridgeCallEvent, PathBuf)> = None;
    let mut args = raw_args.into_iter().peekable();

    if let Some(first) = args.peek().map(|value| value.as_str()) {
        match first {
            "help" => return Ok(CliAction::PrintHelp),
            "version" => return Ok(CliAction::PrintVersion),
            "bridge-call" => {
                let _ = args.next();
                let raw_event = next_value(&mut args, "bridge-call <event>", usage)?;
                let event = BridgeCallEvent::parse(&raw_event)
                    .ok_or_else(|| format!("unknown bridge event '{raw_event}'\n{}", usage()))?;
                let params = next_value(&mut args, "bridge-call <params.json>", usage)?;
                bridge_call = Some((event, PathBuf::from(params)));
            }
            _ => {}
        }
    }
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(CliAction::PrintHelp),
            "--version" | "-V" => return Ok(CliAction::PrintVersion),
            "--backend" => {
                let value = next_value(&mut args, "--backend", usage)?;
                backend = Backend::parse(&value)
                    .ok_or_else(|| format!("invalid backend '{value}'\n{}", usage()))?;
                backend_set = true;
            }
            "--data-dir" => {
                data_dir = Some(PathBuf::from(next_value(&mut args, "--data-dir", usage)?));
            }
            "--conf" => {
                conf_path = Some(PathBuf::from(next_value(&mut args, "--conf", usage)?));
            }
            "--network" => {
                let value = next_value(&mut args, "--network", usage)?;
                network = NetworkName::parse(&value)
                    .ok_or_else(|| format!("invalid network '{value}'\n{}", usage()))?;
                network_set = true;
            }
            "--txid-version" => {
                let value = next_value(&mut args, "--txid-version", usage)?;
                txid_version = TxidVersion::parse(&value)
                    .ok_or_else(|| format!("invalid txid version '{value}'\n{}", usage()))?;
                txid_version_set = true;
            }
            "--sdk-endpoint" => {
                sdk_endpoint = next_value(&mut args, "--sdk-endpoint", usage)?;
                sdk_endpoint_set = true;
            }
            "--sdk-timeout-secs" => {
                let value = next_value(&mut args, "--sdk-timeout-secs", usage)?;
                sdk_timeout_secs = parse_u64(&value, "--sdk-timeout-secs", usage)?;
                sdk_timeout_set = true;
            }
            "--worker" => {
                let value = next_value(&mut args, "--worker", usage)?;
                worker = WorkerMode::parse(&value).ok_or_else(|| {
                    format!(
                        "invalid worker mode '{value}' (expected off|inline|process)\n{}",
                        usage()
                    )
                })?;
                worker_set = true;
            }
            "--worker-path" => {
                worker_path = Some(PathBuf::from(next_value(&mut args, "--worker-path", usage)?));
            }
            "--log-level" => {
                let value = next_value(&mut args, "--log-level", usage)?;
                log_level = logging::Level::parse(&value)
                    .ok_or_else(|| format!("invalid log level '{value}'\n{}", usage()))?;
                log_level_set = true;
            }
            "--log-format" => {
                let value = next_value(&mut args, "--log-format", usage)?;
                log_format = logging::Format::parse(&value)
                    .ok_or_else(|| format!("invalid log format '{value}'\n{}", usage()))?;
                log_format_set = true;
            }
            "--no-log-timestamps" => {
                log_timestamps = false;
                log_timestamps_set = true;
            }
            "--status-interval" => {
                let value = next_value(&mut args, "--status-interval", usage)?;
                status_interval_secs = parse_u64(&value, "--status-interval", usage)?;
                status_interval_set = true;
            }
            "--discreet" => discreet = Some(true),
            "--no-discreet" => discreet = Some(false),
            "--tui" => tui = true,
            "--no-tui" => tui = false,
            other => {
                return Err(format!("unknown argument '{other}'\n{}", usage()));
            }
        }
    }

    let data_dir = data_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let conf_file = conf_path.unwrap_or_else(|| data_dir.join(CONF_FILE_NAME));
    if let Some(conf) = load_conf(&conf_file)? {
        let last = |key: &str| conf.get(key).and_then(|values| values.last()).cloned();
        let invalid = |key: &str, raw: &str| {
            format!("invalid {key} value '{raw}' in {}", conf_file.display())
        };
        if !network_set {
            if let Some(raw) = last("network") {
                network = NetworkName::parse(&raw).ok_or_else(|| invalid("network", &raw))?;
            }
        }
        if !txid_version_set {
            if let Some(raw) = last("txidversion") {
                txid_version =
                    TxidVersion::parse(&raw).ok_or_else(|| invalid("txidversion", &raw))?;
            }
        }
        if !backend_set {
            if let Some(raw) = last("backend") {
                backend = Backend::parse(&raw).ok_or_else(|| invalid("backend", &raw))?;
            }
        }
        if !sdk_endpoint_set {
            if let Some(raw) = last("sdkendpoint") {
                sdk_endpoint = raw;
            }
        }
        if !sdk_timeout_set {
            if let Some(raw) = last("sdktimeout") {
                sdk_timeout_secs = raw.parse().map_err(|_| invalid("sdktimeout", &raw))?;
            }
        }
        if !worker_set {
            if let Some(raw) = last("worker") {
                worker = WorkerMode::parse(&raw).ok_or_else(|| invalid("worker", &raw))?;
            }
        }
        if worker_path.is_none() {
            worker_path = last("workerpath").map(PathBuf::from);
        }
        if !log_level_set {
            if let Some(raw) = last("loglevel") {
                log_level = logging::Level::parse(&raw).ok_or_else(|| invalid("loglevel", &raw))?;
            }
        }
        if !log_format_set {
            if let Some(raw) = last("logformat") {
                log_format =
                    logging::Format::parse(&raw).ok_or_else(|| invalid("logformat", &raw))?;
            }
        }
        if !log_timestamps_set {
            if let Some(raw) = last("logtimestamps") {
                log_timestamps =
                    parse_conf_bool(&raw).ok_or_else(|| invalid("logtimestamps", &raw))?;
            }
        }
        if !status_interval_set {
            if let Some(raw) = last("statusinterval") {
                status_interval_secs = raw.parse().map_err(|_| invalid("statusinterval", &raw))?;
            }
        }
        if discreet.is_none() {
            if let Some(raw) = last("discreet") {
                discreet = Some(parse_conf_bool(&raw).ok_or_else(|| invalid("discreet", &raw))?);
            }
        }
    }

    let config = Config {
        backend,
        data_dir,
        conf_path: conf_file,
        network,
        txid_version,
        sdk_endpoint,
        sdk_timeout_secs,
        worker,
        worker_path,
        log_level,
        log_format,
        log_timestamps,
        status_interval_secs,
        discreet,
        tui,
    };
    Ok(match bridge_call {
        Some((event, params_path)) => CliAction::BridgeCall {
            config,
            event,
            params_path,
        },
        None => CliAction::Run(config),
    })
}

fn parse_worker_args_from<I>(raw_args: I) -> Result<WorkerAction, String>
where
    I: IntoIterator<Item = String>,
{
    let mut config = WorkerConfig {
        sdk_endpoint: DEFAULT_SDK_ENDPOINT.to_string(),
        timeout_secs: DEFAULT_TIMEOUT_SECS,
        log_level: logging::Level::Info,
        log_format: logging::Format::Text,
        log_timestamps: true,
    };
    let mut args = raw_args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(WorkerAction::PrintHelp),
            "--version" | "-V" => return Ok(WorkerAction::PrintVersion),
            "--sdk-endpoint" => {
                config.sdk_endpoint = next_value(&mut args, "--sdk-endpoint", worker_usage)?;
            }
            "--timeout-secs" => {
                let value = next_value(&mut args, "--timeout-secs", worker_usage)?;
                config.timeout_secs = parse_u64(&value, "--timeout-secs", worker_usage)?;
            }
            "--log-level" => {
                let value = next_value(&mut args, "--log-level", worker_usage)?;
                config.log_level = logging::Level::parse(&value)
                    .ok_or_else(|| format!("invalid log level '{value}'\n{}", worker_usage()))?;
            }
            "--log-format" => {
                let value = next_value(&mut args, "--log-format", worker_usage)?;
                config.log_format = logging::Format::parse(&value)
                    .ok_or_else(|| format!("invalid log format '{value}'\n{}", worker_usage()))?;
            }
            "--no-log-timestamps" => config.log_timestamps = false,
            other => {
                return Err(format!("unknown argument '{other}'\n{}", worker_usage()));
            }
        }
    }
    Ok(WorkerAction::Serve(config))
}

fn load_conf(path: &Path) -> Result<Option<HashMap<String, Vec<String>>>, String> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(format!("failed to read {}: {err}", path.display())),
    };

    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for raw_line in contents.lines() {
        let mut line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(idx) = line.find('#') {
            line = &line[..idx];
        }
        if let Some(idx) = line.find(';') {
            line = &line[..idx];
        }
        line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (line, "1"),
        };
        if key.is_empty() {
            continue;
        }
        out.entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.to_string());
    }
    Ok(Some(out))
}

fn parse_conf_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.is_empty() {
        return Some(true);
    }
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn usage() -> String {
    let events = BridgeCallEvent::ALL
        .iter()
        .map(|event| format!("                  {event}"))
        .collect::<Vec<_>>()
        .join("\n");
    [
        "Usage:",
        "  shade [options]",
        "  shade <command> [options]",
        "",
        "Commands:",
        "  help            Print this help and exit",
        "  version         Print version and exit",
        "  bridge-call <event> <params.json>",
        "                  Send one unshield call through the worker and print the result",
        "                  Events:",
        events.as_str(),
        "",
        "Options:",
        "  --help, -h  Print this help and exit",
        "  --version, -V  Print version and exit",
        "  --backend  Settings backend: fjall|memory (default: fjall)",
        "  --data-dir  Base data directory (default: ./data)",
        "  --conf  Config file path (default: <data-dir>/shade.conf)",
        "  --network  Network to show (default: Ethereum)",
        "  --txid-version  V2_PoseidonMerkle|V3_PoseidonMerkle (default: V2_PoseidonMerkle)",
        "  --sdk-endpoint  Wallet SDK sidecar URL (default: http://127.0.0.1:7765)",
        "  --sdk-timeout-secs  Sidecar request timeout (default: 120)",
        "  --worker  Unshield worker: off|inline|process (default: process)",
        "  --worker-path  Worker executable (default: shade-worker next to shade)",
        "  --log-level  error|warn|info|debug|trace (default: info)",
        "  --log-format  text|json (default: text)",
        "  --no-log-timestamps  Omit timestamps from log lines",
        "  --status-interval  Seconds between scan status polls (default: 5)",
        "  --discreet, --no-discreet  Override the saved discreet mode",
        "  --tui, --no-tui  Run the terminal UI, or refresh once and print balances",
    ]
    .join("\n")
}

fn worker_usage() -> String {
    [
        "Usage:",
        "  shade-worker [options]",
        "",
        "Reads bridge requests as JSON lines on stdin and writes replies on stdout.",
        "",
        "Options:",
        "  --help, -h  Print this help and exit",
        "  --version, -V  Print version and exit",
        "  --sdk-endpoint  Wallet SDK sidecar URL (default: http://127.0.0.1:7765)",
        "  --timeout-secs  Sidecar request timeout (default: 120)",
        "  --log-level  error|warn|info|debug|trace (default: info)",
        "  --log-format  text|json (default: text)",
        "  --no-log-timestamps  Omit timestamps from log lines",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("shade-{name}-{}-{nanos}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn run_config(values: &[&str]) -> Config {
        match parse_args_from(args(values), true).unwrap() {
            CliAction::Run(config) => config,
            other => panic!("expected run config, got {other:?}"),
        }
    }

    #[test]
    fn defaults_without_conf() {
        let dir = unique_temp_dir("defaults");
        let config = run_config(&["--data-dir", dir.to_str().unwrap()]);
        assert_eq!(config.backend, Backend::Fjall);
        assert_eq!(config.network, NetworkName::Ethereum);
        assert_eq!(config.txid_version, TxidVersion::V2PoseidonMerkle);
        assert_eq!(config.sdk_endpoint, DEFAULT_SDK_ENDPOINT);
        assert_eq!(config.worker, WorkerMode::Process);
        assert_eq!(config.conf_path, dir.join(CONF_FILE_NAME));
        assert_eq!(config.discreet, None);
        assert!(config.tui);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn conf_values_apply_unless_overridden() {
        let dir = unique_temp_dir("conf");
        fs::write(
            dir.join(CONF_FILE_NAME),
            "# shade settings\nnetwork=Polygon\nNetwork=Arbitrum\ntxidversion=V3_PoseidonMerkle\nbackend=memory ; inline comment\nworker=inline\ndiscreet=yes\nstatusinterval=30\n",
        )
        .unwrap();

        let config = run_config(&["--data-dir", dir.to_str().unwrap()]);
        assert_eq!(config.network, NetworkName::Arbitrum);
        assert_eq!(config.txid_version, TxidVersion::V3PoseidonMerkle);
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.worker, WorkerMode::Inline);
        assert_eq!(config.discreet, Some(true));
        assert_eq!(config.status_interval_secs, 30);

        let config = run_config(&[
            "--data-dir",
            dir.to_str().unwrap(),
            "--network",
            "sepolia",
            "--no-discreet",
            "--worker",
            "off",
        ]);
        assert_eq!(config.network, NetworkName::EthereumSepolia);
        assert_eq!(config.discreet, Some(false));
        assert_eq!(config.worker, WorkerMode::Off);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_conf_value_names_the_file() {
        let dir = unique_temp_dir("bad-conf");
        let conf = dir.join("custom.conf");
        fs::write(&conf, "network=moon\n").unwrap();
        let err = parse_args_from(args(&["--conf", conf.to_str().unwrap()]), true).unwrap_err();
        assert!(err.contains("invalid network value 'moon'"));
        assert!(err.contains("custom.conf"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn argument_errors() {
        let err = parse_args_from(args(&["--network"]), true).unwrap_err();
        assert!(err.starts_with("missing value for --network"));
        let err = parse_args_from(args(&["--bogus"]), true).unwrap_err();
        assert!(err.starts_with("unknown argument '--bogus'"));
        assert!(matches!(
            parse_args_from(args(&["help"]), true),
            Ok(CliAction::PrintHelp)
        ));
    }

    #[test]
    fn bridge_call_command() {
        let dir = unique_temp_dir("bridge-call");
        let action = parse_args_from(
            args(&[
                "bridge-call",
                "GetERC20AndNFTAmountRecipientsForUnshieldToOrigin",
                "params.json",
                "--data-dir",
                dir.to_str().unwrap(),
                "--worker",
                "inline",
            ]),
            true,
        )
        .unwrap();
        match action {
            CliAction::BridgeCall {
                config,
                event,
                params_path,
            } => {
                assert_eq!(
                    event,
                    BridgeCallEvent::GetErc20AndNftAmountRecipientsForUnshieldToOrigin
                );
                assert_eq!(params_path, PathBuf::from("params.json"));
                assert_eq!(config.worker, WorkerMode::Inline);
            }
            other => panic!("expected bridge call, got {other:?}"),
        }
        let err = parse_args_from(args(&["bridge-call", "NotAnEvent", "p.json"]), true)
            .unwrap_err();
        assert!(err.starts_with("unknown bridge event 'NotAnEvent'"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn bridge_call_params_must_match_event() {
        let call = build_bridge_call(
            BridgeCallEvent::GetErc20AndNftAmountRecipientsForUnshieldToOrigin,
            json!({
                "txidVersion": "V2_PoseidonMerkle",
                "networkName": "Ethereum",
                "railgunWalletID": "wallet",
                "originalShieldTxid": "0xabc",
            }),
        )
        .unwrap();
        assert_eq!(
            call.event(),
            BridgeCallEvent::GetErc20AndNftAmountRecipientsForUnshieldToOrigin
        );
        let err =
            build_bridge_call(BridgeCallEvent::PopulateProvedUnshield, json!({})).unwrap_err();
        assert!(err.starts_with("params do not match PopulateProvedUnshield"));
    }

    #[test]
    fn worker_arguments_round_trip() {
        let dir = unique_temp_dir("worker-args");
        let config = run_config(&[
            "--data-dir",
            dir.to_str().unwrap(),
            "--sdk-endpoint",
            "http://127.0.0.1:9000",
            "--sdk-timeout-secs",
            "7",
            "--log-level",
            "debug",
        ]);
        let action = parse_worker_args_from(worker_args(&config)).unwrap();
        assert_eq!(
            action,
            WorkerAction::Serve(WorkerConfig {
                sdk_endpoint: "http://127.0.0.1:9000".to_string(),
                timeout_secs: 7,
                log_level: logging::Level::Debug,
                log_format: logging::Format::Text,
                log_timestamps: true,
            })
        );
        let quiet = run_config(&[
            "--data-dir",
            dir.to_str().unwrap(),
            "--log-format",
            "json",
            "--no-log-timestamps",
        ]);
        match parse_worker_args_from(worker_args(&quiet)).unwrap() {
            WorkerAction::Serve(worker) => {
                assert!(!worker.log_timestamps);
                assert_eq!(worker.log_format, logging::Format::Json);
            }
            other => panic!("unexpected {other:?}"),
        }
        let err = parse_worker_args_from(args(&["--timeout-secs", "soon"])).unwrap_err();
        assert!(err.starts_with("invalid --timeout-secs 'soon'"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn data_dir_lock_is_exclusive() {
        let dir = unique_temp_dir("lock");
        let first = lock_data_dir(&dir).unwrap();
        let err = match lock_data_dir(&dir) {
            Ok(_) => panic!("second lock should fail"),
            Err(err) => err,
        };
        assert!(err.contains("already locked"));
        drop(first);
        assert!(lock_data_dir(&dir).is_ok());
        let _ = fs::remove_dir_all(&dir);
    }
}
