use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Error,
        Level::Warn,
        Level::Info,
        Level::Debug,
        Level::Trace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }

    fn from_u8(raw: u8) -> Self {
        Self::ALL
            .into_iter()
            .find(|level| *level as u8 == raw)
            .unwrap_or(Self::Info)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Format {
    Text = 0,
    Json = 1,
}

impl Format {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LogConfig {
    pub level: Level,
    pub format: Format,
    pub timestamps: bool,
    /// Records go to stderr only. The worker process speaks the bridge
    /// protocol on stdout.
    pub stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: Format::Text,
            timestamps: true,
            stderr: true,
        }
    }
}

static MAX_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static JSON_FORMAT: AtomicBool = AtomicBool::new(false);
static TIMESTAMPS: AtomicBool = AtomicBool::new(true);
static STDERR: AtomicBool = AtomicBool::new(true);

/// A record kept in memory so the TUI can show recent activity while it owns
/// the terminal.
#[derive(Clone, Debug)]
pub struct CapturedRecord {
    pub ts_ms: u64,
    pub level: Level,
    pub target: &'static str,
    pub msg: String,
}

struct CaptureRing {
    capacity: AtomicUsize,
    records: Mutex<VecDeque<CapturedRecord>>,
}

static CAPTURE_ON: AtomicBool = AtomicBool::new(false);
static CAPTURE: OnceLock<CaptureRing> = OnceLock::new();

pub fn init(config: LogConfig) {
    MAX_LEVEL.store(config.level as u8, Ordering::Relaxed);
    JSON_FORMAT.store(matches!(config.format, Format::Json), Ordering::Relaxed);
    TIMESTAMPS.store(config.timestamps, Ordering::Relaxed);
    STDERR.store(config.stderr, Ordering::Relaxed);
}

pub fn max_level() -> Level {
    Level::from_u8(MAX_LEVEL.load(Ordering::Relaxed))
}

pub fn set_stderr_enabled(enabled: bool) {
    STDERR.store(enabled, Ordering::Relaxed);
}

pub fn enable_capture(capacity: usize) {
    if capacity == 0 {
        CAPTURE_ON.store(false, Ordering::Relaxed);
        return;
    }
    let ring = CAPTURE.get_or_init(|| CaptureRing {
        capacity: AtomicUsize::new(capacity),
        records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
    });
    ring.capacity.store(capacity, Ordering::Relaxed);
    CAPTURE_ON.store(true, Ordering::Relaxed);
}

pub fn captured(limit: usize) -> Vec<CapturedRecord> {
    let Some(ring) = CAPTURE.get() else {
        return Vec::new();
    };
    let Ok(records) = ring.records.lock() else {
        return Vec::new();
    };
    let skip = records.len().saturating_sub(limit);
    records.iter().skip(skip).cloned().collect()
}

pub fn enabled(level: Level) -> bool {
    level as u8 <= MAX_LEVEL.load(Ordering::Relaxed)
}

pub fn log(
    level: Level,
    target: &'static str,
    file: &'static str,
    line: u32,
    args: fmt::Arguments<'_>,
) {
    if !enabled(level) {
        return;
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let ts_ms: u64 = now.as_millis().try_into().unwrap_or(u64::MAX);
    let capture = CAPTURE_ON.load(Ordering::Relaxed);
    let json_format = JSON_FORMAT.load(Ordering::Relaxed);
    let msg = (json_format || capture).then(|| args.to_string());

    if STDERR.load(Ordering::Relaxed) {
        let mut out = io::stderr().lock();
        if json_format {
            let record = json!({
                "ts_ms": ts_ms,
                "level": level.as_str(),
                "target": target,
                "file": file,
                "line": line,
                "msg": msg.as_deref().unwrap_or_default(),
            });
            let _ = writeln!(out, "{record}");
        } else {
            if TIMESTAMPS.load(Ordering::Relaxed) {
                let _ = write!(out, "{} ", Rfc3339Millis(now.as_millis()));
            }
            let _ = writeln!(out, "{} {target}: {args}", level.as_str());
        }
    }

    if capture {
        push_captured(CapturedRecord {
            ts_ms,
            level,
            target,
            msg: msg.unwrap_or_default(),
        });
    }
}

fn push_captured(record: CapturedRecord) {
    let Some(ring) = CAPTURE.get() else {
        return;
    };
    let capacity = ring.capacity.load(Ordering::Relaxed);
    let Ok(mut records) = ring.records.lock() else {
        return;
    };
    records.push_back(record);
    while records.len() > capacity {
        records.pop_front();
    }
}

#[macro_export]
macro_rules! log_at {
    ($level:expr, $($arg:tt)*) => {{
        if $crate::enabled($level) {
            $crate::log($level, module_path!(), file!(), line!(), format_args!($($arg)*));
        }
    }};
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Error, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Warn, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Info, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Debug, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Trace, $($arg)*);
    }};
}

/// Milliseconds since the unix epoch, printed as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub struct Rfc3339Millis(pub u128);

impl fmt::Display for Rfc3339Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_secs = (self.0 / 1000) as u64;
        let millis = (self.0 % 1000) as u32;
        let days = (total_secs / 86_400) as i64;
        let secs_of_day = total_secs % 86_400;
        let (year, month, day) = date_from_epoch_days(days);
        write!(
            f,
            "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
            secs_of_day / 3600,
            (secs_of_day % 3600) / 60,
            secs_of_day % 60,
        )
    }
}

// Howard Hinnant's days-to-civil conversion.
fn date_from_epoch_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe as i32 + era as i32 * 400 + i32::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level() {
        assert_eq!(Level::parse("error"), Some(Level::Error));
        assert_eq!(Level::parse(" Warning "), Some(Level::Warn));
        assert_eq!(Level::parse("TRACE"), Some(Level::Trace));
        assert_eq!(Level::parse("verbose"), None);
    }

    #[test]
    fn level_round_trips_through_u8() {
        for level in Level::ALL {
            assert_eq!(Level::from_u8(level as u8), level);
        }
        assert_eq!(Level::from_u8(0), Level::Info);
    }

    #[test]
    fn parse_format() {
        assert_eq!(Format::parse("json"), Some(Format::Json));
        assert_eq!(Format::parse("Text"), Some(Format::Text));
        assert_eq!(Format::parse("yaml"), None);
    }

    #[test]
    fn timestamp_formatting() {
        assert_eq!(Rfc3339Millis(0).to_string(), "1970-01-01T00:00:00.000Z");
        assert_eq!(
            Rfc3339Millis(1_709_251_199_123).to_string(),
            "2024-02-29T23:59:59.123Z"
        );
    }
}
