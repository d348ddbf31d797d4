//! Core logging bootstrap and per-component log channels.
//!
//! # Responsibility
//! - Initialize file-based rolling logs exactly once per process.
//! - Give every operation family its own rolling log file (`channel`).
//! - Hand components an explicit [`LogContext`] instead of global logger
//!   handles.
//!
//! # Invariants
//! - Logging init is idempotent for the same directory and level.
//! - Logging initialization must not panic.
//! - Re-initialization with a different directory or level is rejected.
//! - Passwords and password hashes are never part of a log event.

use flexi_logger::writers::FileLogWriter;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "routesol";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    log_dir: PathBuf,
    _logger: LoggerHandle,
}

/// Operation family with its own log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Connection,
    InsertOne,
    InsertMany,
    Search,
    SearchAll,
    Modify,
    Delete,
    Registration,
    Login,
}

impl Channel {
    pub const ALL: [Channel; 9] = [
        Channel::Connection,
        Channel::InsertOne,
        Channel::InsertMany,
        Channel::Search,
        Channel::SearchAll,
        Channel::Modify,
        Channel::Delete,
        Channel::Registration,
        Channel::Login,
    ];

    /// Stable channel name, also used as log file basename.
    pub fn name(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::InsertOne => "insert_one",
            Self::InsertMany => "insert_many",
            Self::Search => "search",
            Self::SearchAll => "search_all",
            Self::Modify => "modify",
            Self::Delete => "delete",
            Self::Registration => "registration",
            Self::Login => "login",
        }
    }

    // flexi_logger sends `{name}` targets only to the writer registered as `name`.
    fn routed_target(self) -> &'static str {
        match self {
            Self::Connection => "{connection}",
            Self::InsertOne => "{insert_one}",
            Self::InsertMany => "{insert_many}",
            Self::Search => "{search}",
            Self::SearchAll => "{search_all}",
            Self::Modify => "{modify}",
            Self::Delete => "{delete}",
            Self::Registration => "{registration}",
            Self::Login => "{login}",
        }
    }

    fn plain_target(self) -> &'static str {
        match self {
            Self::Connection => "routesol::connection",
            Self::InsertOne => "routesol::insert_one",
            Self::InsertMany => "routesol::insert_many",
            Self::Search => "routesol::search",
            Self::SearchAll => "routesol::search_all",
            Self::Modify => "routesol::modify",
            Self::Delete => "routesol::delete",
            Self::Registration => "routesol::registration",
            Self::Login => "routesol::login",
        }
    }
}

/// Log target bound to one channel; components keep these as fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogChannel {
    channel: Channel,
    target: &'static str,
}

impl LogChannel {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Target passed to `log` macros.
    pub fn target(&self) -> &'static str {
        self.target
    }

    /// Value of the `module=` key in log events.
    pub fn module(&self) -> &'static str {
        self.channel.name()
    }
}

/// Source of [`LogChannel`]s injected into components at construction.
///
/// The default context logs under plain `routesol::<channel>` targets. The
/// context returned by [`init_logging`] routes each channel to its own
/// rolling file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogContext {
    routed: bool,
}

impl LogContext {
    /// Context with plain targets, for callers that manage logging themselves.
    pub fn detached() -> Self {
        Self { routed: false }
    }

    pub fn is_routed(&self) -> bool {
        self.routed
    }

    pub fn channel(&self, channel: Channel) -> LogChannel {
        let target = if self.routed {
            channel.routed_target()
        } else {
            channel.plain_target()
        };
        LogChannel { channel, target }
    }
}

/// Initializes core logging with level and directory.
///
/// Starts the default rolling log `routesol.log` and one rolling log per
/// [`Channel`], each rotated at 1 MiB with 5 files kept.
///
/// # Invariants
/// - Calling this function repeatedly with the same `level` and `log_dir` is idempotent.
/// - Re-initialization with a different `level` or `log_dir` is rejected.
/// - Initialization never panics.
///
/// # Errors
/// - Returns an error when `level` is unsupported.
/// - Returns an error when `log_dir` is empty, non-absolute, or cannot be created.
/// - Returns an error when logger backend setup fails.
pub fn init_logging(level: &str, log_dir: &str) -> Result<LogContext, String> {
    let normalized_level = normalize_level(level)?;
    let normalized_dir = normalize_log_dir(log_dir)?;

    let state = LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState, String> {
        start_logger(normalized_level, &normalized_dir)
    })?;

    if state.log_dir != normalized_dir {
        return Err(format!(
            "logging already initialized at `{}`; refusing to switch to `{}`",
            state.log_dir.display(),
            normalized_dir.display()
        ));
    }
    if state.level != normalized_level {
        return Err(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            state.level, normalized_level
        ));
    }

    Ok(LogContext { routed: true })
}

/// Returns active logging status metadata.
///
/// Returns `None` when logging has not been initialized.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.level, state.log_dir.clone()))
}

/// Returns the default log level for current build mode.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_logger(level: &'static str, log_dir: &Path) -> Result<LoggingState, String> {
    std::fs::create_dir_all(log_dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            log_dir.display()
        )
    })?;

    let mut logger = Logger::try_with_str(level)
        .map_err(|err| format!("invalid log level `{level}`: {err}"))?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format);

    for channel in Channel::ALL {
        let writer = FileLogWriter::builder(
            FileSpec::default()
                .directory(log_dir)
                .basename(channel.name()),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .append()
        .format(flexi_logger::detailed_format)
        .try_build()
        .map_err(|err| format!("failed to build `{}` log writer: {err}", channel.name()))?;
        logger = logger.add_writer(channel.name(), Box::new(writer));
    }

    let handle = logger
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    install_panic_hook_once();

    info!(
        "event=app_start module=core status=ok platform={} build_mode={} version={}",
        std::env::consts::OS,
        build_mode(),
        env!("CARGO_PKG_VERSION")
    );
    info!(
        "event=core_init module=core status=ok level={} log_dir={} channels={}",
        level,
        log_dir.display(),
        Channel::ALL.len()
    );

    Ok(LoggingState {
        level,
        log_dir: log_dir.to_path_buf(),
        _logger: handle,
    })
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn normalize_log_dir(log_dir: &str) -> Result<PathBuf, String> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(format!("log_dir must be an absolute path, got `{trimmed}`"));
    }
    Ok(path.to_path_buf())
}

fn build_mode() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.get().is_some() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_summary(panic_info);
        error!(
            "event=panic_captured module=core status=error location={} payload={}",
            location, payload
        );
        previous_hook(panic_info);
    }));

    let _ = PANIC_HOOK_INSTALLED.set(());
}

fn panic_payload_summary(info: &std::panic::PanicHookInfo<'_>) -> String {
    let payload = if let Some(message) = info.payload().downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = info.payload().downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };

    sanitize_message(&payload, MAX_PANIC_PAYLOAD_CHARS)
}

fn sanitize_message(value: &str, max_chars: usize) -> String {
    let normalized = value.replace(['\n', '\r'], " ");
    let mut truncated = normalized.chars().take(max_chars).collect::<String>();
    if normalized.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}
