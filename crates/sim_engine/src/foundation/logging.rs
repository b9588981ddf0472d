//! Logging utilities and crash reporting
//!
//! Day-to-day diagnostics go straight through the `log` facade. The
//! [`EngineLogger`] trait is the engine-facing logger capability: leveled
//! messages plus persistence of crash reports when a component faults.

use chrono::{DateTime, Local};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use log::{debug, error, info, trace, warn};

/// Log target used for fatal messages
pub const FATAL_TARGET: &str = "fatal";

/// Initialize the logging system
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system with a default filter (e.g. `"info"`)
///
/// `RUST_LOG` still takes precedence when set.
pub fn init_with_filter(filter: &str) {
    let env = env_logger::Env::default().default_filter_or(filter);
    if let Err(e) = env_logger::Builder::from_env(env).try_init() {
        log::debug!("Logger already initialized: {e}");
    }
}

/// Engine log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Verbose diagnostics
    Debug,
    /// Normal operation
    Info,
    /// Recoverable problems
    Warning,
    /// Failed operations
    Error,
    /// Faults that take the engine down
    Fatal,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

/// Details of a component fault
#[derive(Debug, Clone)]
pub struct CrashReport {
    /// Name of the faulting component
    pub component: String,
    /// Fault description (error message or panic payload)
    pub fault: String,
    /// When the fault was observed
    pub timestamp: DateTime<Local>,
    /// Stack trace captured where the fault surfaced
    pub backtrace: Option<String>,
}

impl CrashReport {
    /// Create a report stamped with the current local time
    pub fn new(component: impl Into<String>, fault: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            fault: fault.into(),
            timestamp: Local::now(),
            backtrace: None,
        }
    }

    /// Attach a captured stack trace
    pub fn with_backtrace(mut self, backtrace: impl Into<String>) -> Self {
        self.backtrace = Some(backtrace.into());
        self
    }

    /// File name the report is persisted under
    pub fn file_name(&self) -> String {
        let component: String = self
            .component
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("crash-{}-{}.log", self.timestamp.format("%Y%m%d-%H%M%S"), component)
    }

    /// Render the report body
    pub fn render(&self) -> String {
        let mut body = format!(
            "Crash report\ncomponent: {}\ntime: {}\nthread: {}\n\n{}\n",
            self.component,
            self.timestamp.to_rfc3339(),
            std::thread::current().name().unwrap_or("<unnamed>"),
            self.fault,
        );
        if let Some(backtrace) = &self.backtrace {
            body.push_str("\nbacktrace:\n");
            body.push_str(backtrace);
            body.push('\n');
        }
        body
    }
}

/// Leveled logger with crash report persistence
pub trait EngineLogger: Send + Sync {
    /// Emit a message at the given level
    fn log(&self, level: LogLevel, message: &str);

    /// Persist a crash report, returning where it was written
    fn dump_crash_report(&self, report: &CrashReport) -> io::Result<PathBuf>;

    /// Emit a debug message
    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Emit an info message
    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Emit a warning
    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    /// Emit an error
    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Emit a fatal message
    fn fatal(&self, message: &str) {
        self.log(LogLevel::Fatal, message);
    }
}

/// Logger forwarding to the `log` facade and writing crash reports to disk
#[derive(Debug, Clone)]
pub struct FileLogger {
    crash_dir: PathBuf,
}

impl FileLogger {
    /// Create a logger persisting crash reports under `crash_dir`
    pub fn new(crash_dir: impl Into<PathBuf>) -> Self {
        Self {
            crash_dir: crash_dir.into(),
        }
    }

    /// Directory crash reports are written to
    pub fn crash_dir(&self) -> &Path {
        &self.crash_dir
    }
}

impl EngineLogger for FileLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => log::debug!("{message}"),
            LogLevel::Info => log::info!("{message}"),
            LogLevel::Warning => log::warn!("{message}"),
            LogLevel::Error => log::error!("{message}"),
            LogLevel::Fatal => log::error!(target: FATAL_TARGET, "{message}"),
        }
    }

    fn dump_crash_report(&self, report: &CrashReport) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.crash_dir)?;
        let path = self.crash_dir.join(report.file_name());
        fs::write(&path, report.render())?;
        Ok(path)
    }
}
