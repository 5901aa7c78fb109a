//! Leveled logging for the `objbridge` workspace.
//!
//! Messages carry the module path of the call site and are written to a
//! selectable [`Sink`]: standard error (the default), standard output, or an
//! in-memory capture buffer that tests can drain with [`take_captured`].
//!
//! # Example
//!
//! ```
//! use objbridge_log::{debug, info, Level};
//!
//! objbridge_log::set_level(Level::Debug);
//!
//! let class = "NSMutableArray";
//! info!("importing {}", class);
//! debug!("ancestors: {:?}", ["NSArray", "NSObject"]);
//! ```

use std::fmt::{self, Arguments};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};

/// Severity of a log message.
///
/// Lower numeric values are more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Failures the caller will see.
    Error = 0,
    /// Recoverable oddities (missing metadata, skipped classes).
    Warn = 1,
    /// Coarse lifecycle events such as framework loads.
    Info = 2,
    /// Import and registration detail.
    Debug = 3,
    /// Per-call dispatch decisions.
    Trace = 4,
}

impl Level {
    const fn color_code(self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }

    /// Upper-case name used in rendered output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Level {
        match raw {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            3 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a level name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid log level: {}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Parses a level name, ignoring case. `"warning"` is accepted as an
    /// alias for `Warn`.
    ///
    /// # Example
    ///
    /// ```
    /// use objbridge_log::Level;
    ///
    /// assert_eq!("debug".parse::<Level>(), Ok(Level::Debug));
    /// assert!("loud".parse::<Level>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Level::Error),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "INFO" => Ok(Level::Info),
            "DEBUG" => Ok(Level::Debug),
            "TRACE" => Ok(Level::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Where rendered records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    /// Coloured output on standard error.
    Stderr,
    /// Coloured output on standard output.
    Stdout,
    /// Uncoloured records kept in memory until [`take_captured`] is called.
    Capture,
}

/// One captured log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Process-wide logger state.
pub struct Logger {
    level: AtomicU8,
    sink: Mutex<Sink>,
    captured: Mutex<Vec<Record>>,
}

impl Logger {
    const fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
            sink: Mutex::new(Sink::Stderr),
            captured: Mutex::new(Vec::new()),
        }
    }

    /// Sets the least severe level that is still emitted.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    /// Returns the current threshold.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Returns `true` if a record at `level` would be emitted.
    pub fn enabled(&self, level: Level) -> bool {
        level as u8 <= self.level.load(Ordering::Relaxed)
    }

    /// Redirects output.
    pub fn set_sink(&self, sink: Sink) {
        if let Ok(mut current) = self.sink.lock() {
            *current = sink;
        }
    }

    /// Returns the active sink.
    pub fn sink(&self) -> Sink {
        self.sink.lock().map(|s| *s).unwrap_or(Sink::Stderr)
    }

    fn write(&self, level: Level, target: &str, args: Arguments<'_>) {
        const RESET: &str = "\x1b[0m";
        match self.sink() {
            Sink::Stderr => {
                eprintln!("{}[{}]{RESET} {target}: {args}", level.color_code(), level);
            }
            Sink::Stdout => {
                println!("{}[{}]{RESET} {target}: {args}", level.color_code(), level);
            }
            Sink::Capture => {
                if let Ok(mut records) = self.captured.lock() {
                    records.push(Record {
                        level,
                        target: target.to_string(),
                        message: args.to_string(),
                    });
                }
            }
        }
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Returns the global logger, creating it at `Level::Warn` on first use.
pub fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::new(Level::Warn))
}

/// Sets the global threshold.
pub fn set_level(level: Level) {
    get_logger().set_level(level);
}

/// Sets the global threshold from a level name.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if `s` is not a level name; the current
/// threshold is left untouched.
pub fn set_level_from_str(s: &str) -> Result<(), ParseLevelError> {
    set_level(s.parse()?);
    Ok(())
}

/// Reads the threshold from the environment variable `var`.
///
/// Returns the level that was applied, or `Ok(None)` if the variable is
/// unset or empty.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if the variable holds something other than a
/// level name.
pub fn init_from_env(var: &str) -> Result<Option<Level>, ParseLevelError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            let level: Level = value.parse()?;
            set_level(level);
            Ok(Some(level))
        }
        _ => Ok(None),
    }
}

/// Redirects global output.
pub fn set_sink(sink: Sink) {
    get_logger().set_sink(sink);
}

/// Drains every record captured while the sink was [`Sink::Capture`].
pub fn take_captured() -> Vec<Record> {
    get_logger()
        .captured
        .lock()
        .map(|mut records| std::mem::take(&mut *records))
        .unwrap_or_default()
}

#[doc(hidden)]
pub fn __log_with_target(level: Level, target: &str, args: Arguments<'_>) {
    let logger = get_logger();
    if logger.enabled(level) {
        logger.write(level, target, args);
    }
}

/// Logs at an explicit level, tagging the record with the caller's module.
///
/// ```
/// use objbridge_log::{log, Level};
///
/// log!(level: Level::Warn, "selector {} has no signature", "frame");
/// ```
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($arg:tt)*) => {
        {
            if $crate::get_logger().enabled($level) {
                $crate::__log_with_target(
                    $level,
                    module_path!(),
                    format_args!($($arg)*)
                );
            }
        }
    };
}

/// Logs at [`Level::Error`].
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Error, $($arg)*)
    };
}

/// Logs at [`Level::Warn`].
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Warn, $($arg)*)
    };
}

/// Logs at [`Level::Info`].
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Info, $($arg)*)
    };
}

/// Logs at [`Level::Debug`].
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Debug, $($arg)*)
    };
}

/// Logs at [`Level::Trace`].
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Trace, $($arg)*)
    };
}
