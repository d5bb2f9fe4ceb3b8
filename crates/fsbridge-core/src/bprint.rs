//! Leveled stderr logging for bridge internals.
//!
//! Backend lifecycle events (worker spawn/exit, reactor start/stop, drain
//! anomalies) log through these macros. Output goes to a locked stderr
//! handle so lines from worker threads never interleave.
//!
//! # Environment Variables
//!
//! - `FSBRIDGE_LOG=<level>` - 0=off, 1=error, 2=warn, 3=info, 4=debug
//!   (default: warn)

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Log levels.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize the log level from `FSBRIDGE_LOG`.
///
/// Called automatically on first log; explicit calls are idempotent.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }
    if let Ok(val) = std::env::var("FSBRIDGE_LOG") {
        let level = match val.to_lowercase().as_str() {
            "off" | "0" => LogLevel::Off,
            "error" | "1" => LogLevel::Error,
            "warn" | "2" => LogLevel::Warn,
            "info" | "3" => LogLevel::Info,
            "debug" | "4" => LogLevel::Debug,
            _ => LogLevel::Warn,
        };
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
}

/// Set log level programmatically (overrides the environment).
pub fn set_log_level(level: LogLevel) {
    INITIALIZED.store(true, Ordering::SeqCst);
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Check if a log level is enabled.
#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    level as u8 <= LOG_LEVEL.load(Ordering::Relaxed)
}

/// Internal: leveled line write under the stderr lock.
#[doc(hidden)]
pub fn _blog_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = write!(handle, "{} fsbridge: ", level.prefix());
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
}

/// Error level log.
#[macro_export]
macro_rules! berror {
    ($($arg:tt)*) => {{
        $crate::bprint::_blog_impl($crate::bprint::LogLevel::Error, format_args!($($arg)*));
    }};
}

/// Warn level log.
#[macro_export]
macro_rules! bwarn {
    ($($arg:tt)*) => {{
        $crate::bprint::_blog_impl($crate::bprint::LogLevel::Warn, format_args!($($arg)*));
    }};
}

/// Info level log.
#[macro_export]
macro_rules! binfo {
    ($($arg:tt)*) => {{
        $crate::bprint::_blog_impl($crate::bprint::LogLevel::Info, format_args!($($arg)*));
    }};
}

/// Debug level log.
#[macro_export]
macro_rules! bdebug {
    ($($arg:tt)*) => {{
        $crate::bprint::_blog_impl($crate::bprint::LogLevel::Debug, format_args!($($arg)*));
    }};
}
