//! Logger setup plus per-module switches for chatty code paths.
//!
//! Stores refresh often, so their routine messages go through the gated
//! macros below. A module opts in by declaring its own flag:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! log_info!("loaded {} rows", rows.len());
//! ```

/// Installs `env_logger`. `RUST_LOG` still takes precedence over `default`.
/// Calling it twice is harmless.
pub fn init_logging(default: log::LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(default)
        .parse_default_env()
        .try_init();
}

/// `log::info!` when the calling module's `ENABLE_LOGS` is set.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// `log::warn!` when the calling module's `ENABLE_LOGS` is set.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// `log::debug!` when the calling module's `ENABLE_LOGS` is set.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}
