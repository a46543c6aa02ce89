#![deny(missing_docs)]
//! Shared logging utilities for the tagger workspace.
//!
//! This crate provides the `tagger_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger. Every line is
//! prefixed with the batch number the pipeline is currently working on, so a
//! log of a long-running session can be split per pass over the inbox.

use std::sync::atomic::{AtomicU64, Ordering};

#[doc(hidden)]
pub use log as __log;

/// Batch counter shared by every task of the process.
static CURRENT_BATCH: AtomicU64 = AtomicU64::new(0);

/// Records the batch number the pipeline has just started.
/// Called by the engine each time a new batch of chats is loaded.
pub fn set_current_batch(batch: u64) {
    CURRENT_BATCH.store(batch, Ordering::Relaxed);
}

/// Returns the batch number last recorded, or 0 before the first batch.
pub fn current_batch() -> u64 {
    CURRENT_BATCH.load(Ordering::Relaxed)
}

/// Logs a trace-level message prefixed with the current batch.
#[macro_export]
macro_rules! tagger_trace {
    ($($arg:tt)*) => {{
        $crate::__log::trace!("[batch {}] {}", $crate::current_batch(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message prefixed with the current batch.
#[macro_export]
macro_rules! tagger_debug {
    ($($arg:tt)*) => {{
        $crate::__log::debug!("[batch {}] {}", $crate::current_batch(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message prefixed with the current batch.
#[macro_export]
macro_rules! tagger_info {
    ($($arg:tt)*) => {{
        $crate::__log::info!("[batch {}] {}", $crate::current_batch(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message prefixed with the current batch.
#[macro_export]
macro_rules! tagger_warn {
    ($($arg:tt)*) => {{
        $crate::__log::warn!("[batch {}] {}", $crate::current_batch(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message prefixed with the current batch.
#[macro_export]
macro_rules! tagger_error {
    ($($arg:tt)*) => {{
        $crate::__log::error!("[batch {}] {}", $crate::current_batch(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
