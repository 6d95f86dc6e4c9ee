#![deny(missing_docs)]
//! Shared logging utilities for the docflow workspace.
//!
//! This crate provides the `docflow_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger.

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! docflow_trace {
    ($($arg:tt)*) => {{
        log::trace!(target: "docflow", $($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! docflow_info {
    ($($arg:tt)*) => {{
        log::info!(target: "docflow", $($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! docflow_debug {
    ($($arg:tt)*) => {{
        log::debug!(target: "docflow", $($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! docflow_warn {
    ($($arg:tt)*) => {{
        log::warn!(target: "docflow", $($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! docflow_error {
    ($($arg:tt)*) => {{
        log::error!(target: "docflow", $($arg)*);
    }};
}

/// Maps a `-v` occurrence count onto a level filter.
///
/// Zero keeps the default of `Info`; one enables `Debug`; anything above is `Trace`.
pub fn level_for_verbosity(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Initializes a simple terminal logger for use in unit tests.
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
