#![deny(missing_docs)]
//! Shared logging utilities for the jobwatch workspace.
//!
//! This crate provides the `jobwatch_*` logging macros used across the
//! codebase, a per-thread job context that prefixes every message, and a
//! minimal test initializer for the global logger.

use std::cell::RefCell;

#[doc(hidden)]
pub use log;

thread_local! {
    /// Identifier of the job the current thread is working on, if any.
    static JOB_CONTEXT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Sets the job context for the current thread.
/// The monitor loop calls this whenever the active job changes.
pub fn set_job_context(job_id: Option<&str>) {
    JOB_CONTEXT.with(|ctx| *ctx.borrow_mut() = job_id.map(str::to_owned));
}

/// Retrieves the job context for the current thread.
/// Returns `None` when no job is active.
pub fn job_context() -> Option<String> {
    JOB_CONTEXT.with(|ctx| ctx.borrow().clone())
}

#[doc(hidden)]
pub fn context_prefix() -> String {
    JOB_CONTEXT.with(|ctx| match ctx.borrow().as_deref() {
        Some(job_id) => format!("[job {job_id}] "),
        None => String::new(),
    })
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! jobwatch_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! jobwatch_info {
    ($($arg:tt)*) => {{
        $crate::log::info!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! jobwatch_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! jobwatch_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! jobwatch_error {
    ($($arg:tt)*) => {{
        $crate::log::error!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
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
