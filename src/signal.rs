//! Ctrl+C handling for cancelling scans.
//!
//! A scan checks a shared `AtomicBool` between directories. Installing the
//! handler wires that flag to Ctrl+C; the scan then stops before the next
//! directory and the process exits with code 130.
//!
//! ```rust,no_run
//! use photocat::signal::install_handler;
//!
//! let handler = install_handler().expect("signal handler");
//! let flag = handler.get_flag();
//! // pass `flag` to CatalogScanner::with_shutdown_flag
//! # let _ = flag;
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit code for SIGINT (Ctrl+C) interruption: 128 + SIGINT.
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request a shutdown, as Ctrl+C would.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag to hand to a [`CatalogScanner`](crate::scanner::CatalogScanner).
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler, or reuse the installed one.
///
/// `ctrlc` allows a single hook per process, so later calls (from tests
/// running `run_app` in parallel, say) get the already installed handler
/// with its flag cleared. If the hook was claimed by someone else, an
/// unhooked handler is returned that still honours
/// [`ShutdownHandler::request_shutdown`].
///
/// # Errors
///
/// Currently always succeeds; the `Result` leaves room for platforms where
/// a missing hook should be fatal.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    let hooked = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(
            std::io::stderr(),
            "\nInterrupted. Stopping after the current folder..."
        );
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    });

    if let Err(e) = hooked {
        log::debug!("Ctrl+C handler not installed ({e}), using unhooked handler");
    }
    let _ = GLOBAL_HANDLER.set(handler);
    let installed = GLOBAL_HANDLER.get().cloned().unwrap_or_default();
    installed.reset();
    Ok(installed)
}
