//! Shutdown signalling.
//!
//! `ShutdownFlag` is set from the SIGINT/SIGTERM handler; the collection loop
//! polls it between ticks and, once set, leaves the loop and drains.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Trait for checking shutdown status.
pub trait ShutdownCheck: Send + Sync {
    /// Returns true if shutdown has been requested.
    fn should_stop(&self) -> bool;
}

/// Flag set by the process signal handler.
#[derive(Debug, Clone)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownFlag {
    /// Create a flag and register it with the Ctrl+C / SIGTERM handler.
    ///
    /// Only one handler can exist per process. If registration fails the
    /// flag is still returned and can be triggered manually.
    pub fn new() -> Self {
        let flag = Arc::new(AtomicBool::new(false));
        let handler_flag = flag.clone();

        let _ = ctrlc::set_handler(move || {
            handler_flag.store(true, Ordering::SeqCst);
        });

        Self { flag }
    }

    /// Create a flag without registering a handler.
    pub fn manual() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request shutdown.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

impl ShutdownCheck for ShutdownFlag {
    fn should_stop(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Never signals shutdown.
#[derive(Debug, Default, Clone)]
pub struct NeverShutdown;

impl ShutdownCheck for NeverShutdown {
    fn should_stop(&self) -> bool {
        false
    }
}

/// Signals shutdown after a fixed number of checks.
///
/// The first `allowed` calls return false, every later call returns true.
#[derive(Debug, Clone)]
pub struct CountingShutdown {
    allowed: usize,
    calls: Arc<AtomicUsize>,
}

impl CountingShutdown {
    pub fn new(allowed: usize) -> Self {
        Self {
            allowed,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of times `should_stop` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ShutdownCheck for CountingShutdown {
    fn should_stop(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst) >= self.allowed
    }
}
