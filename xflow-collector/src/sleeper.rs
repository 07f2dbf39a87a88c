//! Sleep abstraction for the collection loop.
//!
//! The loop ticks once per second; tests substitute a sleeper that returns
//! immediately and records how long it was asked to wait.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Trait for sleeping between loop ticks.
pub trait Sleeper: Send + Sync {
    /// Sleep for the specified number of seconds.
    fn sleep_sec(&self, seconds: u64);
}

/// Sleeper backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealSleeper;

impl RealSleeper {
    pub fn new() -> Self {
        Self
    }
}

impl Sleeper for RealSleeper {
    fn sleep_sec(&self, seconds: u64) {
        std::thread::sleep(Duration::from_secs(seconds));
    }
}

/// Returns immediately, accumulating the requested sleep time.
/// Cloning shares the total.
#[derive(Debug, Default, Clone)]
pub struct MockSleeper {
    slept: Arc<AtomicU64>,
}

impl MockSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total seconds requested so far.
    pub fn total_slept(&self) -> u64 {
        self.slept.load(Ordering::SeqCst)
    }
}

impl Sleeper for MockSleeper {
    fn sleep_sec(&self, seconds: u64) {
        self.slept.fetch_add(seconds, Ordering::SeqCst);
    }
}
