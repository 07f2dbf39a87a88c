//! Clock abstraction for xflow.
//!
//! The classifier stamps packets with `bpf_ktime_get_ns()`, which reads
//! CLOCK_MONOTONIC. Reports need wall-clock seconds, so the collector samples
//! both clocks once at startup and keeps the difference as a [`TimeOffset`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use nix::time::{clock_gettime, ClockId};
use thiserror::Error;

const NANOS_PER_SEC: f64 = 1e9;

/// Errors reading clock sources.
#[derive(Debug, Error, PartialEq)]
pub enum ClockError {
    #[error("wall clock unavailable: {0}")]
    WallClock(String),

    #[error("monotonic clock unavailable: {0}")]
    Monotonic(String),
}

/// Trait for reading the two clocks the collector reconciles.
pub trait Clock: Send + Sync {
    /// Current wall-clock time as fractional Unix seconds.
    fn wall_time_sec(&self) -> Result<f64, ClockError>;

    /// Current monotonic time in nanoseconds since boot.
    fn monotonic_ns(&self) -> Result<u64, ClockError>;
}

/// Real system clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn wall_time_sec(&self) -> Result<f64, ClockError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .map_err(|e| ClockError::WallClock(e.to_string()))
    }

    fn monotonic_ns(&self) -> Result<u64, ClockError> {
        let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)
            .map_err(|e| ClockError::Monotonic(e.to_string()))?;
        let secs = u64::try_from(ts.tv_sec())
            .map_err(|_| ClockError::Monotonic(format!("negative seconds: {}", ts.tv_sec())))?;
        let nanos = u64::try_from(ts.tv_nsec())
            .map_err(|_| ClockError::Monotonic(format!("negative nanoseconds: {}", ts.tv_nsec())))?;
        Ok(secs * 1_000_000_000 + nanos)
    }
}

/// Mock clock for testing with fixed readings.
#[derive(Debug, Clone, Copy)]
pub struct MockClock {
    wall_sec: f64,
    monotonic_ns: u64,
}

impl MockClock {
    /// Create a mock clock with fixed wall and monotonic readings.
    pub fn new(wall_sec: f64, monotonic_ns: u64) -> Self {
        Self {
            wall_sec,
            monotonic_ns,
        }
    }
}

impl Clock for MockClock {
    fn wall_time_sec(&self) -> Result<f64, ClockError> {
        Ok(self.wall_sec)
    }

    fn monotonic_ns(&self) -> Result<u64, ClockError> {
        Ok(self.monotonic_ns)
    }
}

/// Mock clock whose wall time advances on each call.
///
/// Useful for testing polling loops where time needs to progress. The
/// monotonic reading tracks the last wall time handed out, so the offset
/// between the two stays constant.
#[derive(Debug)]
pub struct AdvancingClock {
    wall_ms: AtomicU64,
    last_ms: AtomicU64,
    increment_ms: u64,
    boot_wall_ms: u64,
}

impl AdvancingClock {
    /// Start at `wall_sec` with the machine booted `uptime_sec` ago, stepping
    /// `increment_sec` per wall-clock read.
    pub fn new(wall_sec: u64, uptime_sec: u64, increment_sec: u64) -> Self {
        Self {
            wall_ms: AtomicU64::new(wall_sec * 1000),
            last_ms: AtomicU64::new(wall_sec * 1000),
            increment_ms: increment_sec * 1000,
            boot_wall_ms: (wall_sec - uptime_sec) * 1000,
        }
    }
}

impl Clock for AdvancingClock {
    fn wall_time_sec(&self) -> Result<f64, ClockError> {
        let ms = self.wall_ms.fetch_add(self.increment_ms, Ordering::SeqCst);
        self.last_ms.store(ms, Ordering::SeqCst);
        Ok(ms as f64 / 1000.0)
    }

    fn monotonic_ns(&self) -> Result<u64, ClockError> {
        let ms = self.last_ms.load(Ordering::SeqCst);
        Ok((ms - self.boot_wall_ms) * 1_000_000)
    }
}

/// Fixed offset between CLOCK_MONOTONIC and Unix time, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct TimeOffset(pub f64);

impl TimeOffset {
    /// Convert a monotonic nanosecond stamp to wall-clock seconds.
    pub fn to_wall_seconds(&self, monotonic_ns: u64) -> f64 {
        monotonic_ns as f64 / NANOS_PER_SEC + self.0
    }

    /// Offset in seconds.
    pub fn seconds(&self) -> f64 {
        self.0
    }
}

/// Compute the monotonic-to-wall offset from the current clock readings.
///
/// Runs once at startup. Any clock failure is returned to the caller, which
/// must abort rather than collect with a zero offset.
pub fn reconcile_time_base<C: Clock + ?Sized>(clock: &C) -> Result<TimeOffset, ClockError> {
    let wall = clock.wall_time_sec()?;
    let uptime_ns = clock.monotonic_ns()?;
    Ok(TimeOffset(wall - uptime_ns as f64 / NANOS_PER_SEC))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenClock;

    impl Clock for BrokenClock {
        fn wall_time_sec(&self) -> Result<f64, ClockError> {
            Ok(1_700_000_000.0)
        }

        fn monotonic_ns(&self) -> Result<u64, ClockError> {
            Err(ClockError::Monotonic("EINVAL".to_string()))
        }
    }

    // ===========================================
    // Time base reconciliation
    // ===========================================

    #[test]
    fn test_reconcile_subtracts_uptime() {
        let clock = MockClock::new(1_700_000_000.0, 3_600_000_000_000);
        let offset = reconcile_time_base(&clock).expect("offset");

        assert_eq!(offset, TimeOffset(1_699_996_400.0));
    }

    #[test]
    fn test_offset_converts_monotonic_stamp() {
        let clock = MockClock::new(1_700_000_000.0, 100_000_000_000);
        let offset = reconcile_time_base(&clock).expect("offset");

        // A packet stamped at uptime 50s happened 50s before "now".
        let wall = offset.to_wall_seconds(50_000_000_000);
        assert_eq!(wall, 1_699_999_950.0);
    }

    #[test]
    fn test_offset_keeps_sub_second_precision() {
        let offset = TimeOffset(1_000.0);
        assert_eq!(offset.to_wall_seconds(1_500_000_000), 1_001.5);
    }

    #[test]
    fn test_reconcile_propagates_clock_failure() {
        let err = reconcile_time_base(&BrokenClock).unwrap_err();
        assert_eq!(err, ClockError::Monotonic("EINVAL".to_string()));
        assert_eq!(err.to_string(), "monotonic clock unavailable: EINVAL");
    }

    #[test]
    fn test_reconcile_trait_object() {
        let clock: Box<dyn Clock> = Box::new(MockClock::new(10.0, 4_000_000_000));
        let offset = reconcile_time_base(clock.as_ref()).expect("offset");
        assert_eq!(offset.seconds(), 6.0);
    }

    // ===========================================
    // Clock implementations
    // ===========================================

    #[test]
    fn test_system_clock_returns_reasonable_time() {
        let clock = SystemClock;
        let now = clock.wall_time_sec().expect("wall");

        // Between 2020-01-01 and 2100-01-01
        assert!(now > 1_577_836_800.0);
        assert!(now < 4_102_444_800.0);
    }

    #[test]
    fn test_system_clock_monotonic_advances() {
        let clock = SystemClock;
        let t1 = clock.monotonic_ns().expect("monotonic");
        let t2 = clock.monotonic_ns().expect("monotonic");
        assert!(t2 >= t1);
    }

    #[test]
    fn test_system_offset_is_before_now() {
        let clock = SystemClock;
        let offset = reconcile_time_base(&clock).expect("offset");
        let now = clock.wall_time_sec().expect("wall");
        assert!(offset.seconds() <= now);
    }

    #[test]
    fn test_advancing_clock_increments() {
        let clock = AdvancingClock::new(1000, 100, 5);
        assert_eq!(clock.wall_time_sec().unwrap(), 1000.0);
        assert_eq!(clock.wall_time_sec().unwrap(), 1005.0);
        assert_eq!(clock.wall_time_sec().unwrap(), 1010.0);
    }

    #[test]
    fn test_advancing_clock_offset_is_stable() {
        let clock = AdvancingClock::new(1000, 100, 5);
        let first = reconcile_time_base(&clock).expect("offset");
        clock.wall_time_sec().unwrap();
        let second = reconcile_time_base(&clock).expect("offset");

        assert_eq!(first, TimeOffset(900.0));
        assert_eq!(second, TimeOffset(900.0));
    }

    #[test]
    fn test_mock_clock_debug() {
        let clock = MockClock::new(1.0, 2);
        let debug = format!("{:?}", clock);
        assert!(debug.contains("MockClock"));
    }
}
