//! Time sources for the executor.
//!
//! Live execution sleeps on the wall clock between retries. Dry runs use a
//! [`VirtualClock`] that advances instantly, so a simulated timeline with
//! minutes of backoff completes in microseconds and is fully deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A monotonic time source measured from an arbitrary origin.
///
/// Implementations must be `Send + Sync` so one clock can be shared by
/// branches running on different threads.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;

    /// Blocks (or, for virtual clocks, advances) for `duration`.
    fn sleep(&self, duration: Duration);

    /// An independent clock for one branch of work, reading at least `at`.
    ///
    /// Time that passes on the fork never shows up on the parent, so
    /// concurrent branches do not see each other's sleeps.
    fn fork_at(&self, at: Duration) -> Self
    where
        Self: Sized;

    /// Current time in whole milliseconds.
    #[inline]
    fn now_ms(&self) -> u64 {
        self.now().as_millis() as u64
    }
}

// ============================================================================
// Production Implementation
// ============================================================================

/// Wall-clock time measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }

    /// Wall time is shared by every branch; only the reading is copied.
    fn fork_at(&self, _at: Duration) -> Self {
        *self
    }
}

// ============================================================================
// Virtual Implementation
// ============================================================================

/// Deterministic clock that only moves when slept on.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now_ms: AtomicU64,
}

impl VirtualClock {
    /// Creates a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock already advanced to `start`.
    pub fn starting_at(start: Duration) -> Self {
        Self {
            now_ms: AtomicU64::new(start.as_millis() as u64),
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms.load(Ordering::Acquire))
    }

    fn sleep(&self, duration: Duration) {
        let delta = duration.as_millis() as u64;
        self.now_ms.fetch_add(delta, Ordering::AcqRel);
    }

    fn fork_at(&self, at: Duration) -> Self {
        Self::starting_at(self.now().max(at))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_clock_advances_on_sleep() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now_ms(), 0);

        clock.sleep(Duration::from_secs(60));
        clock.sleep(Duration::from_millis(250));
        assert_eq!(clock.now_ms(), 60_250);
    }

    #[test]
    fn test_virtual_clock_starting_offset() {
        let clock = VirtualClock::starting_at(Duration::from_millis(400));
        clock.sleep(Duration::from_millis(100));
        assert_eq!(clock.now(), Duration::from_millis(500));
    }

    #[test]
    fn test_virtual_fork_is_independent() {
        let parent = VirtualClock::starting_at(Duration::from_millis(100));
        let fork = parent.fork_at(Duration::from_millis(300));
        fork.sleep(Duration::from_secs(2));

        assert_eq!(fork.now_ms(), 2_300);
        assert_eq!(parent.now_ms(), 100);
        // Never earlier than the parent.
        assert_eq!(parent.fork_at(Duration::ZERO).now_ms(), 100);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now();
        clock.sleep(Duration::from_millis(1));
        assert!(clock.now() >= first);
    }
}
