use core::time::Duration;
use tokio::time::Instant;

/// Default delay before a submitted value is digested. The same delay is used
/// as the shutdown grace period.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// A trait for time sources that report elapsed time from a fixed origin.
///
/// This abstraction allows the service to use a real monotonic clock in
/// production or a hand-driven time source in tests. Timestamps returned by
/// one source are only comparable with timestamps from the same source.
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use hashq::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn now(&self) -> Duration {
///         Duration::from_millis(1234)
///     }
/// }
///
/// assert_eq!(FixedTime.now(), Duration::from_millis(1234));
/// ```
pub trait TimeSource {
    /// Returns the time elapsed since this source's origin.
    fn now(&self) -> Duration;
}

/// A monotonic time source measuring elapsed time since construction.
///
/// Backed by [`tokio::time::Instant`], so it never goes backward under
/// wall-clock adjustments and it follows Tokio's paused clock in tests.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Constructs a clock whose origin (t = 0) is the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}
