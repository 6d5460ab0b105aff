//! Aggregate accept-path statistics.

use core::time::Duration;
use parking_lot::RwLock;

/// Point-in-time copy of the aggregate statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Number of accepted submissions.
    pub total: u64,
    /// Running average accept latency, in nanoseconds.
    pub average_nanos: u64,
}

impl StatsSnapshot {
    /// Average accept latency in whole microseconds, the unit reported to
    /// clients.
    pub const fn average_micros(&self) -> u64 {
        self.average_nanos / 1_000
    }
}

/// Running count and average of accept-path latency.
///
/// The average follows the recurrence `average = (average + latency) / total`
/// in integer nanoseconds, updated once per accepted submission. This is not
/// an arithmetic mean; clients depend on this exact recurrence.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    inner: RwLock<StatsSnapshot>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one accepted submission whose accept path took `latency`.
    pub fn record_accept_latency(&self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        let mut stats = self.inner.write();
        stats.total += 1;
        stats.average_nanos = stats.average_nanos.saturating_add(nanos) / stats.total;
    }

    /// Returns a consistent `(total, average)` snapshot.
    pub fn snapshot(&self) -> StatsSnapshot {
        *self.inner.read()
    }
}
