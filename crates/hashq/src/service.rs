//! Request orchestration for deferred digests.
//!
//! This module defines [`HashService`], the only component that talks to the
//! [`RecordStore`], the [`StatsAggregator`] and the [`Lifecycle`] controller.
//! It exposes the operations consumed by transport adapters.
//!
//! ## Responsibilities
//!
//! - Gate every request on the lifecycle state.
//! - Admit submissions (allocate + record pending + record latency) and
//!   return the id before the digest exists.
//! - Schedule a deferred completion per submission on a [`TaskTracker`].
//! - Answer polls with a time-gated sentinel or the finished digest.

use crate::{
    Error, Id, Lifecycle, LifecycleState, MonotonicClock, RecordStore, Result, StatsAggregator,
    StatsSnapshot, Terminator, TimeSource, DEFAULT_DELAY, EntryView, digest,
};
use core::{fmt, time::Duration};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;

/// Runtime settings for a [`HashService`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Delay before a submission is digested. Also used as the shutdown grace
    /// delay, so anything admitted before shutdown completes before exit.
    pub delay: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
        }
    }
}

/// Outcome of polling an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollResult {
    /// The delay has not elapsed (or the digest is not stored yet). Carries
    /// the id itself, which adapters echo back as the sentinel.
    NotReady(Id),
    /// The finished digest.
    Ready(String),
}

impl PollResult {
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl fmt::Display for PollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady(id) => write!(f, "{id}"),
            Self::Ready(digest) => f.write_str(digest),
        }
    }
}

/// Parses a client-supplied id.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] if `raw` is not a non-negative integer.
pub fn parse_id(raw: &str) -> Result<Id> {
    raw.trim().parse::<Id>().map_err(|e| Error::InvalidRequest {
        reason: format!("invalid id {raw:?}: {e}"),
    })
}

struct Inner<T> {
    config: ServiceConfig,
    clock: T,
    store: Arc<RecordStore>,
    stats: StatsAggregator,
    lifecycle: Arc<Lifecycle>,
    tracker: TaskTracker,
}

/// Deferred digest service.
///
/// Cloning is cheap; all clones share the same store, statistics and
/// lifecycle. Separate instances are fully independent.
pub struct HashService<T = MonotonicClock> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for HashService<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for HashService<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashService")
            .field("config", &self.inner.config)
            .field("head", &self.inner.store.head())
            .field("lifecycle", &self.inner.lifecycle)
            .field("in_flight", &self.inner.tracker.len())
            .finish()
    }
}

impl HashService<MonotonicClock> {
    /// Creates a service timed by a fresh [`MonotonicClock`].
    pub fn new(config: ServiceConfig, terminator: Arc<dyn Terminator>) -> Self {
        Self::with_clock(config, MonotonicClock::new(), terminator)
    }
}

impl<T: TimeSource> HashService<T> {
    /// Creates a service reading time from `clock`.
    ///
    /// The clock must advance in step with the Tokio timer, otherwise the
    /// poll gate and the deferred completion disagree about elapsed time.
    pub fn with_clock(config: ServiceConfig, clock: T, terminator: Arc<dyn Terminator>) -> Self {
        let lifecycle = Arc::new(Lifecycle::new(config.delay, terminator));
        Self {
            inner: Arc::new(Inner {
                config,
                clock,
                store: Arc::new(RecordStore::new()),
                stats: StatsAggregator::new(),
                lifecycle,
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Admits `value` and returns its id immediately.
    ///
    /// The digest is computed by a background task once the configured delay
    /// has elapsed. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::ServiceShutdown`] once shutdown has begun. Nothing is
    ///   allocated or counted.
    /// - [`Error::DuplicateId`] if the store invariant is broken.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn submit(&self, value: impl Into<String>) -> Result<Id> {
        let inner = &self.inner;
        if !inner.lifecycle.is_accepting() {
            return Err(Error::ServiceShutdown);
        }

        let started = inner.clock.now();
        let value = value.into();
        let (id, ()) = inner.store.admit_with(value.clone(), started, |_| {
            let latency = inner.clock.now().saturating_sub(started);
            inner.stats.record_accept_latency(latency);
        })?;

        self.schedule_completion(id, value);

        #[cfg(feature = "tracing")]
        tracing::debug!(id, "Accepted submission");
        Ok(id)
    }

    fn schedule_completion(&self, id: Id, value: String) {
        let store = Arc::clone(&self.inner.store);
        // Deadline is fixed at submission, not at the task's first poll.
        let deadline = Instant::now() + self.inner.config.delay;

        let fut = async move {
            tokio::time::sleep_until(deadline).await;
            if let Err(_e) = store.complete(id, digest(value)) {
                #[cfg(feature = "tracing")]
                tracing::error!("Deferred completion failed: {_e}");
            }
        };
        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::debug_span!("complete", id))
        };

        self.inner.tracker.spawn(fut);
    }

    /// Reports the state of `id`.
    ///
    /// Readiness is time-gated: until the configured delay has elapsed since
    /// submission the sentinel [`PollResult::NotReady`] is returned, even if the
    /// digest happens to be stored already. After the delay the digest is
    /// returned once it exists; an entry still pending past the delay also
    /// reports [`PollResult::NotReady`].
    ///
    /// # Errors
    ///
    /// - [`Error::ServiceShutdown`] once shutdown has begun.
    /// - [`Error::NotFound`] if `id` was never issued.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn poll(&self, id: Id) -> Result<PollResult> {
        let inner = &self.inner;
        if !inner.lifecycle.is_accepting() {
            return Err(Error::ServiceShutdown);
        }

        let view = inner.store.lookup(id)?;
        let age = inner.clock.now().saturating_sub(view.submitted_at());
        let poll = match view {
            EntryView::Completed { digest, .. } if age >= inner.config.delay => PollResult::Ready(digest),
            _ => PollResult::NotReady(id),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(ready = poll.is_ready(), "Polled");
        Ok(poll)
    }

    /// Parses `raw` as an id and polls it.
    ///
    /// The shutdown gate is checked before parsing, so a draining service
    /// ignores malformed ids as well.
    ///
    /// # Errors
    ///
    /// As [`Self::poll`], plus [`Error::InvalidRequest`] for a malformed id.
    pub fn poll_str(&self, raw: &str) -> Result<PollResult> {
        if !self.inner.lifecycle.is_accepting() {
            return Err(Error::ServiceShutdown);
        }
        self.poll(parse_id(raw)?)
    }

    /// Returns the aggregate accept statistics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once shutdown has begun.
    pub fn stats(&self) -> Result<StatsSnapshot> {
        if !self.inner.lifecycle.is_accepting() {
            return Err(Error::ServiceShutdown);
        }
        Ok(self.inner.stats.snapshot())
    }

    /// Stops admissions and schedules termination after the grace delay.
    ///
    /// Returns immediately. `true` means this call initiated the shutdown;
    /// later calls are acknowledged but return `false`. Must be called from
    /// within a Tokio runtime.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn shutdown(&self) -> bool {
        self.inner
            .lifecycle
            .request_shutdown(self.inner.clock.now())
    }

    /// Returns the number of accepted submissions, regardless of the
    /// lifecycle state.
    pub fn total_accepted(&self) -> u64 {
        self.inner.stats.snapshot().total
    }

    /// Returns `true` while the service admits requests.
    pub fn is_accepting(&self) -> bool {
        self.inner.lifecycle.is_accepting()
    }

    /// Returns the current lifecycle state.
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.inner.lifecycle.state()
    }

    /// Returns the configuration this service was built with.
    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Returns the number of deferred completions still running.
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Waits up to `timeout` for every deferred completion to finish.
    ///
    /// Closes the task tracker first; submissions accepted afterwards are
    /// still tracked. Returns `true` if everything drained in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let tracker = &self.inner.tracker;
        tracker.close();

        #[cfg(feature = "tracing")]
        tracing::info!("Draining deferred completions ({} active)", tracker.len());

        match tokio::time::timeout(timeout, tracker.wait()).await {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("All deferred completions drained");
                true
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Drain timed out ({} completions still active)",
                    tracker.len()
                );
                false
            }
        }
    }
}
