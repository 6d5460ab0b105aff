//! Shutdown lifecycle: `Running -> Draining -> Stopped`.
//!
//! A shutdown request flips the controller into `Draining` (one way, visible
//! to every thread immediately), after which new submissions are refused.
//! Once the grace delay elapses the controller asks its [`Terminator`] to end
//! the process and moves to `Stopped`. If termination fails the controller
//! stays in `Draining`.

use crate::{Error, Result};
use core::time::Duration;
use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicU8, Ordering},
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Observable lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    /// Accepting submissions.
    Running = 0,
    /// Refusing submissions while in-flight work finishes.
    Draining = 1,
    /// Termination was delivered.
    Stopped = 2,
}

impl LifecycleState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Delivers the final termination signal once the grace delay has elapsed.
pub trait Terminator: Send + Sync + 'static {
    /// Requests process termination.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Termination`] if the signal could not be delivered.
    fn terminate(&self) -> Result<()>;
}

/// A [`Terminator`] that cancels a [`CancellationToken`].
///
/// The process entry point selects on the token alongside OS signals, so
/// cancelling it is the in-process equivalent of sending an interrupt to
/// ourselves.
#[derive(Clone, Debug, Default)]
pub struct TokenTerminator {
    token: CancellationToken,
}

impl TokenTerminator {
    pub const fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Returns a handle to the token cancelled on termination.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Terminator for TokenTerminator {
    fn terminate(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Termination {
                reason: "termination token already cancelled".to_string(),
            });
        }
        self.token.cancel();
        Ok(())
    }
}

/// One-way shutdown controller.
pub struct Lifecycle {
    state: AtomicU8,
    requested_at: OnceLock<Duration>,
    grace: Duration,
    terminator: Arc<dyn Terminator>,
}

impl core::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.state())
            .field("requested_at", &self.requested_at.get())
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

impl Lifecycle {
    /// Creates a running controller that waits `grace` after a shutdown
    /// request before calling `terminator`.
    pub fn new(grace: Duration, terminator: Arc<dyn Terminator>) -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Running as u8),
            requested_at: OnceLock::new(),
            grace,
            terminator,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Returns `true` only while `Running`.
    pub fn is_accepting(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Returns when shutdown was first requested, if it has been.
    pub fn requested_at(&self) -> Option<Duration> {
        self.requested_at.get().copied()
    }

    /// Returns the grace delay between a shutdown request and termination.
    pub const fn grace(&self) -> Duration {
        self.grace
    }

    /// Moves `Running -> Draining` and schedules termination after the grace
    /// delay.
    ///
    /// Returns `true` if this call started the shutdown, `false` if shutdown
    /// was already underway (nothing new is scheduled).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn request_shutdown(self: &Arc<Self>, now: Duration) -> bool {
        if self
            .state
            .compare_exchange(
                LifecycleState::Running as u8,
                LifecycleState::Draining as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            #[cfg(feature = "tracing")]
            tracing::debug!("Shutdown already requested");
            return false;
        }
        let _ = self.requested_at.set(now);

        #[cfg(feature = "tracing")]
        tracing::info!("Draining; terminating in {:?}", self.grace);

        let deadline = Instant::now() + self.grace;
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            this.finish();
        });
        true
    }

    fn finish(&self) {
        match self.terminator.terminate() {
            Ok(()) => {
                self.state
                    .store(LifecycleState::Stopped as u8, Ordering::SeqCst);
                #[cfg(feature = "tracing")]
                tracing::info!("Termination delivered");
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Error in shutdown: {_e}");
            }
        }
    }
}
