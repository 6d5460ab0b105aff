//! Error types for the deferred digest service.
//!
//! This module defines the central [`Error`] enum, which captures every
//! reportable failure of the store, the lifecycle controller and the request
//! orchestrator. Adapters (such as the HTTP server) map each variant onto a
//! response; none of them are expected to crash the process.
//!
//! ## Error Cases
//! - `InvalidRequest`: The caller supplied a missing or unparseable value.
//! - `NotFound`: The requested id was never issued.
//! - `ServiceShutdown`: The request arrived after shutdown began. Adapters
//!   answer these with an empty response rather than an error.
//! - `DuplicateId` / `UnknownId`: Store invariant violations. These indicate a
//!   programming defect and are logged, never surfaced to clients as-is.
//! - `Termination`: The lifecycle controller failed to deliver the final
//!   termination signal.

use crate::Id;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for the deferred digest service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The request was malformed (missing password, non-numeric id, ...).
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// No entry exists for the requested id.
    #[error("ID {id} not found")]
    NotFound { id: Id },

    /// The service is draining and no longer admits requests.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// A pending entry was inserted twice under the same id.
    #[error("Invariant violated: id {id} inserted twice")]
    DuplicateId { id: Id },

    /// A completion targeted an id that was never allocated.
    #[error("Invariant violated: completion for unallocated id {id}")]
    UnknownId { id: Id },

    /// Delivering the termination signal to the process failed.
    #[error("Termination failed: {reason}")]
    Termination { reason: String },
}

impl Error {
    /// Returns `true` for variants that signal a broken internal invariant
    /// rather than a bad request or a lifecycle condition.
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::DuplicateId { .. } | Self::UnknownId { .. })
    }
}
