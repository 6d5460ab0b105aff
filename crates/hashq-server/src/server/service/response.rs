//! Request and response bodies, plus the mapping from [`hashq::Error`] to
//! HTTP responses.
//!
//! ## Error mapping
//! - `InvalidRequest` -> `400 Bad Request` with the reason as text.
//! - `NotFound` -> `404 Not Found`.
//! - `ServiceShutdown` -> `200 OK` with an empty body. Requests that arrive
//!   while draining are ignored, not failed.
//! - Invariant and termination failures (`DuplicateId`, `UnknownId`,
//!   `Termination`) -> logged at error level with full detail. The client
//!   only sees a bare `500 Internal Server Error`; the variant, id and
//!   message never leave the process.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hashq::{Error, Id, StatsSnapshot};
use serde::{Deserialize, Serialize};

use crate::server::telemetry::increment_ignored;

/// Body sent for every internal failure, whatever its cause.
pub const INTERNAL_ERROR_BODY: &str = "Internal Server Error\n";

/// Body of `POST /hash`, either urlencoded or JSON.
#[derive(Debug, Deserialize)]
pub struct HashRequest {
    pub password: String,
}

/// JSON response of `POST /hash`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HashResponse {
    pub id: Id,
}

/// JSON response of `GET /stats`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsResponse {
    pub total: u64,
    /// Running average accept latency in microseconds.
    pub average: u64,
}

impl From<StatsSnapshot> for StatsResponse {
    fn from(stats: StatsSnapshot) -> Self {
        Self {
            total: stats.total,
            average: stats.average_micros(),
        }
    }
}

/// Error returned by route handlers.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            Error::InvalidRequest { reason } => {
                tracing::warn!("Error in request: {reason}");
                (StatusCode::BAD_REQUEST, format!("Error in request: {reason}\n")).into_response()
            }
            Error::NotFound { id } => {
                (StatusCode::NOT_FOUND, format!("Bad Request:  ID {id} not found\n"))
                    .into_response()
            }
            Error::ServiceShutdown => {
                increment_ignored();
                tracing::debug!("Ignoring request while shutting down");
                StatusCode::OK.into_response()
            }
            err => {
                tracing::error!("Internal error: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response()
            }
        }
    }
}
