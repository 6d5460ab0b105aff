//! HTTP adapter around [`hashq::HashService`].
//!
//! ## Structure
//!
//! - [`config`] - CLI/environment configuration.
//! - [`service`] - route handlers and response mapping.
//! - [`telemetry`] - log subscriber and optional OpenTelemetry metrics.

pub mod config;
pub mod service;
pub mod telemetry;
