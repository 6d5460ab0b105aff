//! HTTP service implementation.
//!
//! This module maps HTTP requests onto [`hashq::HashService`] operations and
//! maps their results back onto responses.
//!
//! ## Structure
//!
//! - [`handler`] - route handlers and the [`handler::router`] constructor.
//! - [`response`] - request/response bodies and error-to-response mapping.

pub mod handler;
pub mod response;
