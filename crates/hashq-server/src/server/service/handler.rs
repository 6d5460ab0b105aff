//! Route handlers for the deferred digest API.
//!
//! Each handler is a thin adapter: it extracts the request, calls one
//! [`HashService`] operation, and turns the outcome into a response. Every
//! failure becomes a well-formed response through [`ApiError`].

use crate::server::{
    service::response::{ApiError, HashRequest, HashResponse, StatsResponse},
    telemetry::{increment_polls, increment_submissions, record_submit_duration},
};
use axum::{
    Form, Json, Router,
    extract::{FromRequest, Path, Query, Request, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use hashq::{Error, HashService};
use tower_http::trace::TraceLayer;

/// Builds the application router around `service`.
///
/// Routes:
/// - `POST /hash` - submit a password (form or JSON).
/// - `GET /hash/{id}` - poll for the digest.
/// - `GET /stats` - aggregate statistics.
/// - `GET|POST /shutdown` - begin a graceful shutdown.
pub fn router(service: HashService) -> Router {
    Router::new()
        .route("/hash", post(hash_password))
        .route("/hash/{id}", get(check_password))
        .route("/stats", get(api_stats))
        .route("/shutdown", get(shutdown).post(shutdown))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

fn is_json(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// `POST /hash`
///
/// Reads the password from a JSON body when the content type says so, from a
/// urlencoded form body or the query string otherwise, and answers with the freshly issued id before
/// any hashing has happened.
#[tracing::instrument(skip_all)]
async fn hash_password(
    State(service): State<HashService>,
    req: Request,
) -> Result<Response, ApiError> {
    let start = std::time::Instant::now();

    // Draining services ignore the request before looking at the body.
    if !service.is_accepting() {
        return Err(Error::ServiceShutdown.into());
    }

    let use_json = is_json(&req);
    let password = if use_json {
        let Json(body) = Json::<HashRequest>::from_request(req, &service)
            .await
            .map_err(|e| Error::InvalidRequest {
                reason: format!("Failed to decode body: {}", e.body_text()),
            })?;
        body.password
    } else {
        // A password in the body wins over one in the query string.
        let from_query = Query::<HashRequest>::try_from_uri(req.uri())
            .ok()
            .map(|Query(body)| body.password);
        match Form::<HashRequest>::from_request(req, &service).await {
            Ok(Form(body)) => body.password,
            Err(e) => from_query.ok_or_else(|| Error::InvalidRequest {
                reason: format!("No password. Use \"password=<value>\" ({})", e.body_text()),
            })?,
        }
    };

    let id = service.submit(password)?;

    increment_submissions();
    record_submit_duration(start.elapsed().as_secs_f64() * 1_000_000.0);
    tracing::info!(id, json = use_json, "Response return for HashPassword");

    Ok(if use_json {
        Json(HashResponse { id }).into_response()
    } else {
        format!("{id}\n").into_response()
    })
}

/// `GET /hash/{id}`
///
/// Answers with the id itself until the digest delay has elapsed, and with
/// the digest afterwards.
#[tracing::instrument(skip(service))]
async fn check_password(
    State(service): State<HashService>,
    Path(id): Path<String>,
) -> Result<String, ApiError> {
    let poll = service.poll_str(&id)?;

    increment_polls(poll.is_ready());
    tracing::info!(ready = poll.is_ready(), "Response return for CheckPassword");

    Ok(format!("{poll}\n"))
}

/// `GET /stats`
#[tracing::instrument(skip_all)]
async fn api_stats(State(service): State<HashService>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = StatsResponse::from(service.stats()?);
    tracing::info!(?stats, "Response return for GetAPIStats");
    Ok(Json(stats))
}

/// `GET|POST /shutdown`
///
/// Acknowledges immediately. New requests are ignored from now on and the
/// process terminates once the grace delay has passed.
#[tracing::instrument(skip_all)]
async fn shutdown(State(service): State<HashService>) -> &'static str {
    if service.shutdown() {
        tracing::info!("Shutdown requested; exiting in {:?}", service.config().delay);
    } else {
        tracing::debug!("Shutdown already in progress");
    }
    "Shutting service down\n"
}
