//! Mung Admin library.
//!
//! Server-rendered operator dashboard for the Mung anti-phishing education
//! platform. Every entity lives in the backend REST API; this crate only
//! proxies, caches, and renders it.
//!
//! # Security
//!
//! Operators authenticate against the backend and every page call carries
//! their bearer token. The admin holds no credentials of its own.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::Path;
use std::time::Duration;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use middleware::create_session_layer;
use state::AppState;

/// Directory served under `/static`, relative to the workspace root.
pub const STATIC_DIR: &str = "crates/admin/static";

/// Build the complete application router.
///
/// Includes static files, sessions, and request tracing. Sentry layers are
/// added by the binary on top of this.
pub fn build_app(state: AppState) -> Router {
    build_app_with_static(state, STATIC_DIR)
}

/// Build the application router serving static files from `static_dir`.
pub fn build_app_with_static(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    let session_layer = create_session_layer(state.config());

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                status = tracing::field::Empty,
                latency_ms = tracing::field::Empty,
            )
        })
        .on_response(
            |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                span.record("status", response.status().as_u16());
                span.record(
                    "latency_ms",
                    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                );
                DefaultOnResponse::default().on_response(response, latency, span);
            },
        );

    Router::new()
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(ServiceBuilder::new().layer(trace_layer).layer(session_layer))
        .with_state(state)
}
