//! HTTP middleware and extractors for the admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions, moka store)
//! 4. Auth extractor on protected handlers

pub mod auth;
pub mod session;

pub use auth::{RequireAdminAuth, clear_session, set_current_admin};
pub use session::create_session_layer;
