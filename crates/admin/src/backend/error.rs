//! Backend API error types.

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when calling the REST backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection failure or timeout.
    #[error("Backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The bearer token was rejected (expired or invalid).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The token is valid but lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("API error: {status} - {detail}")]
    Api { status: u16, detail: String },

    /// A success response whose body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The backend base URL or a presigned URL is malformed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl BackendError {
    /// Build an error from a non-success status and its response body.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = extract_detail(body)
            .unwrap_or_else(|| format!("request failed with status {status}"));
        match status {
            401 => Self::Unauthorized(detail),
            403 => Self::Forbidden(detail),
            404 => Self::NotFound(detail),
            _ => Self::Api { status, detail },
        }
    }

    /// Human-readable detail for flash messages.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Transport(e) if e.is_timeout() => "the server did not respond in time".to_string(),
            Self::Transport(_) => "could not connect to the server".to_string(),
            Self::Unauthorized(detail)
            | Self::Forbidden(detail)
            | Self::NotFound(detail)
            | Self::Api { detail, .. }
            | Self::Parse(detail)
            | Self::InvalidUrl(detail) => detail.clone(),
        }
    }

    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Pull a readable message out of an error body.
///
/// Handles `{"detail": "..."}`, validation errors of the form
/// `{"detail": [{"msg": "..."}, ...]}` (joined by `; `), and plain text.
/// Returns `None` for an empty body.
#[must_use]
pub fn extract_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return Some(body.to_string());
    };

    match json.get("detail") {
        Some(Value::String(detail)) => Some(detail.clone()),
        Some(Value::Array(items)) => {
            let joined = items
                .iter()
                .map(|item| match item.get("msg") {
                    Some(Value::String(msg)) => msg.clone(),
                    _ => item.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; ");
            Some(joined)
        }
        Some(other) => Some(other.to_string()),
        None => Some(body.to_string()),
    }
}
