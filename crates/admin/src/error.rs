//! Unified error handling for admin.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::backend::BackendError;

/// Where a rejected backend token sends the operator. The login page clears
/// the session when it sees the `expired` flag.
pub const SESSION_EXPIRED_PATH: &str = "/auth/login?expired=1";

/// Application-level error type for the admin panel.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend API call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Standalone error page.
#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPageTemplate {
    status: u16,
    title: String,
    message: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Backend(BackendError::Transport(_)) => StatusCode::BAD_GATEWAY,
            Self::Backend(BackendError::NotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Backend(BackendError::Forbidden(_)) => StatusCode::FORBIDDEN,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> (String, String) {
        match self {
            Self::Backend(BackendError::Transport(_)) => (
                "Server unreachable".to_string(),
                "The backend server could not be reached. Check that it is running and try again."
                    .to_string(),
            ),
            Self::Backend(e @ BackendError::Forbidden(_)) => {
                ("Permission denied".to_string(), e.detail())
            }
            Self::Backend(e @ BackendError::NotFound(_)) => ("Not found".to_string(), e.detail()),
            Self::Backend(e) => ("Backend error".to_string(), e.detail()),
            Self::NotFound(what) => ("Not found".to_string(), what.clone()),
            Self::BadRequest(why) => ("Bad request".to_string(), why.clone()),
            Self::Session(_) | Self::Internal(_) => (
                "Internal server error".to_string(),
                "Something went wrong. Please try again.".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Backend(BackendError::Unauthorized(_)) = self {
            tracing::info!("Backend rejected the session token; sending to login");
            return Redirect::to(SESSION_EXPIRED_PATH).into_response();
        }

        // Log server errors with Sentry
        if matches!(
            self,
            Self::Session(_)
                | Self::Internal(_)
                | Self::Backend(
                    BackendError::Api { .. } | BackendError::Parse(_) | BackendError::InvalidUrl(_)
                )
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        } else {
            tracing::warn!(error = %self, "Admin request failed");
        }

        let status = self.status();
        let (title, message) = self.public_message();
        let page = ErrorPageTemplate {
            status: status.as_u16(),
            title,
            message,
        };

        let body = page.render().unwrap_or_else(|e| {
            tracing::error!("Template render error: {}", e);
            "Internal Server Error".to_string()
        });
        (status, Html(body)).into_response()
    }
}
