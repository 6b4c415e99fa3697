//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                        - Liveness check
//! GET  /health/ready                  - Backend reachability check
//!
//! # Dashboard
//! GET  /                              - Overview with counts
//! POST /refresh                       - Clear cached backend data
//!
//! # Auth
//! GET  /auth/login                    - Login page
//! POST /auth/login                    - Exchange email/password for a token
//! POST /auth/logout                   - Logout
//! GET  /auth/setup                    - Initial superuser form (signup mode)
//! POST /auth/setup                    - Create the initial superuser
//!
//! # Users
//! GET  /users                         - Search and paginate users
//! GET  /users/{id}/edit               - Edit form
//! POST /users/{id}                    - Save changes (multipart)
//! POST /users/{id}/delete             - Delete image then user
//!
//! # Personas
//! GET  /personas                      - List and search
//! GET  /personas/new                  - Create form
//! POST /personas                      - Create (multipart)
//! GET  /personas/{id}/edit            - Edit form
//! POST /personas/{id}                 - Save changes (multipart)
//! POST /personas/{id}/delete          - Delete image then persona
//! GET  /personas/export               - Download JSON backup
//! POST /personas/import               - Restore from JSON backup
//!
//! # Phishing cases
//! GET  /phishing                      - Cases grouped by category
//! GET  /phishing/new                  - Create form
//! POST /phishing                      - Create
//! GET  /phishing/{id}/edit            - Edit form
//! POST /phishing/{id}                 - Save changes
//! POST /phishing/{id}/delete          - Delete
//! GET  /phishing/export               - Download JSON backup
//! POST /phishing/import               - Restore from JSON backup
//!
//! # Conversations
//! GET  /conversations                 - List, search, create form
//! POST /conversations                 - Create with a scenario method
//! GET  /conversations/{id}            - Messages and panels
//! POST /conversations/{id}/messages   - Send text and/or image (multipart)
//! POST /conversations/{id}/delete     - Delete
//!
//! # Image analysis
//! GET  /image-analysis                - Upload form
//! POST /image-analysis                - Analyze (multipart)
//! ```

use std::future::Future;

use axum::{
    Form, Router,
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::backend::BackendError;
use crate::error::AppError;
use crate::models::{CurrentAdmin, Flash};
use crate::services::backup::{self, RestoreReport};
use crate::state::AppState;

pub mod auth;
pub mod conversations;
pub mod dashboard;
pub mod forms;
pub mod health;
pub mod image_analysis;
pub mod personas;
pub mod phishing;
pub mod setup;
pub mod users;

/// Build the full admin router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::index))
        .route("/refresh", post(refresh))
        .merge(health::router())
        .merge(auth::router())
        .merge(setup::router())
        .merge(users::router())
        .merge(personas::router())
        .merge(phishing::router())
        .merge(conversations::router())
        .merge(image_analysis::router())
}

/// Layout data shared by every page.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Logged-in admin, `None` on the login and setup pages.
    pub admin_email: Option<String>,
    pub current_path: &'static str,
    pub flashes: Vec<Flash>,
}

impl PageContext {
    /// Context for an authenticated page. Takes pending flash messages.
    pub async fn new(session: &Session, admin: &CurrentAdmin, current_path: &'static str) -> Self {
        Self {
            admin_email: Some(admin.email.clone()),
            current_path,
            flashes: Flash::take_all(session).await,
        }
    }

    /// Context for the login and setup pages.
    pub async fn anonymous(session: &Session, current_path: &'static str) -> Self {
        Self {
            admin_email: None,
            current_path,
            flashes: Flash::take_all(session).await,
        }
    }

    /// Whether a navigation entry is the active section.
    #[must_use]
    pub fn is_section(&self, prefix: &str) -> bool {
        if prefix == "/" {
            self.current_path == "/"
        } else {
            self.current_path.starts_with(prefix)
        }
    }
}

/// Turn a list fetch into rows plus an error banner.
///
/// A rejected token still propagates so the operator is sent to login.
pub(crate) fn rows_or_banner<T>(
    result: Result<Vec<T>, BackendError>,
    what: &str,
) -> Result<(Vec<T>, Option<String>), AppError> {
    match result {
        Ok(rows) => Ok((rows, None)),
        Err(e) if e.is_unauthorized() => Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load {what}");
            Ok((Vec::new(), Some(format!("Failed to load {what}: {}", e.detail()))))
        }
    }
}

/// Flash a failed mutation with the backend detail.
///
/// A rejected token propagates instead.
pub(crate) async fn flash_failure(
    session: &Session,
    action: &str,
    error: BackendError,
) -> Result<(), AppError> {
    if error.is_unauthorized() {
        return Err(error.into());
    }
    tracing::warn!(error = %error, "{action} failed");
    Flash::error(format!("{action} failed: {}", error.detail()))
        .push(session)
        .await;
    Ok(())
}

/// JSON file download response.
pub(crate) fn json_download(file_name: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response()
}

/// Read the uploaded backup file and flash the restore report.
pub(crate) async fn run_import<F, Fut>(
    session: &Session,
    multipart: Multipart,
    restore: F,
) -> Result<Option<RestoreReport>, AppError>
where
    F: FnOnce(Vec<serde_json::Value>) -> Fut,
    Fut: Future<Output = RestoreReport>,
{
    let mut form = forms::MultipartForm::read(multipart).await?;
    let Some(file) = form.take_file("file") else {
        Flash::error("Choose a backup file to restore.").push(session).await;
        return Ok(None);
    };

    let entries = match backup::parse_backup(&file.bytes) {
        Ok(entries) => entries,
        Err(e) => {
            Flash::error(e.to_string()).push(session).await;
            return Ok(None);
        }
    };

    let report = restore(entries).await;
    let flash = if report.failed == 0 {
        Flash::success(report.summary())
    } else {
        let shown: Vec<&str> = report.failures.iter().take(5).map(String::as_str).collect();
        Flash::warning(format!("{} {}", report.summary(), shown.join(" | ")))
    };
    flash.push(session).await;
    Ok(Some(report))
}

/// Only same-site paths are accepted as redirect targets.
fn safe_return_path(path: Option<&str>) -> &str {
    match path {
        Some(p) if p.starts_with('/') && !p.starts_with("//") => p,
        _ => "/",
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshForm {
    pub return_to: Option<String>,
}

/// Clear all cached backend data and return to the page.
///
/// POST /refresh
async fn refresh(
    crate::middleware::RequireAdminAuth(_admin): crate::middleware::RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RefreshForm>,
) -> Response {
    state.cache().clear();
    Flash::info("Cached data cleared.").push(&session).await;
    Redirect::to(safe_return_path(form.return_to.as_deref())).into_response()
}
