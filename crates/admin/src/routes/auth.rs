//! Authentication route handlers for admin.
//!
//! Email and password are exchanged for a backend bearer token, which is
//! kept in the session until logout or until the backend rejects it.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::backend::BackendError;
use crate::config::{DEV_LOGIN_EMAIL, DEV_LOGIN_PASSWORD};
use crate::error::AppError;
use crate::middleware::{clear_session, set_current_admin};
use crate::models::{CurrentAdmin, Flash, session_keys};
use crate::routes::PageContext;
use crate::state::AppState;

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub email: String,
    pub password: String,
    pub error: Option<String>,
    pub notice: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub expired: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login_page).post(login))
        .route("/auth/logout", post(logout))
}

/// Notice shown on the login page when signup mode is on but a superuser
/// already exists.
const ADMIN_EXISTS_NOTICE: &str = "An admin account already exists. Log in with it.";

/// Render the login page.
///
/// GET /auth/login
#[instrument(skip(state, session))]
async fn login_page(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<LoginQuery>,
) -> Result<Response, AppError> {
    if query.expired.is_some() {
        clear_session(&session).await?;
        Flash::warning("Your session has expired. Please log in again.")
            .push(&session)
            .await;
    } else if session
        .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await?
        .is_some()
    {
        return Ok(Redirect::to("/").into_response());
    }

    let config = state.config();
    let mut notice = None;
    if config.signup_mode {
        if state.cache().superuser_exists(state.backend()).await {
            notice = Some(ADMIN_EXISTS_NOTICE.to_string());
        } else {
            return Ok(Redirect::to("/auth/setup").into_response());
        }
    }

    let (email, password) = if config.is_dev() {
        (DEV_LOGIN_EMAIL.to_string(), DEV_LOGIN_PASSWORD.to_string())
    } else {
        (String::new(), String::new())
    };

    Ok(LoginTemplate {
        page: PageContext::anonymous(&session, "/auth/login").await,
        email,
        password,
        error: None,
        notice,
    }
    .into_response())
}

/// Handle login form submission.
///
/// POST /auth/login
#[instrument(skip(state, session, form))]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let email = form.email.trim();

    let error = if email.is_empty() || form.password.is_empty() {
        "Enter both email and password.".to_string()
    } else {
        match state.backend().login_for_token(email, &form.password).await {
            Ok(access_token) => {
                let admin = CurrentAdmin {
                    email: email.to_string(),
                    access_token,
                };
                set_current_admin(&session, &admin).await?;
                tracing::info!("Admin logged in");
                Flash::success("Logged in.").push(&session).await;
                return Ok(Redirect::to("/").into_response());
            }
            Err(e @ BackendError::Transport(_)) => {
                tracing::warn!(error = %e, "Login failed: backend unreachable");
                format!("Login failed: {}", e.detail())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Login failed");
                "Login failed. Check your email and password.".to_string()
            }
        }
    };

    Ok(LoginTemplate {
        page: PageContext::anonymous(&session, "/auth/login").await,
        email: email.to_string(),
        password: String::new(),
        error: Some(error),
        notice: None,
    }
    .into_response())
}

/// Logout and clear session.
///
/// POST /auth/logout
async fn logout(session: Session) -> Result<Redirect, AppError> {
    clear_session(&session).await?;
    Flash::info("Logged out.").push(&session).await;
    Ok(Redirect::to("/auth/login"))
}
