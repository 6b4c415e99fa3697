//! Initial superuser setup.
//!
//! Only reachable when signup mode is enabled and the backend reports no
//! superuser yet. Once an account exists the page sends operators back to
//! the login page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use mung_core::Email;

use crate::error::AppError;
use crate::models::Flash;
use crate::routes::PageContext;
use crate::state::AppState;

/// Setup page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/setup.html")]
pub struct SetupTemplate {
    pub page: PageContext,
    pub email: String,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct SetupForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Build the setup router.
pub fn router() -> Router<AppState> {
    Router::new().route("/auth/setup", get(setup_page).post(create_superuser))
}

/// Ensure setup is currently allowed.
///
/// Returns a redirect to login when a superuser already exists.
async fn guard(state: &AppState, session: &Session) -> Result<Option<Response>, AppError> {
    if !state.config().signup_mode {
        return Err(AppError::NotFound("Setup is disabled".to_string()));
    }
    if state.cache().superuser_exists(state.backend()).await {
        Flash::info("An admin account already exists. Log in with it.")
            .push(session)
            .await;
        return Ok(Some(Redirect::to("/auth/login").into_response()));
    }
    Ok(None)
}

/// Check the form before calling the backend.
fn validate(form: &SetupForm) -> Result<Email, String> {
    if form.email.trim().is_empty() || form.password.is_empty() || form.confirm_password.is_empty()
    {
        return Err("All fields are required.".to_string());
    }
    if form.password != form.confirm_password {
        return Err("Passwords do not match.".to_string());
    }
    Email::parse(&form.email).map_err(|e| e.to_string())
}

/// Render the setup page.
///
/// GET /auth/setup
#[instrument(skip(state, session))]
async fn setup_page(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    if let Some(redirect) = guard(&state, &session).await? {
        return Ok(redirect);
    }

    Ok(SetupTemplate {
        page: PageContext::anonymous(&session, "/auth/setup").await,
        email: String::new(),
        error: None,
    }
    .into_response())
}

/// Create the initial superuser.
///
/// POST /auth/setup
#[instrument(skip(state, session, form))]
async fn create_superuser(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SetupForm>,
) -> Result<Response, AppError> {
    if let Some(redirect) = guard(&state, &session).await? {
        return Ok(redirect);
    }

    let error = match validate(&form) {
        Err(message) => message,
        Ok(email) => match state
            .backend()
            .create_initial_superuser(email.as_str(), &form.password)
            .await
        {
            Ok(_) => {
                state.cache().clear();
                tracing::info!(email = %email, "Initial superuser created");
                Flash::success(format!("Superuser {email} created. Please log in."))
                    .push(&session)
                    .await;
                return Ok(Redirect::to("/auth/login").into_response());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Initial superuser creation failed");
                format!("Could not create the superuser: {}", e.detail())
            }
        },
    };

    Ok(SetupTemplate {
        page: PageContext::anonymous(&session, "/auth/setup").await,
        email: form.email.trim().to_string(),
        error: Some(error),
    }
    .into_response())
}
