//! Initial superuser bootstrap.
//!
//! # Usage
//!
//! ```bash
//! mung-cli superuser status
//! mung-cli superuser create -e admin@example.com --password '...'
//! ```
//!
//! # Environment Variables
//!
//! - `FASTAPI_API_BASE_URL` - Backend REST API base URL
//! - `MUNG_ADMIN_PASSWORD` - Password used when `--password` is omitted

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use mung_admin::backend::{BackendClient, BackendError};
use mung_core::{Email, EmailError};

/// Errors that can occur during superuser operations.
#[derive(Debug, Error)]
pub enum SuperuserError {
    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Empty password.
    #[error("Password cannot be empty")]
    EmptyPassword,

    /// A superuser already exists (or the check failed).
    #[error("A superuser already exists; log in to the admin instead")]
    AlreadyExists,

    /// Backend request failed.
    #[error("{}", .0.detail())]
    Backend(#[from] BackendError),
}

/// Report whether a superuser exists.
///
/// Unlike the admin's setup gate this reports the raw check, so an
/// unreachable backend is an error instead of "exists".
pub async fn status(backend: &BackendClient) -> Result<bool, SuperuserError> {
    let exists = backend.try_superuser_exists().await?;
    if exists {
        tracing::info!("A superuser exists at {}", backend.base_url());
    } else {
        tracing::info!(
            "No superuser exists at {}; run 'superuser create' to add one",
            backend.base_url()
        );
    }
    Ok(exists)
}

/// Create the initial superuser.
///
/// Refuses when a superuser already exists or the check fails.
pub async fn create(
    backend: &BackendClient,
    email: &str,
    password: &SecretString,
) -> Result<(), SuperuserError> {
    let email = Email::parse(email)?;
    if password.expose_secret().is_empty() {
        return Err(SuperuserError::EmptyPassword);
    }

    if backend.check_superuser_exists().await {
        return Err(SuperuserError::AlreadyExists);
    }

    let user = backend
        .create_initial_superuser(email.as_str(), password.expose_secret())
        .await?;
    tracing::info!("Superuser created successfully! ID: {}, Email: {}", user.id, email);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_rejects_invalid_email_before_calling_backend() {
        let backend = BackendClient::new("http://127.0.0.1:9").unwrap_or_else(|e| panic!("{e}"));
        let err = create(&backend, "not-an-email", &SecretString::from("pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, SuperuserError::InvalidEmail(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_password() {
        let backend = BackendClient::new("http://127.0.0.1:9").unwrap_or_else(|e| panic!("{e}"));
        let err = create(&backend, "root@example.com", &SecretString::from(""))
            .await
            .unwrap_err();
        assert!(matches!(err, SuperuserError::EmptyPassword));
    }

    #[tokio::test]
    async fn test_create_fails_closed_when_backend_unreachable() {
        let backend = BackendClient::new("http://127.0.0.1:9").unwrap_or_else(|e| panic!("{e}"));
        let err = create(&backend, "root@example.com", &SecretString::from("pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, SuperuserError::AlreadyExists));
    }
}
