//! CLI command implementations.

pub mod backup;
pub mod superuser;

use secrecy::{ExposeSecret, SecretString};

use mung_admin::backend::{AccessToken, BackendClient, BackendError};

/// Log in as an operator and return the bearer token.
pub async fn login(
    backend: &BackendClient,
    email: &str,
    password: &SecretString,
) -> Result<AccessToken, BackendError> {
    tracing::info!("Logging in as {email}...");
    backend.login_for_token(email, password.expose_secret()).await
}
