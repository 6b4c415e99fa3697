//! Authentication and first-run setup endpoints.

use reqwest::Method;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use mung_core::User;

use super::{BackendClient, BackendError, timeouts};

/// Bearer token returned by `POST /auth/token`.
///
/// Serializable so it can live in the session; `Debug` never shows it.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(#[serde(with = "secret_string")] SecretString);

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    #[must_use]
    pub const fn secret(&self) -> &SecretString {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Serde adapter for `SecretString`, which deliberately does not serialize.
mod secret_string {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(secret.expose_secret())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
        String::deserialize(deserializer).map(SecretString::from)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Serialize)]
struct SuperuserRequest<'a> {
    email: &'a str,
    password: &'a str,
}

impl BackendClient {
    /// Exchange email and password for an access token.
    ///
    /// The backend expects an OAuth2 password form, so the email goes in the
    /// `username` field.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for bad credentials, `Parse` if the response
    /// has no token.
    #[instrument(skip(self, password))]
    pub async fn login_for_token(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AccessToken, BackendError> {
        let request = self
            .request(Method::POST, "/auth/token", None, timeouts::SHORT)
            .form(&[("username", email), ("password", password)]);

        let response: TokenResponse = self.send_json(request).await?;
        response
            .access_token
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
            .ok_or_else(|| BackendError::Parse("response has no access_token".to_string()))
    }

    /// Whether a superuser already exists.
    ///
    /// Fails closed: any failure, or a body that is not a boolean, counts as
    /// "exists" so that the setup page stays locked.
    pub async fn check_superuser_exists(&self) -> bool {
        self.try_superuser_exists().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Superuser check failed; assuming one exists");
            true
        })
    }

    /// Raw superuser check; a non-boolean body still counts as `true`.
    ///
    /// # Errors
    ///
    /// Returns the transport or status error of the request.
    #[instrument(skip(self))]
    pub async fn try_superuser_exists(&self) -> Result<bool, BackendError> {
        let request = self.request(
            Method::GET,
            "/admin/superuser-exists",
            None,
            timeouts::SHORT,
        );
        let body: Value = self.send_json(request).await?;
        Ok(body.as_bool().unwrap_or(true))
    }

    /// Create the very first superuser account.
    ///
    /// # Errors
    ///
    /// Returns the backend's `detail` (e.g. a superuser already exists).
    #[instrument(skip(self, password))]
    pub async fn create_initial_superuser(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, BackendError> {
        let request = self
            .request(
                Method::POST,
                "/admin/initial-superuser",
                None,
                timeouts::SHORT,
            )
            .json(&SuperuserRequest { email, password });
        self.send_json(request).await
    }
}
