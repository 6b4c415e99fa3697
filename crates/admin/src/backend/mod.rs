//! REST client for the Mung backend.
//!
//! Every admin action maps 1:1 onto a backend endpoint. Methods are grouped
//! per feature area in the submodules, each adding an `impl` block to the
//! single [`BackendClient`].
//!
//! # Contract
//!
//! - Base URL comes from `FASTAPI_API_BASE_URL`; paths are appended verbatim,
//!   including trailing slashes where the backend expects them.
//! - Authenticated calls send `Authorization: Bearer <token>`.
//! - Every call carries a fixed timeout (see [`timeouts`]).
//! - Non-2xx responses become [`BackendError`] with the backend's `detail`.

mod auth;
mod conversations;
mod error;
mod personas;
mod phishing;
mod storage;
mod users;

pub use auth::AccessToken;
pub use conversations::{NewConversation, ScenarioMethod};
pub use error::{BackendError, extract_detail};

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;

/// Fixed per-endpoint timeouts.
pub mod timeouts {
    use std::time::Duration;

    /// Login, setup, listings of users and personas, single case lookups.
    pub const SHORT: Duration = Duration::from_secs(5);
    /// Mutations, admin conversation endpoints, storage presigning.
    pub const STANDARD: Duration = Duration::from_secs(10);
    /// Conversation creation that may generate a scenario.
    pub const SCENARIO: Duration = Duration::from_secs(20);
    /// Sending a message (AI reply) and raw storage uploads.
    pub const LONG: Duration = Duration::from_secs(60);
    /// Image phishing analysis.
    pub const ANALYSIS: Duration = Duration::from_secs(90);
}

/// Client for the Mung REST backend.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is not an http(s) URL or the HTTP client
    /// fails to build.
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let parsed =
            url::Url::parse(base_url.trim()).map_err(|e| BackendError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BackendError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("mung-admin/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: parsed.as_str().trim_end_matches('/').to_string(),
            }),
        })
    }

    /// The normalised base URL (no trailing slash).
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Start a request to `path` under the base URL.
    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&AccessToken>,
        timeout: Duration,
    ) -> RequestBuilder {
        let url = format!("{}{path}", self.inner.base_url);
        let builder = self.inner.client.request(method, url).timeout(timeout);
        match token {
            Some(token) => builder.bearer_auth(token.secret().expose_secret()),
            None => builder,
        }
    }

    /// Send a request and parse a JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        let body = self.send(request).await?;
        serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(error = %e, "Unexpected backend response body");
            BackendError::Parse(format!("Failed to parse response: {e}"))
        })
    }

    /// Send a request whose response body is ignored.
    async fn send_unit(&self, request: RequestBuilder) -> Result<(), BackendError> {
        self.send(request).await.map(|_| ())
    }

    /// Send a request, returning the raw body of a 2xx response.
    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, BackendError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, timeout = e.is_timeout(), "Backend request failed");
            BackendError::Transport(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.bytes().await?.to_vec());
        }

        let body = response.text().await.unwrap_or_default();
        let error = BackendError::from_status(status.as_u16(), &body);
        tracing::warn!(status = status.as_u16(), error = %error, "Backend returned an error");
        Err(error)
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalised() {
        let client = BackendClient::new("http://localhost:8000/api/v1/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api/v1");

        let client = BackendClient::new("http://app:80").unwrap();
        assert_eq!(client.base_url(), "http://app");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            BackendClient::new("not a url"),
            Err(BackendError::InvalidUrl(_))
        ));
        assert!(matches!(
            BackendClient::new("ftp://example.com"),
            Err(BackendError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_timeouts_ordered() {
        assert!(timeouts::SHORT < timeouts::STANDARD);
        assert!(timeouts::STANDARD < timeouts::SCENARIO);
        assert!(timeouts::LONG < timeouts::ANALYSIS);
    }
}
