//! Short-lived memoization of backend reads.
//!
//! One `moka` cache holds every kind of response; each entry expires after
//! the TTL of its [`CacheKey`]. Only successful reads are stored, and any
//! successful mutation clears the whole cache. A read that started before a
//! clear is returned to its caller but never stored.
//!
//! Every operator is a superuser seeing the same data, so entries are not
//! partitioned by token.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;

use mung_core::{Conversation, Persona, PhishingCase, PhishingCaseId, PhishingCategory, User};

use crate::backend::{AccessToken, BackendClient, BackendError};

/// Number of conversations the listing page asks for.
pub const CONVERSATION_LIST_LIMIT: u32 = 1000;

/// Cache key: which backend read an entry came from.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    SuperuserExists,
    Users,
    Personas,
    Categories,
    Cases,
    Conversations { skip: u32, limit: u32 },
    Case(PhishingCaseId),
    DownloadUrl(String),
}

impl CacheKey {
    /// Time-to-live for entries under this key.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        match self {
            Self::SuperuserExists | Self::Users | Self::Personas | Self::Cases => {
                Duration::from_secs(60)
            }
            Self::Conversations { .. } => Duration::from_secs(30),
            Self::Categories | Self::Case(_) => Duration::from_secs(300),
            Self::DownloadUrl(_) => Duration::from_secs(600),
        }
    }
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Flag(bool),
    Users(Vec<User>),
    Personas(Vec<Persona>),
    Categories(Vec<PhishingCategory>),
    Cases(Vec<PhishingCase>),
    Conversations(Vec<Conversation>),
    Case(Box<PhishingCase>),
    Url(String),
}

/// Expiry policy driven by [`CacheKey::ttl`].
struct PerKeyExpiry;

impl Expiry<CacheKey, CacheValue> for PerKeyExpiry {
    fn expire_after_create(
        &self,
        key: &CacheKey,
        _value: &CacheValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(key.ttl())
    }
}

/// Shared response cache.
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<CacheKey, CacheValue>,
    /// Bumped by every [`ResponseCache::clear`].
    generation: Arc<AtomicU64>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .expire_after(PerKeyExpiry)
            .build();
        Self {
            cache,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Drop every cached entry, including reads still in flight.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate_all();
        tracing::debug!("Response cache cleared");
    }

    /// Return the cached value for `key`, or run `fetch` and cache its success.
    async fn get_or_fetch<T, Fut>(
        &self,
        key: CacheKey,
        unwrap: fn(CacheValue) -> Option<T>,
        wrap: fn(T) -> CacheValue,
        fetch: Fut,
    ) -> Result<T, BackendError>
    where
        T: Clone,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        if let Some(value) = self.cache.get(&key).await.and_then(unwrap) {
            return Ok(value);
        }

        let started = self.generation.load(Ordering::Acquire);
        let value = fetch.await?;
        if self.generation.load(Ordering::Acquire) == started {
            self.cache.insert(key, wrap(value.clone())).await;
        } else {
            tracing::debug!(?key, "Cache cleared during fetch; result not stored");
        }
        Ok(value)
    }

    /// Superuser existence, failing closed without caching the failure.
    pub async fn superuser_exists(&self, backend: &BackendClient) -> bool {
        self.get_or_fetch(
            CacheKey::SuperuserExists,
            |v| match v {
                CacheValue::Flag(flag) => Some(flag),
                _ => None,
            },
            CacheValue::Flag,
            backend.try_superuser_exists(),
        )
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Superuser check failed; assuming one exists");
            true
        })
    }

    /// # Errors
    ///
    /// Propagates the backend error; failures are not cached.
    pub async fn users(
        &self,
        backend: &BackendClient,
        token: &AccessToken,
    ) -> Result<Vec<User>, BackendError> {
        self.get_or_fetch(
            CacheKey::Users,
            |v| match v {
                CacheValue::Users(users) => Some(users),
                _ => None,
            },
            CacheValue::Users,
            backend.get_all_users(token),
        )
        .await
    }

    /// # Errors
    ///
    /// Propagates the backend error; failures are not cached.
    pub async fn personas(
        &self,
        backend: &BackendClient,
        token: &AccessToken,
    ) -> Result<Vec<Persona>, BackendError> {
        self.get_or_fetch(
            CacheKey::Personas,
            |v| match v {
                CacheValue::Personas(personas) => Some(personas),
                _ => None,
            },
            CacheValue::Personas,
            backend.get_personas(token),
        )
        .await
    }

    /// # Errors
    ///
    /// Propagates the backend error; failures are not cached.
    pub async fn categories(
        &self,
        backend: &BackendClient,
    ) -> Result<Vec<PhishingCategory>, BackendError> {
        self.get_or_fetch(
            CacheKey::Categories,
            |v| match v {
                CacheValue::Categories(categories) => Some(categories),
                _ => None,
            },
            CacheValue::Categories,
            backend.get_phishing_categories(),
        )
        .await
    }

    /// # Errors
    ///
    /// Propagates the backend error; failures are not cached.
    pub async fn cases(
        &self,
        backend: &BackendClient,
        token: &AccessToken,
    ) -> Result<Vec<PhishingCase>, BackendError> {
        self.get_or_fetch(
            CacheKey::Cases,
            |v| match v {
                CacheValue::Cases(cases) => Some(cases),
                _ => None,
            },
            CacheValue::Cases,
            backend.get_all_phishing_cases(token),
        )
        .await
    }

    /// # Errors
    ///
    /// Propagates the backend error; failures are not cached.
    pub async fn conversations(
        &self,
        backend: &BackendClient,
        token: &AccessToken,
    ) -> Result<Vec<Conversation>, BackendError> {
        let (skip, limit) = (0, CONVERSATION_LIST_LIMIT);
        self.get_or_fetch(
            CacheKey::Conversations { skip, limit },
            |v| match v {
                CacheValue::Conversations(conversations) => Some(conversations),
                _ => None,
            },
            CacheValue::Conversations,
            backend.get_all_conversations_admin(token, skip, limit),
        )
        .await
    }

    /// # Errors
    ///
    /// Propagates the backend error; failures are not cached.
    pub async fn case(
        &self,
        backend: &BackendClient,
        token: &AccessToken,
        id: PhishingCaseId,
    ) -> Result<PhishingCase, BackendError> {
        self.get_or_fetch(
            CacheKey::Case(id),
            |v| match v {
                CacheValue::Case(case) => Some(*case),
                _ => None,
            },
            |case| CacheValue::Case(Box::new(case)),
            backend.get_phishing_case_by_id(token, id),
        )
        .await
    }

    /// # Errors
    ///
    /// Propagates the backend error; failures are not cached.
    pub async fn download_url(
        &self,
        backend: &BackendClient,
        token: &AccessToken,
        object_key: &str,
    ) -> Result<String, BackendError> {
        self.get_or_fetch(
            CacheKey::DownloadUrl(object_key.to_string()),
            |v| match v {
                CacheValue::Url(url) => Some(url),
                _ => None,
            },
            CacheValue::Url,
            backend.get_presigned_url_for_download(token, object_key),
        )
        .await
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
