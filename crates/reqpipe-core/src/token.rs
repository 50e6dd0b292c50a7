//! Access/refresh token pair storage with single-flight refresh.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::envelope::{self, ApiEnvelope};
use crate::error::ApiError;
use crate::transport::{HttpClient, HttpRequest};

/// The current access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= OffsetDateTime::now_utc())
    }
}

/// Exchanges a refresh token for a fresh pair.
pub trait TokenRefresher: Send + Sync {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenPair, ApiError>> + Send + 'a>>;
}

/// Refresher for hosts that only carry a static access token.
#[derive(Debug, Default)]
pub struct NoopTokenRefresher;

impl TokenRefresher for NoopTokenRefresher {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenPair, ApiError>> + Send + 'a>> {
        let _ = refresh_token;
        Box::pin(async move { Err(ApiError::authentication("token refresh is not configured")) })
    }
}

/// Refresher that POSTs the refresh token to an auth endpoint and expects
/// a token pair inside the standard envelope.
pub struct EndpointTokenRefresher {
    transport: Arc<dyn HttpClient>,
    url: String,
}

impl EndpointTokenRefresher {
    pub fn new(transport: Arc<dyn HttpClient>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }
}

impl TokenRefresher for EndpointTokenRefresher {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenPair, ApiError>> + Send + 'a>> {
        Box::pin(async move {
            let request = HttpRequest::post(self.url.clone()).with_json(&serde_json::json!({
                "refresh_token": refresh_token,
            }));

            let response = self
                .transport
                .execute(request)
                .await
                .map_err(|error| ApiError::from_transport(&error))?;

            if !response.is_success() {
                return Err(ApiError::from_status(
                    response.status,
                    envelope::server_message(&response.body),
                ));
            }

            let envelope = ApiEnvelope::from_body(&response.body)
                .map_err(|error| ApiError::system(format!("malformed token response: {error}")))?;
            if !envelope.is_success() {
                return Err(ApiError::authentication(envelope.message));
            }

            envelope
                .data_as::<TokenPair>()
                .map_err(|error| ApiError::system(format!("malformed token payload: {error}")))
        })
    }
}

/// Observer notified when the session ends (logout or failed refresh).
/// A UI host navigates to its login boundary here.
pub trait SessionListener: Send + Sync {
    fn on_logout(&self);
}

/// Holds the token pair and coordinates refresh.
///
/// `refresh` is single-flight: concurrent callers coalesce into one
/// underlying refresher call. A caller that acquires the gate after a
/// completed refresh observes the bumped generation and returns without a
/// second network call.
pub struct TokenStore {
    pair: Mutex<Option<TokenPair>>,
    generation: AtomicU64,
    refresh_gate: tokio::sync::Mutex<()>,
    refresher: Arc<dyn TokenRefresher>,
    listeners: Mutex<Vec<Arc<dyn SessionListener>>>,
}

impl TokenStore {
    pub fn new(refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            pair: Mutex::new(None),
            generation: AtomicU64::new(0),
            refresh_gate: tokio::sync::Mutex::new(()),
            refresher,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Atomically replace both tokens.
    pub fn set(&self, pair: TokenPair) {
        *self.pair.lock().expect("token store lock is not poisoned") = Some(pair);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn token_pair(&self) -> Option<TokenPair> {
        self.pair
            .lock()
            .expect("token store lock is not poisoned")
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.token_pair()
            .map(|pair| pair.access_token)
            .filter(|token| !token.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.token_pair()
            .map(|pair| pair.refresh_token)
            .filter(|token| !token.is_empty())
    }

    pub fn is_access_expired(&self) -> bool {
        self.token_pair().is_some_and(|pair| pair.is_expired())
    }

    pub fn register_listener(&self, listener: Arc<dyn SessionListener>) {
        self.listeners
            .lock()
            .expect("token store lock is not poisoned")
            .push(listener);
    }

    /// Clear the pair and notify session listeners.
    pub fn logout(&self) {
        *self.pair.lock().expect("token store lock is not poisoned") = None;
        self.generation.fetch_add(1, Ordering::AcqRel);

        let listeners = self
            .listeners
            .lock()
            .expect("token store lock is not poisoned")
            .clone();
        for listener in listeners {
            listener.on_logout();
        }
    }

    /// Exchange the refresh token for a fresh pair (single-flight).
    ///
    /// On failure the session is terminated via [`TokenStore::logout`].
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let start_generation = self.generation.load(Ordering::Acquire);
        let _gate = self.refresh_gate.lock().await;

        if self.generation.load(Ordering::Acquire) != start_generation {
            // Another caller settled the refresh while we waited.
            if self.access_token().is_some() {
                return Ok(());
            }
            return Err(ApiError::authentication("session expired"));
        }

        let Some(refresh_token) = self.refresh_token() else {
            self.logout();
            return Err(ApiError::authentication("no refresh token available"));
        };

        match self.refresher.refresh(&refresh_token).await {
            Ok(pair) => {
                tracing::debug!("access token refreshed");
                self.set(pair);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(message = error.message(), "token refresh failed, logging out");
                self.logout();
                Err(error)
            }
        }
    }
}
