//! Core request orchestration layer for reqpipe.
//!
//! This crate contains:
//! - A pluggable HTTP transport contract and reqwest implementation
//! - The standard `{code, message, data}` response envelope
//! - Error taxonomy, classification and listener notification
//! - Retry policy with backoff and a per-key attempt ledger
//! - Bounded TTL response cache, cancellation registry, loading tracker
//! - Token store with single-flight refresh
//! - The `ApiClient` pipeline composing all of the above

pub mod cache;
pub mod cancel;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod loading;
pub mod retry;
pub mod timing;
pub mod token;
pub mod transport;

pub use cache::ResponseCache;
pub use cancel::CancelRegistry;
pub use client::{batch, ApiClient};
pub use config::{ClientConfig, ConfigError, RequestOptions};
pub use envelope::ApiEnvelope;
pub use error::{ApiError, ErrorHub, ErrorKind, ErrorListener, Severity};
pub use loading::{LoadingGuard, LoadingTracker};
pub use retry::{Backoff, RetryConfig, RetryLedger};
pub use timing::RequestTimer;
pub use token::{
    EndpointTokenRefresher, NoopTokenRefresher, SessionListener, TokenPair, TokenRefresher,
    TokenStore,
};
pub use transport::{
    HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient, DEFAULT_TIMEOUT,
};
