//! The request pipeline: composition of transport, auth, cache,
//! cancellation, loading, timing, retry and error handling.
//!
//! Per-request flow:
//!
//! 1. build the URL and attach `Authorization` / `X-Request-ID` headers
//! 2. serve fresh cache hits for cacheable GETs
//! 3. register a cancellation token under the request key (latest wins)
//! 4. hold a loading guard and a timing mark for the request lifetime
//! 5. send, retrying network/5xx failures with backoff up to the cap and
//!    replaying exactly once after a 401-triggered token refresh
//! 6. normalize the body into the `{code, message, data}` envelope

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::cache::ResponseCache;
use crate::cancel::CancelRegistry;
use crate::config::{ClientConfig, RequestOptions};
use crate::envelope::{self, ApiEnvelope};
use crate::error::{ApiError, ErrorHub};
use crate::loading::LoadingTracker;
use crate::retry::RetryLedger;
use crate::timing::RequestTimer;
use crate::token::TokenStore;
use crate::transport::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};

#[derive(Debug, Clone)]
struct RequestBody {
    bytes: Vec<u8>,
    content_type: String,
}

/// Client-side request orchestrator over a pluggable transport.
///
/// All collaborating services are constructed once and owned here; no
/// module-level globals. Clone-cheap services are exposed through
/// accessors for host integration (spinners, cache invalidation, ...).
pub struct ApiClient {
    transport: Arc<dyn HttpClient>,
    config: ClientConfig,
    tokens: Option<Arc<TokenStore>>,
    cache: ResponseCache,
    cancels: CancelRegistry,
    loading: LoadingTracker,
    timer: RequestTimer,
    retries: RetryLedger,
    errors: ErrorHub,
}

impl ApiClient {
    /// Build a client over the production reqwest transport.
    pub fn new(config: ClientConfig) -> Self {
        let transport = Arc::new(ReqwestHttpClient::new(&config.user_agent));
        Self::with_transport(config, transport)
    }

    /// Build a client over an injected transport (tests, custom stacks).
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn HttpClient>) -> Self {
        let cache = ResponseCache::new(config.cache_capacity, config.cache_ttl);
        Self {
            transport,
            config,
            tokens: None,
            cache,
            cancels: CancelRegistry::new(),
            loading: LoadingTracker::new(),
            timer: RequestTimer::new(),
            retries: RetryLedger::new(),
            errors: ErrorHub::new(),
        }
    }

    pub fn with_token_store(mut self, tokens: Arc<TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub const fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub const fn cancels(&self) -> &CancelRegistry {
        &self.cancels
    }

    pub const fn loading(&self) -> &LoadingTracker {
        &self.loading
    }

    pub const fn timer(&self) -> &RequestTimer {
        &self.timer
    }

    pub const fn retries(&self) -> &RetryLedger {
        &self.retries
    }

    pub const fn errors(&self) -> &ErrorHub {
        &self.errors
    }

    pub fn tokens(&self) -> Option<&Arc<TokenStore>> {
        self.tokens.as_ref()
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<ApiEnvelope, ApiError> {
        self.request(HttpMethod::Get, path, None, options).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: Value,
        options: RequestOptions,
    ) -> Result<ApiEnvelope, ApiError> {
        self.request(HttpMethod::Post, path, Some(body), options)
            .await
    }

    pub async fn put(
        &self,
        path: &str,
        body: Value,
        options: RequestOptions,
    ) -> Result<ApiEnvelope, ApiError> {
        self.request(HttpMethod::Put, path, Some(body), options)
            .await
    }

    pub async fn patch(
        &self,
        path: &str,
        body: Value,
        options: RequestOptions,
    ) -> Result<ApiEnvelope, ApiError> {
        self.request(HttpMethod::Patch, path, Some(body), options)
            .await
    }

    pub async fn delete(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiEnvelope, ApiError> {
        self.request(HttpMethod::Delete, path, None, options).await
    }

    /// Send a request and normalize the response into the envelope.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<ApiEnvelope, ApiError> {
        let result = self.request_inner(method, path, body, &options).await;
        self.finish(&options, result)
    }

    /// Upload bytes as a `multipart/form-data` file field.
    pub async fn upload(
        &self,
        path: &str,
        field: &str,
        file_name: &str,
        bytes: Vec<u8>,
        options: RequestOptions,
    ) -> Result<ApiEnvelope, ApiError> {
        let boundary = format!("reqpipe-{:016x}", fastrand::u64(..));
        let body = RequestBody {
            bytes: multipart_body(&boundary, field, file_name, &bytes),
            content_type: format!("multipart/form-data; boundary={boundary}"),
        };

        let result = match self
            .dispatch(HttpMethod::Post, path, Some(body), &options)
            .await
        {
            Ok(response) => normalize(&response),
            Err(error) => Err(error),
        };
        self.finish(&options, result)
    }

    /// Fetch raw bytes without envelope normalization (file download).
    pub async fn download(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Vec<u8>, ApiError> {
        let result = self
            .dispatch(HttpMethod::Get, path, None, &options)
            .await
            .map(|response| response.body);
        self.finish(&options, result)
    }

    async fn request_inner(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
        options: &RequestOptions,
    ) -> Result<ApiEnvelope, ApiError> {
        let cacheable = matches!(method, HttpMethod::Get) && options.cache;
        let cache_key = self.cache_key(method, path, options);

        if cacheable {
            if let Some(cached) = self.cache.get(&cache_key).await {
                match serde_json::from_str::<ApiEnvelope>(&cached) {
                    Ok(envelope) => {
                        tracing::debug!(key = %cache_key, "cache hit");
                        return Ok(envelope);
                    }
                    Err(_) => {
                        self.cache.remove(&cache_key).await;
                    }
                }
            }
        }

        let body = body.map(|value| RequestBody {
            bytes: value.to_string().into_bytes(),
            content_type: String::from("application/json"),
        });

        let response = self.dispatch(method, path, body, options).await?;
        let envelope = normalize(&response)?;

        if cacheable {
            if let Ok(serialized) = serde_json::to_string(&envelope) {
                self.cache
                    .insert(cache_key, serialized, options.cache_ttl)
                    .await;
            }
        }

        Ok(envelope)
    }

    /// Run a single logical request through cancellation, loading, timing
    /// and the retry/refresh loop. Returns the first 2xx response.
    async fn dispatch(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<RequestBody>,
        options: &RequestOptions,
    ) -> Result<HttpResponse, ApiError> {
        let key = request_key(method, path, options);
        let url = self.url_for(path);
        let cancel = self.cancels.register(&key);
        let _loading = options
            .loading_enabled()
            .then(|| self.loading.begin(Some(&key)));

        self.timer
            .observe(&key, self.attempt_loop(method, &url, body, options, &key, &cancel))
            .await
    }

    async fn attempt_loop(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<RequestBody>,
        options: &RequestOptions,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ApiError> {
        let retry_allowed = options.retry_enabled() && self.config.retry.enabled;
        let mut replayed = false;

        loop {
            let request_id = request_id();
            let request = self.build_request(method, url, body.as_ref(), options, &request_id);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    Err(HttpError::aborted("request superseded by a newer call"))
                }
                response = self.transport.execute(request) => response,
            };

            let error = match outcome {
                Ok(response) if response.is_success() => {
                    self.retries.clear(key);
                    return Ok(response);
                }
                Ok(response) if response.status == 401 => {
                    if let Some(tokens) = &self.tokens {
                        if !replayed && tokens.refresh_token().is_some() {
                            // One-shot recovery, outside the retry counter.
                            replayed = true;
                            tracing::debug!(key, "401 received, refreshing token and replaying");
                            if let Err(error) = tokens.refresh().await {
                                self.cache.clear().await;
                                return Err(error.with_request_id(request_id));
                            }
                            continue;
                        }
                        tokens.logout();
                        self.cache.clear().await;
                    }
                    return Err(ApiError::from_status(
                        401,
                        envelope::server_message(&response.body),
                    )
                    .with_request_id(request_id));
                }
                Ok(response) => ApiError::from_status(
                    response.status,
                    envelope::server_message(&response.body),
                )
                .with_request_id(request_id),
                Err(transport_error) => {
                    ApiError::from_transport(&transport_error).with_request_id(request_id)
                }
            };

            if error.is_superseded() {
                return Err(error);
            }

            if retry_allowed && error.is_retryable() {
                let attempt = self.retries.record_failure(key);
                if attempt <= self.config.retry.max_retries {
                    let delay = self.config.retry.delay_for_attempt(attempt - 1);
                    tracing::debug!(
                        key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying failed request"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }

            return Err(error);
        }
    }

    fn build_request(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&RequestBody>,
        options: &RequestOptions,
        request_id: &str,
    ) -> HttpRequest {
        let mut request = HttpRequest::new(method, url)
            .with_timeout(options.timeout.unwrap_or(self.config.timeout));

        for (name, value) in &options.headers {
            request = request.with_header(name.clone(), value.clone());
        }
        for (name, value) in &options.query {
            request = request.with_query(name.clone(), value.clone());
        }

        if let Some(token) = self.tokens.as_ref().and_then(|tokens| tokens.access_token()) {
            request = request.with_header("authorization", format!("Bearer {token}"));
        }
        request = request.with_header("x-request-id", request_id);

        if let Some(body) = body {
            request = request
                .with_header("content-type", body.content_type.clone())
                .with_body(body.bytes.clone());
        }

        request
    }

    fn finish<T>(&self, options: &RequestOptions, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(error) = &result {
            if !options.silent && !error.is_superseded() {
                self.errors.handle(error);
            }
        }
        result
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    fn cache_key(&self, method: HttpMethod, path: &str, options: &RequestOptions) -> String {
        let mut probe = HttpRequest::new(method, self.url_for(path));
        for (name, value) in &options.query {
            probe = probe.with_query(name.clone(), value.clone());
        }
        format!("{method} {}", probe.full_url())
    }
}

fn normalize(response: &HttpResponse) -> Result<ApiEnvelope, ApiError> {
    if response.body.is_empty() {
        return Ok(ApiEnvelope::success(Value::Null));
    }

    let envelope = ApiEnvelope::from_body(&response.body)
        .map_err(|error| ApiError::system(format!("invalid response body: {error}")))?;

    if envelope.is_success() {
        return Ok(envelope);
    }

    let message = if envelope.message.is_empty() {
        format!("request failed with code {}", envelope.code)
    } else {
        envelope.message.clone()
    };
    Err(ApiError::business(envelope.code, message))
}

fn request_key(method: HttpMethod, path: &str, options: &RequestOptions) -> String {
    options
        .key
        .clone()
        .unwrap_or_else(|| format!("{method} {path}"))
}

fn request_id() -> String {
    let now_ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("req-{now_ms}-{:08x}", fastrand::u32(..))
}

/// Run `f` over `items` in chunks of `chunk_size`, awaiting each chunk
/// concurrently and sleeping `pause` between chunks. Bounds concurrency to
/// the chunk size; chunks are serialized. Results keep input order.
pub async fn batch<T, R, F, Fut>(items: Vec<T>, chunk_size: usize, pause: Duration, f: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: std::future::Future<Output = R>,
{
    let mut results = Vec::with_capacity(items.len());
    let mut iter = items.into_iter().peekable();

    while iter.peek().is_some() {
        let chunk: Vec<T> = iter.by_ref().take(chunk_size.max(1)).collect();
        results.extend(join_all(chunk.into_iter().map(&f)).await);

        if iter.peek().is_some() && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    results
}

fn multipart_body(boundary: &str, field: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::NoopHttpClient;

    fn client() -> ApiClient {
        let config = ClientConfig::new("https://api.example.test").expect("valid config");
        ApiClient::with_transport(config, Arc::new(NoopHttpClient))
    }

    #[test]
    fn url_for_joins_base_and_path() {
        let client = client();
        assert_eq!(
            client.url_for("/users"),
            "https://api.example.test/users"
        );
        assert_eq!(client.url_for("users"), "https://api.example.test/users");
        assert_eq!(
            client.url_for("https://other.test/x"),
            "https://other.test/x"
        );
    }

    #[test]
    fn cache_keys_differ_by_query() {
        let client = client();
        let plain = client.cache_key(HttpMethod::Get, "/users", &RequestOptions::new());
        let paged = client.cache_key(
            HttpMethod::Get,
            "/users",
            &RequestOptions::new().with_query("page", "2"),
        );
        assert_ne!(plain, paged);
    }

    #[test]
    fn request_key_prefers_explicit_key() {
        let derived = request_key(HttpMethod::Get, "/users", &RequestOptions::new());
        assert_eq!(derived, "GET /users");

        let explicit = request_key(
            HttpMethod::Get,
            "/users",
            &RequestOptions::new().with_key("user-list"),
        );
        assert_eq!(explicit, "user-list");
    }

    #[test]
    fn request_ids_carry_prefix_and_vary() {
        let a = request_id();
        let b = request_id();
        assert!(a.starts_with("req-"));
        assert_ne!(a, b);
    }

    #[test]
    fn multipart_body_wraps_bytes_with_boundary() {
        let body = multipart_body("b123", "file", "report.pdf", b"PDFDATA");
        let text = String::from_utf8_lossy(&body);

        assert!(text.starts_with("--b123\r\n"));
        assert!(text.contains("name=\"file\"; filename=\"report.pdf\""));
        assert!(text.contains("PDFDATA"));
        assert!(text.ends_with("--b123--\r\n"));
    }

    #[tokio::test]
    async fn noop_transport_round_trip_normalizes_empty_object() {
        let client = client();
        let envelope = client
            .get("/anything", RequestOptions::new())
            .await
            .expect("noop transport always succeeds");

        assert_eq!(envelope.code, 200);
        assert_eq!(envelope.data, serde_json::json!({}));
    }

    #[tokio::test]
    async fn batch_preserves_order_and_processes_all_chunks() {
        let results = batch(
            vec![1, 2, 3, 4, 5],
            2,
            Duration::from_millis(1),
            |n| async move { n * 2 },
        )
        .await;

        assert_eq!(results, vec![2, 4, 6, 8, 10]);
    }
}
