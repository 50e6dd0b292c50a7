//! Error classification and handling side effects observed through the
//! pipeline: taxonomy per status, listener fan-out, and silent mode.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use reqpipe_core::{
    ApiClient, ApiError, ClientConfig, ErrorKind, ErrorListener, HttpError, RequestOptions,
    RetryConfig, Severity,
};
use reqpipe_tests::ScriptedHttpClient;
use serde_json::json;

#[derive(Default)]
struct RecordingListener {
    seen: Mutex<Vec<(ErrorKind, String)>>,
    calls: AtomicUsize,
}

impl RecordingListener {
    fn seen(&self) -> Vec<(ErrorKind, String)> {
        self.seen.lock().expect("listener lock").clone()
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ErrorListener for RecordingListener {
    fn on_error(&self, error: &ApiError) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .expect("listener lock")
            .push((error.kind(), error.message().to_string()));
    }
}

fn quiet_client(transport: Arc<ScriptedHttpClient>) -> ApiClient {
    let config = ClientConfig::new("https://api.example.test")
        .expect("valid config")
        .with_retry(RetryConfig::no_retry());
    ApiClient::with_transport(config, transport)
}

#[tokio::test]
async fn when_statuses_arrive_they_classify_into_the_taxonomy() {
    let cases: [(u16, ErrorKind); 5] = [
        (400, ErrorKind::Validation),
        (403, ErrorKind::Authorization),
        (404, ErrorKind::Business),
        (500, ErrorKind::System),
        (418, ErrorKind::Business),
    ];

    for (status, expected_kind) in cases {
        let transport = Arc::new(ScriptedHttpClient::new());
        transport.push_status(status, "");
        let client = quiet_client(transport);

        let error = client
            .get("/resource", RequestOptions::new().silent())
            .await
            .expect_err("failure status");

        assert_eq!(error.kind(), expected_kind, "status {status}");
        assert_eq!(error.status(), Some(status));
    }
}

#[tokio::test]
async fn when_the_server_explains_itself_its_message_is_kept() {
    let transport = Arc::new(ScriptedHttpClient::new());
    transport.push_status(400, r#"{"message":"email is malformed"}"#);
    let client = quiet_client(transport);

    let error = client
        .post("/users", json!({"email": "nope"}), RequestOptions::new().silent())
        .await
        .expect_err("validation failure");

    assert_eq!(error.message(), "email is malformed");
    assert_eq!(error.user_message(), "email is malformed");
}

#[tokio::test]
async fn when_no_response_arrives_the_failure_is_a_network_error() {
    let transport = Arc::new(ScriptedHttpClient::new());
    transport.push_transport_error(HttpError::timeout("deadline exceeded"));
    let client = quiet_client(transport);

    let error = client
        .get("/slow", RequestOptions::new().silent())
        .await
        .expect_err("transport failure");

    assert_eq!(error.kind(), ErrorKind::Network);
    assert_eq!(error.status(), None);
    assert_eq!(
        error.user_message(),
        "network error, please check your connection"
    );
}

#[tokio::test]
async fn when_a_request_fails_registered_listeners_hear_it_once() {
    let transport = Arc::new(ScriptedHttpClient::new());
    transport.push_status(500, r#"{"message":"boom"}"#);
    let client = quiet_client(transport);

    let listener = Arc::new(RecordingListener::default());
    client.errors().register(listener.clone());

    client
        .get("/broken", RequestOptions::new())
        .await
        .expect_err("server failure");

    assert_eq!(listener.call_count(), 1);
    assert_eq!(
        listener.seen(),
        vec![(ErrorKind::System, String::from("boom"))]
    );
}

#[tokio::test]
async fn when_retries_exhaust_listeners_hear_only_the_final_failure() {
    let transport = Arc::new(ScriptedHttpClient::new());
    for _ in 0..3 {
        transport.push_status(503, "");
    }
    let config = ClientConfig::new("https://api.example.test")
        .expect("valid config")
        .with_retry(RetryConfig::fixed(std::time::Duration::from_millis(1), 2));
    let client = ApiClient::with_transport(config, transport);

    let listener = Arc::new(RecordingListener::default());
    client.errors().register(listener.clone());

    client
        .get("/flaky", RequestOptions::new())
        .await
        .expect_err("exhausted retries");

    // Intermediate attempts stay internal.
    assert_eq!(listener.call_count(), 1);
}

#[tokio::test]
async fn when_silent_is_requested_listeners_stay_quiet() {
    let transport = Arc::new(ScriptedHttpClient::new());
    transport.push_status(500, "");
    let client = quiet_client(transport);

    let listener = Arc::new(RecordingListener::default());
    client.errors().register(listener.clone());

    let error = client
        .get("/broken", RequestOptions::new().silent())
        .await
        .expect_err("failure still surfaces to the caller");

    assert_eq!(error.kind(), ErrorKind::System);
    assert_eq!(listener.call_count(), 0);
}

#[tokio::test]
async fn when_a_business_code_arrives_the_listener_sees_a_business_error() {
    let transport = Arc::new(ScriptedHttpClient::new());
    transport.push_ok(r#"{"code":4001,"message":"quota exceeded"}"#);
    let client = quiet_client(transport);

    let listener = Arc::new(RecordingListener::default());
    client.errors().register(listener.clone());

    let error = client
        .get("/quota", RequestOptions::new())
        .await
        .expect_err("business failure");

    assert_eq!(error.kind(), ErrorKind::Business);
    assert_eq!(error.severity(), Severity::Warning);
    assert_eq!(error.code(), Some(4001));
    assert_eq!(listener.call_count(), 1);
}

#[tokio::test]
async fn when_a_request_is_superseded_no_listener_or_retry_fires() {
    let transport = Arc::new(ScriptedHttpClient::new());
    transport.push_transport_error(HttpError::aborted("superseded"));
    let config = ClientConfig::new("https://api.example.test")
        .expect("valid config")
        .with_retry(RetryConfig::fixed(std::time::Duration::from_millis(1), 3));
    let client = ApiClient::with_transport(config, transport.clone());

    let listener = Arc::new(RecordingListener::default());
    client.errors().register(listener.clone());

    let error = client
        .get("/search", RequestOptions::new())
        .await
        .expect_err("superseded request fails quietly");

    assert!(error.is_superseded());
    assert_eq!(error.severity(), Severity::Info);
    assert_eq!(transport.call_count(), 1, "supersession is never retried");
    assert_eq!(listener.call_count(), 0);
}
