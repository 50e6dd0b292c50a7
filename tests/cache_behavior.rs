//! Cache behavior through the full pipeline: key derivation, TTL expiry
//! and insertion-order eviction observed from the caller's side.

use std::sync::Arc;
use std::time::Duration;

use reqpipe_core::{ApiClient, ClientConfig, RequestOptions, RetryConfig};
use reqpipe_tests::ScriptedHttpClient;
use serde_json::json;

fn client_with_cache(
    transport: Arc<ScriptedHttpClient>,
    capacity: usize,
    ttl: Duration,
) -> ApiClient {
    let config = ClientConfig::new("https://api.example.test")
        .expect("valid config")
        .with_cache(capacity, ttl)
        .expect("valid cache settings")
        .with_retry(RetryConfig::no_retry());
    ApiClient::with_transport(config, transport)
}

#[tokio::test]
async fn when_only_some_calls_opt_in_only_those_are_cached() {
    let transport = Arc::new(ScriptedHttpClient::new());
    transport.push_ok(r#"{"n":1}"#);
    transport.push_ok(r#"{"n":2}"#);
    transport.push_ok(r#"{"n":3}"#);
    let client = client_with_cache(transport.clone(), 10, Duration::from_secs(60));

    client
        .get("/volatile", RequestOptions::new())
        .await
        .expect("success");
    client
        .get("/volatile", RequestOptions::new())
        .await
        .expect("success");
    let cached = client
        .get("/volatile", RequestOptions::new().cached())
        .await
        .expect("success");
    let hit = client
        .get("/volatile", RequestOptions::new().cached())
        .await
        .expect("cache hit");

    // Two uncached calls plus one cache fill; the fourth call never left.
    assert_eq!(transport.call_count(), 3);
    assert_eq!(cached.data, hit.data);
    assert_eq!(hit.data, json!({"n": 3}));
}

#[tokio::test]
async fn when_queries_differ_the_cache_treats_them_as_distinct() {
    let transport = Arc::new(ScriptedHttpClient::new());
    transport.push_ok(r#"{"page":1}"#);
    transport.push_ok(r#"{"page":2}"#);
    let client = client_with_cache(transport.clone(), 10, Duration::from_secs(60));

    let page = |n: &'static str| RequestOptions::new().cached().with_query("page", n);
    let first = client.get("/users", page("1")).await.expect("success");
    let second = client.get("/users", page("2")).await.expect("success");
    let first_again = client.get("/users", page("1")).await.expect("cache hit");

    assert_eq!(transport.call_count(), 2);
    assert_eq!(first.data, json!({"page": 1}));
    assert_eq!(second.data, json!({"page": 2}));
    assert_eq!(first_again.data, first.data);
}

#[tokio::test]
async fn when_the_ttl_elapses_the_entry_is_gone_and_the_cache_shrinks() {
    let transport = Arc::new(ScriptedHttpClient::new());
    transport.push_ok(r#"{"v":"old"}"#);
    transport.push_ok(r#"{"v":"new"}"#);
    let client = client_with_cache(transport.clone(), 10, Duration::from_millis(40));

    client
        .get("/config", RequestOptions::new().cached())
        .await
        .expect("success");
    assert_eq!(client.cache().len().await, 1);

    tokio::time::sleep(Duration::from_millis(70)).await;
    let refetched = client
        .get("/config", RequestOptions::new().cached())
        .await
        .expect("refetched after expiry");

    assert_eq!(transport.call_count(), 2);
    assert_eq!(refetched.data, json!({"v": "new"}));
}

#[tokio::test]
async fn when_capacity_overflows_the_earliest_cached_path_is_refetched() {
    // Given: room for two cached responses
    let transport = Arc::new(ScriptedHttpClient::new());
    for n in 1..=4 {
        transport.push_ok(&format!(r#"{{"n":{n}}}"#));
    }
    let client = client_with_cache(transport.clone(), 2, Duration::from_secs(60));

    // When: three distinct paths are cached
    client
        .get("/a", RequestOptions::new().cached())
        .await
        .expect("success");
    client
        .get("/b", RequestOptions::new().cached())
        .await
        .expect("success");
    client
        .get("/c", RequestOptions::new().cached())
        .await
        .expect("success");
    assert_eq!(client.cache().len().await, 2);

    // Then: the earliest entry was evicted and its path hits the wire again,
    // while the later ones are still served from the cache
    let refetched = client
        .get("/a", RequestOptions::new().cached())
        .await
        .expect("refetched");
    client
        .get("/c", RequestOptions::new().cached())
        .await
        .expect("cache hit");

    assert_eq!(transport.call_count(), 4);
    assert_eq!(refetched.data, json!({"n": 4}));
}

#[tokio::test]
async fn when_the_cache_is_cleared_the_next_call_hits_the_transport() {
    let transport = Arc::new(ScriptedHttpClient::new());
    transport.push_ok(r#"{"v":1}"#);
    transport.push_ok(r#"{"v":2}"#);
    let client = client_with_cache(transport.clone(), 10, Duration::from_secs(60));

    client
        .get("/config", RequestOptions::new().cached())
        .await
        .expect("success");
    client.cache().clear().await;
    let refetched = client
        .get("/config", RequestOptions::new().cached())
        .await
        .expect("refetched");

    assert_eq!(transport.call_count(), 2);
    assert_eq!(refetched.data, json!({"v": 2}));
}

#[tokio::test]
async fn when_responses_are_failures_nothing_is_cached() {
    let transport = Arc::new(ScriptedHttpClient::new());
    transport.push_status(500, "");
    let client = client_with_cache(transport.clone(), 10, Duration::from_secs(60));

    client
        .get("/broken", RequestOptions::new().cached().silent())
        .await
        .expect_err("server failure");

    assert!(client.cache().is_empty().await);
}
