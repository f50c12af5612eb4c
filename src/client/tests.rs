//! Tests for the client module

use super::*;
use crate::error::Error;
use crate::http::TransportResponse;
use crate::pagination::Page;
use crate::types::{BackoffType, JsonObject, JsonValue, Method, Query, QueryParams, Record};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Scripted transport
// ============================================================================

#[derive(Debug, Clone)]
struct Request {
    method: Method,
    path: String,
    params: QueryParams,
    body: Option<JsonValue>,
}

type Handler = dyn Fn(&Request) -> TransportResponse + Send + Sync;

struct MockTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    fn new(handler: impl Fn(&Request) -> TransportResponse + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn count(&self, method: Method) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &QueryParams,
        body: Option<&JsonValue>,
    ) -> Result<TransportResponse> {
        let request = Request {
            method,
            path: path.to_string(),
            params: params.clone(),
            body: body.cloned(),
        };
        self.requests.lock().unwrap().push(request.clone());
        Ok((self.handler)(&request))
    }
}

fn ok(body: JsonValue) -> TransportResponse {
    TransportResponse::new(200, body.to_string())
}

fn org(id: &str, name: &str) -> JsonValue {
    json!({"id": id, "type": "organizations", "attributes": {"name": name}})
}

fn page_doc(ids: &[&str], current: u32, total: u32) -> JsonValue {
    let data: Vec<JsonValue> = ids.iter().map(|id| org(id, &format!("Org {id}"))).collect();
    json!({
        "data": data,
        "meta": {
            "current-page": current,
            "next-page": if current < total { json!(current + 1) } else { JsonValue::Null },
            "prev-page": if current > 1 { json!(current - 1) } else { JsonValue::Null },
            "total-pages": total,
            "total-count": 5
        }
    })
}

fn attrs(value: JsonValue) -> JsonObject {
    value.as_object().unwrap().clone()
}

fn test_config() -> ClientConfig {
    ClientConfig::builder()
        .base_url("https://api.example.test")
        .backoff(
            BackoffType::Exponential,
            Duration::from_millis(10),
            Duration::from_millis(40),
        )
        .build()
        .unwrap()
}

fn client_with(transport: &Arc<MockTransport>, config: ClientConfig) -> Client {
    Client::with_transport(config, transport.clone()).unwrap()
}

/// Serves three pages of organizations and single records by id
fn collection_handler(request: &Request) -> TransportResponse {
    match request.path.as_str() {
        "organizations" => {
            let page: u32 = request.params["page[number]"].parse().unwrap();
            match page {
                1 => ok(page_doc(&["1", "2"], 1, 3)),
                2 => ok(page_doc(&["3", "4"], 2, 3)),
                _ => ok(page_doc(&["5"], 3, 3)),
            }
        }
        path => {
            let id = path.trim_start_matches("organizations/");
            ok(json!({"data": org(id, "Acme")}))
        }
    }
}

// ============================================================================
// get_one
// ============================================================================

#[tokio::test]
async fn test_get_one_twice_fetches_once() {
    let transport = MockTransport::new(collection_handler);
    let client = client_with(&transport, test_config());
    let orgs = client.organizations();

    let first = orgs.get_one("123", false).await.unwrap();
    let second = orgs.get_one("123", false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first["id"], "123");
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(transport.requests()[0].path, "organizations/123");

    let stats = client.get_stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[tokio::test]
async fn test_get_one_force_refresh_bypasses_cache() {
    let transport = MockTransport::new(collection_handler);
    let client = client_with(&transport, test_config());
    let orgs = client.organizations();

    orgs.get_one("1", false).await.unwrap();
    orgs.get_one("1", true).await.unwrap();
    orgs.get_one("1", false).await.unwrap();

    assert_eq!(transport.requests().len(), 2);
    assert_eq!(client.get_stats().hits, 1);
}

#[tokio::test]
async fn test_get_one_not_found() {
    let transport = MockTransport::new(|_| {
        TransportResponse::new(
            404,
            json!({"errors": [{"status": "404", "title": "Record not found"}]}).to_string(),
        )
    });
    let client = client_with(&transport, test_config());

    let err = client.organizations().get_one("999", false).await.unwrap_err();

    assert!(err.is_not_found());
    assert!(err.to_string().contains("organizations/999"));
    // 404 is not retried
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_get_one_null_data_is_not_found() {
    let transport = MockTransport::new(|_| ok(json!({"data": null})));
    let client = client_with(&transport, test_config());

    let err = client.organizations().get_one("5", false).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_disabled_cache_always_fetches() {
    let transport = MockTransport::new(collection_handler);
    let config = ClientConfig::builder()
        .base_url("https://api.example.test")
        .no_cache()
        .build()
        .unwrap();
    let client = client_with(&transport, config);

    client.organizations().get_one("1", false).await.unwrap();
    client.organizations().get_one("1", false).await.unwrap();

    assert_eq!(transport.requests().len(), 2);
    let stats = client.get_stats();
    assert_eq!((stats.hits, stats.misses), (0, 2));
}

// ============================================================================
// Collections
// ============================================================================

#[tokio::test]
async fn test_get_all_walks_pages_and_caches_each() {
    let transport = MockTransport::new(collection_handler);
    let client = client_with(&transport, test_config());
    let orgs = client.organizations();

    let records = orgs.get_all(QueryParams::new(), false).await.unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    for (i, request) in requests.iter().enumerate() {
        assert_eq!(request.params["page[number]"], (i + 1).to_string());
        assert_eq!(request.params["page[size]"], "50");
    }

    // the second walk is served page by page from the cache
    let again = orgs.get_all(QueryParams::new(), false).await.unwrap();
    assert_eq!(again, records);
    assert_eq!(transport.requests().len(), 3);
    assert_eq!(client.get_stats().hits, 3);
    assert_eq!(client.cache().len().await, 3);
}

#[tokio::test]
async fn test_get_all_passes_query_params() {
    let transport = MockTransport::new(|_| ok(page_doc(&["1"], 1, 1)));
    let client = client_with(&transport, test_config());

    let params = Query::new()
        .filter("name", "Acme")
        .sort("-updated_at")
        .param("page[size]", "10")
        .into_params();
    client.organizations().get_all(params, false).await.unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.params["filter[name]"], "Acme");
    assert_eq!(request.params["sort"], "-updated_at");
    assert_eq!(request.params["page[size]"], "10");
}

#[tokio::test]
async fn test_iter_fetches_lazily() {
    let transport = MockTransport::new(collection_handler);
    let client = client_with(&transport, test_config());

    let first_two: Vec<Record> = client
        .organizations()
        .iter(QueryParams::new(), false)
        .take(2)
        .try_collect()
        .await
        .unwrap();

    assert_eq!(first_two.len(), 2);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_pages_and_list_page() {
    let transport = MockTransport::new(collection_handler);
    let client = client_with(&transport, test_config());
    let orgs = client.organizations();

    let pages: Vec<Page> = orgs
        .pages(QueryParams::new(), Some(2), false)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(pages.len(), 2);

    let third = orgs.list_page(&QueryParams::new(), 3, false).await.unwrap();
    assert!(third.metadata.is_last_page());
    assert_eq!(third.len(), 1);
}

#[tokio::test]
async fn test_configured_page_cap_bounds_iteration() {
    // claims one more page forever
    let transport = MockTransport::new(|request| {
        let page: u32 = request.params["page[number]"].parse().unwrap();
        ok(json!({
            "data": [org(&page.to_string(), "x")],
            "meta": {"current-page": page, "next-page": page + 1, "total-pages": 1_000_000}
        }))
    });
    let config = ClientConfig::builder()
        .base_url("https://api.example.test")
        .max_pages(4)
        .build()
        .unwrap();
    let client = client_with(&transport, config);

    let records = client
        .organizations()
        .get_all(QueryParams::new(), false)
        .await
        .unwrap();
    assert_eq!(records.len(), 4);
}

#[tokio::test]
async fn test_pagination_loop_is_reported() {
    let transport = MockTransport::new(|_| {
        ok(json!({
            "data": [org("1", "x")],
            "meta": {"current-page": 1, "next-page": 1, "total-pages": 2}
        }))
    });
    let client = client_with(&transport, test_config());

    let err = client
        .organizations()
        .get_all(QueryParams::new(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPaginationState { .. }));
}

// ============================================================================
// Writes
// ============================================================================

#[tokio::test]
async fn test_update_invalidates_cached_record() {
    let version = Arc::new(AtomicU32::new(1));
    let server_version = version.clone();
    let transport = MockTransport::new(move |request| match request.method {
        Method::PATCH => {
            let v = server_version.fetch_add(1, Ordering::SeqCst) + 1;
            ok(json!({"data": org("123", &format!("v{v}"))}))
        }
        _ => {
            let v = server_version.load(Ordering::SeqCst);
            ok(json!({"data": org("123", &format!("v{v}"))}))
        }
    });
    let client = client_with(&transport, test_config());
    let orgs = client.organizations();

    let before = orgs.get_one("123", false).await.unwrap();
    assert_eq!(before["attributes"]["name"], "v1");

    let updated = orgs
        .update("123", attrs(json!({"name": "renamed"})))
        .await
        .unwrap();
    assert_eq!(updated["attributes"]["name"], "v2");

    let after = orgs.get_one("123", false).await.unwrap();
    assert_eq!(after["attributes"]["name"], "v2");
    assert_eq!(transport.count(Method::GET), 2);

    let patch = transport
        .requests()
        .into_iter()
        .find(|r| r.method == Method::PATCH)
        .unwrap();
    assert_eq!(patch.path, "organizations/123");
    assert_eq!(
        patch.body.unwrap(),
        json!({"data": {"type": "organizations", "id": "123", "attributes": {"name": "renamed"}}})
    );
    assert_eq!(version.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_create_invalidates_collection_pages() {
    let transport = MockTransport::new(|request| match request.method {
        Method::POST => TransportResponse::new(201, json!({"data": org("9", "New")}).to_string()),
        _ => collection_handler(request),
    });
    let client = client_with(&transport, test_config());
    let orgs = client.organizations();

    orgs.get_all(QueryParams::new(), false).await.unwrap();
    let created = orgs.create(attrs(json!({"name": "New"}))).await.unwrap();
    assert_eq!(created["id"], "9");
    assert!(client.cache().is_empty().await);

    orgs.get_all(QueryParams::new(), false).await.unwrap();
    assert_eq!(transport.count(Method::GET), 6);

    let post = &transport.requests()[3];
    assert_eq!(
        post.body.clone().unwrap(),
        json!({"data": {"type": "organizations", "attributes": {"name": "New"}}})
    );
}

#[tokio::test]
async fn test_flexible_assets_use_hyphenated_type() {
    let transport = MockTransport::new(|_| {
        TransportResponse::new(201, json!({"data": {"id": "1", "type": "flexible-assets"}}).to_string())
    });
    let client = client_with(&transport, test_config());

    client
        .flexible_assets()
        .create(attrs(json!({"traits": {}})))
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.path, "flexible_assets");
    assert_eq!(request.body.as_ref().unwrap()["data"]["type"], "flexible-assets");
}

#[tokio::test]
async fn test_delete_accepts_empty_body() {
    let transport = MockTransport::new(|request| match request.method {
        Method::DELETE => TransportResponse::new(204, ""),
        _ => collection_handler(request),
    });
    let client = client_with(&transport, test_config());
    let orgs = client.organizations();

    orgs.get_one("7", false).await.unwrap();
    orgs.delete("7").await.unwrap();
    assert!(client.cache().is_empty().await);
}

#[tokio::test]
async fn test_update_without_body_reads_record_back() {
    let transport = MockTransport::new(|request| match request.method {
        Method::PATCH => TransportResponse::new(204, ""),
        _ => ok(json!({"data": org("9", "renamed")})),
    });
    let client = client_with(&transport, test_config());
    let orgs = client.organizations();

    let updated = orgs
        .update("9", attrs(json!({"name": "renamed"})))
        .await
        .unwrap();
    assert_eq!(updated["attributes"]["name"], "renamed");
    assert_eq!(transport.count(Method::GET), 1);

    let bulk = orgs
        .bulk_update(["9"], &attrs(json!({"name": "renamed"})))
        .await;
    assert!(bulk.is_complete_success());
}

// ============================================================================
// Reads racing writes
// ============================================================================

/// Serves one organization whose name tracks a server-side version. The
/// first GET captures its body, then parks until released.
struct GatedTransport {
    version: AtomicU32,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
    gets: AtomicU32,
}

impl GatedTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            version: AtomicU32::new(1),
            armed: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
            gets: AtomicU32::new(0),
        })
    }

    fn body(&self, path: &str) -> JsonValue {
        let name = format!("v{}", self.version.load(Ordering::SeqCst));
        if path == "organizations" {
            json!({
                "data": [org("123", &name)],
                "meta": {"current-page": 1, "total-pages": 1}
            })
        } else {
            json!({"data": org("123", &name)})
        }
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        _params: &QueryParams,
        _body: Option<&JsonValue>,
    ) -> Result<TransportResponse> {
        match method {
            Method::GET => {
                self.gets.fetch_add(1, Ordering::SeqCst);
                let body = self.body(path);
                if self.armed.swap(false, Ordering::SeqCst) {
                    self.entered.notify_one();
                    self.release.notified().await;
                }
                Ok(ok(body))
            }
            _ => {
                self.version.fetch_add(1, Ordering::SeqCst);
                Ok(ok(self.body("organizations/123")))
            }
        }
    }
}

#[tokio::test]
async fn test_read_in_flight_during_update_is_not_cached() {
    let transport = GatedTransport::new();
    let client = Client::with_transport(test_config(), transport.clone()).unwrap();
    let orgs = client.organizations();

    let reader = {
        let orgs = orgs.clone();
        tokio::spawn(async move { orgs.get_one("123", false).await })
    };
    transport.entered.notified().await;

    orgs.update("123", attrs(json!({"name": "v2"})))
        .await
        .unwrap();
    transport.release.notify_one();

    // the racing read may return what it saw, but must not keep it
    let raced = reader.await.unwrap().unwrap();
    assert_eq!(raced["attributes"]["name"], "v1");

    let after = orgs.get_one("123", false).await.unwrap();
    assert_eq!(after["attributes"]["name"], "v2");
    assert_eq!(transport.gets.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_page_in_flight_during_create_is_not_cached() {
    let transport = GatedTransport::new();
    let client = Client::with_transport(test_config(), transport.clone()).unwrap();
    let orgs = client.organizations();

    let reader = {
        let orgs = orgs.clone();
        tokio::spawn(async move { orgs.list_page(&QueryParams::new(), 1, false).await })
    };
    transport.entered.notified().await;

    orgs.create(attrs(json!({"name": "new"}))).await.unwrap();
    transport.release.notify_one();
    reader.await.unwrap().unwrap();

    let page = orgs.list_page(&QueryParams::new(), 1, false).await.unwrap();
    assert_eq!(page.items[0]["attributes"]["name"], "v2");
    assert_eq!(transport.gets.load(Ordering::SeqCst), 2);
    assert_eq!(client.cache().len().await, 1);
}

// ============================================================================
// Retries
// ============================================================================

#[tokio::test]
async fn test_mutation_retried_after_429() {
    let attempts = Arc::new(AtomicU32::new(0));
    let seen = attempts.clone();
    let transport = MockTransport::new(move |_| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            TransportResponse::new(429, "").with_header("Retry-After", "0")
        } else {
            TransportResponse::new(201, json!({"data": org("1", "x")}).to_string())
        }
    });
    let client = client_with(&transport, test_config());

    client
        .organizations()
        .create(attrs(json!({"name": "x"})))
        .await
        .unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_mutation_not_retried_after_server_error() {
    let transport = MockTransport::new(|_| TransportResponse::new(500, "boom"));
    let client = client_with(&transport, test_config());

    let err = client
        .organizations()
        .update("1", attrs(json!({"name": "x"})))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Server { status: 500, .. }));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_read_retries_exhausted_surface_last_error() {
    let transport = MockTransport::new(|_| TransportResponse::new(503, "unavailable"));
    let client = client_with(&transport, test_config());

    let err = client.organizations().get_one("1", false).await.unwrap_err();

    assert!(matches!(err, Error::Server { status: 503, .. }));
    // first attempt plus three retries
    assert_eq!(transport.requests().len(), 4);
}

#[tokio::test]
async fn test_validation_errors_carry_server_detail() {
    let transport = MockTransport::new(|_| {
        TransportResponse::new(
            422,
            json!({"errors": [{"title": "Invalid", "detail": "name can't be blank"}]}).to_string(),
        )
    });
    let client = client_with(&transport, test_config());

    let err = client
        .organizations()
        .create(attrs(json!({})))
        .await
        .unwrap_err();

    match err {
        Error::Validation { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "Invalid: name can't be blank");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_requests_wait_for_next_window() {
    let transport = MockTransport::new(collection_handler);
    let config = ClientConfig::builder()
        .base_url("https://api.example.test")
        .rate_limit(2, Duration::from_secs(10))
        .build()
        .unwrap();
    let client = client_with(&transport, config);
    let orgs = client.organizations();
    let start = tokio::time::Instant::now();

    orgs.get_one("1", false).await.unwrap();
    orgs.get_one("2", false).await.unwrap();
    assert_eq!(client.rate_limiter().unwrap().remaining(), 0);
    assert!(start.elapsed() < Duration::from_secs(1));

    orgs.get_one("3", false).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert_eq!(client.rate_limiter().unwrap().snapshot().consumed, 1);
}

#[tokio::test]
async fn test_cache_hits_do_not_spend_budget() {
    let transport = MockTransport::new(collection_handler);
    let client = client_with(&transport, test_config());
    let orgs = client.organizations();

    orgs.get_one("1", false).await.unwrap();
    orgs.get_one("1", false).await.unwrap();

    let snapshot = client.rate_limiter().unwrap().snapshot();
    assert_eq!(snapshot.consumed, 1);
    assert_eq!(snapshot.remaining, 2999);
}

#[test]
fn test_rate_limit_can_be_disabled() {
    let transport = MockTransport::new(collection_handler);
    let config = ClientConfig::builder()
        .base_url("https://api.example.test")
        .no_rate_limit()
        .build()
        .unwrap();
    let client = client_with(&transport, config);
    assert!(client.rate_limiter().is_none());
}

#[tokio::test]
async fn test_clones_share_cache_and_budget() {
    let transport = MockTransport::new(collection_handler);
    let client = client_with(&transport, test_config());
    let clone = client.clone();

    client.organizations().get_one("1", false).await.unwrap();
    clone.organizations().get_one("1", false).await.unwrap();

    assert_eq!(transport.requests().len(), 1);
    assert_eq!(clone.get_stats().hits, 1);
    assert_eq!(clone.rate_limiter().unwrap().snapshot().consumed, 1);
}

// ============================================================================
// Bulk
// ============================================================================

#[tokio::test]
async fn test_bulk_update_isolates_failures() {
    let transport = MockTransport::new(|request| {
        if request.path == "organizations/B" {
            TransportResponse::new(422, json!({"errors": [{"title": "Locked"}]}).to_string())
        } else {
            let id = request.path.trim_start_matches("organizations/");
            ok(json!({"data": org(id, "bulk")}))
        }
    });
    let client = client_with(&transport, test_config());

    let result = client
        .organizations()
        .bulk_update(["A", "B", "C"], &attrs(json!({"name": "bulk"})))
        .await;

    let succeeded: Vec<&String> = result.succeeded_inputs().collect();
    let failed: Vec<&String> = result.failed_inputs().collect();
    assert_eq!(succeeded, vec!["A", "C"]);
    assert_eq!(failed, vec!["B"]);
    assert!(matches!(
        result.failed[0].1,
        Error::Validation { status: 422, .. }
    ));
    assert_eq!(result.succeeded[1].1["id"], "C");
    assert_eq!(result.total(), 3);
    assert!(result.has_failures());
    assert_eq!(transport.count(Method::PATCH), 3);
}

#[tokio::test]
async fn test_bulk_delete_preserves_order() {
    let transport = MockTransport::new(|_| TransportResponse::new(204, ""));
    let config = ClientConfig::builder()
        .base_url("https://api.example.test")
        .bulk_concurrency(2)
        .build()
        .unwrap();
    let client = client_with(&transport, config);

    let ids: Vec<String> = (1..=6).map(|i| i.to_string()).collect();
    let result = client.organizations().bulk_delete(ids.clone()).await;

    assert!(result.is_complete_success());
    let done: Vec<String> = result.succeeded.into_iter().map(|(id, ())| id).collect();
    assert_eq!(done, ids);
}

#[tokio::test]
async fn test_bulk_apply_with_custom_operation() {
    let transport = MockTransport::new(collection_handler);
    let client = client_with(&transport, test_config());
    let orgs = client.organizations();
    let api = &orgs;

    let result = orgs
        .bulk_apply(vec!["1", "2", "3"], move |id| async move {
            api.get_one(id, false).await.map(|r| r["id"].clone())
        })
        .await;

    let ids: Vec<JsonValue> = result.succeeded.into_iter().map(|(_, id)| id).collect();
    assert_eq!(ids, vec![json!("1"), json!("2"), json!("3")]);
}

#[tokio::test]
async fn test_concurrent_readers_share_one_client() {
    let transport = MockTransport::new(collection_handler);
    let client = client_with(&transport, test_config());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let orgs = client.organizations();
            tokio::spawn(async move { orgs.get_one(&(i % 2).to_string(), false).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stats = client.get_stats();
    assert_eq!(stats.hits + stats.misses, 8);
    assert_eq!(transport.requests().len() as u64, stats.misses);
}
