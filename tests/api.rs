use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{self, Request, StatusCode};
use blog_views::kv::{
    Environment, KvOptions, KvStore, MemoryStore, SITE_KEY, StoreError, VIEWS_FIELD, select_store,
};
use blog_views::server::{ViewsResponse, router};
use futures::future::join_all;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tower::ServiceExt;

fn memory_router() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (router(store.clone()), store)
}

async fn send(router: &Router, method: http::Method, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .uri(uri)
        .method(method)
        .body(Body::empty())
        .unwrap();

    let resp = router.clone().oneshot(req).await.unwrap();

    let status_code = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let output = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&body).unwrap()
    };

    (status_code, output)
}

async fn views(router: &Router, method: http::Method, uri: &str) -> u64 {
    let (status_code, output) = send(router, method, uri).await;
    assert_eq!(status_code, StatusCode::OK, "{uri}: {output}");
    let resp: ViewsResponse = serde_json::from_value(output).unwrap();
    resp.views
}

#[tokio::test]
async fn test_site_counter() {
    let (router, _) = memory_router();

    assert_eq!(views(&router, http::Method::GET, "/api/view/site").await, 0);
    assert_eq!(views(&router, http::Method::GET, "/api/view/site").await, 0);
    assert_eq!(views(&router, http::Method::POST, "/api/view/site").await, 1);
    assert_eq!(views(&router, http::Method::POST, "/api/view/site").await, 2);
    assert_eq!(views(&router, http::Method::GET, "/api/view/site").await, 2);
}

#[tokio::test]
async fn test_site_response_shape() {
    let (router, _) = memory_router();
    let (status_code, output) = send(&router, http::Method::POST, "/api/view/site").await;
    assert_eq!(status_code, StatusCode::OK);
    assert_eq!(output, serde_json::json!({ "views": 1 }));
}

#[tokio::test]
async fn test_page_counter() {
    let (router, store) = memory_router();

    assert_eq!(views(&router, http::Method::GET, "/api/view/hello-world").await, 0);
    // Reading an unseen page must not create it
    assert_eq!(store.len(), 1);

    assert_eq!(views(&router, http::Method::PUT, "/api/view/hello-world").await, 1);
    assert_eq!(views(&router, http::Method::PUT, "/api/view/hello-world").await, 2);
    assert_eq!(views(&router, http::Method::GET, "/api/view/hello-world").await, 2);

    // Pages are independent of each other and of the site counter
    assert_eq!(views(&router, http::Method::PUT, "/api/view/other-post").await, 1);
    assert_eq!(views(&router, http::Method::GET, "/api/view/site").await, 0);
    assert_eq!(
        store.get("hello-world", VIEWS_FIELD).await.unwrap(),
        Some(2)
    );
}

#[tokio::test]
async fn test_missing_page_id_is_rejected() {
    let (router, store) = memory_router();

    for (method, uri) in [
        (http::Method::GET, "/api/view/"),
        (http::Method::PUT, "/api/view/"),
        (http::Method::GET, "/api/view"),
        (http::Method::PUT, "/api/view"),
        (http::Method::PUT, "/api/view/%20"),
    ] {
        let (status_code, output) = send(&router, method.clone(), uri).await;
        assert_eq!(status_code, StatusCode::BAD_REQUEST, "{method} {uri}");
        assert_eq!(output["message"], "missing page identifier");
    }

    assert_eq!(store.len(), 1);
    assert_eq!(store.get(SITE_KEY, VIEWS_FIELD).await.unwrap(), Some(0));
}

#[tokio::test]
async fn test_unsupported_methods() {
    let (router, _) = memory_router();

    let (status_code, _) = send(&router, http::Method::DELETE, "/api/view/site").await;
    assert_eq!(status_code, StatusCode::METHOD_NOT_ALLOWED);

    let (status_code, _) = send(&router, http::Method::POST, "/api/view/hello-world").await;
    assert_eq!(status_code, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_page_views() {
    let (router, _) = memory_router();

    let requests = (0..64).map(|_| views(&router, http::Method::PUT, "/api/view/popular"));
    let mut results = join_all(requests).await;
    results.sort_unstable();

    assert_eq!(results, (1..=64).collect::<Vec<u64>>());
    assert_eq!(views(&router, http::Method::GET, "/api/view/popular").await, 64);
}

#[tokio::test]
async fn test_development_store_from_factory() {
    let store = select_store(Environment::Development, &KvOptions::default()).unwrap();
    let router = router(store);

    assert_eq!(views(&router, http::Method::GET, "/api/view/site").await, 0);
    assert_eq!(views(&router, http::Method::POST, "/api/view/site").await, 1);
}

/// Store whose backend is always unreachable
struct UnavailableStore;

#[async_trait]
impl KvStore for UnavailableStore {
    async fn get(&self, _key: &str, _field: &str) -> Result<Option<u64>, StoreError> {
        Err(StoreError::ConnectionClosed)
    }

    async fn set(&self, _key: &str, _field: &str, _value: u64) -> Result<(), StoreError> {
        Err(StoreError::ConnectionClosed)
    }

    async fn increment(&self, _key: &str, _field: &str, _by: u64) -> Result<u64, StoreError> {
        Err(StoreError::ConnectionClosed)
    }
}

#[tokio::test]
async fn test_backend_failure_is_surfaced() {
    let router = router(Arc::new(UnavailableStore));

    for (method, uri) in [
        (http::Method::GET, "/api/view/site"),
        (http::Method::POST, "/api/view/site"),
        (http::Method::GET, "/api/view/hello-world"),
        (http::Method::PUT, "/api/view/hello-world"),
    ] {
        let (status_code, output) = send(&router, method, uri).await;
        assert_eq!(status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(output["message"].as_str().unwrap().contains("connection closed"));
    }

    // Validation still runs before any store access
    let (status_code, _) = send(&router, http::Method::PUT, "/api/view/").await;
    assert_eq!(status_code, StatusCode::BAD_REQUEST);
}
