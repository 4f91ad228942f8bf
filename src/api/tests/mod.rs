use super::*;
use crate::downloader::test_helpers::{
    MockBehavior, MockEngine, create_downloader_with, wait_for_running, wait_idle,
};
use crate::types::{ItemId, Status};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt; // for oneshot()


/// Router backed by a mock engine, plus handles to drive it
struct TestApp {
    app: Router,
    downloader: Arc<BatchDownloader>,
    engine: Arc<MockEngine>,
    _temp_dir: tempfile::TempDir,
}

fn test_app_with(max_concurrent: usize, behavior: MockBehavior) -> TestApp {
    let (downloader, engine, temp_dir) = create_downloader_with(max_concurrent, behavior);
    let downloader = Arc::new(downloader);
    let app = create_router(downloader.clone(), downloader.get_config());
    TestApp {
        app,
        downloader,
        engine,
        _temp_dir: temp_dir,
    }
}

fn test_app() -> TestApp {
    test_app_with(3, MockBehavior::Succeed)
}

impl TestApp {
    /// Send a request, returning the status and the JSON body (Null when empty)
    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::POST, uri, body).await
    }

    /// Add URLs through the API and return their ids
    async fn add(&self, urls: &[&str]) -> Vec<ItemId> {
        let body: Vec<Value> = urls.iter().map(|u| json!({ "url": u })).collect();
        let (status, json) = self.post("/api/batch/add", Some(json!(body))).await;
        assert_eq!(status, StatusCode::CREATED, "add failed: {json}");
        serde_json::from_value(json["item_ids"].clone()).unwrap()
    }
}

/// Read SSE frames until one contains `needle`
async fn read_sse_until(body: Body, needle: &str) -> String {
    use tokio_stream::StreamExt;

    let mut stream = body.into_data_stream();
    let mut seen = String::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = stream.next().await {
            seen.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if seen.contains(needle) {
                return;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no SSE frame containing {needle:?}, saw {seen:?}"));
    seen
}

#[tokio::test]
async fn test_api_server_spawns() {
    let (downloader, _engine, _temp_dir) = create_downloader_with(1, MockBehavior::Succeed);

    // Port 0 = OS assigns a free port
    let mut config = (*downloader.get_config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let downloader = Arc::new(downloader);
        async move { start_api_server(downloader, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server should still be running");
    api_handle.abort();
}

#[tokio::test]
async fn test_router_builds_with_default_config() {
    let config = Config::default();
    assert!(config.server.api.swagger_ui);
    let temp_dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(MockEngine::new(
        temp_dir.path().to_path_buf(),
        MockBehavior::Succeed,
    ));
    let downloader = Arc::new(BatchDownloader::new(config.clone(), engine).unwrap());

    let app = create_router(downloader, Arc::new(config));

    for uri in ["/openapi.json", SWAGGER_OPENAPI_URL] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(doc["paths"]["/api/batch/queue"].is_object(), "{uri}");
    }
}

#[tokio::test]
async fn test_cors_enabled() {
    let t = test_app();

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (downloader, _engine, _temp_dir) = create_downloader_with(1, MockBehavior::Succeed);
    let mut config = (*downloader.get_config()).clone();
    config.server.api.cors_enabled = false;
    let app = create_router(Arc::new(downloader), Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[test]
fn test_cors_specific_origins() {
    // Builds without panicking even with an unparseable entry
    let _layer = build_cors_layer(&["http://localhost:3000".to_string(), "\n".to_string()]);
}
