use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use genealogy_client::{build_backend, HttpTreeBackend, TreeRequest, TreeSourceClient};
use genealogy_core::{
    ApiConfig, ErrorKind, GenealogyConfig, MatrixTreeQuery, NodeId, PreferredSource, Source,
    SponsorTreeQuery, TreeBackend,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the fake server saw and how it should answer.
#[derive(Default)]
struct Upstream {
    matrix_hits: AtomicUsize,
    sponsor_hits: AtomicUsize,
    /// Number of leading matrix requests answered with 503.
    matrix_failures: AtomicUsize,
    matrix_status: Mutex<Option<(StatusCode, Value)>>,
    matrix_body: Mutex<Value>,
    sponsor_body: Mutex<Value>,
    last_query: Mutex<HashMap<String, String>>,
    last_auth: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

type Shared = Arc<Upstream>;

async fn matrix_tree(
    State(up): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    up.matrix_hits.fetch_add(1, Ordering::SeqCst);
    *up.last_query.lock() = params;
    *up.last_auth.lock() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let delay = *up.delay.lock();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let remaining = up.matrix_failures.load(Ordering::SeqCst);
    if remaining > 0 {
        up.matrix_failures.store(remaining - 1, Ordering::SeqCst);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "message": "upstream busy" })),
        );
    }

    let scripted = up.matrix_status.lock().clone();
    if let Some((status, body)) = scripted {
        return (status, Json(body));
    }
    (StatusCode::OK, Json(up.matrix_body.lock().clone()))
}

async fn sponsor_tree(
    State(up): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    up.sponsor_hits.fetch_add(1, Ordering::SeqCst);
    *up.last_query.lock() = params;
    (StatusCode::OK, Json(up.sponsor_body.lock().clone()))
}

async fn resolve_root(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    match params.get("identifier").map(String::as_str) {
        Some("9876543210") => (StatusCode::OK, Json(json!({ "id": 501 }))),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No member with that identifier" })),
        ),
    }
}

async fn default_root() -> impl IntoResponse {
    Json(json!({ "_id": "ROOT" }))
}

async fn spawn_upstream(up: Shared) -> String {
    let app = Router::new()
        .route("/api/genealogy/matrix-tree", get(matrix_tree))
        .route("/api/genealogy/sponsor-tree", get(sponsor_tree))
        .route("/api/genealogy/resolve-root", get(resolve_root))
        .route("/api/genealogy/default-root", get(default_root))
        .with_state(up);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn api_config(base_url: String) -> ApiConfig {
    ApiConfig {
        base_url,
        timeout_secs: 2,
        max_retries: 2,
        retry_backoff_ms: 10,
        ..Default::default()
    }
}

fn matrix_query(root: &str) -> MatrixTreeQuery {
    MatrixTreeQuery {
        root_node_id: Some(NodeId::from(root)),
        identifier: None,
        max_depth: 6,
        source: PreferredSource::Auto,
    }
}

fn sample_tree() -> Value {
    json!({
        "_id": 100,
        "userName": "alice",
        "fullName": "Alice Example",
        "children": [
            { "id": "101", "username": "bob", "children": null },
            { "username": "ghost" },
            { "nodeId": 102, "user_name": "carol" }
        ]
    })
}

#[tokio::test]
async fn matrix_tree_sends_params_and_normalizes_payload() {
    let up = Shared::default();
    *up.matrix_body.lock() = sample_tree();
    let mut config = api_config(spawn_upstream(up.clone()).await);
    config.api_token = Some("secret-token".to_string());
    let backend = HttpTreeBackend::new(config).unwrap();

    let tree = backend.matrix_tree(&matrix_query("100")).await.unwrap();

    assert_eq!(tree.id, NodeId::from("100"));
    assert_eq!(tree.full_name.as_deref(), Some("Alice Example"));
    let child_ids: Vec<&str> = tree.children.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(child_ids, vec!["101", "102"]);

    let query = up.last_query.lock().clone();
    assert_eq!(query.get("root_node_id").map(String::as_str), Some("100"));
    assert_eq!(query.get("max_depth").map(String::as_str), Some("6"));
    assert_eq!(query.get("source").map(String::as_str), Some("auto"));
    assert!(!query.contains_key("identifier"));
    assert_eq!(up.last_auth.lock().as_deref(), Some("Bearer secret-token"));
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let up = Shared::default();
    *up.matrix_body.lock() = sample_tree();
    up.matrix_failures.store(2, Ordering::SeqCst);
    let backend = HttpTreeBackend::new(api_config(spawn_upstream(up.clone()).await)).unwrap();

    let tree = backend.matrix_tree(&matrix_query("100")).await.unwrap();
    assert_eq!(tree.id, NodeId::from("100"));
    assert_eq!(up.matrix_hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_are_bounded() {
    let up = Shared::default();
    up.matrix_failures.store(10, Ordering::SeqCst);
    let backend = HttpTreeBackend::new(api_config(spawn_upstream(up.clone()).await)).unwrap();

    let err = backend.matrix_tree(&matrix_query("100")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FetchFailed);
    assert!(err.to_string().contains("upstream busy"));
    assert_eq!(up.matrix_hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn status_codes_map_to_error_kinds_without_retry() {
    let cases = [
        (StatusCode::FORBIDDEN, ErrorKind::Unauthorized),
        (StatusCode::UNAUTHORIZED, ErrorKind::Unauthorized),
        (StatusCode::NOT_FOUND, ErrorKind::NotFound),
        (StatusCode::BAD_REQUEST, ErrorKind::FetchFailed),
    ];

    for (status, kind) in cases {
        let up = Shared::default();
        *up.matrix_status.lock() = Some((status, json!({ "detail": "Root outside your downline" })));
        let backend = HttpTreeBackend::new(api_config(spawn_upstream(up.clone()).await)).unwrap();

        let err = backend.matrix_tree(&matrix_query("100")).await.unwrap_err();
        assert_eq!(err.kind(), kind, "status {}", status);
        assert!(err.to_string().contains("Root outside your downline"));
        assert_eq!(up.matrix_hits.load(Ordering::SeqCst), 1, "status {}", status);
    }
}

#[tokio::test]
async fn null_body_is_not_found() {
    let up = Shared::default();
    *up.sponsor_body.lock() = Value::Null;
    let backend = HttpTreeBackend::new(api_config(spawn_upstream(up.clone()).await)).unwrap();

    let err = backend
        .sponsor_tree(&SponsorTreeQuery {
            root_node_id: None,
            max_depth: 6,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!up.last_query.lock().contains_key("root_node_id"));
}

#[tokio::test]
async fn timeouts_surface_as_fetch_failures() {
    let up = Shared::default();
    *up.matrix_body.lock() = sample_tree();
    *up.delay.lock() = Some(Duration::from_millis(1500));
    let mut config = api_config(spawn_upstream(up.clone()).await);
    config.timeout_secs = 1;
    config.max_retries = 0;
    let backend = HttpTreeBackend::new(config).unwrap();

    let err = backend.matrix_tree(&matrix_query("100")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FetchFailed);
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn timeout_bounds_the_whole_retry_sequence() {
    let up = Shared::default();
    up.matrix_failures.store(10, Ordering::SeqCst);
    *up.delay.lock() = Some(Duration::from_millis(700));
    let mut config = api_config(spawn_upstream(up.clone()).await);
    config.timeout_secs = 1;
    config.max_retries = 2;
    let backend = HttpTreeBackend::new(config).unwrap();

    let started = std::time::Instant::now();
    let err = backend.matrix_tree(&matrix_query("100")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FetchFailed);
    assert!(err.to_string().contains("timed out"));
    assert!(started.elapsed() < Duration::from_millis(1800));
    assert!(up.matrix_hits.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn root_resolution_endpoints() {
    let up = Shared::default();
    let backend = HttpTreeBackend::new(api_config(spawn_upstream(up).await)).unwrap();

    assert_eq!(
        backend.resolve_root("9876543210").await.unwrap(),
        NodeId::from("501")
    );
    let err = backend.resolve_root("nobody").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("No member with that identifier"));

    assert_eq!(
        backend.default_admin_root().await.unwrap(),
        NodeId::from("ROOT")
    );
}

#[tokio::test]
async fn default_backend_memoizes_identical_requests() {
    let up = Shared::default();
    *up.matrix_body.lock() = sample_tree();
    let mut config = GenealogyConfig::default();
    config.api = api_config(spawn_upstream(up.clone()).await);
    let backend = build_backend(&config).unwrap();

    backend.matrix_tree(&matrix_query("100")).await.unwrap();
    backend.matrix_tree(&matrix_query("100")).await.unwrap();
    assert_eq!(up.matrix_hits.load(Ordering::SeqCst), 1);

    backend.matrix_tree(&matrix_query("101")).await.unwrap();
    assert_eq!(up.matrix_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn search_falls_back_to_sponsor_over_http() {
    let up = Shared::default();
    *up.matrix_body.lock() = json!({ "id": 501, "username": "dana", "children": [] });
    *up.sponsor_body.lock() = json!({
        "id": 501,
        "username": "dana",
        "children": [{ "id": 600, "username": "eve" }]
    });
    let backend = HttpTreeBackend::new(api_config(spawn_upstream(up.clone()).await)).unwrap();
    let client = TreeSourceClient::new(backend);

    let result = client
        .fetch_tree(&TreeRequest::admin_search(
            "9876543210",
            6,
            PreferredSource::Auto,
        ))
        .await
        .unwrap();

    assert_eq!(result.source, Source::Sponsor);
    assert_eq!(result.root.children.len(), 1);
    assert_eq!(up.sponsor_hits.load(Ordering::SeqCst), 1);
    let query = up.last_query.lock().clone();
    assert_eq!(query.get("root_node_id").map(String::as_str), Some("501"));
}
