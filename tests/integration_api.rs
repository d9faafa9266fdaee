use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use kbrank::api::{create_router, AppState};
use kbrank::storage::SledStorage;
use kbrank::Config;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app(storage: SledStorage) -> Router {
    create_router(Arc::new(AppState::new(storage, Config::default())))
}

async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn knowledge_base() -> Value {
    json!([
        {"text": "Lysandra was born under the emerald canopy of the Whispering Woods.", "key": "lysandra"},
        "Seraphel graces the cosmic stage where stars waltz and galaxies serenade.",
        {"text": "Brevin carries a bag bursting with peculiar gadgets."},
        {"text": "Car engines have evolved. Diesel engines rely on compression.", "key": "engines"}
    ])
}

#[tokio::test]
async fn index_then_question_returns_ranked_context() {
    let storage = SledStorage::in_memory().unwrap();

    let (status, body) = call(app(storage.clone()), "POST", "/index_and_train", Some(knowledge_base())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["indexed"], 4);
    assert_eq!(body["data"]["total_documents"], 4);
    assert_eq!(body["data"]["previous_state"], "absent");

    let (status, body) = call(
        app(storage.clone()),
        "POST",
        "/question",
        Some(json!({"question": "who is lysandra", "k": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body["data"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["index"], 0);
    assert_eq!(results[0]["key"], "lysandra");
    let context = body["data"]["context"].as_str().unwrap();
    assert!(context.starts_with("Lysandra was born"));
}

#[tokio::test]
async fn indexing_appends_across_requests() {
    let storage = SledStorage::in_memory().unwrap();
    call(app(storage.clone()), "POST", "/index_and_train", Some(knowledge_base())).await;

    let (status, body) = call(
        app(storage.clone()),
        "POST",
        "/index_and_train",
        Some(json!(["Electric engines use batteries."])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_documents"], 5);
    assert_eq!(body["data"]["previous_state"], "restored");

    let (status, body) = call(app(storage), "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_documents"], 5);
    assert_eq!(body["data"]["state"], "restored");
}

#[tokio::test]
async fn question_defaults_to_configured_top_k() {
    let storage = SledStorage::in_memory().unwrap();
    let docs: Vec<String> = (0..8).map(|i| format!("engine note number {}", i)).collect();
    call(app(storage.clone()), "POST", "/index_and_train", Some(json!(docs))).await;

    let (status, body) = call(app(storage), "POST", "/question", Some(json!({"question": "engine"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["results"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let storage = SledStorage::in_memory().unwrap();

    let (status, body) = call(app(storage.clone()), "POST", "/index_and_train", Some(json!({"text": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = call(app(storage.clone()), "POST", "/index_and_train", Some(json!(["ok", ""]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(app(storage.clone()), "POST", "/question", Some(json!({"question": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(app(storage.clone()), "POST", "/question", Some(json!({"question": 42}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // nothing was persisted by the rejected batch
    let (_, body) = call(app(storage), "GET", "/stats", None).await;
    assert_eq!(body["data"]["total_documents"], 0);
}

#[tokio::test]
async fn question_on_empty_store_returns_no_results() {
    let storage = SledStorage::in_memory().unwrap();
    let (status, body) = call(app(storage), "POST", "/question", Some(json!({"question": "anything"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["results"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["context"], "");
}

#[tokio::test]
async fn corrupt_snapshot_recovers_empty() {
    use kbrank::SnapshotStore;

    let storage = SledStorage::in_memory().unwrap();
    storage.save(b"definitely not a snapshot").unwrap();

    let (status, body) = call(app(storage.clone()), "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "corrupt");
    assert_eq!(body["data"]["total_documents"], 0);

    let (status, body) = call(app(storage), "POST", "/index_and_train", Some(json!(["fresh start"]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_documents"], 1);
    assert_eq!(body["data"]["previous_state"], "corrupt");
}

#[tokio::test]
async fn health_reports_crate_version() {
    let (status, body) = call(app(SledStorage::in_memory().unwrap()), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "OK");
    assert_eq!(body["data"]["version"], kbrank::VERSION);
}
