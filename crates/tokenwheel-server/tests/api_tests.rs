//! End-to-end tests of the REST surface against a fixed-table model.

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use tokenwheel_core::config::WheelConfig;
use tokenwheel_infrastructure::oracle::fixed_model_config;
use tokenwheel_server::TokenWheelServer;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// ids: 0 " the", 1 " a", 2 " cat", 3 " dog", 4 " emu"
fn app() -> Router {
    let mut config = WheelConfig::default();
    config.models = vec![fixed_model_config(
        "toy",
        &[
            (" the", 0.5),
            (" a", 0.2),
            (" cat", 0.15),
            (" dog", 0.1),
            (" emu", 0.05),
        ],
    )];
    config.preload = vec![];
    config.sampling.seed = Some(42);
    TokenWheelServer::new(config).create_app()
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_with_prompt(app: &Router, prompt: &str) -> String {
    let (status, created) = send(app, Method::POST, "/api/sessions", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["session_id"].as_str().unwrap().to_string();

    let (status, _) = send(
        app,
        Method::POST,
        &format!("/api/sessions/{id}/set-prompt"),
        Some(json!({ "prompt": prompt })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    id
}

// ─────────────────────────────────────────────────────────────────────────────
// Service endpoints
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_root_and_models() {
    let app = app();

    let (status, root) = send(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(root["service"], "Token Wheel");

    let (status, models) = send(&app, Method::GET, "/api/models", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(models["models"][0]["id"], "toy");
    assert_eq!(models["models"][0]["default"], true);
}

#[tokio::test]
async fn test_ready_after_first_session() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");

    let (status, health) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["model_loaded"], false);

    send(&app, Method::POST, "/api/sessions", None).await;

    let (status, _) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
}

// ─────────────────────────────────────────────────────────────────────────────
// Session lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_session_without_body_uses_default() {
    let app = app();
    let (status, created) = send(&app, Method::POST, "/api/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["model_name"], "toy");
    assert!(created["created_at"].is_string());
}

#[tokio::test]
async fn test_create_session_unknown_model() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/sessions",
        Some(json!({ "model_name": "gpt5" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");
    assert!(body["message"].as_str().unwrap().contains("toy"));
}

#[tokio::test]
async fn test_full_round_trip() {
    let app = app();
    let id = create_with_prompt(&app, "Hello").await;

    let (status, append) = send(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/append-token"),
        Some(json!({ "token_text": " cat" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(append["previous_text"], "Hello");
    assert_eq!(append["current_text"], "Hello cat");
    assert_eq!(append["appended_token"]["token_id"], 2);
    assert_eq!(append["appended_token"]["category"], "above_threshold");

    let (status, state) = send(&app, Method::GET, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["initial_prompt"], "Hello");
    assert_eq!(state["generation_count"], 1);

    let (status, undo) = send(&app, Method::POST, &format!("/api/sessions/{id}/undo"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(undo["current_text"], "Hello");
    assert_eq!(undo["removed_token"]["token_text"], " cat");

    let (status, body) = send(&app, Method::POST, &format!("/api/sessions/{id}/undo"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "nothing_to_undo");

    let (status, deleted) = send(&app, Method::DELETE, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["session_id"], id.as_str());

    let (status, _) = send(&app, Method::GET, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_prompt_rejected() {
    let app = app();
    let (_, created) = send(&app, Method::POST, "/api/sessions", None).await;
    let id = created["session_id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/set-prompt"),
        Some(json!({ "prompt": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");
}

// ─────────────────────────────────────────────────────────────────────────────
// Probabilities and sampling
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_next_token_probs() {
    let app = app();
    let id = create_with_prompt(&app, "The").await;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/sessions/{id}/next-token-probs?threshold=0.12&other_top_k=1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let above: Vec<u64> = body["above_threshold_tokens"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["token_id"].as_u64().unwrap())
        .collect();
    assert_eq!(above, vec![0, 1, 2]);
    assert_eq!(body["other_category"]["token_count"], 2);
    assert_eq!(body["other_category"]["sample_tokens"][0]["token_text"], " dog");
    assert_eq!(body["vocabulary_size"], 5);
    assert_eq!(body["current_text"], "The");
}

#[tokio::test]
async fn test_next_token_probs_errors() {
    let app = app();

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/sessions/missing/next-token-probs",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, created) = send(&app, Method::POST, "/api/sessions", None).await;
    let id = created["session_id"].as_str().unwrap().to_string();
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/sessions/{id}/next-token-probs"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "prompt_not_set");

    let id = create_with_prompt(&app, "Hi").await;
    for query in ["threshold=2.0", "temperature=0", "threshold=abc"] {
        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/sessions/{id}/next-token-probs?{query}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query {query}: {body}");
    }
}

#[tokio::test]
async fn test_append_other_category() {
    let app = app();
    let id = create_with_prompt(&app, "Hello").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/append-token"),
        Some(json!({ "category": "other", "threshold": 0.12 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let token_id = body["appended_token"]["token_id"].as_u64().unwrap();
    assert!(token_id == 3 || token_id == 4);
    assert_eq!(body["appended_token"]["sampled_from_other"], true);
    assert_eq!(body["other_category_info"]["token_count"], 2);
    assert_eq!(
        body["other_category_info"]["selected_token_rank"],
        token_id + 1
    );
}

#[tokio::test]
async fn test_append_other_with_empty_bucket() {
    let app = app();
    let id = create_with_prompt(&app, "Hello").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/append-token"),
        Some(json!({ "category": "other", "threshold": 0.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no_tokens_in_category");
}

#[tokio::test]
async fn test_append_requires_token_reference() {
    let app = app();
    let id = create_with_prompt(&app, "Hello").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/append-token"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/append-token"),
        Some(json!({ "category": "purple" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}
