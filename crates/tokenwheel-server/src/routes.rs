//! REST handlers.

use crate::error::{ApiError, ApiJson, ApiQuery};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokenwheel_application::TokenWheelUseCase;
use tokenwheel_application::dto::{
    AppendTokenRequest, CreateSessionRequest, NextTokenQuery, SetPromptRequest,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub usecase: Arc<TokenWheelUseCase>,
}

type ApiResult<T> = Result<T, ApiError>;

/// Every route, without middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/api/models", get(models_handler))
        .route("/api/sessions", post(create_session_handler))
        .route(
            "/api/sessions/{session_id}",
            get(session_state_handler).delete(delete_session_handler),
        )
        .route("/api/sessions/{session_id}/set-prompt", post(set_prompt_handler))
        .route(
            "/api/sessions/{session_id}/next-token-probs",
            get(next_token_probs_handler),
        )
        .route(
            "/api/sessions/{session_id}/append-token",
            post(append_token_handler),
        )
        .route("/api/sessions/{session_id}/undo", post(undo_handler))
        .with_state(state)
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "Token Wheel",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Interactive next-token probability explorer",
    }))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.usecase.health().await)
}

async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.usecase.is_ready().await {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready" })),
        )
    }
}

async fn models_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.usecase.list_models())
}

/// The body is optional; an empty one selects the default model.
async fn create_session_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: CreateSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let response = state.usecase.create_session(request.model_name).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn session_state_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.usecase.get_state(&session_id).await?))
}

async fn set_prompt_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ApiJson(request): ApiJson<SetPromptRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state.usecase.set_prompt(&session_id, request.prompt).await?,
    ))
}

async fn next_token_probs_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ApiQuery(query): ApiQuery<NextTokenQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state.usecase.next_token_probs(&session_id, query).await?,
    ))
}

async fn append_token_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ApiJson(request): ApiJson<AppendTokenRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state.usecase.append_token(&session_id, request).await?,
    ))
}

async fn undo_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.usecase.undo(&session_id).await?))
}

async fn delete_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.usecase.delete_session(&session_id).await?))
}
