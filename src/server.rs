//! HTTP proxy exposing an [`InferenceBackend`] behind JSON routes.
//!
//! Routes:
//! - `GET  /health`            liveness of the proxy itself
//! - `GET  /api/ia/health`     reachability of the inference server
//! - `GET  /api/models`        installed models
//! - `POST /api/chat`          single message
//! - `POST /api/chat-context`  whole conversation
//! - `POST /api/generate`      prompt with optional system context and sampling

use crate::backend::InferenceBackend;
use crate::error::FailureKind;
use crate::models::{ConversationTurn, GenerationOptions, Role};
use crate::prompt::with_system_context;
use crate::types::{Generation, GenerationResult};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    backend: Arc<dyn InferenceBackend>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    #[serde(default)]
    message: Option<String>,
    model: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatContextBody {
    #[serde(default)]
    messages: Vec<TurnBody>,
    model: Option<String>,
}

/// Anything other than `user` is spoken by the assistant.
#[derive(Debug, Deserialize)]
struct TurnBody {
    role: String,
    content: String,
}

impl From<TurnBody> for ConversationTurn {
    fn from(turn: TurnBody) -> Self {
        let role = if turn.role.eq_ignore_ascii_case("user") {
            Role::User
        } else {
            Role::Assistant
        };
        ConversationTurn::new(role, turn.content)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
    #[serde(default)]
    prompt: Option<String>,
    system_context: Option<String>,
    model: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    stop_sequences: Option<Vec<String>>,
}

pub fn router(backend: Arc<dyn InferenceBackend>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/ia/health", get(inference_health))
        .route("/api/models", get(models))
        .route("/api/chat", post(chat))
        .route("/api/chat-context", post(chat_context))
        .route("/api/generate", post(generate))
        .layer(cors)
        .with_state(AppState { backend })
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(backend: Arc<dyn InferenceBackend>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        addr = %listener.local_addr()?,
        upstream = backend.base_url(),
        model = backend.default_model(),
        "proxy listening"
    );
    axum::serve(listener, router(backend)).await
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn inference_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let backend = &state.backend;
    match backend.list_models().await {
        Ok(models) => Json(json!({
            "status": "ok",
            "connected": true,
            "url": backend.base_url(),
            "model": backend.default_model(),
            "models": models,
        })),
        Err(e) => Json(json!({
            "status": "warning",
            "connected": false,
            "url": backend.base_url(),
            "model": backend.default_model(),
            "error": e.to_string(),
        })),
    }
}

async fn models(State(state): State<AppState>) -> Response {
    match state.backend.list_models().await {
        Ok(models) => {
            let count = models.len();
            Json(json!({ "models": models, "count": count })).into_response()
        }
        Err(e) => {
            error!(error = %e, "listing models failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to list models", "details": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => return rejected(rejection),
    };
    let message = match body.message.filter(|m| !m.trim().is_empty()) {
        Some(message) => message,
        None => return bad_request("message is required"),
    };
    let options = GenerationOptions {
        model: body.model,
        temperature: body.temperature,
        max_tokens: body.max_tokens,
        ..GenerationOptions::default()
    };
    let result = state.backend.generate(&message, &options).await;
    reply(result)
}

async fn chat_context(
    State(state): State<AppState>,
    body: Result<Json<ChatContextBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => return rejected(rejection),
    };
    if body.messages.is_empty() {
        return bad_request("messages must be a non-empty array");
    }
    let turns: Vec<ConversationTurn> = body.messages.into_iter().map(Into::into).collect();
    let result = state.backend.chat(&turns, body.model.as_deref()).await;
    reply(result)
}

async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => return rejected(rejection),
    };
    let prompt = match body.prompt.filter(|p| !p.trim().is_empty()) {
        Some(prompt) => prompt,
        None => return bad_request("prompt is required"),
    };
    let full_prompt = with_system_context(body.system_context.as_deref(), &prompt);
    let options = GenerationOptions {
        model: body.model,
        temperature: body.temperature,
        max_tokens: body.max_tokens,
        top_p: None,
        stop_sequences: body.stop_sequences,
    };
    match state.backend.generate(&full_prompt, &options).await {
        GenerationResult::Success(Generation {
            text,
            token_count,
            duration_ms,
            model_used,
        }) => Json(json!({
            "text": text,
            "tokens": token_count,
            "duration_ms": duration_ms,
            "model": model_used,
        }))
        .into_response(),
        GenerationResult::Failure(failure) => failure_response(failure.kind, &failure.message),
    }
}

fn reply(result: GenerationResult) -> Response {
    match result {
        GenerationResult::Success(generation) => Json(json!({
            "reply": generation.text,
            "metadata": {
                "tokens": generation.token_count,
                "duration_ms": generation.duration_ms,
                "model": generation.model_used,
            }
        }))
        .into_response(),
        GenerationResult::Failure(failure) => failure_response(failure.kind, &failure.message),
    }
}

fn failure_response(kind: FailureKind, message: &str) -> Response {
    let status = if kind == FailureKind::InvalidRequest {
        StatusCode::BAD_REQUEST
    } else {
        error!(%kind, error = message, "generation failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(json!({ "error": "generation failed", "details": message })),
    )
        .into_response()
}

fn rejected(rejection: JsonRejection) -> Response {
    bad_request(&rejection.body_text())
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
