// src/server.rs
// HTTP relay between chat clients and the upstream completions API.
//
// Endpoints:
// - GET  /api/status         - health check
// - POST /api/chat           - persona-prompted SSE relay
// - GET  /api/conversations  - conversations for a user, newest first
// - GET  /api/messages       - ordered history for a conversation
//
// The relay selects the persona system prompt server-side from the
// request's assistant_type (unknown values fall back to oracle), forwards
// the conversation to the upstream API with stream enabled, and passes the
// SSE body through untouched. Upstream 429/402 are surfaced with fixed,
// user-renderable error bodies.

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::gateway::WireMessage;
use crate::persona::Assistant;
use crate::session::{ChatMessage, ChatStore, Conversation};

/// Model requested from the upstream completions API.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

#[derive(Clone)]
pub struct AppState {
    pub store: ChatStore,
    pub http: reqwest::Client,
    pub upstream_url: String,
    pub upstream_api_key: String,
    pub model: String,
}

/// Chat relay request: full message history plus the persona selector.
#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub assistant_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConversationsQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub conversation_id: String,
}

/// Create the router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/conversations", get(conversations_handler))
        .route("/api/messages", get(messages_handler))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server until shutdown.
pub async fn run(host: &str, port: u16, state: AppState) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("relay listening on http://{}:{}", host, port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn status_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<RelayRequest>,
) -> Response {
    let assistant = request
        .assistant_type
        .as_deref()
        .map(Assistant::from_id_or_default)
        .unwrap_or_default();

    info!(
        assistant = assistant.id(),
        messages = request.messages.len(),
        "chat relay request"
    );

    let mut messages = vec![WireMessage::new("system", assistant.prompt())];
    messages.extend(request.messages);

    let body = json!({
        "model": state.model,
        "messages": messages,
        "stream": true,
    });

    let upstream = state
        .http
        .post(&state.upstream_url)
        .bearer_auth(&state.upstream_api_key)
        .header(header::ACCEPT, "text/event-stream")
        .json(&body)
        .send()
        .await;

    let response = match upstream {
        Ok(response) => response,
        Err(e) => {
            error!("upstream request failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "AI gateway error" })),
            )
                .into_response();
        }
    };

    match response.status().as_u16() {
        429 => {
            error!("upstream rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Rate limits exceeded, please try again later." })),
            )
                .into_response()
        }
        402 => {
            error!("upstream payment required");
            (
                StatusCode::PAYMENT_REQUIRED,
                Json(json!({ "error": "Payment required, please add funds to your workspace." })),
            )
                .into_response()
        }
        code if !response.status().is_success() => {
            let text = response.text().await.unwrap_or_else(|_| "<no body>".into());
            error!("upstream error {}: {}", code, text);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "AI gateway error" })),
            )
                .into_response()
        }
        _ => {
            // Stream the SSE body through unchanged.
            (
                [(header::CONTENT_TYPE, "text/event-stream")],
                Body::from_stream(response.bytes_stream()),
            )
                .into_response()
        }
    }
}

async fn conversations_handler(
    State(state): State<AppState>,
    Query(params): Query<ConversationsQuery>,
) -> Result<Json<Vec<Conversation>>, (StatusCode, String)> {
    let conversations = state
        .store
        .list_conversations(&params.user_id)
        .await
        .map_err(internal_error)?;
    Ok(Json(conversations))
}

async fn messages_handler(
    State(state): State<AppState>,
    Query(params): Query<MessagesQuery>,
) -> Result<Json<Vec<ChatMessage>>, (StatusCode, String)> {
    let messages = state
        .store
        .list_messages(&params.conversation_id)
        .await
        .map_err(internal_error)?;
    Ok(Json(messages))
}

fn internal_error(e: crate::error::ChatError) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
