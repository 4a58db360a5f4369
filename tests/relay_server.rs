// tests/relay_server.rs
// Relay behavior: persona prompt injection, SSE passthrough, error mapping,
// and the history API.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::mpsc;

use skybeam_chat::gateway::GatewayClient;
use skybeam_chat::persona::Assistant;
use skybeam_chat::server::{create_router, AppState, DEFAULT_MODEL};
use skybeam_chat::session::{ChatStore, SessionManager};

const HELLO_STREAM: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
    "\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
    "\n",
    "data: [DONE]\n",
    "\n",
);

type CapturedRequests = Arc<Mutex<Vec<Value>>>;

async fn test_store() -> ChatStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    ChatStore::with_pool(pool).await.unwrap()
}

async fn serve_ephemeral(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Fake upstream completions API: records request bodies, streams a canned
/// SSE response.
async fn spawn_upstream() -> (String, CapturedRequests) {
    let captured: CapturedRequests = Arc::new(Mutex::new(Vec::new()));

    async fn handler(
        State(captured): State<CapturedRequests>,
        axum::Json(body): axum::Json<Value>,
    ) -> impl IntoResponse {
        captured.lock().unwrap().push(body);
        ([(header::CONTENT_TYPE, "text/event-stream")], HELLO_STREAM)
    }

    let app = Router::new()
        .route("/v1/chat/completions", post(handler))
        .with_state(captured.clone());
    let base = serve_ephemeral(app).await;
    (format!("{}/v1/chat/completions", base), captured)
}

/// Fake upstream that always answers with a fixed status.
async fn spawn_failing_upstream(status: u16) -> String {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || async move { StatusCode::from_u16(status).unwrap() }),
    );
    let base = serve_ephemeral(app).await;
    format!("{}/v1/chat/completions", base)
}

async fn spawn_relay(upstream_url: String, store: ChatStore) -> String {
    let state = AppState {
        store,
        http: reqwest::Client::new(),
        upstream_url,
        upstream_api_key: "test-key".into(),
        model: DEFAULT_MODEL.into(),
    };
    serve_ephemeral(create_router(state)).await
}

#[tokio::test]
async fn test_relay_injects_persona_prompt_and_streams() {
    let (upstream_url, captured) = spawn_upstream().await;
    let relay = spawn_relay(upstream_url, test_store().await).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat", relay))
        .json(&json!({
            "messages": [{ "role": "user", "content": "launch captions?" }],
            "assistant_type": "muse",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    assert_eq!(response.text().await.unwrap(), HELLO_STREAM);

    // The persona prompt was selected server-side and prepended.
    let requests = captured.lock().unwrap();
    let body = &requests[0];
    assert_eq!(body["model"], DEFAULT_MODEL);
    assert_eq!(body["stream"], true);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], Assistant::Muse.prompt());
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "launch captions?");
}

#[tokio::test]
async fn test_unknown_assistant_falls_back_to_oracle() {
    let (upstream_url, captured) = spawn_upstream().await;
    let relay = spawn_relay(upstream_url, test_store().await).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat", relay))
        .json(&json!({
            "messages": [{ "role": "user", "content": "hi" }],
            "assistant_type": "nebula",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let requests = captured.lock().unwrap();
    assert_eq!(
        requests[0]["messages"][0]["content"],
        Assistant::Oracle.prompt()
    );
}

#[tokio::test]
async fn test_upstream_rate_limit_maps_to_fixed_429_body() {
    let upstream_url = spawn_failing_upstream(429).await;
    let relay = spawn_relay(upstream_url, test_store().await).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat", relay))
        .json(&json!({ "messages": [], "assistant_type": "oracle" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 429);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Rate limits exceeded, please try again later."
    );
}

#[tokio::test]
async fn test_upstream_quota_failure_maps_to_fixed_402_body() {
    let upstream_url = spawn_failing_upstream(402).await;
    let relay = spawn_relay(upstream_url, test_store().await).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat", relay))
        .json(&json!({ "messages": [], "assistant_type": "oracle" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 402);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Payment required, please add funds to your workspace."
    );
}

#[tokio::test]
async fn test_history_endpoints() {
    let (upstream_url, _captured) = spawn_upstream().await;
    let store = test_store().await;
    let relay = spawn_relay(upstream_url, store.clone()).await;
    let client = reqwest::Client::new();

    let status: Value = client
        .get(format!("{}/api/status", relay))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "ok");

    let conversation = store
        .create_conversation("user-1", Assistant::Aether, "API review")
        .await
        .unwrap();
    store
        .insert_message(&conversation.id, "user", "review this endpoint")
        .await
        .unwrap();
    store
        .insert_message(&conversation.id, "assistant", "looks reasonable")
        .await
        .unwrap();

    let conversations: Value = client
        .get(format!("{}/api/conversations?user_id=user-1", relay))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(conversations[0]["title"], "API review");
    assert_eq!(conversations[0]["assistant_type"], "aether");

    let messages: Value = client
        .get(format!(
            "{}/api/messages?conversation_id={}",
            relay, conversation.id
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "looks reasonable");
}

#[tokio::test]
async fn test_end_to_end_turn_through_relay() {
    let (upstream_url, _captured) = spawn_upstream().await;
    let store = test_store().await;
    let relay = spawn_relay(upstream_url, store.clone()).await;

    let gateway = GatewayClient::new(format!("{}/api/chat", relay), None);
    let mut manager = SessionManager::new(store.clone(), gateway, Assistant::Ascend, "user-1");

    let (tx, _rx) = mpsc::channel(100);
    let cancelled = AtomicBool::new(false);
    let settled = manager
        .send("analyze this lead", &tx, &cancelled)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(settled.content, "Hello");

    let conversation = manager.conversation().unwrap();
    let messages = store.list_messages(&conversation.id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "Hello");
}
