// src/gateway.rs
// HTTP client for the inference gateway.
//
// The gateway takes the full message history plus an assistant_type and
// answers with a chunked SSE stream of chat-completion deltas. Non-2xx
// responses carry a JSON body { "error": ... }; 429 and 402 are mapped to
// their own error kinds so callers can render them distinctly.

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChatError, Result};
use crate::persona::Assistant;

/// One message on the wire, role plus content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Request body for the gateway's chat endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct GatewayRequest {
    pub messages: Vec<WireMessage>,
    pub assistant_type: Assistant,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: Option<String>,
}

/// Client for the streaming chat endpoint.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST the request and hand back the response once the status has been
    /// vetted. The caller consumes `bytes_stream()` through a StreamDecoder.
    pub async fn open_stream(&self, request: &GatewayRequest) -> Result<reqwest::Response> {
        debug!(
            assistant = request.assistant_type.id(),
            messages = request.messages.len(),
            "opening gateway stream"
        );

        let mut req = self
            .http
            .post(&self.base_url)
            .header(header::ACCEPT, "text/event-stream")
            .json(request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Error bodies are JSON { "error": ... } but fall back to raw text
        // for anything the gateway didn't author.
        let body = response.text().await.unwrap_or_else(|_| "<no body>".into());
        let message = serde_json::from_str::<GatewayErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .unwrap_or(body);

        Err(match status.as_u16() {
            429 => ChatError::RateLimited(message),
            402 => ChatError::QuotaExceeded(message),
            code => ChatError::Gateway {
                status: code,
                message,
            },
        })
    }
}
