// src/session/mod.rs
// Conversation session management.
//
// Owns the turn state machine: a conversation record is created lazily on
// the first send, the user message is persisted before streaming begins,
// deltas live-update the caller through TurnEvents, and the assembled
// assistant message is persisted only once the stream settles. One turn
// may be in flight per conversation at a time.

mod store;
mod types;

pub use store::ChatStore;
pub use types::{
    ChatMessage, Conversation, TurnEvent, TurnState, ROLE_ASSISTANT, ROLE_USER,
};

use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{ChatError, Result};
use crate::gateway::{GatewayClient, GatewayRequest, WireMessage};
use crate::persona::Assistant;
use crate::stream::StreamDecoder;

/// Conversation titles are derived from the first user message.
const TITLE_MAX_CHARS: usize = 64;

/// Drives chat turns for one user against one assistant persona.
///
/// No global state: the manager owns its store and gateway handles and is
/// threaded explicitly to whoever runs turns (REPL, server, tests).
pub struct SessionManager {
    store: ChatStore,
    gateway: GatewayClient,
    assistant: Assistant,
    user_id: String,
    conversation: Option<Conversation>,
    state: TurnState,
}

impl SessionManager {
    pub fn new(
        store: ChatStore,
        gateway: GatewayClient,
        assistant: Assistant,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            assistant,
            user_id: user_id.into(),
            conversation: None,
            state: TurnState::Idle,
        }
    }

    /// Attach to an existing conversation instead of creating one lazily.
    pub fn resume(
        store: ChatStore,
        gateway: GatewayClient,
        conversation: Conversation,
        user_id: impl Into<String>,
    ) -> Self {
        let assistant = conversation.assistant_type;
        Self {
            store,
            gateway,
            assistant,
            user_id: user_id.into(),
            conversation: Some(conversation),
            state: TurnState::Active,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn assistant(&self) -> Assistant {
        self.assistant
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    /// Switch personas. Drops the active conversation; a fresh one is
    /// created on the next send. Any previous in-flight placeholder is the
    /// caller's to discard.
    pub fn switch_assistant(&mut self, assistant: Assistant) {
        if self.assistant == assistant {
            return;
        }
        debug!(from = self.assistant.id(), to = assistant.id(), "switching assistant");
        self.assistant = assistant;
        self.conversation = None;
        self.state = TurnState::Idle;
    }

    /// Durable message history for the active conversation, oldest first.
    pub async fn history(&self) -> Result<Vec<ChatMessage>> {
        match &self.conversation {
            Some(conversation) => self.store.list_messages(&conversation.id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Run one turn: persist the user message, stream the assistant
    /// response, persist the settled message.
    ///
    /// Deltas and lifecycle notifications are delivered through `tx`;
    /// `cancelled` is polled between chunks so the caller can abandon the
    /// stream (nothing partial is persisted). Returns the settled assistant
    /// message, or None when the stream produced no content.
    pub async fn send(
        &mut self,
        content: &str,
        tx: &mpsc::Sender<TurnEvent>,
        cancelled: &AtomicBool,
    ) -> Result<Option<ChatMessage>> {
        if self.state == TurnState::Streaming {
            return Err(ChatError::TurnInFlight);
        }

        let conversation = self.ensure_conversation(content, tx).await?;

        // Persist the user message before anything streams. On failure the
        // turn aborts; the conversation id stays valid for a resubmit.
        if let Err(e) = self
            .store
            .insert_message(&conversation.id, ROLE_USER, content)
            .await
        {
            self.reconcile(&conversation.id, tx).await;
            return Err(e);
        }

        // Full history (including the message just written) goes to the
        // gateway so the model sees the whole conversation.
        let history = self.store.list_messages(&conversation.id).await?;
        let request = GatewayRequest {
            messages: history
                .iter()
                .map(|m| WireMessage::new(m.role.clone(), m.content.clone()))
                .collect(),
            assistant_type: self.assistant,
        };

        self.state = TurnState::Streaming;
        let response = match self.gateway.open_stream(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.state = TurnState::Active;
                return Err(e);
            }
        };

        let mut decoder = StreamDecoder::new();
        let mut byte_stream = response.bytes_stream();

        while let Some(chunk) = byte_stream.next().await {
            if cancelled.load(Ordering::SeqCst) {
                debug!("turn cancelled mid-stream, discarding placeholder");
                self.state = TurnState::Active;
                return Err(ChatError::Cancelled);
            }
            match chunk {
                Ok(bytes) => {
                    for fragment in decoder.feed(bytes.as_ref()) {
                        let _ = tx
                            .send(TurnEvent::TextDelta { delta: fragment })
                            .await;
                    }
                }
                Err(e) => {
                    // Mid-stream transport failure: abandon the placeholder,
                    // keep the conversation usable for a retry.
                    self.state = TurnState::Active;
                    return Err(ChatError::Transport(e));
                }
            }
        }

        let decoded = decoder.finish();
        if !decoded.saw_done {
            debug!("stream closed without [DONE] sentinel, settling anyway");
        }

        // Empty streams settle without persisting an assistant row.
        if decoded.text.is_empty() {
            info!(conversation = %conversation.id, "stream settled with no content");
            self.state = TurnState::Active;
            let _ = tx.send(TurnEvent::Done { message: None }).await;
            return Ok(None);
        }

        let message = match self
            .store
            .insert_message(&conversation.id, ROLE_ASSISTANT, &decoded.text)
            .await
        {
            Ok(message) => message,
            Err(e) => {
                warn!("failed to persist assistant message: {}", e);
                self.reconcile(&conversation.id, tx).await;
                self.state = TurnState::Active;
                return Err(e);
            }
        };

        self.state = TurnState::Settled;
        info!(
            conversation = %conversation.id,
            chars = message.content.len(),
            skipped = decoded.frames_skipped,
            "turn settled"
        );

        let _ = tx
            .send(TurnEvent::Done {
                message: Some(message.clone()),
            })
            .await;
        self.state = TurnState::Active;
        Ok(Some(message))
    }

    /// Make sure a conversation record exists before the first message is
    /// persisted. A failed create leaves the manager Idle so the user can
    /// simply resubmit.
    async fn ensure_conversation(
        &mut self,
        first_message: &str,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> Result<Conversation> {
        if let Some(conversation) = &self.conversation {
            return Ok(conversation.clone());
        }

        self.state = TurnState::Creating;
        let title = derive_title(first_message);
        match self
            .store
            .create_conversation(&self.user_id, self.assistant, &title)
            .await
        {
            Ok(conversation) => {
                debug!(id = %conversation.id, title = %conversation.title, "conversation created");
                self.state = TurnState::Active;
                self.conversation = Some(conversation.clone());
                let _ = tx
                    .send(TurnEvent::ConversationCreated {
                        conversation: conversation.clone(),
                    })
                    .await;
                Ok(conversation)
            }
            Err(e) => {
                self.state = TurnState::Idle;
                Err(e)
            }
        }
    }

    /// Re-read durable history after a persistence failure so the caller
    /// can re-render from storage instead of silently diverging.
    async fn reconcile(&self, conversation_id: &str, tx: &mpsc::Sender<TurnEvent>) {
        match self.store.list_messages(conversation_id).await {
            Ok(messages) => {
                let _ = tx.send(TurnEvent::Reconciled { messages }).await;
            }
            Err(e) => warn!("reconciliation read failed: {}", e),
        }
    }
}

fn derive_title(first_message: &str) -> String {
    let first_line = first_message.lines().next().unwrap_or("").trim();
    let title: String = first_line.chars().take(TITLE_MAX_CHARS).collect();
    if title.is_empty() {
        "New conversation".to_string()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> ChatStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        ChatStore::with_pool(pool).await.unwrap()
    }

    fn unreachable_gateway() -> GatewayClient {
        GatewayClient::new("http://127.0.0.1:1/api/chat", None)
    }

    #[tokio::test]
    async fn test_send_rejected_while_streaming() {
        let store = test_store().await;
        let mut manager =
            SessionManager::new(store, unreachable_gateway(), Assistant::Oracle, "u1");
        manager.state = TurnState::Streaming;

        let (tx, _rx) = mpsc::channel(8);
        let cancelled = AtomicBool::new(false);
        let err = manager.send("hello", &tx, &cancelled).await.unwrap_err();
        assert!(matches!(err, ChatError::TurnInFlight));
    }

    #[tokio::test]
    async fn test_failed_gateway_leaves_conversation_retryable() {
        let store = test_store().await;
        let mut manager =
            SessionManager::new(store.clone(), unreachable_gateway(), Assistant::Muse, "u1");

        let (tx, mut rx) = mpsc::channel(8);
        let cancelled = AtomicBool::new(false);
        let err = manager.send("draft a caption", &tx, &cancelled).await;
        assert!(err.is_err());

        // Conversation was created and the user message persisted before
        // the transport failed; state is Active, ready for a retry.
        assert_eq!(manager.state(), TurnState::Active);
        let conversation = manager.conversation().unwrap().clone();
        let messages = store.list_messages(&conversation.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, ROLE_USER);

        // First event announced the conversation.
        match rx.recv().await.unwrap() {
            TurnEvent::ConversationCreated { conversation: c } => {
                assert_eq!(c.id, conversation.id);
            }
            other => panic!("expected ConversationCreated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_switch_assistant_resets_conversation() {
        let store = test_store().await;
        let mut manager =
            SessionManager::new(store, unreachable_gateway(), Assistant::Oracle, "u1");
        manager.conversation = Some(Conversation {
            id: "c1".into(),
            user_id: "u1".into(),
            assistant_type: Assistant::Oracle,
            title: "t".into(),
            created_at: 0,
        });
        manager.state = TurnState::Active;

        manager.switch_assistant(Assistant::Ascend);
        assert!(manager.conversation().is_none());
        assert_eq!(manager.state(), TurnState::Idle);

        // Switching to the current persona is a no-op.
        let mut manager2 = SessionManager::resume(
            test_store().await,
            unreachable_gateway(),
            Conversation {
                id: "c2".into(),
                user_id: "u1".into(),
                assistant_type: Assistant::Ascend,
                title: "t".into(),
                created_at: 0,
            },
            "u1",
        );
        manager2.switch_assistant(Assistant::Ascend);
        assert!(manager2.conversation().is_some());
    }

    #[test]
    fn test_derive_title_truncates_on_char_boundary() {
        let long = "é".repeat(200);
        let title = derive_title(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);

        assert_eq!(derive_title("  Analyze our Q4 performance  "), "Analyze our Q4 performance");
        assert_eq!(derive_title("\n\n"), "New conversation");
        assert_eq!(derive_title("line one\nline two"), "line one");
    }
}
