// src/session/store.rs
// SQLite persistence sink for conversations and messages.
//
// Insert-and-return-row semantics for writes, timestamp-ordered selects
// for history. No update/delete beyond conversation retitling.

use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::error::Result;
use crate::persona::Assistant;
use crate::session::types::{ChatMessage, Conversation};

#[derive(Clone)]
pub struct ChatStore {
    pool: SqlitePool,
}

impl ChatStore {
    /// Connect to the database and bootstrap the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Self::with_pool(pool).await
    }

    /// Wrap an existing pool (tests use an in-memory pool here).
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                assistant_type TEXT NOT NULL,
                title TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_chat_messages_conversation
            ON chat_messages (conversation_id, created_at)
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a conversation and return the stored row.
    pub async fn create_conversation(
        &self,
        user_id: &str,
        assistant: Assistant,
        title: &str,
    ) -> Result<Conversation> {
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            assistant_type: assistant,
            title: title.to_string(),
            created_at: Utc::now().timestamp(),
        };

        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, assistant_type, title, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&conversation.id)
        .bind(&conversation.user_id)
        .bind(conversation.assistant_type.id())
        .bind(&conversation.title)
        .bind(conversation.created_at)
        .execute(&self.pool)
        .await?;

        Ok(conversation)
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, assistant_type, title, created_at
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_conversation))
    }

    /// Conversations for a user, newest first.
    pub async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, assistant_type, title, created_at
            FROM conversations
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_conversation).collect())
    }

    /// Retitle a conversation. The only mutation conversations support.
    pub async fn rename_conversation(&self, id: &str, title: &str) -> Result<()> {
        sqlx::query("UPDATE conversations SET title = $1 WHERE id = $2")
            .bind(title)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert a message and return the stored row.
    pub async fn insert_message(
        &self,
        conversation_id: &str,
        role: &str,
        content: &str,
    ) -> Result<ChatMessage> {
        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            created_at: Utc::now().timestamp(),
        };

        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, conversation_id, role, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(&message.role)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(message)
    }

    /// Full message history for a conversation, oldest first.
    ///
    /// rowid breaks ties for messages written within the same second, so
    /// insertion order is always preserved.
    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, role, content, created_at
            FROM chat_messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ChatMessage {
                id: row.get(0),
                conversation_id: row.get(1),
                role: row.get(2),
                content: row.get(3),
                created_at: row.get(4),
            })
            .collect())
    }

    pub async fn count_messages(&self, conversation_id: &str) -> Result<i64> {
        let row =
            sqlx::query("SELECT COUNT(*) FROM chat_messages WHERE conversation_id = $1")
                .bind(conversation_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.get(0))
    }
}

fn row_to_conversation(row: sqlx::sqlite::SqliteRow) -> Conversation {
    let assistant: String = row.get(2);
    Conversation {
        id: row.get(0),
        user_id: row.get(1),
        assistant_type: Assistant::from_id_or_default(&assistant),
        title: row.get(3),
        created_at: row.get(4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::{ROLE_ASSISTANT, ROLE_USER};

    async fn test_store() -> ChatStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        ChatStore::with_pool(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_fetch_conversation() {
        let store = test_store().await;
        let created = store
            .create_conversation("user-1", Assistant::Oracle, "Q4 review")
            .await
            .unwrap();

        let fetched = store.get_conversation(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Q4 review");
        assert_eq!(fetched.assistant_type, Assistant::Oracle);
        assert_eq!(fetched.user_id, "user-1");
    }

    #[tokio::test]
    async fn test_messages_come_back_in_insertion_order() {
        let store = test_store().await;
        let conversation = store
            .create_conversation("user-1", Assistant::Aether, "review")
            .await
            .unwrap();

        // Same-second inserts; rowid tie-break must keep insertion order.
        store
            .insert_message(&conversation.id, ROLE_USER, "first")
            .await
            .unwrap();
        store
            .insert_message(&conversation.id, ROLE_ASSISTANT, "second")
            .await
            .unwrap();
        store
            .insert_message(&conversation.id, ROLE_USER, "third")
            .await
            .unwrap();

        let messages = store.list_messages(&conversation.id).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_rename_is_the_only_conversation_mutation() {
        let store = test_store().await;
        let conversation = store
            .create_conversation("user-1", Assistant::Muse, "untitled")
            .await
            .unwrap();

        store
            .rename_conversation(&conversation.id, "Launch captions")
            .await
            .unwrap();

        let fetched = store
            .get_conversation(&conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.title, "Launch captions");
        assert_eq!(fetched.assistant_type, Assistant::Muse);
    }

    #[tokio::test]
    async fn test_list_conversations_scoped_to_user() {
        let store = test_store().await;
        store
            .create_conversation("alice", Assistant::Oracle, "a")
            .await
            .unwrap();
        store
            .create_conversation("bob", Assistant::Oracle, "b")
            .await
            .unwrap();

        let conversations = store.list_conversations("alice").await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].title, "a");
    }
}
