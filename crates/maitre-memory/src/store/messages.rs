//! Exchange history — what the model sees as conversation context.

use super::Store;
use maitre_core::{context::ContextEntry, error::MaitreError};

impl Store {
    /// Append one message to a conversation.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: &str,
        content: &str,
    ) -> Result<(), MaitreError> {
        sqlx::query(
            "INSERT INTO messages (conversation_id, role, content) VALUES (?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(role)
        .bind(content)
        .execute(&self.pool)
        .await
        .map_err(|e| MaitreError::Memory(format!("insert failed: {e}")))?;
        Ok(())
    }

    /// Store a user/assistant exchange in one call.
    pub async fn store_exchange(
        &self,
        conversation_id: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<(), MaitreError> {
        self.append_message(conversation_id, "user", user_text).await?;
        if !assistant_text.is_empty() {
            self.append_message(conversation_id, "assistant", assistant_text)
                .await?;
        }
        Ok(())
    }

    /// The most recent history of a conversation, oldest first, capped at
    /// `max_context_messages`.
    pub async fn history(&self, conversation_id: &str) -> Result<Vec<ContextEntry>, MaitreError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT role, content FROM ( \
                 SELECT id, role, content FROM messages \
                 WHERE conversation_id = ? ORDER BY id DESC LIMIT ? \
             ) ORDER BY id ASC",
        )
        .bind(conversation_id)
        .bind(self.max_context_messages() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MaitreError::Memory(format!("query failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(role, content)| ContextEntry { role, content })
            .collect())
    }
}
