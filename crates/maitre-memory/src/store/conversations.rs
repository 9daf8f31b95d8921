//! Conversation directory — open, close, and the finished-user list.
//!
//! Status values: `active`, `closed` (ended without completion),
//! `finished` (terminal — completed booking or explicit hand-off).
//! `user_id` is always canonical; access is serialized per user by the
//! gateway, so last-writer-wins at row granularity is sufficient.

use super::Store;
use maitre_core::error::MaitreError;
use uuid::Uuid;

impl Store {
    /// The active conversation id for a user, if any.
    pub async fn active_conversation(&self, user_id: &str) -> Result<Option<String>, MaitreError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM conversations \
             WHERE user_id = ? AND status = 'active' \
             ORDER BY started_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MaitreError::Memory(format!("query failed: {e}")))?;

        Ok(row.map(|(id,)| id))
    }

    /// Open a conversation for a user, reusing the active one if present.
    ///
    /// Returns `(conversation_id, newly_opened)` — idempotent by design.
    pub async fn open_conversation(&self, user_id: &str) -> Result<(String, bool), MaitreError> {
        if let Some(id) = self.active_conversation(user_id).await? {
            return Ok((id, false));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO conversations (id, user_id, status, started_at) \
             VALUES (?, ?, 'active', datetime('now'))",
        )
        .bind(&id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| MaitreError::Memory(format!("insert failed: {e}")))?;

        Ok((id, true))
    }

    /// Close the active conversation for a user.
    ///
    /// `finished = true` records the user as done (excluded from
    /// unsolicited auto-activation until cleared). Returns whether a row
    /// was actually closed.
    pub async fn close_conversation(
        &self,
        user_id: &str,
        finished: bool,
    ) -> Result<bool, MaitreError> {
        let status = if finished { "finished" } else { "closed" };
        let result = sqlx::query(
            "UPDATE conversations \
             SET status = ?, finished_at = datetime('now') \
             WHERE user_id = ? AND status = 'active'",
        )
        .bind(status)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| MaitreError::Memory(format!("update failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether the user's most recent conversation ended in `finished`.
    pub async fn is_finished(&self, user_id: &str) -> Result<bool, MaitreError> {
        // rowid breaks ties between conversations opened within the same
        // second.
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT status FROM conversations \
             WHERE user_id = ? ORDER BY started_at DESC, rowid DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MaitreError::Memory(format!("query failed: {e}")))?;

        Ok(matches!(row, Some((status,)) if status == "finished"))
    }

    /// Clear the finished mark so the user is eligible for unsolicited
    /// auto-activation again.
    pub async fn clear_finished(&self, user_id: &str) -> Result<(), MaitreError> {
        sqlx::query(
            "UPDATE conversations SET status = 'closed' \
             WHERE user_id = ? AND status = 'finished'",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| MaitreError::Memory(format!("update failed: {e}")))?;
        Ok(())
    }

    /// All users with an active conversation (for shutdown logging).
    pub async fn active_users(&self) -> Result<Vec<String>, MaitreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT user_id FROM conversations WHERE status = 'active'",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MaitreError::Memory(format!("query failed: {e}")))?;

        Ok(rows.into_iter().map(|(u,)| u).collect())
    }
}
