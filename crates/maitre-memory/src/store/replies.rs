//! Canned replies — pre-authored text/media looked up by `[INDEX=N]`.

use super::Store;
use async_trait::async_trait;
use maitre_core::{booking::CannedReply, error::MaitreError, traits::ReplyStore};

impl Store {
    /// Insert or replace a canned reply at an index.
    pub async fn set_canned_reply(
        &self,
        index: u32,
        text: &str,
        media_path: Option<&str>,
    ) -> Result<(), MaitreError> {
        sqlx::query("INSERT OR REPLACE INTO canned_replies (idx, text, media_path) VALUES (?, ?, ?)")
            .bind(index as i64)
            .bind(text)
            .bind(media_path)
            .execute(&self.pool)
            .await
            .map_err(|e| MaitreError::Memory(format!("insert failed: {e}")))?;
        Ok(())
    }

    /// Remove a canned reply.
    pub async fn delete_canned_reply(&self, index: u32) -> Result<bool, MaitreError> {
        let result = sqlx::query("DELETE FROM canned_replies WHERE idx = ?")
            .bind(index as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| MaitreError::Memory(format!("delete failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ReplyStore for Store {
    async fn get_by_index(&self, index: u32) -> Result<Option<CannedReply>, MaitreError> {
        let row: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT text, media_path FROM canned_replies WHERE idx = ?")
                .bind(index as i64)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| MaitreError::Memory(format!("query failed: {e}")))?;

        Ok(row.map(|(text, media_path)| CannedReply { text, media_path }))
    }
}
