//! Audit logging of processed events.

use maitre_core::error::MaitreError;
use sqlx::SqlitePool;

/// Outcome recorded for an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Ok,
    Error,
    Discarded,
}

impl AuditStatus {
    fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Ok => "ok",
            AuditStatus::Error => "error",
            AuditStatus::Discarded => "discarded",
        }
    }
}

/// One processed event: input batch, delivered output, and the booking
/// calls its directives made.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub channel: String,
    pub user_id: String,
    pub input_text: String,
    pub output_text: Option<String>,
    pub provider_used: Option<String>,
    pub model: Option<String>,
    pub processing_ms: Option<i64>,
    pub status: AuditStatus,
    pub side_effects: Vec<String>,
}

/// Writes audit entries to the shared SQLite pool.
#[derive(Clone)]
pub struct AuditLogger {
    pool: SqlitePool,
}

impl AuditLogger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Log an entry. Failures are surfaced to the caller, which typically
    /// just warns — auditing never blocks the pipeline.
    pub async fn log(&self, entry: &AuditEntry) -> Result<(), MaitreError> {
        let side_effects = if entry.side_effects.is_empty() {
            None
        } else {
            Some(entry.side_effects.join("; "))
        };

        sqlx::query(
            "INSERT INTO audit_log \
             (channel, user_id, input_text, output_text, provider_used, model, processing_ms, status, side_effects) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.channel)
        .bind(&entry.user_id)
        .bind(&entry.input_text)
        .bind(&entry.output_text)
        .bind(&entry.provider_used)
        .bind(&entry.model)
        .bind(entry.processing_ms)
        .bind(entry.status.as_str())
        .bind(side_effects)
        .execute(&self.pool)
        .await
        .map_err(|e| MaitreError::Memory(format!("audit insert failed: {e}")))?;

        Ok(())
    }
}
