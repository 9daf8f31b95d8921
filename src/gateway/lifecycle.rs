//! Conversation lifecycle — who the assistant may talk to, and when it
//! must stop.
//!
//! States live in the store (`active` / `closed` / `finished`); an
//! in-memory map caches the active set so per-event checks don't hit
//! SQLite twice. Every entry point canonicalizes the user id first, so
//! `5511…@c.us` and `5511…@s.whatsapp.net` are one conversation.

use maitre_core::{error::MaitreError, identity::canonical_user_id};
use maitre_memory::Store;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::info;

/// Result of an activation call.
#[derive(Debug, Clone)]
pub struct Activation {
    /// The canonical id actually used for state.
    pub canonical_id: String,
    pub conversation_id: String,
    /// False when the user was already active (idempotent no-op).
    pub newly_activated: bool,
}

/// Tracks active conversations and drives state transitions.
pub struct Lifecycle {
    store: Store,
    /// canonical user id → conversation id.
    active: Mutex<HashMap<String, String>>,
}

impl Lifecycle {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the user currently has an active conversation.
    pub async fn is_active(&self, user_id: &str) -> Result<bool, MaitreError> {
        Ok(self.conversation_id(user_id).await?.is_some())
    }

    /// The active conversation id for a user, warming the cache from the
    /// store (survives restarts).
    pub async fn conversation_id(&self, user_id: &str) -> Result<Option<String>, MaitreError> {
        let canonical = canonical_user_id(user_id);
        let mut active = self.active.lock().await;
        if let Some(id) = active.get(&canonical) {
            return Ok(Some(id.clone()));
        }
        if let Some(id) = self.store.active_conversation(&canonical).await? {
            active.insert(canonical, id.clone());
            return Ok(Some(id));
        }
        Ok(None)
    }

    /// Open a conversation for a user. Idempotent: a second activation
    /// returns the same canonical id and conversation without starting
    /// anything new.
    pub async fn activate(&self, user_id: &str) -> Result<Activation, MaitreError> {
        let canonical = canonical_user_id(user_id);
        let mut active = self.active.lock().await;

        if let Some(id) = active.get(&canonical) {
            return Ok(Activation {
                canonical_id: canonical,
                conversation_id: id.clone(),
                newly_activated: false,
            });
        }

        let (conversation_id, newly_opened) = self.store.open_conversation(&canonical).await?;
        active.insert(canonical.clone(), conversation_id.clone());

        if newly_opened {
            info!("conversation activated for {canonical}");
        }

        Ok(Activation {
            canonical_id: canonical,
            conversation_id,
            newly_activated: newly_opened,
        })
    }

    /// Close the user's conversation.
    ///
    /// `finished = true` is the terminal transition (completed booking or
    /// explicit hand-off) and marks the user as done, excluded from
    /// unsolicited auto-activation until cleared. Returns whether a
    /// conversation was actually open.
    pub async fn deactivate(&self, user_id: &str, finished: bool) -> Result<bool, MaitreError> {
        let canonical = canonical_user_id(user_id);
        let mut active = self.active.lock().await;
        active.remove(&canonical);
        let closed = self.store.close_conversation(&canonical, finished).await?;
        if closed {
            info!(
                "conversation {} for {canonical}",
                if finished { "finished" } else { "closed" }
            );
        }
        Ok(closed)
    }

    /// Whether the user's last conversation finished terminally. Does not
    /// block trigger-word re-activation — only unsolicited sweeps consult
    /// this.
    pub async fn is_finished(&self, user_id: &str) -> Result<bool, MaitreError> {
        self.store.is_finished(&canonical_user_id(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maitre_core::config::MemoryConfig;

    async fn lifecycle(dir: &tempfile::TempDir) -> Lifecycle {
        let config = MemoryConfig {
            db_path: dir.path().join("memory.db").to_string_lossy().into_owned(),
            max_context_messages: 10,
        };
        Lifecycle::new(Store::new(&config).await.expect("store init"))
    }

    #[tokio::test]
    async fn test_activate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(&dir).await;

        let first = lc.activate("972501234567@s.whatsapp.net").await.unwrap();
        let second = lc.activate("972501234567@s.whatsapp.net").await.unwrap();

        assert!(first.newly_activated);
        assert!(!second.newly_activated);
        assert_eq!(first.canonical_id, second.canonical_id);
        assert_eq!(first.conversation_id, second.conversation_id);
    }

    #[tokio::test]
    async fn test_id_variants_share_one_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(&dir).await;

        let via_legacy = lc.activate("972501234567@c.us").await.unwrap();
        assert!(via_legacy.newly_activated);
        assert_eq!(via_legacy.canonical_id, "972501234567@s.whatsapp.net");

        // Same account through the modern suffix: no second conversation.
        let via_modern = lc.activate("972501234567@s.whatsapp.net").await.unwrap();
        assert!(!via_modern.newly_activated);
        assert!(lc.is_active("972501234567:3@s.whatsapp.net").await.unwrap());
    }

    #[tokio::test]
    async fn test_deactivate_then_reactivate() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(&dir).await;
        let user = "972501234567@s.whatsapp.net";

        lc.activate(user).await.unwrap();
        assert!(lc.deactivate(user, false).await.unwrap());
        assert!(!lc.is_active(user).await.unwrap());
        // Deactivating again reports nothing was open.
        assert!(!lc.deactivate(user, false).await.unwrap());

        let again = lc.activate(user).await.unwrap();
        assert!(again.newly_activated);
    }

    #[tokio::test]
    async fn test_finished_recorded_but_reactivation_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(&dir).await;
        let user = "972501234567@s.whatsapp.net";

        lc.activate(user).await.unwrap();
        lc.deactivate(user, true).await.unwrap();
        assert!(lc.is_finished(user).await.unwrap());

        // Finished never blocks explicit re-activation.
        let again = lc.activate(user).await.unwrap();
        assert!(again.newly_activated);
        assert!(!lc.is_finished(user).await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_survives_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = MemoryConfig {
            db_path: dir.path().join("memory.db").to_string_lossy().into_owned(),
            max_context_messages: 10,
        };
        let store = Store::new(&config).await.unwrap();
        let user = "972501234567@s.whatsapp.net";

        let lc1 = Lifecycle::new(store.clone());
        lc1.activate(user).await.unwrap();

        // A fresh lifecycle over the same store sees the active conversation.
        let lc2 = Lifecycle::new(store);
        assert!(lc2.is_active(user).await.unwrap());
    }
}
