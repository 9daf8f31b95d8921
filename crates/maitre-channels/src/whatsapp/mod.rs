//! WhatsApp channel — pure Rust implementation via `whatsapp-rust`.
//!
//! Uses the WhatsApp Web protocol (Noise handshake + Signal encryption).
//! Pairing is done by scanning a QR code, like WhatsApp Web. The session
//! is persisted to `{data_dir}/whatsapp_session/session.db`.

mod bot;
mod channel;
mod events;
mod qr;
mod send;


pub use qr::{generate_qr_image, generate_qr_terminal, start_pairing};

use maitre_core::config::WhatsAppConfig;
use maitre_core::message::InboundEvent;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// WhatsApp channel using the WhatsApp Web protocol.
pub struct WhatsAppChannel {
    pub(super) config: WhatsAppConfig,
    pub(super) data_dir: String,
    /// Client handle for sending messages — set once connected.
    pub(super) client: Arc<Mutex<Option<Arc<whatsapp_rust::client::Client>>>>,
    /// Message IDs this process sent. The account's `from_me` traffic is
    /// forwarded to the gateway (manual-takeover detection), but our own
    /// automated sends must not masquerade as the operator — they are
    /// filtered against this set.
    pub(super) sent_ids: Arc<Mutex<HashSet<String>>>,
    /// Message sender, kept for reconnects.
    pub(super) msg_tx: Arc<Mutex<Option<mpsc::Sender<InboundEvent>>>>,
}

impl WhatsAppChannel {
    /// Create a new WhatsApp channel from config.
    pub fn new(config: WhatsAppConfig, data_dir: &str) -> Self {
        Self {
            config,
            data_dir: data_dir.to_string(),
            client: Arc::new(Mutex::new(None)),
            sent_ids: Arc::new(Mutex::new(HashSet::new())),
            msg_tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Check if the client is currently connected.
    pub async fn is_connected(&self) -> bool {
        self.client.lock().await.is_some()
    }

    /// Get the session database path, creating the directory if needed.
    pub(super) fn session_db_path(&self) -> String {
        let dir = maitre_core::shellexpand(&self.data_dir);
        let session_dir = format!("{dir}/whatsapp_session");
        let _ = std::fs::create_dir_all(&session_dir);
        format!("{session_dir}/session.db")
    }
}
