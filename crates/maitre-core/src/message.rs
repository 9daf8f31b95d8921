use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An inbound chat event from a channel.
///
/// Covers both directions of the operator's account: messages *from* the
/// person being assisted (`from_me == false`) and the operator's own
/// outgoing messages echoed back by the transport (`from_me == true`).
/// The latter are never answered — the gateway only inspects them for
/// the manual-takeover exit word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub id: Uuid,
    /// Channel name (e.g. "whatsapp").
    pub channel: String,
    /// The chat peer this event belongs to, as the transport reported it.
    /// Normalize with [`crate::identity::canonical_user_id`] before any
    /// state lookup.
    pub peer_id: String,
    /// Human-readable peer name, when the transport knows one.
    pub peer_name: Option<String>,
    /// Message text content.
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// True when the operator's own account produced this message.
    #[serde(default)]
    pub from_me: bool,
    /// Platform-specific target for routing the reply (e.g. a full JID).
    #[serde(default)]
    pub reply_target: Option<String>,
    /// Whether this event comes from a group chat.
    #[serde(default)]
    pub is_group: bool,
}

/// An outgoing message to send back through a channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    pub metadata: MessageMetadata,
    /// Platform-specific target for routing (e.g. a full JID).
    #[serde(default)]
    pub reply_target: Option<String>,
}

/// Metadata about how a message was generated.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessageMetadata {
    /// Which provider produced this response.
    pub provider_used: String,
    /// Token count (if available from the provider).
    pub tokens_used: Option<u64>,
    /// Wall-clock processing time in milliseconds.
    pub processing_time_ms: u64,
    /// Model identifier (if applicable).
    pub model: Option<String>,
}

