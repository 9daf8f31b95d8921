//! Inbound WhatsApp event handling — filtering, unwrapping, forwarding.
//!
//! Both directions of the paired account are forwarded: peer messages
//! become regular events, and the operator's own outgoing messages are
//! forwarded with `from_me = true` so the gateway can detect manual
//! takeover. Only this process's own sends (tracked by message id) are
//! dropped as echo.

use maitre_core::message::InboundEvent;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub(super) async fn handle_whatsapp_event(
    msg: waproto::whatsapp::Message,
    info: wacore::types::message::MessageInfo,
    tx: &mpsc::Sender<InboundEvent>,
    allowed: &[String],
    sent_ids: &Arc<Mutex<HashSet<String>>>,
) {
    debug!(
        "WA msg: is_group={}, is_from_me={}, sender={}, chat={}",
        info.source.is_group, info.source.is_from_me, info.source.sender.user, info.source.chat.user,
    );

    // Group chats are never automated.
    if info.source.is_group {
        return;
    }

    let msg_id = info.id.clone();
    if sent_ids.lock().await.remove(&msg_id) {
        debug!("skipping own automated echo: {msg_id}");
        return;
    }

    // The conversation peer is the chat, for both directions.
    let peer = info.source.chat.user.clone();

    if !allowed.is_empty() && !allowed.contains(&peer) {
        warn!("ignoring whatsapp chat with unauthorized {peer}");
        return;
    }

    // Unwrap nested wrappers (device_sent, ephemeral, view_once).
    let inner = msg
        .device_sent_message
        .as_ref()
        .and_then(|d| d.message.as_deref())
        .or_else(|| {
            msg.ephemeral_message
                .as_ref()
                .and_then(|e| e.message.as_deref())
        })
        .or_else(|| {
            msg.view_once_message
                .as_ref()
                .and_then(|v| v.message.as_deref())
        })
        .unwrap_or(&msg);

    let text = inner
        .conversation
        .as_deref()
        .or_else(|| {
            inner
                .extended_text_message
                .as_ref()
                .and_then(|e| e.text.as_deref())
        })
        .unwrap_or("")
        .to_string();

    // Text only — media and voice carry no directive-relevant content.
    if text.is_empty() {
        return;
    }

    let peer_name = if info.source.is_from_me || info.push_name.is_empty() {
        None
    } else {
        Some(info.push_name.clone())
    };

    let event = InboundEvent {
        id: Uuid::new_v4(),
        channel: "whatsapp".to_string(),
        peer_id: peer,
        peer_name,
        text,
        timestamp: chrono::Utc::now(),
        from_me: info.source.is_from_me,
        reply_target: Some(info.source.chat.to_string()),
        is_group: false,
    };

    if tx.send(event).await.is_err() {
        info!("whatsapp channel receiver dropped");
    }
}
