//! The dispatch pipeline — every inbound event funnels through here.
//!
//! Ordering per event: manual-takeover check for operator traffic, exit
//! words before any model call, activation greeting short-circuit,
//! debounce, model call, post-call liveness re-check, directive
//! execution, send, terminal transition. A provider failure aborts the
//! event without sending anything and without touching state.

use super::{Gateway, ReadyBatch, Route};
use crate::directives::{
    classify_response, strip_terminal_markers, ExecutionContext, ResponseKind,
};
use maitre_core::{
    config::{load_behavior, BehaviorConfig},
    context::Context,
    error::MaitreError,
    identity::canonical_user_id,
    message::InboundEvent,
};
use maitre_memory::audit::{AuditEntry, AuditStatus};
use tracing::{debug, error, info, warn};

impl Gateway {
    /// Process one inbound chat event.
    pub(super) async fn handle_event(&self, event: InboundEvent) {
        self.refresh_behavior();
        let behavior = self.behavior_snapshot();

        // Group chats are never automated.
        if event.is_group {
            return;
        }

        let canonical = canonical_user_id(&event.peer_id);

        // Operator's own outgoing traffic: only the manual-takeover check.
        // Never generate a reply to the operator.
        if event.from_me {
            if behavior.is_operator_exit(&event.text)
                && self
                    .lifecycle
                    .deactivate(&canonical, false)
                    .await
                    .unwrap_or(false)
            {
                info!("manual takeover by operator for {canonical}");
            }
            return;
        }

        let preview: String = event.text.chars().take(60).collect();
        info!(
            "[{}] {} says: {preview}",
            event.channel,
            event.peer_name.as_deref().unwrap_or(&canonical)
        );

        let route = Route {
            channel: event.channel.clone(),
            reply_target: event.reply_target.clone(),
            peer_name: event.peer_name.clone(),
        };
        self.routes
            .lock()
            .await
            .insert(canonical.clone(), route.clone());

        let active = match self.lifecycle.is_active(&canonical).await {
            Ok(active) => active,
            Err(e) => {
                error!("lifecycle lookup failed for {canonical}: {e}");
                return;
            }
        };

        // Exit word beats everything — no model call, no reply.
        if active && behavior.is_user_exit(&event.text) {
            if let Err(e) = self.lifecycle.deactivate(&canonical, false).await {
                error!("failed to close conversation for {canonical}: {e}");
            }
            info!("user exit word closed conversation for {canonical}");
            return;
        }

        if !active {
            if !behavior.is_activation(&event.text) {
                // Not ours to answer.
                debug!("ignoring event from inactive user {canonical}");
                return;
            }
            // Finished only suppresses unsolicited sweeps; a trigger word
            // from the user always re-opens.
            if self.lifecycle.is_finished(&canonical).await.unwrap_or(false) {
                debug!("re-activating previously finished user {canonical}");
            }
            match self.lifecycle.activate(&canonical).await {
                Ok(activation) if activation.newly_activated => {
                    // The activating event gets the opening message and
                    // nothing else — anything more would double-reply.
                    self.send_text(&route, &self.prompts.opening).await;
                    let _ = self
                        .memory
                        .append_message(&activation.conversation_id, "user", &event.text)
                        .await;
                    let _ = self
                        .memory
                        .append_message(
                            &activation.conversation_id,
                            "assistant",
                            &self.prompts.opening,
                        )
                        .await;
                    return;
                }
                Ok(_) => {
                    // Concurrent activation won the race; that event owns
                    // the opening message.
                    return;
                }
                Err(e) => {
                    error!("activation failed for {canonical}: {e}");
                    return;
                }
            }
        }

        let outcome = self.aggregator.enqueue(&canonical, &event.text).await;
        if !outcome.should_process {
            // Another concurrent event owns this batch.
            return;
        }

        self.process_batch(&canonical, &route, &outcome.combined_text, outcome.count)
            .await;
    }

    /// A batch assembled from overflow replay became ready.
    pub(super) async fn handle_ready_batch(&self, batch: ReadyBatch) {
        let Some(route) = self.routes.lock().await.get(&batch.user_id).cloned() else {
            // Overflow implies a prior routed event; losing the route
            // means we can't reply, so drop the batch and free the lock.
            warn!("no route for ready batch of {}", batch.user_id);
            self.aggregator.release(&batch.user_id).await;
            return;
        };
        self.process_batch(&batch.user_id, &route, &batch.combined_text, batch.count)
            .await;
    }

    /// Steps 6–10: model call through terminal transition. Always
    /// releases the user's batch lock, whatever happens.
    async fn process_batch(&self, user_id: &str, route: &Route, combined: &str, count: usize) {
        let result = self.run_model_exchange(user_id, route, combined, count).await;
        self.aggregator.release(user_id).await;
        if let Err(e) = result {
            error!("pipeline failed for {user_id}: {e}");
        }
    }

    async fn run_model_exchange(
        &self,
        user_id: &str,
        route: &Route,
        combined: &str,
        count: usize,
    ) -> Result<(), MaitreError> {
        // The conversation may have closed while the batch debounced.
        let Some(conversation_id) = self.lifecycle.conversation_id(user_id).await? else {
            debug!("batch for {user_id} arrived after close, dropping");
            return Ok(());
        };

        info!("[{}] processing batch of {count} for {user_id}", route.channel);

        let history = self.memory.history(&conversation_id).await?;
        let context = Context {
            system_prompt: self.system_prompt(),
            history,
            current_message: combined.to_string(),
            model: None,
        };

        if let (Some(channel), Some(target)) =
            (self.channels.get(&route.channel), route.reply_target.as_deref())
        {
            let _ = channel.send_typing(target).await;
        }

        let response = match self.provider.complete(&context).await {
            Ok(response) => response,
            Err(e) => {
                // No reply, no state change, no automatic retry — the
                // user's next message restarts the pipeline from scratch.
                error!("provider error for {user_id}: {e}");
                let _ = self
                    .audit
                    .log(&AuditEntry {
                        channel: route.channel.clone(),
                        user_id: user_id.to_string(),
                        input_text: combined.to_string(),
                        output_text: Some(format!("ERROR: {e}")),
                        provider_used: Some(self.provider.name().to_string()),
                        model: None,
                        processing_ms: None,
                        status: AuditStatus::Error,
                        side_effects: Vec::new(),
                    })
                    .await;
                return Ok(());
            }
        };

        // Re-check liveness: a stale answer after a concurrent close is
        // discarded unsent.
        if !self.lifecycle.is_active(user_id).await? {
            info!("conversation for {user_id} closed mid-call, discarding answer");
            let _ = self
                .audit
                .log(&AuditEntry {
                    channel: route.channel.clone(),
                    user_id: user_id.to_string(),
                    input_text: combined.to_string(),
                    output_text: Some(response.text.clone()),
                    provider_used: Some(response.metadata.provider_used.clone()),
                    model: response.metadata.model.clone(),
                    processing_ms: Some(response.metadata.processing_time_ms as i64),
                    status: AuditStatus::Discarded,
                    side_effects: Vec::new(),
                })
                .await;
            return Ok(());
        }

        let behavior = self.behavior_snapshot();
        let classification = classify_response(&response.text, &behavior.terminal_markers);
        let terminal = matches!(classification, ResponseKind::Terminal { .. });
        if let ResponseKind::Terminal { ref marker } = classification {
            info!("terminal signal {marker} from model for {user_id}");
        }

        let stripped = strip_terminal_markers(&response.text, &behavior.terminal_markers);
        let executed = self
            .executor
            .execute(
                &stripped,
                &ExecutionContext {
                    user_id: user_id.to_string(),
                    user_name: route.peer_name.clone(),
                },
            )
            .await?;

        self.memory
            .store_exchange(&conversation_id, combined, &executed.text)
            .await?;

        self.send_text(route, &executed.text).await;
        self.send_media(route, &executed.media_paths).await;

        let _ = self
            .audit
            .log(&AuditEntry {
                channel: route.channel.clone(),
                user_id: user_id.to_string(),
                input_text: combined.to_string(),
                output_text: Some(executed.text.clone()),
                provider_used: Some(response.metadata.provider_used.clone()),
                model: response.metadata.model.clone(),
                processing_ms: Some(response.metadata.processing_time_ms as i64),
                status: AuditStatus::Ok,
                side_effects: executed.side_effects.clone(),
            })
            .await;

        if terminal || executed.ends_conversation {
            self.lifecycle.deactivate(user_id, true).await?;
        }

        Ok(())
    }

    /// Canned-reply media, sent after the text.
    async fn send_media(&self, route: &Route, media_paths: &[String]) {
        let Some(channel) = self.channels.get(&route.channel) else {
            return;
        };
        let target = route.reply_target.as_deref().unwrap_or("");
        for path in media_paths {
            match std::fs::read(path) {
                Ok(bytes) => {
                    if let Err(e) = channel.send_photo(target, &bytes, "").await {
                        warn!("failed to send media {path}: {e}");
                    }
                }
                Err(e) => warn!("failed to read media {path}: {e}"),
            }
        }
    }

    /// Reload the behavior section when the config file changed on disk.
    /// Cheap enough to run on every event; a parse failure keeps the
    /// previous vocabulary.
    pub(super) fn refresh_behavior(&self) {
        let Ok(meta) = std::fs::metadata(&self.config_path) else {
            return;
        };
        let Ok(mtime) = meta.modified() else {
            return;
        };

        {
            let mut last = self
                .behavior_mtime
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if *last == Some(mtime) {
                return;
            }
            *last = Some(mtime);
        }

        match load_behavior(&self.config_path) {
            Ok(behavior) => {
                if let Ok(mut current) = self.behavior.write() {
                    *current = behavior;
                    info!("behavior config reloaded from {}", self.config_path);
                }
            }
            Err(e) => warn!("behavior reload failed, keeping previous: {e}"),
        }
    }

    pub(super) fn behavior_snapshot(&self) -> BehaviorConfig {
        self.behavior
            .read()
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    fn system_prompt(&self) -> String {
        let mut prompt = self.prompts.system.clone();
        prompt.push_str(&format!(
            "\n\nToday is {}.",
            chrono::Local::now().format("%Y-%m-%d (%A)")
        ));
        prompt.push_str(
            "\nPlatform: WhatsApp. Avoid markdown tables and headers — use bold (*text*) and bullet lists instead.",
        );
        prompt
    }
}
