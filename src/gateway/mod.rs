//! Gateway — the main event loop connecting the transport, the lifecycle
//! manager, the debounce aggregator, the language model, and the
//! directive executor.

mod debounce;
mod lifecycle;
mod pipeline;

#[cfg(test)]
mod tests;

pub use debounce::{Aggregator, EnqueueOutcome, ReadyBatch};
pub use lifecycle::{Activation, Lifecycle};

use crate::directives::DirectiveExecutor;
use maitre_core::{
    config::{BehaviorConfig, Prompts},
    message::{InboundEvent, MessageMetadata, OutgoingMessage},
    traits::{Channel, Provider},
};
use maitre_memory::{AuditLogger, Store};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

/// Where to route replies for a user: channel name plus the transport's
/// reply target. Remembered per user so overflow batches (which have no
/// originating event in hand) still find their way back.
#[derive(Debug, Clone)]
pub(crate) struct Route {
    pub channel: String,
    pub reply_target: Option<String>,
    pub peer_name: Option<String>,
}

/// The central gateway.
pub struct Gateway {
    pub(super) provider: Arc<dyn Provider>,
    pub(super) channels: HashMap<String, Arc<dyn Channel>>,
    pub(super) memory: Store,
    pub(super) audit: AuditLogger,
    pub(super) lifecycle: Lifecycle,
    pub(super) aggregator: Aggregator,
    pub(super) executor: DirectiveExecutor,
    pub(super) prompts: Prompts,
    /// Hot-reloadable trigger/exit vocabulary. Swapped between events
    /// when the config file changes on disk.
    pub(super) behavior: std::sync::RwLock<BehaviorConfig>,
    pub(super) behavior_mtime: std::sync::Mutex<Option<SystemTime>>,
    pub(super) config_path: String,
    pub(super) routes: Mutex<HashMap<String, Route>>,
    ready_rx: Mutex<Option<mpsc::Receiver<ReadyBatch>>>,
}

impl Gateway {
    pub fn new(
        provider: Arc<dyn Provider>,
        channels: HashMap<String, Arc<dyn Channel>>,
        memory: Store,
        executor: DirectiveExecutor,
        behavior: BehaviorConfig,
        prompts: Prompts,
        config_path: String,
    ) -> Self {
        let audit = AuditLogger::new(memory.pool().clone());
        let lifecycle = Lifecycle::new(memory.clone());
        let (ready_tx, ready_rx) = mpsc::channel::<ReadyBatch>(64);
        let aggregator = Aggregator::new(ready_tx);

        Self {
            provider,
            channels,
            memory,
            audit,
            lifecycle,
            aggregator,
            executor,
            prompts,
            behavior: std::sync::RwLock::new(behavior),
            behavior_mtime: std::sync::Mutex::new(None),
            config_path,
            routes: Mutex::new(HashMap::new()),
            ready_rx: Mutex::new(Some(ready_rx)),
        }
    }

    /// Run the main event loop until ctrl-c.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!(
            "Maitre gateway running | provider: {} | channels: {}",
            self.provider.name(),
            self.channels.keys().cloned().collect::<Vec<_>>().join(", "),
        );

        let (tx, mut rx) = mpsc::channel::<InboundEvent>(256);

        for (name, channel) in &self.channels {
            let mut channel_rx = channel
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start channel {name}: {e}"))?;
            let tx = tx.clone();
            let channel_name = name.clone();

            tokio::spawn(async move {
                while let Some(event) = channel_rx.recv().await {
                    if tx.send(event).await.is_err() {
                        info!("gateway receiver dropped, stopping {channel_name} forwarder");
                        break;
                    }
                }
            });

            info!("Channel started: {name}");
        }

        drop(tx);

        let mut ready_rx = self
            .ready_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow::anyhow!("gateway already running"))?;

        loop {
            tokio::select! {
                Some(event) = rx.recv() => {
                    let gw = self.clone();
                    tokio::spawn(async move {
                        gw.handle_event(event).await;
                    });
                }
                Some(batch) = ready_rx.recv() => {
                    let gw = self.clone();
                    tokio::spawn(async move {
                        gw.handle_ready_batch(batch).await;
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Graceful shutdown: stop channels, note who was mid-conversation.
    async fn shutdown(&self) {
        info!("Shutting down...");

        match self.memory.active_users().await {
            Ok(users) if !users.is_empty() => {
                info!("{} conversation(s) still active", users.len());
            }
            Ok(_) => {}
            Err(e) => warn!("failed to list active conversations: {e}"),
        }

        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!("failed to stop channel {name}: {e}");
            }
        }

        info!("Shutdown complete.");
    }

    /// Send plain text along a route. Send failures are logged, never
    /// retried here, and never touch conversation state.
    pub(super) async fn send_text(&self, route: &Route, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let msg = OutgoingMessage {
            text: text.to_string(),
            metadata: MessageMetadata::default(),
            reply_target: route.reply_target.clone(),
        };

        if let Some(channel) = self.channels.get(&route.channel) {
            if let Err(e) = channel.send(msg).await {
                error!("failed to send message via {}: {e}", route.channel);
            }
        } else {
            error!("no channel found for '{}'", route.channel);
        }
    }
}
