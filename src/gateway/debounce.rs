//! Per-user message debouncing.
//!
//! A burst of rapid messages from one user becomes exactly one combined
//! prompt. Every `enqueue` call settles; only the resolution flagged
//! `should_process` is acted on. While a batch is locked (in flight to
//! the model) new messages divert to overflow and are replayed as fresh
//! enqueues once the lock clears, so nothing is ever dropped and at most
//! one model call is in flight per user. Unrelated users never share a
//! timer or a lock.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, warn};

/// Wait grows by this much per queued message.
const BASE_DELAY: Duration = Duration::from_secs(5);
/// Never wait past this long from the first message of a batch.
const MAX_DELAY: Duration = Duration::from_secs(30);
/// Never fire in under this.
const MIN_DELAY: Duration = Duration::from_secs(1);
/// Lock lingers this long after a fire even if released earlier.
const COOLDOWN: Duration = Duration::from_secs(2);
/// Failsafe: a fired batch whose owner never releases unlocks anyway.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(180);

/// Settled result of an `enqueue` call.
#[derive(Debug, Clone)]
pub struct EnqueueOutcome {
    /// True for exactly one caller per batch — the one that proceeds.
    pub should_process: bool,
    /// All batched texts joined with a single space.
    pub combined_text: String,
    /// Number of messages in the batch.
    pub count: usize,
}

impl EnqueueOutcome {
    fn deferred() -> Self {
        Self {
            should_process: false,
            combined_text: String::new(),
            count: 0,
        }
    }
}

/// A batch that became ready through the overflow replay path, where no
/// external caller is waiting on an `enqueue` future.
#[derive(Debug)]
pub struct ReadyBatch {
    pub user_id: String,
    pub combined_text: String,
    pub count: usize,
}

#[derive(Default)]
struct UserBatch {
    messages: Vec<String>,
    waiters: Vec<oneshot::Sender<EnqueueOutcome>>,
    /// When the first message of the current batch arrived.
    first_at: Option<Instant>,
    /// Bumped on every reschedule; a firing timer with a stale
    /// generation is a cancelled timer.
    timer_gen: u64,
    timer: Option<JoinHandle<()>>,
    locked: bool,
    /// Signalled by `release` once the pipeline is done with the fired batch.
    release: Option<Arc<Notify>>,
    overflow: Vec<String>,
}

enum Registration {
    /// Resolved immediately (locked batch — message went to overflow).
    Immediate(EnqueueOutcome),
    /// Joined the pending batch; resolves when the batch fires.
    Waiter(oneshot::Receiver<EnqueueOutcome>),
}

/// Per-user debounce aggregator.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct Aggregator {
    inner: Arc<Mutex<HashMap<String, UserBatch>>>,
    ready_tx: mpsc::Sender<ReadyBatch>,
}

impl Aggregator {
    /// `ready_tx` receives batches assembled from overflow replay.
    pub fn new(ready_tx: mpsc::Sender<ReadyBatch>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ready_tx,
        }
    }

    /// Queue a message for a user.
    ///
    /// Resolves when the user's batch fires (or immediately, if a batch
    /// is already in flight). Exactly one caller per batch sees
    /// `should_process == true`.
    pub async fn enqueue(&self, user_id: &str, text: &str) -> EnqueueOutcome {
        match self.register(user_id, text).await {
            Registration::Immediate(outcome) => outcome,
            Registration::Waiter(rx) => rx.await.unwrap_or_else(|_| {
                warn!("batch waiter dropped for {user_id}");
                EnqueueOutcome::deferred()
            }),
        }
    }

    /// Mark the user's in-flight batch as done.
    ///
    /// The lock clears at `max(fire + COOLDOWN, release)`; overflow
    /// messages replay after that. Must be called exactly once per
    /// `should_process == true` resolution (success or failure).
    pub async fn release(&self, user_id: &str) {
        let map = self.inner.lock().await;
        if let Some(batch) = map.get(user_id) {
            if batch.locked {
                if let Some(release) = &batch.release {
                    release.notify_one();
                }
            }
        }
    }

    /// Synchronously join the batch (under the map lock), deferring the
    /// wait to the returned receiver. Keeping registration synchronous
    /// preserves arrival order during overflow replay.
    async fn register(&self, user_id: &str, text: &str) -> Registration {
        let mut map = self.inner.lock().await;
        let batch = map.entry(user_id.to_string()).or_default();

        if batch.locked {
            // In flight — hold for the next batch, leave the timer alone.
            batch.overflow.push(text.to_string());
            debug!("overflow message for {user_id} (batch in flight)");
            return Registration::Immediate(EnqueueOutcome::deferred());
        }

        batch.messages.push(text.to_string());
        let first_at = *batch.first_at.get_or_insert_with(Instant::now);

        let (tx, rx) = oneshot::channel();
        batch.waiters.push(tx);

        // Debounce with a growing ceiling: wait scales with burst size,
        // capped at MAX_DELAY from the first message, floored at MIN_DELAY.
        let wait = (BASE_DELAY * batch.messages.len() as u32).min(MAX_DELAY);
        let remaining = wait
            .saturating_sub(first_at.elapsed())
            .max(MIN_DELAY);

        // Reschedule, don't stack: the previous timer is dead.
        batch.timer_gen += 1;
        let generation = batch.timer_gen;
        if let Some(old) = batch.timer.take() {
            old.abort();
        }

        let aggregator = self.clone();
        let user = user_id.to_string();
        batch.timer = Some(tokio::spawn(async move {
            sleep(remaining).await;
            aggregator.fire(&user, generation).await;
        }));

        Registration::Waiter(rx)
    }

    /// Timer expiry: lock the batch, resolve every waiter, and schedule
    /// the unlock.
    async fn fire(&self, user_id: &str, generation: u64) {
        let (combined, count, waiters, release) = {
            let mut map = self.inner.lock().await;
            let Some(batch) = map.get_mut(user_id) else {
                return;
            };
            // A reschedule or concurrent fire beat us to it.
            if batch.timer_gen != generation || batch.locked || batch.messages.is_empty() {
                return;
            }

            let messages = std::mem::take(&mut batch.messages);
            let waiters = std::mem::take(&mut batch.waiters);
            batch.first_at = None;
            batch.timer = None;
            batch.locked = true;
            let release = Arc::new(Notify::new());
            batch.release = Some(release.clone());

            // Batch size is the message count, not the waiter count —
            // overflow replay registers messages without external waiters.
            (messages.join(" "), messages.len(), waiters, release)
        };

        debug!("batch fired for {user_id}: {count} message(s)");

        // First caller proceeds; the rest are informational no-ops.
        for (i, waiter) in waiters.into_iter().enumerate() {
            let _ = waiter.send(EnqueueOutcome {
                should_process: i == 0,
                combined_text: combined.clone(),
                count,
            });
        }

        let aggregator = self.clone();
        let user = user_id.to_string();
        tokio::spawn(async move {
            sleep(COOLDOWN).await;
            if tokio::time::timeout(RELEASE_TIMEOUT, release.notified())
                .await
                .is_err()
            {
                warn!("batch for {user} never released, unlocking anyway");
            }
            aggregator.unlock(&user).await;
        });
    }

    /// Clear the lock and replay overflow as fresh enqueues, in order.
    async fn unlock(&self, user_id: &str) {
        let overflow = {
            let mut map = self.inner.lock().await;
            let Some(batch) = map.get_mut(user_id) else {
                return;
            };
            batch.locked = false;
            batch.release = None;
            let overflow = std::mem::take(&mut batch.overflow);
            if overflow.is_empty() && batch.messages.is_empty() {
                map.remove(user_id);
            }
            overflow
        };

        for text in overflow {
            match self.register(user_id, &text).await {
                Registration::Waiter(rx) => {
                    // The replayed entry has no external caller; forward a
                    // winning resolution to the ready channel instead.
                    let ready_tx = self.ready_tx.clone();
                    let user = user_id.to_string();
                    tokio::spawn(async move {
                        if let Ok(outcome) = rx.await {
                            if outcome.should_process {
                                let _ = ready_tx
                                    .send(ReadyBatch {
                                        user_id: user,
                                        combined_text: outcome.combined_text,
                                        count: outcome.count,
                                    })
                                    .await;
                            }
                        }
                    });
                }
                Registration::Immediate(_) => {}
            }
        }
    }
}
