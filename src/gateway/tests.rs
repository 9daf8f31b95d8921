use super::*;
use crate::directives::DirectiveExecutor;
use async_trait::async_trait;
use maitre_core::{
    config::{BehaviorConfig, BookingConfig, MemoryConfig, Mode, Prompts, ReplyTexts},
    context::Context,
    error::MaitreError,
    message::{InboundEvent, MessageMetadata, OutgoingMessage},
    traits::{Channel, ReplyStore as _},
};
use maitre_memory::Store;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

struct MockProvider {
    responses: std::sync::Mutex<VecDeque<String>>,
    calls: std::sync::Mutex<Vec<Context>>,
    fail: bool,
    delay: Duration,
}

impl MockProvider {
    fn with_response(text: &str) -> Self {
        Self {
            responses: std::sync::Mutex::new(VecDeque::from([text.to_string()])),
            calls: std::sync::Mutex::new(Vec::new()),
            fail: false,
            delay: Duration::ZERO,
        }
    }

    fn failing() -> Self {
        Self {
            responses: std::sync::Mutex::new(VecDeque::new()),
            calls: std::sync::Mutex::new(Vec::new()),
            fail: true,
            delay: Duration::ZERO,
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl maitre_core::traits::Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn requires_api_key(&self) -> bool {
        false
    }

    async fn complete(&self, context: &Context) -> Result<OutgoingMessage, MaitreError> {
        self.calls.lock().unwrap().push(context.clone());
        if self.delay > Duration::ZERO {
            sleep(self.delay).await;
        }
        if self.fail {
            return Err(MaitreError::Provider("mock outage".into()));
        }
        let text = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "ok".to_string());
        Ok(OutgoingMessage {
            text,
            metadata: MessageMetadata::default(),
            reply_target: None,
        })
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct MockChannel {
    sent: std::sync::Mutex<Vec<OutgoingMessage>>,
    photos: std::sync::Mutex<Vec<String>>,
}

impl MockChannel {
    fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn start(&self) -> Result<mpsc::Receiver<InboundEvent>, MaitreError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), MaitreError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn send_photo(
        &self,
        target: &str,
        _image: &[u8],
        _caption: &str,
    ) -> Result<(), MaitreError> {
        self.photos.lock().unwrap().push(target.to_string());
        Ok(())
    }

    async fn stop(&self) -> Result<(), MaitreError> {
        Ok(())
    }
}

struct Harness {
    gateway: Arc<Gateway>,
    channel: Arc<MockChannel>,
    provider: Arc<MockProvider>,
    _dir: tempfile::TempDir,
}

async fn harness(provider: MockProvider) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let memory = Store::new(&MemoryConfig {
        db_path: dir.path().join("memory.db").to_string_lossy().into_owned(),
        max_context_messages: 20,
    })
    .await
    .unwrap();

    let booking = maitre_booking::BookingStore::new(&BookingConfig {
        db_path: dir.path().join("booking.db").to_string_lossy().into_owned(),
        open_time: "09:00".into(),
        close_time: "18:00".into(),
        slot_minutes: 30,
    })
    .await
    .unwrap();

    let executor = DirectiveExecutor::new(
        Arc::new(booking),
        Arc::new(memory.clone()),
        ReplyTexts::default(),
    );

    let behavior = BehaviorConfig {
        mode: Mode::Auto,
        activation_words: vec!["appointment".into(), "לקבוע תור".into()],
        user_exit_words: vec!["stop".into()],
        operator_exit_words: vec!["#takeover".into()],
        terminal_markers: vec!["[CONVERSATION_DONE]".into()],
    };

    let provider = Arc::new(provider);
    let channel = Arc::new(MockChannel::default());
    let mut channels: HashMap<String, Arc<dyn Channel>> = HashMap::new();
    channels.insert("whatsapp".into(), channel.clone());

    let gateway = Arc::new(Gateway::new(
        provider.clone(),
        channels,
        memory,
        executor,
        behavior,
        Prompts::default(),
        dir.path().join("config.toml").to_string_lossy().into_owned(),
    ));

    Harness {
        gateway,
        channel,
        provider,
        _dir: dir,
    }
}

const USER: &str = "972501234567@s.whatsapp.net";

fn event(text: &str) -> InboundEvent {
    InboundEvent {
        id: uuid::Uuid::new_v4(),
        channel: "whatsapp".into(),
        peer_id: USER.into(),
        peer_name: Some("Dana".into()),
        text: text.into(),
        timestamp: chrono::Utc::now(),
        from_me: false,
        reply_target: Some(USER.into()),
        is_group: false,
    }
}

fn operator_event(text: &str) -> InboundEvent {
    InboundEvent {
        from_me: true,
        ..event(text)
    }
}

#[tokio::test(start_paused = true)]
async fn test_inactive_user_without_trigger_is_ignored() {
    let h = harness(MockProvider::with_response("ok")).await;

    h.gateway.handle_event(event("just chatting")).await;

    assert_eq!(h.provider.call_count(), 0);
    assert!(h.channel.sent_texts().is_empty());
    assert!(!h.gateway.lifecycle.is_active(USER).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_trigger_word_activates_and_sends_opening_only() {
    let h = harness(MockProvider::with_response("should not be called")).await;

    h.gateway.handle_event(event("I need an appointment")).await;

    assert!(h.gateway.lifecycle.is_active(USER).await.unwrap());
    let sent = h.channel.sent_texts();
    assert_eq!(sent.len(), 1, "activation sends exactly the opening");
    assert_eq!(sent[0], Prompts::default().opening);
    // The activating event never reaches the model — no duplicate reply.
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exit_word_closes_without_model_call() {
    let h = harness(MockProvider::with_response("should not be called")).await;

    h.gateway.lifecycle.activate(USER).await.unwrap();
    h.gateway.handle_event(event("ok stop now")).await;

    assert_eq!(h.provider.call_count(), 0);
    assert!(h.channel.sent_texts().is_empty());
    assert!(!h.gateway.lifecycle.is_active(USER).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_operator_takeover_closes_silently() {
    let h = harness(MockProvider::with_response("should not be called")).await;

    h.gateway.lifecycle.activate(USER).await.unwrap();
    h.gateway.handle_event(operator_event("I got this #takeover")).await;

    assert!(!h.gateway.lifecycle.is_active(USER).await.unwrap());
    assert_eq!(h.provider.call_count(), 0);
    assert!(h.channel.sent_texts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_operator_message_without_exit_word_is_inert() {
    let h = harness(MockProvider::with_response("should not be called")).await;

    h.gateway.lifecycle.activate(USER).await.unwrap();
    h.gateway.handle_event(operator_event("checking in manually")).await;

    assert!(h.gateway.lifecycle.is_active(USER).await.unwrap());
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_active_message_reaches_model_and_reply_is_sent() {
    let h = harness(MockProvider::with_response("Happy to help!")).await;

    h.gateway.lifecycle.activate(USER).await.unwrap();
    h.gateway.handle_event(event("what can you do?")).await;

    assert_eq!(h.provider.call_count(), 1);
    let calls = h.provider.calls.lock().unwrap();
    assert_eq!(calls[0].current_message, "what can you do?");
    drop(calls);
    assert_eq!(h.channel.sent_texts(), vec!["Happy to help!".to_string()]);
    assert!(h.gateway.lifecycle.is_active(USER).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_rapid_burst_coalesces_into_one_model_call() {
    let h = harness(MockProvider::with_response("בסדר גמור")).await;
    h.gateway.lifecycle.activate(USER).await.unwrap();

    let h1 = tokio::spawn({
        let gw = h.gateway.clone();
        async move { gw.handle_event(event("היי")).await }
    });
    sleep(Duration::from_millis(300)).await;
    let h2 = tokio::spawn({
        let gw = h.gateway.clone();
        async move { gw.handle_event(event("אני רוצה")).await }
    });
    sleep(Duration::from_millis(300)).await;
    let h3 = tokio::spawn({
        let gw = h.gateway.clone();
        async move { gw.handle_event(event("לקבוע תור")).await }
    });

    h1.await.unwrap();
    h2.await.unwrap();
    h3.await.unwrap();

    assert_eq!(h.provider.call_count(), 1, "one model call for the burst");
    let calls = h.provider.calls.lock().unwrap();
    assert_eq!(calls[0].current_message, "היי אני רוצה לקבוע תור");
    drop(calls);
    assert_eq!(h.channel.sent_texts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_booking_directive_finishes_conversation() {
    let h = harness(MockProvider::with_response(
        "All set! [BOOK_APPOINTMENT: date=2099-06-01, time=10:00]",
    ))
    .await;

    h.gateway.lifecycle.activate(USER).await.unwrap();
    h.gateway.handle_event(event("book me for 10am june 1st")).await;

    let sent = h.channel.sent_texts();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("2099-06-01"));
    assert!(sent[0].contains("10:00"));
    assert!(!sent[0].contains('['), "no directive leakage");

    assert!(!h.gateway.lifecycle.is_active(USER).await.unwrap());
    assert!(h.gateway.lifecycle.is_finished(USER).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_terminal_marker_finishes_conversation() {
    let h = harness(MockProvider::with_response("Glad I could help!\n[CONVERSATION_DONE]")).await;

    h.gateway.lifecycle.activate(USER).await.unwrap();
    h.gateway.handle_event(event("thanks, that's all")).await;

    let sent = h.channel.sent_texts();
    assert_eq!(sent, vec!["Glad I could help!".to_string()]);
    assert!(h.gateway.lifecycle.is_finished(USER).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_provider_failure_sends_nothing_keeps_state() {
    let h = harness(MockProvider::failing()).await;

    h.gateway.lifecycle.activate(USER).await.unwrap();
    h.gateway.handle_event(event("hello?")).await;

    assert!(h.channel.sent_texts().is_empty(), "no reply on provider failure");
    assert!(h.gateway.lifecycle.is_active(USER).await.unwrap(), "state unchanged");
}

#[tokio::test(start_paused = true)]
async fn test_stale_response_after_close_is_discarded() {
    let mut provider = MockProvider::with_response("too late");
    provider.delay = Duration::from_secs(3);
    let h = harness(provider).await;

    h.gateway.lifecycle.activate(USER).await.unwrap();
    let handle = tokio::spawn({
        let gw = h.gateway.clone();
        async move { gw.handle_event(event("are you there?")).await }
    });

    // Debounce fires at 5s; the model call is in flight until 8s.
    // Close the conversation in that window.
    sleep(Duration::from_secs(6)).await;
    h.gateway.lifecycle.deactivate(USER, false).await.unwrap();

    handle.await.unwrap();

    assert_eq!(h.provider.call_count(), 1);
    assert!(h.channel.sent_texts().is_empty(), "stale answer discarded unsent");
}

#[tokio::test(start_paused = true)]
async fn test_abort_example_end_to_end() {
    let h = harness(MockProvider::with_response("ביטלתי את התהליך. [ABORT_BOOKING]")).await;

    h.gateway.lifecycle.activate(USER).await.unwrap();
    h.gateway.handle_event(event("בעצם לא משנה, בטל")).await;

    let sent = h.channel.sent_texts();
    assert_eq!(sent.len(), 1);
    assert!(!sent[0].contains("ABORT_BOOKING"));
    assert!(!sent[0].contains('['));
    assert!(sent[0].contains("ביטלתי"));
}

#[tokio::test(start_paused = true)]
async fn test_canned_reply_media_is_sent() {
    let h = harness(MockProvider::with_response("[INDEX=1]")).await;

    // Media path must exist on disk for the pipeline to read it.
    let media = h._dir.path().join("hours.png");
    std::fs::write(&media, b"png-bytes").unwrap();
    h.gateway
        .memory
        .set_canned_reply(1, "Here are our opening hours.", Some(&media.to_string_lossy()))
        .await
        .unwrap();
    assert!(h.gateway.memory.get_by_index(1).await.unwrap().is_some());

    h.gateway.lifecycle.activate(USER).await.unwrap();
    h.gateway.handle_event(event("when are you open?")).await;

    assert_eq!(h.channel.sent_texts(), vec!["Here are our opening hours.".to_string()]);
    assert_eq!(h.channel.photos.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exchange_lands_in_history() {
    let h = harness(MockProvider::with_response("Sure thing")).await;

    let activation = h.gateway.lifecycle.activate(USER).await.unwrap();
    h.gateway.handle_event(event("hello")).await;

    let history = h.gateway.memory.history(&activation.conversation_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[0].content, "hello");
    assert_eq!(history[1].role, "assistant");
    assert_eq!(history[1].content, "Sure thing");
}
