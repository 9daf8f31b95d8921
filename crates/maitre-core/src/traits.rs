use crate::{
    booking::{Appointment, BookingContext, BookingOutcome, CancelOutcome, CannedReply, Slot},
    context::Context,
    error::MaitreError,
    message::{InboundEvent, OutgoingMessage},
};
use async_trait::async_trait;
use chrono::NaiveDate;

/// AI Provider trait — the language-model gateway.
///
/// Every backend (Anthropic API, OpenAI-compatible, etc.) implements this
/// trait to provide a uniform interface. A failed call surfaces as an
/// error, never as a special text value.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Whether this provider requires an API key to function.
    fn requires_api_key(&self) -> bool;

    /// Send a conversation context to the provider and get a response.
    async fn complete(&self, context: &Context) -> Result<OutgoingMessage, MaitreError>;

    /// Check if the provider is available and ready.
    async fn is_available(&self) -> bool;
}

/// Messaging Channel trait — the chat transport.
///
/// The transport delivers *all* traffic of the paired account, including
/// the operator's own outgoing messages (`InboundEvent::from_me`), which
/// the gateway needs for manual-takeover detection.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start listening for events.
    /// Returns a receiver that yields inbound events.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<InboundEvent>, MaitreError>;

    /// Send a message back through this channel.
    async fn send(&self, message: OutgoingMessage) -> Result<(), MaitreError>;

    /// Send a typing indicator while a reply is being prepared.
    async fn send_typing(&self, _target: &str) -> Result<(), MaitreError> {
        Ok(())
    }

    /// Send a photo (image bytes) with an optional caption.
    async fn send_photo(
        &self,
        _target: &str,
        _image: &[u8],
        _caption: &str,
    ) -> Result<(), MaitreError> {
        Ok(())
    }

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), MaitreError>;
}

/// Booking/availability subsystem interface.
///
/// Directive handlers depend only on this trait; the sqlite-backed
/// implementation lives in `maitre-booking`.
#[async_trait]
pub trait BookingService: Send + Sync {
    /// Free slots for a date, optionally filtered by service.
    async fn query_availability(
        &self,
        date: NaiveDate,
        service: Option<&str>,
    ) -> Result<Vec<Slot>, MaitreError>;

    /// Book a slot for a user. A taken slot is an outcome, not an error.
    async fn book(
        &self,
        date: NaiveDate,
        time: chrono::NaiveTime,
        service: Option<&str>,
        ctx: &BookingContext,
    ) -> Result<BookingOutcome, MaitreError>;

    /// Cancel an appointment by id.
    async fn cancel(&self, appointment_id: &str) -> Result<CancelOutcome, MaitreError>;

    /// Upcoming appointments for a user (possibly empty).
    async fn list(&self, user_id: &str) -> Result<Vec<Appointment>, MaitreError>;
}

/// Canned-reply store, addressed by index.
#[async_trait]
pub trait ReplyStore: Send + Sync {
    /// Look up a canned reply; `None` when the index is unknown.
    async fn get_by_index(&self, index: u32) -> Result<Option<CannedReply>, MaitreError>;
}
