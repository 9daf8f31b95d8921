//! Domain types for the booking/availability subsystem.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// A bookable time slot on a given date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// Service/category this slot belongs to, when schedules differ per service.
    pub service: Option<String>,
}

/// A booked appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub service: Option<String>,
}

/// Everything the booking subsystem needs to know about the person booking.
#[derive(Debug, Clone)]
pub struct BookingContext {
    /// Canonical user id.
    pub user_id: String,
    /// Display name, when known.
    pub user_name: Option<String>,
}

/// Result of a booking attempt.
#[derive(Debug, Clone)]
pub enum BookingOutcome {
    /// Slot was free and is now booked.
    Confirmed(Appointment),
    /// Slot already taken (or outside business hours).
    Unavailable,
}

/// Result of a cancellation attempt. Not-found is an expected outcome,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
}

/// A pre-authored canned reply, addressed by index.
#[derive(Debug, Clone, Default)]
pub struct CannedReply {
    pub text: String,
    /// Path to an optional media file sent alongside the text.
    pub media_path: Option<String>,
}
