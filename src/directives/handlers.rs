//! Directive handlers — each turns parsed params plus the execution
//! context into a natural-language reply and booking side effects.
//!
//! Friendly by contract: missing params, unknown appointments, and empty
//! result sets are normal conversation, never errors. Only transport/DB
//! failures propagate as `Err`.

use super::{ExecutionContext, ParsedDirective};
use chrono::{NaiveDate, NaiveTime};
use maitre_core::{
    booking::{BookingContext, BookingOutcome, CancelOutcome},
    config::ReplyTexts,
    error::MaitreError,
    traits::BookingService,
};

/// What a handler hands back to the executor.
#[derive(Debug, Default)]
pub(super) struct HandlerReply {
    /// Replaces the directive's span. May be empty.
    pub text: String,
    /// A confirmed terminal outcome (e.g. successful booking).
    pub ends_conversation: bool,
    /// Free-form record of the subsystem call, for the audit log.
    pub side_effect: Option<String>,
}

impl HandlerReply {
    fn text_only(text: String) -> Self {
        Self {
            text,
            ..Default::default()
        }
    }
}

/// Accepted date formats — the model usually emits ISO, people-facing
/// configs sometimes use day-first.
fn parse_date(s: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s.trim(), fmt).ok())
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    const FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s.trim(), fmt).ok())
}

/// `[ABORT_BOOKING]` — drop the current flow. The model's own prose
/// carries the confirmation, so the replacement is empty.
pub(super) fn abort_booking(ctx: &ExecutionContext) -> HandlerReply {
    HandlerReply {
        text: String::new(),
        ends_conversation: false,
        side_effect: Some(format!("abort_flow(user={})", ctx.user_id)),
    }
}

/// `[CHECK_AVAILABILITY: date=…, service=…]`
pub(super) async fn check_availability(
    booking: &dyn BookingService,
    texts: &ReplyTexts,
    directive: &ParsedDirective,
) -> Result<HandlerReply, MaitreError> {
    let Some(date_raw) = directive.param("date") else {
        return Ok(HandlerReply::text_only(texts.ask_date.clone()));
    };
    let Some(date) = parse_date(date_raw) else {
        return Ok(HandlerReply::text_only(texts.bad_date.clone()));
    };
    let service = directive.param("service");

    let slots = booking.query_availability(date, service).await?;
    let date_str = date.format("%Y-%m-%d").to_string();

    if slots.is_empty() {
        return Ok(HandlerReply {
            text: ReplyTexts::fill(&texts.no_slots, &date_str, "", ""),
            ends_conversation: false,
            side_effect: Some(format!("query_availability({date_str}) -> 0 slots")),
        });
    }

    let mut lines = vec![ReplyTexts::fill(&texts.slots_header, &date_str, "", "")];
    for slot in &slots {
        lines.push(format!("• {}", slot.time.format("%H:%M")));
    }

    Ok(HandlerReply {
        text: lines.join("\n"),
        ends_conversation: false,
        side_effect: Some(format!(
            "query_availability({date_str}) -> {} slots",
            slots.len()
        )),
    })
}

/// `[LIST_APPOINTMENTS]`
pub(super) async fn list_appointments(
    booking: &dyn BookingService,
    texts: &ReplyTexts,
    ctx: &ExecutionContext,
) -> Result<HandlerReply, MaitreError> {
    let appointments = booking.list(&ctx.user_id).await?;

    if appointments.is_empty() {
        return Ok(HandlerReply {
            text: texts.no_appointments.clone(),
            ends_conversation: false,
            side_effect: Some(format!("list(user={}) -> empty", ctx.user_id)),
        });
    }

    let mut lines = vec![texts.appointments_header.clone()];
    for a in &appointments {
        let service = a
            .service
            .as_deref()
            .map(|s| format!(" ({s})"))
            .unwrap_or_default();
        lines.push(format!(
            "• #{} — {} {}{service}",
            a.id,
            a.date.format("%Y-%m-%d"),
            a.time.format("%H:%M"),
        ));
    }

    Ok(HandlerReply {
        text: lines.join("\n"),
        ends_conversation: false,
        side_effect: Some(format!(
            "list(user={}) -> {} appointments",
            ctx.user_id,
            appointments.len()
        )),
    })
}

/// `[CANCEL_APPOINTMENT: id=…]`
pub(super) async fn cancel_appointment(
    booking: &dyn BookingService,
    texts: &ReplyTexts,
    directive: &ParsedDirective,
) -> Result<HandlerReply, MaitreError> {
    let Some(id) = directive.param("id") else {
        return Ok(HandlerReply::text_only(texts.ask_cancel_id.clone()));
    };

    match booking.cancel(id).await? {
        CancelOutcome::Cancelled => Ok(HandlerReply {
            text: ReplyTexts::fill(&texts.cancelled, "", "", id),
            ends_conversation: false,
            side_effect: Some(format!("cancel({id}) -> cancelled")),
        }),
        CancelOutcome::NotFound => Ok(HandlerReply {
            text: texts.cancel_not_found.clone(),
            ends_conversation: false,
            side_effect: Some(format!("cancel({id}) -> not_found")),
        }),
    }
}

/// `[BOOK_APPOINTMENT: date=…, time=…, service=…]`
///
/// A confirmed booking is the terminal outcome of the whole flow —
/// the conversation finishes after this reply.
pub(super) async fn book_appointment(
    booking: &dyn BookingService,
    texts: &ReplyTexts,
    ctx: &ExecutionContext,
    directive: &ParsedDirective,
) -> Result<HandlerReply, MaitreError> {
    if ctx.user_id.is_empty() {
        return Ok(HandlerReply::text_only(texts.missing_user.clone()));
    }

    let (Some(date_raw), Some(time_raw)) = (directive.param("date"), directive.param("time"))
    else {
        return Ok(HandlerReply::text_only(texts.ask_booking_details.clone()));
    };
    let (Some(date), Some(time)) = (parse_date(date_raw), parse_time(time_raw)) else {
        return Ok(HandlerReply::text_only(texts.ask_booking_details.clone()));
    };

    let booking_ctx = BookingContext {
        user_id: ctx.user_id.clone(),
        user_name: ctx.user_name.clone(),
    };
    let service = directive.param("service");

    match booking.book(date, time, service, &booking_ctx).await? {
        BookingOutcome::Confirmed(appointment) => Ok(HandlerReply {
            text: ReplyTexts::fill(
                &texts.booking_confirmed,
                &appointment.date.format("%Y-%m-%d").to_string(),
                &appointment.time.format("%H:%M").to_string(),
                &appointment.id,
            ),
            ends_conversation: true,
            side_effect: Some(format!(
                "book({} {}) -> confirmed #{}",
                appointment.date, appointment.time, appointment.id
            )),
        }),
        BookingOutcome::Unavailable => Ok(HandlerReply {
            text: texts.slot_taken.clone(),
            ends_conversation: false,
            side_effect: Some(format!("book({date} {time}) -> unavailable")),
        }),
    }
}
