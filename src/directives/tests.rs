use super::*;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use maitre_core::{
    booking::{Appointment, BookingContext, BookingOutcome, CancelOutcome, CannedReply, Slot},
    config::ReplyTexts,
    error::MaitreError,
    traits::{BookingService, ReplyStore},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

// --- Grammar ---

#[test]
fn test_parse_zero_argument_directive() {
    let directives = parse_named_directives("ok [ABORT_BOOKING] done");
    assert_eq!(directives.len(), 1);
    assert_eq!(directives[0].kind, DirectiveKind::AbortBooking);
    assert!(directives[0].params.is_empty());
    assert_eq!(&"ok [ABORT_BOOKING] done"[directives[0].span.clone()], "[ABORT_BOOKING]");
}

#[test]
fn test_parse_parameterized_directive() {
    let text = "[BOOK_APPOINTMENT: date=2026-03-12, time=10:30, service=haircut]";
    let directives = parse_named_directives(text);
    assert_eq!(directives.len(), 1);
    assert_eq!(directives[0].kind, DirectiveKind::BookAppointment);
    assert_eq!(directives[0].param("date"), Some("2026-03-12"));
    assert_eq!(directives[0].param("time"), Some("10:30"));
    assert_eq!(directives[0].param("service"), Some("haircut"));
}

#[test]
fn test_params_preserve_order_and_raw_values() {
    let params = parse_params("b=2, a = hello world , c=");
    assert_eq!(params[0], ("b".to_string(), "2".to_string()));
    assert_eq!(params[1], ("a".to_string(), "hello world".to_string()));
    // Empty value kept as a pair; param() filters it out.
    assert_eq!(params[2].0, "c");
}

#[test]
fn test_param_missing_and_empty() {
    let d = &parse_named_directives("[CANCEL_APPOINTMENT: id=]")[0];
    assert_eq!(d.param("id"), None);
    assert_eq!(d.param("nope"), None);
}

#[test]
fn test_unknown_name_is_typed_unknown() {
    let directives = parse_named_directives("[SOME_DIRECTIVE: x=1]");
    assert_eq!(
        directives[0].kind,
        DirectiveKind::Unknown("SOME_DIRECTIVE".into())
    );
}

#[test]
fn test_index_directive_not_a_named_match() {
    assert!(parse_named_directives("[INDEX=3]").is_empty());
    let indices = parse_index_directives("before [INDEX=3] after");
    assert_eq!(indices.len(), 1);
    assert_eq!(indices[0].kind, DirectiveKind::Canned(3));
    assert_eq!(&"before [INDEX=3] after"[indices[0].span.clone()], "[INDEX=3]");
}

#[test]
fn test_multiple_directives_in_order() {
    let text = "[LIST_APPOINTMENTS] and then [ABORT_BOOKING]";
    let directives = parse_named_directives(text);
    assert_eq!(directives.len(), 2);
    assert_eq!(directives[0].kind, DirectiveKind::ListAppointments);
    assert_eq!(directives[1].kind, DirectiveKind::AbortBooking);
}

#[test]
fn test_lowercase_brackets_are_not_directives() {
    assert!(parse_named_directives("see [this link] here").is_empty());
}

#[test]
fn test_classify_response() {
    let markers = vec!["[CONVERSATION_DONE]".to_string()];
    assert_eq!(classify_response("hello", &markers), ResponseKind::Prose);
    assert_eq!(
        classify_response("bye [CONVERSATION_DONE]", &markers),
        ResponseKind::Terminal {
            marker: "[CONVERSATION_DONE]".into()
        }
    );
    assert_eq!(
        classify_response("[LIST_APPOINTMENTS]", &markers),
        ResponseKind::ContainsDirectives
    );
    // Terminal wins even when directives are present.
    assert_eq!(
        classify_response("[BOOK_APPOINTMENT: date=x] [CONVERSATION_DONE]", &markers),
        ResponseKind::Terminal {
            marker: "[CONVERSATION_DONE]".into()
        }
    );
}

#[test]
fn test_collapse_whitespace_preserves_line_breaks() {
    let text = "Free slots:\n• 09:00\n• 09:30\n\n\n  spaced   out  ";
    let out = collapse_whitespace(text);
    assert_eq!(out, "Free slots:\n• 09:00\n• 09:30\n\nspaced out");
}

// --- Execution ---

#[derive(Default)]
struct FakeBooking {
    slots: Vec<NaiveTime>,
    appointments: Mutex<Vec<Appointment>>,
    book_succeeds: bool,
}

#[async_trait]
impl BookingService for FakeBooking {
    async fn query_availability(
        &self,
        date: NaiveDate,
        service: Option<&str>,
    ) -> Result<Vec<Slot>, MaitreError> {
        Ok(self
            .slots
            .iter()
            .map(|&time| Slot {
                date,
                time,
                service: service.map(str::to_string),
            })
            .collect())
    }

    async fn book(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        service: Option<&str>,
        ctx: &BookingContext,
    ) -> Result<BookingOutcome, MaitreError> {
        if !self.book_succeeds {
            return Ok(BookingOutcome::Unavailable);
        }
        let appointment = Appointment {
            id: "ab12cd34".into(),
            user_id: ctx.user_id.clone(),
            date,
            time,
            service: service.map(str::to_string),
        };
        self.appointments.lock().unwrap().push(appointment.clone());
        Ok(BookingOutcome::Confirmed(appointment))
    }

    async fn cancel(&self, appointment_id: &str) -> Result<CancelOutcome, MaitreError> {
        let mut appointments = self.appointments.lock().unwrap();
        let before = appointments.len();
        appointments.retain(|a| a.id != appointment_id);
        if appointments.len() < before {
            Ok(CancelOutcome::Cancelled)
        } else {
            Ok(CancelOutcome::NotFound)
        }
    }

    async fn list(&self, user_id: &str) -> Result<Vec<Appointment>, MaitreError> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct FakeReplies {
    replies: HashMap<u32, CannedReply>,
}

#[async_trait]
impl ReplyStore for FakeReplies {
    async fn get_by_index(&self, index: u32) -> Result<Option<CannedReply>, MaitreError> {
        Ok(self.replies.get(&index).cloned())
    }
}

fn executor(booking: FakeBooking, replies: FakeReplies) -> DirectiveExecutor {
    DirectiveExecutor::new(
        Arc::new(booking),
        Arc::new(replies),
        ReplyTexts::default(),
    )
}

fn ctx() -> ExecutionContext {
    ExecutionContext {
        user_id: "972501234567@s.whatsapp.net".into(),
        user_name: Some("Dana".into()),
    }
}

#[tokio::test]
async fn test_abort_directive_strips_and_keeps_confirmation_prose() {
    let exec = executor(FakeBooking::default(), FakeReplies::default());
    let out = exec
        .execute("ביטלתי את התהליך. [ABORT_BOOKING]", &ctx())
        .await
        .unwrap();
    assert!(!out.text.contains("ABORT_BOOKING"));
    assert!(!out.text.contains('['));
    assert!(out.text.contains("ביטלתי את התהליך."));
    assert!(!out.ends_conversation);
    assert_eq!(out.side_effects.len(), 1);
}

#[tokio::test]
async fn test_no_directive_leakage_ever() {
    let booking = FakeBooking {
        slots: vec![NaiveTime::from_hms_opt(9, 0, 0).unwrap()],
        ..Default::default()
    };
    let exec = executor(booking, FakeReplies::default());
    let out = exec
        .execute(
            "Here: [CHECK_AVAILABILITY: date=2026-03-12] and [SOME_DIRECTIVE: x=1] done",
            &ctx(),
        )
        .await
        .unwrap();
    assert!(!out.text.contains('['));
    assert!(!out.text.contains(']'));
    assert!(out.text.contains("09:00"));
}

#[tokio::test]
async fn test_availability_lists_one_slot_per_line() {
    let booking = FakeBooking {
        slots: vec![
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        ],
        ..Default::default()
    };
    let exec = executor(booking, FakeReplies::default());
    let out = exec
        .execute("[CHECK_AVAILABILITY: date=2026-03-12]", &ctx())
        .await
        .unwrap();
    let lines: Vec<&str> = out.text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("09:00"));
    assert!(lines[2].contains("09:30"));
}

#[tokio::test]
async fn test_availability_missing_date_is_friendly() {
    let exec = executor(FakeBooking::default(), FakeReplies::default());
    let out = exec.execute("[CHECK_AVAILABILITY]", &ctx()).await.unwrap();
    assert_eq!(out.text, ReplyTexts::default().ask_date);
}

#[tokio::test]
async fn test_booking_success_ends_conversation() {
    let booking = FakeBooking {
        book_succeeds: true,
        ..Default::default()
    };
    let exec = executor(booking, FakeReplies::default());
    let out = exec
        .execute(
            "All set! [BOOK_APPOINTMENT: date=2026-03-12, time=10:30]",
            &ctx(),
        )
        .await
        .unwrap();
    assert!(out.ends_conversation);
    assert!(out.text.contains("2026-03-12"));
    assert!(out.text.contains("10:30"));
    assert!(!out.text.contains('['));
}

#[tokio::test]
async fn test_booking_taken_slot_is_friendly_and_not_terminal() {
    let exec = executor(FakeBooking::default(), FakeReplies::default());
    let out = exec
        .execute("[BOOK_APPOINTMENT: date=2026-03-12, time=10:30]", &ctx())
        .await
        .unwrap();
    assert!(!out.ends_conversation);
    assert_eq!(out.text, ReplyTexts::default().slot_taken);
}

#[tokio::test]
async fn test_booking_missing_user_context_is_friendly() {
    let booking = FakeBooking {
        book_succeeds: true,
        ..Default::default()
    };
    let exec = executor(booking, FakeReplies::default());
    let no_user = ExecutionContext {
        user_id: String::new(),
        user_name: None,
    };
    let out = exec
        .execute("[BOOK_APPOINTMENT: date=2026-03-12, time=10:30]", &no_user)
        .await
        .unwrap();
    assert!(!out.ends_conversation);
    assert_eq!(out.text, ReplyTexts::default().missing_user);
}

#[tokio::test]
async fn test_cancel_not_found_is_friendly() {
    let exec = executor(FakeBooking::default(), FakeReplies::default());
    let out = exec
        .execute("[CANCEL_APPOINTMENT: id=zzz]", &ctx())
        .await
        .unwrap();
    assert_eq!(out.text, ReplyTexts::default().cancel_not_found);
    assert!(!out.ends_conversation);
}

#[tokio::test]
async fn test_empty_list_is_friendly() {
    let exec = executor(FakeBooking::default(), FakeReplies::default());
    let out = exec.execute("[LIST_APPOINTMENTS]", &ctx()).await.unwrap();
    assert_eq!(out.text, ReplyTexts::default().no_appointments);
}

#[tokio::test]
async fn test_canned_reply_with_text_splice_and_media() {
    let mut replies = FakeReplies::default();
    replies.replies.insert(
        2,
        CannedReply {
            text: "Our opening hours:\n[TEXT]".into(),
            media_path: Some("/data/hours.png".into()),
        },
    );
    let exec = executor(FakeBooking::default(), replies);
    let out = exec
        .execute("We're open every weekday. [INDEX=2]", &ctx())
        .await
        .unwrap();
    assert_eq!(out.text, "Our opening hours:\nWe're open every weekday.");
    assert_eq!(out.media_paths, vec!["/data/hours.png".to_string()]);
}

#[tokio::test]
async fn test_canned_reply_without_placeholder_stands_alone() {
    let mut replies = FakeReplies::default();
    replies.replies.insert(
        0,
        CannedReply {
            text: "Standard greeting.".into(),
            media_path: None,
        },
    );
    let exec = executor(FakeBooking::default(), replies);
    let out = exec.execute("ignored prose [INDEX=0]", &ctx()).await.unwrap();
    assert_eq!(out.text, "Standard greeting.");
    assert!(out.media_paths.is_empty());
}

#[tokio::test]
async fn test_unknown_canned_index_drops_directive_keeps_prose() {
    let exec = executor(FakeBooking::default(), FakeReplies::default());
    let out = exec.execute("hello [INDEX=42] there", &ctx()).await.unwrap();
    assert_eq!(out.text, "hello there");
}

#[tokio::test]
async fn test_index_parsed_before_named_directives() {
    // The named directive precedes the index directive; its replacement
    // must not swallow the [INDEX=1] that follows in the string.
    let mut replies = FakeReplies::default();
    replies.replies.insert(
        1,
        CannedReply {
            text: "Canned: [TEXT]".into(),
            media_path: None,
        },
    );
    let exec = executor(FakeBooking::default(), replies);
    let out = exec
        .execute("[LIST_APPOINTMENTS] please hold [INDEX=1]", &ctx())
        .await
        .unwrap();
    assert!(out.text.starts_with("Canned:"));
    assert!(out.text.contains("please hold"));
    assert!(!out.text.contains('['));
}

#[tokio::test]
async fn test_multiple_named_directives_all_execute() {
    let booking = FakeBooking {
        slots: vec![NaiveTime::from_hms_opt(9, 0, 0).unwrap()],
        ..Default::default()
    };
    let exec = executor(booking, FakeReplies::default());
    let out = exec
        .execute(
            "[CHECK_AVAILABILITY: date=2026-03-12]\n[LIST_APPOINTMENTS]",
            &ctx(),
        )
        .await
        .unwrap();
    assert_eq!(out.side_effects.len(), 2);
    assert!(out.text.contains("09:00"));
    assert!(out.text.contains(ReplyTexts::default().no_appointments.as_str()));
}

#[tokio::test]
async fn test_directive_only_response_can_become_empty() {
    let exec = executor(FakeBooking::default(), FakeReplies::default());
    let out = exec.execute("[ABORT_BOOKING]", &ctx()).await.unwrap();
    assert!(out.text.is_empty());
}
