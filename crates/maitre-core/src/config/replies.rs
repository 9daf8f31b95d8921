use serde::{Deserialize, Serialize};

/// Prompts fed to the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompts {
    /// System prompt — assistant persona plus the directive protocol.
    #[serde(default = "default_system")]
    pub system: String,
    /// Greeting sent when a conversation is activated. The activating
    /// event gets this message and nothing else.
    #[serde(default = "default_opening")]
    pub opening: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            system: default_system(),
            opening: default_opening(),
        }
    }
}

fn default_system() -> String {
    "You are a scheduling assistant chatting with a client over WhatsApp.\n\
     You help them check availability, book, list, and cancel appointments.\n\
     Answer in the client's own language, briefly and warmly.\n\n\
     To act, embed directives in your reply. They are executed and replaced\n\
     with their results before the client sees anything:\n\
     - [CHECK_AVAILABILITY: date=YYYY-MM-DD, service=<optional>] — free slots for a date\n\
     - [BOOK_APPOINTMENT: date=YYYY-MM-DD, time=HH:MM, service=<optional>] — book a slot\n\
     - [LIST_APPOINTMENTS] — the client's upcoming appointments\n\
     - [CANCEL_APPOINTMENT: id=<appointment id>] — cancel one\n\
     - [ABORT_BOOKING] — the client changed their mind; drop the current flow\n\
     - [INDEX=N] — send pre-authored reply number N instead of free text\n\n\
     When the conversation is over and nothing remains to do, end your reply\n\
     with [CONVERSATION_DONE] on its own line. If the client needs a human,\n\
     end with [HUMAN_HANDOFF]."
        .to_string()
}

fn default_opening() -> String {
    "Hi! I'm the scheduling assistant. I can check availability, book, \
     or cancel appointments for you. What would you like to do?"
        .to_string()
}

/// Natural-language texts returned by directive handlers.
///
/// `{date}`, `{time}`, `{id}` placeholders are substituted by the handler.
/// Friendly by design: not-found and missing-parameter cases are normal
/// conversation, never errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyTexts {
    #[serde(default = "default_ask_date")]
    pub ask_date: String,
    #[serde(default = "default_bad_date")]
    pub bad_date: String,
    #[serde(default = "default_slots_header")]
    pub slots_header: String,
    #[serde(default = "default_no_slots")]
    pub no_slots: String,
    #[serde(default = "default_no_appointments")]
    pub no_appointments: String,
    #[serde(default = "default_appointments_header")]
    pub appointments_header: String,
    #[serde(default = "default_ask_cancel_id")]
    pub ask_cancel_id: String,
    #[serde(default = "default_cancelled")]
    pub cancelled: String,
    #[serde(default = "default_cancel_not_found")]
    pub cancel_not_found: String,
    #[serde(default = "default_ask_booking_details")]
    pub ask_booking_details: String,
    #[serde(default = "default_booking_confirmed")]
    pub booking_confirmed: String,
    #[serde(default = "default_slot_taken")]
    pub slot_taken: String,
    #[serde(default = "default_missing_user")]
    pub missing_user: String,
}

impl Default for ReplyTexts {
    fn default() -> Self {
        Self {
            ask_date: default_ask_date(),
            bad_date: default_bad_date(),
            slots_header: default_slots_header(),
            no_slots: default_no_slots(),
            no_appointments: default_no_appointments(),
            appointments_header: default_appointments_header(),
            ask_cancel_id: default_ask_cancel_id(),
            cancelled: default_cancelled(),
            cancel_not_found: default_cancel_not_found(),
            ask_booking_details: default_ask_booking_details(),
            booking_confirmed: default_booking_confirmed(),
            slot_taken: default_slot_taken(),
            missing_user: default_missing_user(),
        }
    }
}

fn default_ask_date() -> String {
    "Which date should I check? (for example 2026-03-12)".into()
}
fn default_bad_date() -> String {
    "I couldn't read that date — could you give it as YYYY-MM-DD?".into()
}
fn default_slots_header() -> String {
    "Free slots on {date}:".into()
}
fn default_no_slots() -> String {
    "There are no free slots on {date}. Want me to check another day?".into()
}
fn default_no_appointments() -> String {
    "You have no upcoming appointments.".into()
}
fn default_appointments_header() -> String {
    "Your upcoming appointments:".into()
}
fn default_ask_cancel_id() -> String {
    "Which appointment should I cancel? Ask me to list them if you're unsure.".into()
}
fn default_cancelled() -> String {
    "Done — appointment {id} is cancelled.".into()
}
fn default_cancel_not_found() -> String {
    "I couldn't find that appointment — it may already be cancelled.".into()
}
fn default_ask_booking_details() -> String {
    "To book I need a date and a time, like 2026-03-12 at 10:30.".into()
}
fn default_booking_confirmed() -> String {
    "Booked! You're down for {date} at {time}. See you then \u{1f4c5}".into()
}
fn default_slot_taken() -> String {
    "That slot was just taken. Want me to list what's still free?".into()
}
fn default_missing_user() -> String {
    "I can't place the booking yet — I'm missing your contact details.".into()
}

impl ReplyTexts {
    /// Substitute `{date}`, `{time}`, `{id}` placeholders.
    pub fn fill(template: &str, date: &str, time: &str, id: &str) -> String {
        template
            .replace("{date}", date)
            .replace("{time}", time)
            .replace("{id}", id)
    }
}
