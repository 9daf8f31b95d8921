//! Serde default helpers for the config structs.

pub(super) fn default_name() -> String {
    "Maitre".to_string()
}
pub(super) fn default_data_dir() -> String {
    "~/.maitre".to_string()
}
pub(super) fn default_log_level() -> String {
    "info".to_string()
}
pub(super) fn default_db_path() -> String {
    "~/.maitre/memory.db".to_string()
}
pub(super) fn default_max_context() -> usize {
    30
}
pub(super) fn default_booking_db_path() -> String {
    "~/.maitre/booking.db".to_string()
}
pub(super) fn default_open_time() -> String {
    "09:00".to_string()
}
pub(super) fn default_close_time() -> String {
    "18:00".to_string()
}
pub(super) fn default_slot_minutes() -> u32 {
    30
}
pub(super) fn default_anthropic_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
pub(super) fn default_openai_model() -> String {
    "gpt-4o".to_string()
}
pub(super) fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
pub(super) fn default_provider() -> String {
    "anthropic".to_string()
}
