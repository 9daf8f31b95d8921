//! # maitre-channels
//!
//! Chat transport integration. Currently WhatsApp, via the `whatsapp-rust`
//! implementation of the WhatsApp Web protocol.
//!
//! Unlike a typical bot bridge, this channel forwards the operator's own
//! outgoing messages (`from_me`) to the gateway — the manual-takeover
//! signal lives in that traffic.

pub mod session_store;
pub mod whatsapp;

pub use whatsapp::WhatsAppChannel;
