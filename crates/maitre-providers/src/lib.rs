//! # maitre-providers
//!
//! Language-model gateway implementations. Each backend implements
//! `maitre_core::traits::Provider`; the gateway never sees past the trait.

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
