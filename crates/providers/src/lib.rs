//! LLM provider adapters for Capstan.
//!
//! All adapters implement the `capstan_core::Provider` trait and translate
//! the canonical conversation to one backend wire protocol and back.
//! The router builds the single active adapter from configuration.

mod http;

pub mod anthropic;
pub mod gemini;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ActiveProvider, build_from_config};

/// Inserted when a backend requires the first turn to be user-authored and
/// the view starts with something else. Never enters the canonical history.
pub const SYNTHETIC_USER_TURN: &str = "(continuing the conversation)";

/// Sent in place of a blank final answer when it is replayed upstream.
/// Anthropic and Gemini reject empty assistant turns.
pub const EMPTY_ASSISTANT_TURN: &str = "(no response)";
