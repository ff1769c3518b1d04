//! The agent loop for Capstan.
//!
//! Each user turn runs a **request → dispatch** cycle:
//!
//! 1. **Append** the user message to the session history
//! 2. **Window** the history (system messages + recent turns)
//! 3. **Send** the window and capability declarations to the provider
//! 4. **If calls**: answer each one, flush skill injections, loop back to 2
//! 5. **If text**: append it and return it
//!
//! Skills are enabled on demand: their instructions enter the history as
//! system messages once the current call batch is closed.

pub mod builtins;
pub mod loop_runner;
pub mod prompt;
pub mod skills;
pub mod state;
pub mod window;

pub use loop_runner::{AgentLoop, DEFAULT_MAX_ROUNDS};
pub use prompt::{SystemPromptBuilder, load_persona};
pub use skills::SkillController;
pub use state::ConversationState;
pub use window::{ContextWindow, fold_discovery_noise};
