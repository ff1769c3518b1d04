//! # Capstan Core
//!
//! Domain types, traits, and error definitions for the Capstan agent runtime.
//! This crate has no framework dependencies. It defines the canonical
//! conversation model that every provider adapter translates to and from,
//! plus the seams (provider, tool, memory, retrieval, skill store) that the
//! other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is a trait here. Implementations live in their
//! respective crates, which keeps the dependency graph pointing inward and
//! lets tests swap in scripted fakes.

pub mod error;
pub mod knowledge;
pub mod memory;
pub mod message;
pub mod provider;
pub mod skill;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{
    Error, MemoryError, ProtocolViolation, ProviderError, Result, SkillError, ToolError,
};
pub use knowledge::{KnowledgeChunk, Retriever};
pub use memory::{MemoryRecord, MemoryStore};
pub use message::{Conversation, ConversationId, Message, Role, ToolCall};
pub use provider::{CapabilityDeclaration, NormalizedResponse, Provider, ProviderRequest};
pub use skill::{CategoryRecord, SkillRecord, SkillStore};
pub use tool::{Tool, ToolRegistry, ToolResult};
