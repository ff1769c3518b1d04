//! Memory and knowledge implementations for Capstan.

pub mod in_memory;
pub mod json_store;
pub mod knowledge;

pub use in_memory::InMemoryStore;
pub use json_store::JsonFileMemory;
pub use knowledge::KeywordRetriever;
