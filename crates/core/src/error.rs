//! Error types for the Capstan domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum. [`Error`] is what a chat
//! turn can fail with; tool, memory and skill failures never reach it
//! because the loop turns them into tool-result text.

use thiserror::Error;

/// The top-level error type for all Capstan operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Conversation invariants ---
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    // --- Orchestration ---
    #[error("Round limit exceeded: no final answer after {rounds} round-trips")]
    RoundLimitExceeded { rounds: usize },
}

impl Error {
    /// True when the error means the conversation model or a backend payload
    /// broke the call/result contract. These are never recovered from.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::Protocol(_) | Error::Provider(ProviderError::Protocol(_))
        )
    }

    /// True for transport, backend and round-cap failures that end a single
    /// turn without corrupting state.
    pub fn is_backend(&self) -> bool {
        match self {
            Error::Provider(ProviderError::Protocol(_)) => false,
            Error::Provider(_) | Error::RoundLimitExceeded { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A breach of the call/result pairing contract, raised either by the
/// conversation model itself or by an adapter decoding a backend payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("tool result for '{call_id}' has no outstanding call")]
    UnmatchedResult { call_id: String },

    #[error("tool result message carries no call id")]
    MissingCallId,

    #[error("cannot append a {role} message while calls are outstanding: {pending:?}")]
    CallsOutstanding { role: String, pending: Vec<String> },

    #[error("call id '{0}' already used in this conversation")]
    DuplicateCallId(String),

    #[error("only assistant messages may carry calls (got {0})")]
    CallsOnNonAssistant(String),

    #[error("no (assistant call, tool result) exchange at index {index}")]
    NotAnExchange { index: usize },

    #[error("no preceding assistant call with id '{call_id}'")]
    UnknownCallName { call_id: String },

    #[error("malformed backend payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum SkillError {
    #[error("Skill '{0}' not found")]
    NotFound(String),

    #[error("Skill storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn conversation_breach_is_not_backend_class() {
        let err = Error::from(ProtocolViolation::UnmatchedResult {
            call_id: "c9".into(),
        });
        assert!(err.is_protocol_violation());
        assert!(!err.is_backend());
        assert!(err.to_string().contains("c9"));
    }

    #[test]
    fn malformed_payload_is_a_protocol_violation() {
        let err: Error =
            ProviderError::from(ProtocolViolation::Malformed("missing choices".into())).into();
        assert!(err.is_protocol_violation());
        assert!(!err.is_backend());
    }

    #[test]
    fn round_limit_is_backend_class() {
        let err = Error::RoundLimitExceeded { rounds: 25 };
        assert!(err.is_backend());
        assert!(!err.is_protocol_violation());
        assert!(err.to_string().contains("25"));
    }

    #[test]
    fn transport_failure_is_backend_class() {
        let err = Error::from(ProviderError::Network("connection refused".into()));
        assert!(err.is_backend());
    }
}
