//! Error types for the Inkwell domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; all of them convert into
//! the top-level [`Error`].
//!
//! Display strings are part of the contract: the action executor and the
//! memory indexer classify failures by substring, so each variant names its
//! failure kind (`timeout`, `validation`, `not found`, ...) in its message.

use thiserror::Error;

/// The top-level error type for all Inkwell operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Reasoning errors ---
    #[error("Reasoning error: {0}")]
    Reasoning(#[from] ReasoningError),

    // --- Action errors ---
    #[error("Action error: {0}")]
    Action(#[from] ActionExecutionError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("LLM API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("LLM rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("LLM authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("LLM provider not configured: {0}")]
    NotConfigured(String),

    #[error("LLM request timeout: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Failures of the reasoning phase that cannot be recovered locally.
#[derive(Debug, Clone, Error)]
pub enum ReasoningError {
    #[error("LLM call failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("LLM response could not be parsed and carried no usable text: {0}")]
    Unparseable(String),
}

/// Failures of the act phase.
#[derive(Debug, Clone, Error)]
pub enum ActionExecutionError {
    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("Argument validation failed for {capability}: missing required argument '{argument}'")]
    MissingArgument { capability: String, argument: String },

    #[error(
        "Argument validation failed for {capability}: invalid argument '{argument}' (expected {expected}, found {found})"
    )]
    InvalidArgument {
        capability: String,
        argument: String,
        expected: String,
        found: String,
    },

    #[error("Capability {capability} hit its timeout after {timeout_secs}s")]
    Timeout { capability: String, timeout_secs: u64 },

    #[error("Capability {capability} execution failed: {reason}")]
    ExecutionFailed { capability: String, reason: String },
}

impl ActionExecutionError {
    /// The capability this error concerns.
    pub fn capability(&self) -> &str {
        match self {
            Self::CapabilityNotFound(name) => name,
            Self::MissingArgument { capability, .. }
            | Self::InvalidArgument { capability, .. }
            | Self::Timeout { capability, .. }
            | Self::ExecutionFailed { capability, .. } => capability,
        }
    }
}

/// Errors raised by a capability implementation itself.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted record in {stream}: {reason}")]
    Corrupted { stream: String, reason: String },
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
    fn missing_argument_names_the_argument() {
        let err = ActionExecutionError::MissingArgument {
            capability: "brainstorm".into(),
            argument: "topic".into(),
        };
        let text = err.to_string();
        assert!(text.contains("'topic'"));
        assert!(text.contains("validation"));
        assert_eq!(err.capability(), "brainstorm");
    }

    #[test]
    fn timeout_message_carries_timeout_keyword() {
        let err = ActionExecutionError::Timeout {
            capability: "outline".into(),
            timeout_secs: 60,
        };
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn reasoning_error_converts_to_top_level() {
        let err: Error = ReasoningError::RetriesExhausted {
            attempts: 3,
            last_error: "empty".into(),
        }
        .into();
        assert!(err.to_string().contains("3 attempts"));
    }
}
