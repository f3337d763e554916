//! Error types for the Loopwright domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Only [`ProviderError`], [`PlanError`] and [`TranscriptError`] ever reach
//! the caller of an agent run. [`ActionError`] is always converted into
//! action-result text inside the turn executor, and [`RegistryError`] can
//! only happen while a registry is being built.

use thiserror::Error;

/// The top-level error type for all Loopwright operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Action errors ---
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    // --- Registry construction ---
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Planning ---
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    // --- Transcript invariants ---
    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),

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
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

/// Failures of a single action invocation.
///
/// `Unknown` is the unknown-action condition; every other variant is an
/// action execution failure.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Unknown action: {0}")]
    Unknown(String),

    #[error("Action execution failed: {action} — {reason}")]
    ExecutionFailed { action: String, reason: String },

    #[error("Action timed out: {action} after {timeout_secs}s")]
    Timeout { action: String, timeout_secs: u64 },

    #[error("Permission denied: {action} — {reason}")]
    PermissionDenied { action: String, reason: String },

    #[error("Invalid action arguments: {0}")]
    InvalidArguments(String),

    #[error("Action cancelled: {0}")]
    Cancelled(String),
}

/// Errors raised while building an action registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate action: {0}")]
    Duplicate(String),

    #[error("Invalid schema for action '{action}': {reason}")]
    InvalidSchema { action: String, reason: String },
}

/// Errors raised by the plan manager.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Could not parse plan: {reason}")]
    Parse { reason: String, raw: String },

    #[error("Plan has no steps")]
    EmptyPlan,
}

/// Violations of the request/result pairing in a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("Action request '{0}' has no result")]
    Unanswered(String),

    #[error("Action result '{0}' does not match any open request")]
    Orphan(String),

    #[error("Action request '{0}' was answered more than once")]
    Duplicate(String),
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
    fn action_error_displays_correctly() {
        let err = Error::Action(ActionError::PermissionDenied {
            action: "shell".into(),
            reason: "command not in allowlist".into(),
        });
        assert!(err.to_string().contains("shell"));
        assert!(err.to_string().contains("allowlist"));
    }

    #[test]
    fn transient_classification() {
        assert!(ProviderError::Network("reset".into()).is_transient());
        assert!(ProviderError::RateLimited { retry_after_secs: 1 }.is_transient());
        assert!(ProviderError::ApiError { status_code: 503, message: String::new() }.is_transient());
        assert!(!ProviderError::ApiError { status_code: 400, message: String::new() }.is_transient());
        assert!(!ProviderError::AuthenticationFailed("bad key".into()).is_transient());
        assert!(!ProviderError::Cancelled.is_transient());
    }
}
