//! Error types for parley-core.

use thiserror::Error;

/// Result type alias using parley-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while routing a dialogue cycle.
#[derive(Error, Debug)]
pub enum Error {
    /// A single paid generation call failed. Recovered locally by the
    /// responder that made the call; never escapes past the controller.
    #[error("generation error: {provider} - {message}")]
    Generation {
        provider: String,
        message: String,
    },

    /// The generation backend is unreachable after its retry budget.
    /// Surfaced to the channel transport as a retryable failure.
    #[error("generation backend unavailable: {0}")]
    GenerationUnavailable(String),

    /// A domain graph hit its iteration cap before the supervisor
    /// signalled completion.
    #[error("routing exhausted after {iterations} iterations in domain '{domain}'")]
    RoutingExhausted { domain: String, iterations: u32 },

    /// A worker set or domain catalog is mis-wired. Fatal at startup,
    /// never raised per-request.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Cycle deadline expired
    #[error("cycle timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Conversation history persistence error
    #[error("history storage error: {0}")]
    History(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a single-call generation error.
    pub fn generation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a backend-unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::GenerationUnavailable(message.into())
    }

    /// Create a routing-exhausted error.
    pub fn routing_exhausted(domain: impl Into<String>, iterations: u32) -> Self {
        Self::RoutingExhausted {
            domain: domain.into(),
            iterations,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// True if the caller may retry the whole cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GenerationUnavailable(_) | Self::Timeout { .. })
    }
}
