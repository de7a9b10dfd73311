//! Error types for the typed-transport runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the typed-transport runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// No response arrived within the configured ceiling on a complete link.
    #[error("timeout: no response for '{event}' within {after_ms}ms")]
    Timeout {
        /// Event name of the call that timed out.
        event: String,
        /// Ceiling that elapsed, in milliseconds.
        after_ms: u64,
    },

    /// A payload did not match its declared shape.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An event name is not declared in the relevant schema.
    #[error("unknown event: '{0}'")]
    UnknownEvent(String),

    /// Mandatory-complete construction with a handler map that does not
    /// cover every server-schema event.
    #[error("no handler registered for server event '{0}'")]
    MissingHandler(String),

    /// Transport-level send failure where absence of the destination is
    /// deterministically detectable.
    #[error("transport error: {0}")]
    Transport(String),

    /// Correlation channel closed unexpectedly.
    #[error("channel closed unexpectedly")]
    ChannelClosed,

    /// Malformed correlation id on the wire.
    #[error(transparent)]
    CallId(#[from] tt_protocol::CallIdError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Shorthand for a validation failure with a reason.
    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Validation(reason.into())
    }
}
