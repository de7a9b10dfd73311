//! Structured correlation ids.
//!
//! A call id is `{localAppId}:{eventName}:{random}`: the first segment
//! tells a receiver which side originated the call, the middle segment
//! carries the event name so no side table is needed, and the last segment
//! makes concurrent calls to the same event distinct. A liveness pulse for
//! a call reuses its id with a trailing `:processing` marker.

use std::fmt;
use thiserror::Error;

/// Trailing segment marking a liveness pulse rather than a response.
pub const PROCESSING_MARKER: &str = "processing";

/// Errors from parsing a wire string as a call id.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallIdError {
    /// The string does not have the `{app}:{event}:{random}` segment shape.
    #[error("malformed call id: '{0}'")]
    Malformed(String),
}

/// Parsed correlation id for one in-flight call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallId {
    app_id: String,
    event_name: String,
    suffix: String,
    processing: bool,
}

impl CallId {
    /// Builds the id for a fresh call. Segment contents are not validated
    /// here; app ids and event names are constrained to be colon-free at
    /// registry and routing construction.
    pub fn new(
        app_id: impl Into<String>,
        event_name: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            event_name: event_name.into(),
            suffix: suffix.into(),
            processing: false,
        }
    }

    /// Parses a wire `event` field. Accepts exactly three segments, or four
    /// where the last is the processing marker.
    pub fn parse(raw: &str) -> Result<Self, CallIdError> {
        let parts: Vec<&str> = raw.split(':').collect();
        let (parts, processing) = match parts.as_slice() {
            [a, e, s] => ([*a, *e, *s], false),
            [a, e, s, marker] if *marker == PROCESSING_MARKER => ([*a, *e, *s], true),
            _ => return Err(CallIdError::Malformed(raw.to_string())),
        };
        if parts.iter().any(|p| p.is_empty()) {
            return Err(CallIdError::Malformed(raw.to_string()));
        }
        Ok(Self {
            app_id: parts[0].to_string(),
            event_name: parts[1].to_string(),
            suffix: parts[2].to_string(),
            processing,
        })
    }

    /// Application id of the side that originated the call.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Event name encoded in the id.
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// True if this id carries the processing marker.
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// The same id with the processing marker stripped. Used to look up the
    /// pending call a pulse belongs to.
    pub fn base(&self) -> Self {
        Self {
            processing: false,
            ..self.clone()
        }
    }

    /// The pulse id for this call.
    pub fn processing(&self) -> Self {
        Self {
            processing: true,
            ..self.clone()
        }
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.app_id, self.event_name, self.suffix)?;
        if self.processing {
            write!(f, ":{PROCESSING_MARKER}")?;
        }
        Ok(())
    }
}
