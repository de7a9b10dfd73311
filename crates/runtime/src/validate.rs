//! Pluggable schema validation seam.
//!
//! Parsing a JSON value against a declared shape is an external capability:
//! the engine calls through this trait and never interprets shapes itself.
//! Hosts plug in whatever validation library they already use.

use crate::error::Result;
use serde_json::Value;

/// Validates a payload against a declared shape.
///
/// On success returns the (possibly normalized) value; on failure returns
/// [`crate::Error::Validation`], which the engine propagates unwrapped to
/// whichever await chain triggered the parse.
pub trait Validator: Send + Sync {
    fn validate(&self, shape: &Value, value: &Value) -> Result<Value>;
}

/// Pass-through validator accepting every payload. The default when no
/// validator is supplied.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _shape: &Value, value: &Value) -> Result<Value> {
        Ok(value.clone())
    }
}

/// Adapter lifting a plain function into a [`Validator`].
pub struct FnValidator<F>(pub F);

impl<F> Validator for FnValidator<F>
where
    F: Fn(&Value, &Value) -> Result<Value> + Send + Sync,
{
    fn validate(&self, shape: &Value, value: &Value) -> Result<Value> {
        (self.0)(shape, value)
    }
}
