//! Event schema registries.
//!
//! Each direction of a link declares a closed set of events it may issue:
//! the client schema lists calls the embedded side makes, the server schema
//! lists calls the host makes. A registry is pure data - shapes are opaque
//! JSON values interpreted by whatever validator the runtime is given.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One named event: a request shape and a response shape.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDefinition {
    /// Unique name within its registry. Colon-free, since the name is
    /// embedded as a call-id segment.
    pub name: String,
    /// Declared shape of the request payload.
    pub request_shape: Value,
    /// Declared shape of the response payload.
    pub response_shape: Value,
}

impl EventDefinition {
    pub fn new(name: impl Into<String>, request_shape: Value, response_shape: Value) -> Self {
        Self {
            name: name.into(),
            request_shape,
            response_shape,
        }
    }
}

/// Immutable set of event definitions keyed by name.
///
/// Cheap to clone and safe to share across concurrent calls. Insertion
/// order is irrelevant.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    events: Arc<HashMap<String, EventDefinition>>,
}

impl SchemaRegistry {
    /// Builds a registry from definitions.
    ///
    /// # Panics
    ///
    /// Panics on duplicate, empty, or colon-containing names. These are
    /// programming errors in the declared schema, not runtime conditions.
    pub fn new(definitions: impl IntoIterator<Item = EventDefinition>) -> Self {
        let mut events = HashMap::new();
        for def in definitions {
            assert!(
                !def.name.is_empty() && !def.name.contains(':'),
                "invalid event name: '{}'",
                def.name
            );
            let name = def.name.clone();
            assert!(
                events.insert(name.clone(), def).is_none(),
                "duplicate event name: '{name}'"
            );
        }
        Self {
            events: Arc::new(events),
        }
    }

    /// Registry with no events, for links that only call in one direction.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Looks up an event's declared shapes.
    pub fn get(&self, name: &str) -> Option<&EventDefinition> {
        self.events.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }

    /// Iterates over declared event names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
