//! Handler adapter: the dispatch path as a plain callable.
//!
//! Turns a schema plus a handler map into a single `(event, data) ->
//! response` function with no real transport behind it. Internally this is
//! a full engine over a degenerate transport whose `send` is a no-op and
//! whose `recv` just captures the dispatch closure, so validation and
//! middleware behave exactly as they do on a live link.

use crate::error::{Error, Result};
use crate::middleware::{HandlerFn, Middleware};
use crate::sdk::Sdk;
use crate::transport::{RecvHandler, Transport, Unsubscribe};
use crate::validate::{AcceptAll, Validator};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tt_protocol::{CallId, Envelope, Routing, SchemaRegistry};

/// Transport that cannot send and only captures the dispatch closure.
#[derive(Default)]
struct NullTransport {
    captured: Mutex<Option<RecvHandler>>,
}

impl NullTransport {
    fn take_captured(&self) -> Option<RecvHandler> {
        self.captured.lock().take()
    }
}

impl Transport for NullTransport {
    fn send(&self, _event: &str, _data: Value, _routing: &Routing) -> Result<()> {
        Ok(())
    }

    fn recv(&self, handler: RecvHandler, _routing: &Routing) -> Option<Unsubscribe> {
        *self.captured.lock() = Some(handler);
        None
    }
}

/// Directly callable dispatcher over a schema and handler map.
pub struct LocalHandler {
    dispatch: RecvHandler,
    schema: SchemaRegistry,
    caller: Routing,
    next_call: AtomicU64,
}

impl LocalHandler {
    /// Starts configuring an adapter for the given schema. Defaults to
    /// mandatory-complete mode: the handler map must cover every event.
    pub fn builder(schema: SchemaRegistry) -> LocalHandlerBuilder {
        LocalHandlerBuilder {
            schema,
            handlers: Vec::new(),
            middleware: Vec::new(),
            validator: Arc::new(AcceptAll),
            complete: true,
        }
    }

    /// Invokes the handler for one event, reusing the engine's validation
    /// and middleware path. Events outside the schema are rejected; events
    /// left unhandled in optional-complete mode resolve to `Value::Null`.
    pub async fn call(&self, event: &str, data: Value) -> Result<Value> {
        if !self.schema.contains(event) {
            return Err(Error::UnknownEvent(event.to_string()));
        }
        let n = self.next_call.fetch_add(1, Ordering::SeqCst);
        let id = CallId::new(&self.caller.local_app_id, event, format!("local{n:07}"));
        let envelope = Envelope::outbound(id.to_string(), data, &self.caller);
        match (self.dispatch)(envelope).await? {
            Some(value) => Ok(value),
            None => Ok(Value::Null),
        }
    }
}

/// Builder for [`LocalHandler`].
pub struct LocalHandlerBuilder {
    schema: SchemaRegistry,
    handlers: Vec<(String, HandlerFn)>,
    middleware: Vec<(String, Middleware)>,
    validator: Arc<dyn Validator>,
    complete: bool,
}

impl LocalHandlerBuilder {
    /// Registers the terminal handler for an event.
    pub fn handler<F, Fut>(mut self, event: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        self.handlers
            .push((event.into(), crate::middleware::handler_fn(f)));
        self
    }

    /// Appends a middleware for an event.
    pub fn middleware<F, Fut>(mut self, event: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, HandlerFn) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        self.middleware
            .push((event.into(), crate::middleware::middleware_fn(f)));
        self
    }

    /// Plugs in the schema validation capability.
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Switches between mandatory-complete (the default) and
    /// optional-complete handler maps.
    pub fn complete(mut self, complete: bool) -> Self {
        self.complete = complete;
        self
    }

    /// Builds the callable dispatcher.
    pub fn build(self) -> Result<LocalHandler> {
        let transport = Arc::new(NullTransport::default());
        // Two synthetic ids keep the engine's "reply or request?" check
        // pointing every local call at the dispatch path.
        let engine_routing = Routing::new("local-handler", "local-caller");
        let caller = engine_routing.reversed();

        let mut builder = Sdk::builder(
            Arc::clone(&transport) as Arc<dyn Transport>,
            SchemaRegistry::empty(),
            self.schema.clone(),
            engine_routing,
        )
        .complete(self.complete)
        .validator(self.validator);
        for (event, handler) in self.handlers {
            builder = builder.handler_boxed(event, handler);
        }
        for (event, mw) in self.middleware {
            builder = builder.middleware_boxed(event, mw);
        }
        // The engine lives on inside the captured dispatch closure; the
        // Sdk handle itself has nothing further to offer here.
        let _sdk = builder.build()?;

        let dispatch = transport
            .take_captured()
            .expect("engine construction always registers its dispatcher");

        Ok(LocalHandler {
            dispatch,
            schema: self.schema,
            caller,
            next_call: AtomicU64::new(0),
        })
    }
}
