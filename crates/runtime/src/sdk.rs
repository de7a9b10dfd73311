//! The RPC engine: typed calls out, dispatched handlers in.
//!
//! An [`Sdk`] wraps one transport with the two schema registries of a link
//! and provides both directions at once:
//! - the client path: one async call per client-schema event, correlated
//!   by structured call id against a private pending table;
//! - the dispatch path: inbound server-schema requests validated, run
//!   through the event's middleware chain, and answered with a response
//!   envelope.
//!
//! # Message Flow
//!
//! 1. `call()` allocates a call id and registers a pending entry
//! 2. The request envelope goes out via `transport.send`
//! 3. The far side's dispatch validates, runs middleware + handler
//! 4. A slow handler triggers a `:processing` pulse after the grace period
//! 5. The response envelope comes back carrying the same call id
//! 6. The pending entry resolves; the caller validates the response shape
//!
//! Timeouts are purely local wall-clock timers. On a complete link (the far
//! side answers every request) an elapsed ceiling rejects the call; on an
//! incomplete link silence is a legitimate outcome and the call resolves to
//! `Value::Null`. There is no retry at this layer.

use crate::error::{Error, Result};
use crate::ids::{CallIdSuffix, RandomSuffix};
use crate::middleware::{HandlerFn, Middleware, compose, handler_fn, middleware_fn};
use crate::transport::{RecvHandler, Transport, Unsubscribe};
use crate::validate::{AcceptAll, Validator};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, oneshot};
use tt_protocol::{CallId, Envelope, Routing, SchemaRegistry};

/// Global default call ceiling, applied unless an event declares its own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Grace period before a still-running handler emits a `:processing` pulse.
pub const DEFAULT_GRACE: Duration = Duration::from_millis(50);

/// One in-flight call, owned exclusively by the engine that created it.
struct PendingCall {
    /// Resolves with `Some(raw payload)` on a reply, `None` on an
    /// incomplete-link timeout, or an error.
    reply: oneshot::Sender<Result<Option<Value>>>,
    /// Pulsed when a `:processing` envelope for this call arrives.
    pulse: Arc<Notify>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    routing: Routing,
    client_schema: SchemaRegistry,
    server_schema: SchemaRegistry,
    validator: Arc<dyn Validator>,
    call_ids: Arc<dyn CallIdSuffix>,
    handlers: HashMap<String, HandlerFn>,
    middleware: HashMap<String, Vec<Middleware>>,
    timeouts: HashMap<String, Duration>,
    default_timeout: Duration,
    grace: Duration,
    complete: bool,
    pending: Mutex<HashMap<String, PendingCall>>,
}

impl Inner {
    /// Handles one filtered inbound envelope: a reply or pulse for a call
    /// we made, or a request the far side made.
    async fn dispatch(self: Arc<Self>, envelope: Envelope) -> Result<Option<Value>> {
        let id = CallId::parse(&envelope.event)?;

        if id.app_id() == self.routing.local_app_id {
            self.resolve_reply(&id, envelope.data);
            return Ok(None);
        }

        let event = id.event_name().to_string();
        let Some(definition) = self.server_schema.get(&event) else {
            tracing::debug!(%event, "unknown event, ignored");
            return Ok(None);
        };
        let Some(handler) = self.handlers.get(&event) else {
            tracing::debug!(%event, "no handler registered, ignored");
            return Ok(None);
        };

        // A request shape mismatch is a caller-side bug, not a recoverable
        // condition: propagate, never answer.
        let request = self
            .validator
            .validate(&definition.request_shape, &envelope.data)?;

        let chain = self.middleware.get(&event).map(Vec::as_slice).unwrap_or(&[]);
        let effective = compose(chain, Arc::clone(handler));

        let mut work = effective(request);
        let value = tokio::select! {
            value = &mut work => value?,
            _ = tokio::time::sleep(self.grace) => {
                tracing::debug!(%event, "handler still running, sending processing pulse");
                let pulse = id.processing().to_string();
                if let Err(e) = self.transport.send(&pulse, Value::Null, &self.routing) {
                    tracing::debug!("failed to send processing pulse: {e}");
                }
                work.await?
            }
        };

        self.transport
            .send(&id.to_string(), value.clone(), &self.routing)?;
        Ok(Some(value))
    }

    /// Resolves a reply or pulse against the pending table. Unmatched ids
    /// are dropped silently: they are stale (a local timeout already
    /// reclaimed the slot) or forged, and both are expected noise.
    fn resolve_reply(&self, id: &CallId, data: Value) {
        if id.is_processing() {
            let key = id.base().to_string();
            match self.pending.lock().get(&key) {
                Some(pending) => {
                    tracing::debug!(call = %key, "processing pulse received");
                    pending.pulse.notify_one();
                }
                None => tracing::debug!(call = %key, "pulse for unknown call, dropped"),
            }
            return;
        }

        let key = id.to_string();
        match self.pending.lock().remove(&key) {
            Some(pending) => {
                let _ = pending.reply.send(Ok(Some(data)));
            }
            None => tracing::debug!(call = %key, "reply for unknown call, dropped"),
        }
    }
}

/// Typed bidirectional RPC endpoint over one transport.
///
/// Construct via [`Sdk::builder`]. Engines are fully independent: the
/// pending table and handler maps are private per-instance state, so one
/// engine per physical link coexists safely with others.
pub struct Sdk {
    inner: Arc<Inner>,
    unsubscribe: Mutex<Option<Unsubscribe>>,
}

impl Sdk {
    /// Starts configuring an engine for the given transport, schemas, and
    /// link identity.
    pub fn builder(
        transport: Arc<dyn Transport>,
        client_schema: SchemaRegistry,
        server_schema: SchemaRegistry,
        routing: Routing,
    ) -> SdkBuilder {
        SdkBuilder {
            transport,
            client_schema,
            server_schema,
            routing,
            validator: Arc::new(AcceptAll),
            call_ids: Arc::new(RandomSuffix),
            handlers: HashMap::new(),
            middleware: HashMap::new(),
            timeouts: HashMap::new(),
            default_timeout: DEFAULT_TIMEOUT,
            grace: DEFAULT_GRACE,
            complete: false,
        }
    }

    /// Issues one call for a client-schema event and awaits its outcome.
    ///
    /// Resolution is one of:
    /// - the far side's response, validated against the response shape;
    /// - `Value::Null` after the ceiling on an incomplete link;
    /// - `Err(Timeout)` after the ceiling on a complete link.
    pub async fn call(&self, event: &str, request: Value) -> Result<Value> {
        let inner = &self.inner;
        let definition = inner
            .client_schema
            .get(event)
            .ok_or_else(|| Error::UnknownEvent(event.to_string()))?;
        let response_shape = definition.response_shape.clone();

        let id = CallId::new(
            &inner.routing.local_app_id,
            event,
            inner.call_ids.suffix(),
        );
        let key = id.to_string();

        let (tx, rx) = oneshot::channel();
        let pulse = Arc::new(Notify::new());
        inner.pending.lock().insert(
            key.clone(),
            PendingCall {
                reply: tx,
                pulse: Arc::clone(&pulse),
            },
        );

        // A declared ceiling only matters when the far side is guaranteed
        // to answer; on an incomplete link the default always wins and
        // silence is a legitimate result.
        let configured = inner
            .timeouts
            .get(event)
            .copied()
            .unwrap_or(inner.default_timeout);
        let ceiling = if inner.complete {
            configured
        } else {
            inner.default_timeout
        };

        // The reaper frees the pending slot when the ceiling elapses, even
        // if the caller has lost interest by then.
        {
            let inner = Arc::clone(inner);
            let key = key.clone();
            let event = event.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(ceiling).await;
                if let Some(pending) = inner.pending.lock().remove(&key) {
                    let outcome = if inner.complete {
                        Err(Error::Timeout {
                            event,
                            after_ms: ceiling.as_millis() as u64,
                        })
                    } else {
                        Ok(None)
                    };
                    let _ = pending.reply.send(outcome);
                }
            });
        }

        // Liveness side-timer, only when this call's ceiling exceeds the
        // default. A `:processing` pulse (or expiry) clears it; it never
        // rejects. Calls with shorter ceilings deliberately get none.
        if ceiling > inner.default_timeout {
            let default = inner.default_timeout;
            let call = key.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = pulse.notified() => {
                        tracing::debug!(%call, "liveness pulse cleared side-timer");
                    }
                    _ = tokio::time::sleep(default) => {
                        tracing::debug!(%call, "liveness window elapsed without pulse");
                    }
                }
            });
        }

        if let Err(e) = inner.transport.send(&key, request, &inner.routing) {
            inner.pending.lock().remove(&key);
            return Err(e);
        }

        match rx.await.map_err(|_| Error::ChannelClosed)?? {
            Some(raw) => inner.validator.validate(&response_shape, &raw),
            None => Ok(Value::Null),
        }
    }

    /// Typed convenience over [`Sdk::call`].
    pub async fn call_as<P, R>(&self, event: &str, request: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let raw = self.call(event, serde_json::to_value(request)?).await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Link identity this engine was built with.
    pub fn routing(&self) -> &Routing {
        &self.inner.routing
    }
}

impl Drop for Sdk {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.lock().take() {
            unsubscribe();
        }
    }
}

/// Builder for [`Sdk`].
pub struct SdkBuilder {
    transport: Arc<dyn Transport>,
    client_schema: SchemaRegistry,
    server_schema: SchemaRegistry,
    routing: Routing,
    validator: Arc<dyn Validator>,
    call_ids: Arc<dyn CallIdSuffix>,
    handlers: HashMap<String, HandlerFn>,
    middleware: HashMap<String, Vec<Middleware>>,
    timeouts: HashMap<String, Duration>,
    default_timeout: Duration,
    grace: Duration,
    complete: bool,
}

impl SdkBuilder {
    /// Registers the terminal handler for a server-schema event.
    pub fn handler<F, Fut>(self, event: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.handler_boxed(event, handler_fn(f))
    }

    /// Registers an already-boxed handler.
    pub fn handler_boxed(mut self, event: impl Into<String>, handler: HandlerFn) -> Self {
        self.handlers.insert(event.into(), handler);
        self
    }

    /// Appends a middleware for a server-schema event. Registration order
    /// is nesting order: the first registered is outermost.
    pub fn middleware<F, Fut>(self, event: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, HandlerFn) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.middleware_boxed(event, middleware_fn(f))
    }

    /// Appends an already-boxed middleware.
    pub fn middleware_boxed(mut self, event: impl Into<String>, mw: Middleware) -> Self {
        self.middleware.entry(event.into()).or_default().push(mw);
        self
    }

    /// Declares a per-event ceiling for a client-schema event. Ceilings
    /// only take effect on complete links; on incomplete links the default
    /// always wins.
    pub fn timeout(mut self, event: impl Into<String>, ceiling: Duration) -> Self {
        self.timeouts.insert(event.into(), ceiling);
        self
    }

    /// Overrides the global default ceiling.
    pub fn default_timeout(mut self, ceiling: Duration) -> Self {
        self.default_timeout = ceiling;
        self
    }

    /// Overrides the processing-pulse grace period.
    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Declares the link complete: the far side is guaranteed to answer
    /// every request, so elapsed ceilings reject instead of resolving
    /// `Null`, and construction requires a handler for every server event.
    pub fn complete(mut self, complete: bool) -> Self {
        self.complete = complete;
        self
    }

    /// Plugs in the schema validation capability.
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Plugs in the call-id suffix generator.
    pub fn call_ids(mut self, call_ids: Arc<dyn CallIdSuffix>) -> Self {
        self.call_ids = call_ids;
        self
    }

    /// Validates the configuration, registers the dispatcher with the
    /// transport, and returns the engine.
    pub fn build(self) -> Result<Sdk> {
        for name in self.handlers.keys() {
            if !self.server_schema.contains(name) {
                return Err(Error::UnknownEvent(name.clone()));
            }
        }
        for name in self.middleware.keys() {
            if !self.server_schema.contains(name) {
                return Err(Error::UnknownEvent(name.clone()));
            }
        }
        for name in self.timeouts.keys() {
            if !self.client_schema.contains(name) {
                return Err(Error::UnknownEvent(name.clone()));
            }
        }
        if self.complete {
            for name in self.server_schema.names() {
                if !self.handlers.contains_key(name) {
                    return Err(Error::MissingHandler(name.to_string()));
                }
            }
        }

        let inner = Arc::new(Inner {
            transport: self.transport,
            routing: self.routing,
            client_schema: self.client_schema,
            server_schema: self.server_schema,
            validator: self.validator,
            call_ids: self.call_ids,
            handlers: self.handlers,
            middleware: self.middleware,
            timeouts: self.timeouts,
            default_timeout: self.default_timeout,
            grace: self.grace,
            complete: self.complete,
            pending: Mutex::new(HashMap::new()),
        });

        let dispatch: RecvHandler = {
            let inner = Arc::clone(&inner);
            Arc::new(move |envelope| {
                let inner = Arc::clone(&inner);
                Box::pin(async move { inner.dispatch(envelope).await })
            })
        };
        let unsubscribe = inner.transport.recv(dispatch, &inner.routing);

        Ok(Sdk {
            inner,
            unsubscribe: Mutex::new(unsubscribe),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use serde_json::json;
    use tt_protocol::EventDefinition;

    /// Transport that swallows sends and never receives.
    struct Blackhole;

    impl Transport for Blackhole {
        fn send(&self, _event: &str, _data: Value, _routing: &Routing) -> Result<()> {
            Ok(())
        }

        fn recv(&self, _handler: RecvHandler, _routing: &Routing) -> Option<Unsubscribe> {
            None
        }
    }

    fn schema(names: &[&str]) -> SchemaRegistry {
        SchemaRegistry::new(
            names
                .iter()
                .map(|n| EventDefinition::new(*n, json!(null), json!(null))),
        )
    }

    fn builder(client: &[&str], server: &[&str]) -> SdkBuilder {
        Sdk::builder(
            Arc::new(Blackhole),
            schema(client),
            schema(server),
            Routing::new("app-a", "app-b"),
        )
    }

    #[tokio::test]
    async fn complete_mode_requires_every_handler() {
        let err = builder(&[], &["ping", "pong"])
            .complete(true)
            .handler("ping", |_| async { Ok(json!(null)) })
            .build()
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, Error::MissingHandler(name) if name == "pong"));
    }

    #[tokio::test]
    async fn optional_mode_accepts_partial_maps() {
        assert!(builder(&[], &["ping", "pong"])
            .handler("ping", |_| async { Ok(json!(null)) })
            .build()
            .is_ok());
    }

    #[tokio::test]
    async fn handler_for_undeclared_event_is_rejected() {
        let err = builder(&[], &["ping"])
            .handler("nope", |_| async { Ok(json!(null)) })
            .build()
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownEvent(name) if name == "nope"));
    }

    #[tokio::test]
    async fn timeout_for_undeclared_event_is_rejected() {
        let err = builder(&["ping"], &[])
            .timeout("nope", Duration::from_millis(5))
            .build()
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownEvent(name) if name == "nope"));
    }

    #[tokio::test]
    async fn calling_an_undeclared_event_is_rejected() {
        let sdk = builder(&["ping"], &[]).build().unwrap();
        let err = sdk.call("nope", json!(null)).await.unwrap_err();
        assert!(matches!(err, Error::UnknownEvent(name) if name == "nope"));
    }
}
