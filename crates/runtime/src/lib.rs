//! typed-transport runtime - engine, transports, and middleware
//!
//! This crate provides the machinery for a typed bidirectional RPC link
//! between an embedded application and a host it does not control, over an
//! asynchronous, unordered, adversarial channel:
//!
//! - **Engine**: call correlation, timeouts, liveness pulses, dispatch
//! - **Transports**: cross-context messaging and the serialized bridge
//! - **Middleware**: composable interceptors on the dispatch path
//! - **Adapter**: the dispatch path exposed as a plain callable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │  application │  generated/typed calls
//! └──────┬───────┘
//! ┌──────▼───────┐
//! │  tt-runtime  │  this crate
//! │  ┌────────┐  │
//! │  │  Sdk   │  │  correlation, timeouts, dispatch
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Trans  │  │  cross-context / bridge transport
//! │  └────────┘  │
//! └──────┬───────┘
//! ┌──────▼───────┐
//! │ tt-protocol  │  envelope, call ids, schemas
//! └──────────────┘
//! ```
//!
//! # Decoupling via Validator
//!
//! Parsing payloads against declared shapes is injected through the
//! [`Validator`] trait rather than hard-wired to a validation library,
//! keeping the engine portable.

pub mod adapter;
pub mod error;
pub mod ids;
pub mod middleware;
pub mod sdk;
pub mod transport;
pub mod validate;

// Re-export key types at crate root
pub use adapter::{LocalHandler, LocalHandlerBuilder};
pub use error::{Error, Result};
pub use ids::{CallIdSuffix, RandomSuffix, SequentialSuffix};
pub use middleware::{HandlerFn, Middleware, compose, handler_fn, middleware_fn};
pub use sdk::{DEFAULT_GRACE, DEFAULT_TIMEOUT, Sdk, SdkBuilder};
pub use transport::{
    BridgeMessage, BridgeTransport, CrossContextTransport, MessagePort, PostFn, PostedMessage,
    RecvHandler, Transport, Unsubscribe,
};
pub use validate::{AcceptAll, FnValidator, Validator};
