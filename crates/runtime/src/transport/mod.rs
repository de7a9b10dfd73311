//! Transport abstraction.
//!
//! A transport moves envelopes between the two sides of a link and filters
//! inbound traffic before the engine ever sees it. Two concrete transports
//! ship: cross-context messaging (origin-checked structured passing) and
//! the serialized string bridge (native shells). The handler adapter adds a
//! degenerate third with a no-op send.
//!
//! Filtering contract - an inbound message reaches the handler only if ALL
//! of these hold:
//! 1. it originates from the expected counterpart channel object
//!    (identity, not content),
//! 2. its origin is in the allow-list, when one is configured and
//!    non-empty,
//! 3. `libId` equals the protocol tag,
//! 4. `receiverAppId` equals this side's local id,
//! 5. `senderAppId` equals this side's expected remote id.
//!
//! Everything that fails a check is dropped silently: hostile and stale
//! messages are expected background noise on a shared channel.

mod bridge;
mod cross_context;

pub use bridge::{BridgeMessage, BridgeTransport, PostFn};
pub use cross_context::{CrossContextTransport, MessagePort, PostedMessage};

use crate::error::Result;
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tt_protocol::{Envelope, Routing};

/// Inbound handler registered by the engine.
///
/// The returned future yields the locally-computed response payload
/// (`Some` when a request was dispatched, `None` for replies, pulses, and
/// silent drops). Sending transports ignore it - the engine emits response
/// envelopes itself - while the send-less adapter transport surfaces it
/// directly to the caller. Errors are logged by receive loops.
pub type RecvHandler =
    Arc<dyn Fn(Envelope) -> BoxFuture<'static, Result<Option<Value>>> + Send + Sync>;

/// Cleanup closure deregistering a receive handler.
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// Bidirectional message channel between the two sides of a link.
pub trait Transport: Send + Sync {
    /// Fire-and-forget enqueue onto the physical channel.
    ///
    /// Must not fail for a normal, connected channel: an absent destination
    /// is only detectable by the caller via timeout. The exception is a
    /// deterministically detectable absence (no remote channel object at
    /// all), which errors synchronously.
    fn send(&self, event: &str, data: Value, routing: &Routing) -> Result<()>;

    /// Registers the inbound handler, invoked once per physical message
    /// that passes this transport's filtering. Returns a cleanup closure
    /// where supported; at most one registration is honored.
    fn recv(&self, handler: RecvHandler, routing: &Routing) -> Option<Unsubscribe>;
}
