//! Cross-context messaging transport.
//!
//! Models window-to-window structured message passing inside one process:
//! a [`MessagePort`] pair stands in for the two browsing contexts, each
//! carrying an origin string and a channel-object identity. Posting honors
//! target-origin restrictions at delivery time, and the transport applies
//! the full filter chain (source identity, origin allow-list, envelope
//! identity fields) before handing anything to the engine.

use crate::error::{Error, Result};
use crate::transport::{RecvHandler, Transport, Unsubscribe};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tt_protocol::{Envelope, Routing};

/// Process-wide port identity allocator. Identities are opaque; only
/// equality matters (the "which window sent this" check).
static NEXT_PORT_ID: AtomicU64 = AtomicU64::new(1);

/// One physical message as observed by the receiving context: the payload
/// plus the sender's channel-level identity.
#[derive(Debug, Clone)]
pub struct PostedMessage {
    /// Structured payload, passed without serialization.
    pub data: Value,
    /// Origin string of the sending context.
    pub origin: String,
    /// Channel-object identity of the sending context.
    pub source: u64,
}

/// One endpoint of a linked cross-context channel.
pub struct MessagePort {
    id: u64,
    origin: Arc<str>,
    peer_id: u64,
    peer_origin: Arc<str>,
    to_peer: mpsc::UnboundedSender<PostedMessage>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<PostedMessage>>>,
}

impl MessagePort {
    /// Creates a linked pair of ports with the given origins.
    pub fn pair(origin_a: &str, origin_b: &str) -> (MessagePort, MessagePort) {
        let (to_b, inbox_b) = mpsc::unbounded_channel();
        let (to_a, inbox_a) = mpsc::unbounded_channel();
        let id_a = NEXT_PORT_ID.fetch_add(1, Ordering::Relaxed);
        let id_b = NEXT_PORT_ID.fetch_add(1, Ordering::Relaxed);
        let origin_a: Arc<str> = Arc::from(origin_a);
        let origin_b: Arc<str> = Arc::from(origin_b);
        let a = MessagePort {
            id: id_a,
            origin: Arc::clone(&origin_a),
            peer_id: id_b,
            peer_origin: Arc::clone(&origin_b),
            to_peer: to_b,
            inbox: Mutex::new(Some(inbox_a)),
        };
        let b = MessagePort {
            id: id_b,
            origin: origin_b,
            peer_id: id_a,
            peer_origin: origin_a,
            to_peer: to_a,
            inbox: Mutex::new(Some(inbox_b)),
        };
        (a, b)
    }

    /// Channel-object identity of this port.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Origin string of this port's context.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Identity of the linked peer, used as the expected source on receive.
    pub fn peer_id(&self) -> u64 {
        self.peer_id
    }

    /// Posts a payload to the peer context.
    ///
    /// A `target_origin` restriction drops the message at delivery when it
    /// does not match the peer's origin, without surfacing an error - the
    /// sender cannot observe the mismatch. A dropped peer is the one
    /// deterministically detectable failure.
    pub fn post(&self, data: Value, target_origin: Option<&str>) -> Result<()> {
        if let Some(target) = target_origin {
            if target != &*self.peer_origin {
                tracing::debug!(restricted_to = target, peer = %self.peer_origin, "target origin mismatch, dropped");
                return Ok(());
            }
        }
        self.post_raw(PostedMessage {
            data,
            origin: self.origin.to_string(),
            source: self.id,
        })
    }

    /// Delivers an arbitrary physical message to the peer, identity fields
    /// included. This is the injection point for modeling foreign or forged
    /// senders sharing the channel.
    pub fn post_raw(&self, message: PostedMessage) -> Result<()> {
        self.to_peer
            .send(message)
            .map_err(|_| Error::Transport("no remote context".to_string()))
    }

    fn take_inbox(&self) -> Option<mpsc::UnboundedReceiver<PostedMessage>> {
        self.inbox.lock().take()
    }
}

/// Transport routing envelopes through a cross-context [`MessagePort`].
pub struct CrossContextTransport {
    port: Arc<MessagePort>,
    allowed_origins: Vec<String>,
}

impl CrossContextTransport {
    /// Wraps a port with an origin allow-list. An empty list disables the
    /// origin checks on both send (no target restriction) and receive.
    pub fn new(port: MessagePort, allowed_origins: Vec<String>) -> Self {
        Self {
            port: Arc::new(port),
            allowed_origins,
        }
    }
}

impl Transport for CrossContextTransport {
    fn send(&self, event: &str, data: Value, routing: &Routing) -> Result<()> {
        let envelope = Envelope::outbound(event, data, routing);
        let value = serde_json::to_value(&envelope)?;
        if self.allowed_origins.is_empty() {
            self.port.post(value, None)
        } else {
            // Broadcast style: one post per allowed origin. Non-matching
            // target origins are dropped at delivery.
            for origin in &self.allowed_origins {
                self.port.post(value.clone(), Some(origin))?;
            }
            Ok(())
        }
    }

    fn recv(&self, handler: RecvHandler, routing: &Routing) -> Option<Unsubscribe> {
        let mut inbox = self.port.take_inbox()?;
        let expected_source = self.port.peer_id();
        let allowed = self.allowed_origins.clone();
        let routing = routing.clone();
        let task = tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                if message.source != expected_source {
                    tracing::debug!(source = message.source, "foreign source, dropped");
                    continue;
                }
                if !allowed.is_empty() && !allowed.iter().any(|o| *o == message.origin) {
                    tracing::debug!(origin = %message.origin, "origin not allow-listed, dropped");
                    continue;
                }
                let envelope: Envelope = match serde_json::from_value(message.data) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::debug!("non-envelope message, dropped: {e}");
                        continue;
                    }
                };
                if !envelope.is_for(&routing) {
                    tracing::debug!(event = %envelope.event, "envelope for another link, dropped");
                    continue;
                }
                if let Err(e) = handler(envelope).await {
                    tracing::error!("error dispatching message: {e}");
                }
            }
        });
        Some(Box::new(move || task.abort()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc as tokio_mpsc;

    fn routing_ab() -> (Routing, Routing) {
        let a = Routing::new("app-a", "app-b");
        let b = a.reversed();
        (a, b)
    }

    fn collecting_handler() -> (RecvHandler, tokio_mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let handler: RecvHandler = Arc::new(move |envelope| {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(envelope);
                Ok(None)
            })
        });
        (handler, rx)
    }

    #[tokio::test]
    async fn delivers_matching_envelopes() {
        let (port_a, port_b) = MessagePort::pair("https://a.example", "https://b.example");
        let a = CrossContextTransport::new(port_a, vec!["https://b.example".to_string()]);
        let b = CrossContextTransport::new(port_b, vec!["https://a.example".to_string()]);
        let (ra, rb) = routing_ab();

        let (handler, mut seen) = collecting_handler();
        b.recv(handler, &rb).unwrap();

        a.send("app-a:ping:c0000000", json!("ping"), &ra).unwrap();
        let envelope = seen.recv().await.unwrap();
        assert_eq!(envelope.event, "app-a:ping:c0000000");
        assert_eq!(envelope.data, json!("ping"));
    }

    #[tokio::test]
    async fn second_recv_is_refused() {
        let (port_a, _port_b) = MessagePort::pair("https://a.example", "https://b.example");
        let transport = CrossContextTransport::new(port_a, vec![]);
        let (ra, _) = routing_ab();
        let (h1, _s1) = collecting_handler();
        let (h2, _s2) = collecting_handler();
        assert!(transport.recv(h1, &ra).is_some());
        assert!(transport.recv(h2, &ra).is_none());
    }

    #[tokio::test]
    async fn drops_foreign_source_even_with_matching_envelope() {
        let (port_a, port_b) = MessagePort::pair("https://a.example", "https://b.example");
        let b = CrossContextTransport::new(port_b, vec!["https://a.example".to_string()]);
        let (ra, rb) = routing_ab();

        let (handler, mut seen) = collecting_handler();
        b.recv(handler, &rb).unwrap();

        // Perfectly-formed envelope, but injected with a forged source id.
        let envelope = Envelope::outbound("app-a:ping:c0000000", json!("ping"), &ra);
        port_a
            .post_raw(PostedMessage {
                data: serde_json::to_value(&envelope).unwrap(),
                origin: "https://a.example".to_string(),
                source: 999_999,
            })
            .unwrap();

        // A genuine message after it proves the forged one was skipped.
        port_a
            .post(serde_json::to_value(&envelope).unwrap(), None)
            .unwrap();
        let delivered = seen.recv().await.unwrap();
        assert_eq!(delivered.event, "app-a:ping:c0000000");
        assert!(seen.try_recv().is_err());
    }

    #[tokio::test]
    async fn drops_non_allow_listed_origin() {
        let (port_a, port_b) = MessagePort::pair("https://evil.example", "https://b.example");
        let b = CrossContextTransport::new(port_b, vec!["https://a.example".to_string()]);
        let (ra, rb) = routing_ab();

        let (handler, mut seen) = collecting_handler();
        b.recv(handler, &rb).unwrap();

        let envelope = Envelope::outbound("app-a:ping:c0000000", json!("ping"), &ra);
        port_a
            .post(serde_json::to_value(&envelope).unwrap(), None)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(seen.try_recv().is_err());
    }

    #[tokio::test]
    async fn target_origin_mismatch_is_dropped_at_delivery() {
        let (port_a, port_b) = MessagePort::pair("https://a.example", "https://b.example");
        // Allow-list names an origin the peer does not have: posts go out
        // but delivery drops them, indistinguishable from silence.
        let a = CrossContextTransport::new(port_a, vec!["https://other.example".to_string()]);
        let b = CrossContextTransport::new(port_b, vec![]);
        let (ra, rb) = routing_ab();

        let (handler, mut seen) = collecting_handler();
        b.recv(handler, &rb).unwrap();

        a.send("app-a:ping:c0000000", json!("ping"), &ra).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(seen.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_errors_when_peer_is_gone() {
        let (port_a, port_b) = MessagePort::pair("https://a.example", "https://b.example");
        drop(port_b);
        let a = CrossContextTransport::new(port_a, vec![]);
        let (ra, _) = routing_ab();
        let err = a.send("app-a:ping:c0000000", json!("ping"), &ra).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
