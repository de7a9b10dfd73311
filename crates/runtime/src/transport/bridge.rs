//! Serialized-bridge transport.
//!
//! Used when the host is a native shell exposing only a string-in/event-out
//! bridge: outbound envelopes are JSON-serialized and handed to a provided
//! post function; inbound strings are parsed and filtered. Native bridges
//! have no real origin concept, so receive additionally requires the
//! synthetic [`BRIDGE_ORIGIN`] token in place of a channel-level origin
//! check.

use crate::error::Result;
use crate::transport::{RecvHandler, Transport, Unsubscribe};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tt_protocol::{BRIDGE_ORIGIN, Envelope, Routing};

/// Host-provided function posting one serialized envelope to the shell.
pub type PostFn = Arc<dyn Fn(String) + Send + Sync>;

/// One inbound string message from the shell, tagged with its origin token.
#[derive(Debug, Clone)]
pub struct BridgeMessage {
    /// Raw JSON text of the envelope.
    pub raw: String,
    /// Origin token attached by the bridge glue; must equal
    /// [`BRIDGE_ORIGIN`] to be accepted.
    pub origin: String,
}

impl BridgeMessage {
    /// A message as the genuine shell glue would deliver it.
    pub fn from_shell(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            origin: BRIDGE_ORIGIN.to_string(),
        }
    }
}

/// Transport over a native string bridge.
pub struct BridgeTransport {
    post: PostFn,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<BridgeMessage>>>,
}

impl BridgeTransport {
    /// Wraps a post function and an inbound message stream.
    pub fn new(post: PostFn, inbound: mpsc::UnboundedReceiver<BridgeMessage>) -> Self {
        Self {
            post,
            inbound: Mutex::new(Some(inbound)),
        }
    }

    /// Convenience constructor returning the sender half the bridge glue
    /// feeds inbound messages into.
    pub fn channel(post: PostFn) -> (Self, mpsc::UnboundedSender<BridgeMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(post, rx), tx)
    }
}

impl Transport for BridgeTransport {
    fn send(&self, event: &str, data: Value, routing: &Routing) -> Result<()> {
        let envelope = Envelope::outbound(event, data, routing);
        let raw = serde_json::to_string(&envelope)?;
        (self.post)(raw);
        Ok(())
    }

    fn recv(&self, handler: RecvHandler, routing: &Routing) -> Option<Unsubscribe> {
        let mut inbound = self.inbound.lock().take()?;
        let routing = routing.clone();
        let task = tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                if message.origin != BRIDGE_ORIGIN {
                    tracing::debug!(origin = %message.origin, "unexpected bridge origin, dropped");
                    continue;
                }
                let envelope: Envelope = match serde_json::from_str(&message.raw) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::debug!("unparseable bridge message, dropped: {e}");
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
    use tt_protocol::NATIVE_SHELL_APP_ID;

    fn capture_posts() -> (PostFn, std::sync::mpsc::Receiver<String>) {
        let (tx, rx) = std::sync::mpsc::channel();
        let post: PostFn = Arc::new(move |raw| {
            let _ = tx.send(raw);
        });
        (post, rx)
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

    #[test]
    fn send_serializes_the_exact_field_set() {
        let (post, posted) = capture_posts();
        let (transport, _tx) = BridgeTransport::channel(post);
        let routing = Routing::to_native_shell("app-a");

        transport
            .send("app-a:ping:c0000000", json!("ping"), &routing)
            .unwrap();

        let raw = posted.recv().unwrap();
        let wire: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            wire,
            json!({
                "event": "app-a:ping:c0000000",
                "data": "ping",
                "libId": "typed-transport",
                "receiverAppId": NATIVE_SHELL_APP_ID,
                "senderAppId": "app-a",
            })
        );
    }

    #[tokio::test]
    async fn recv_parses_and_filters() {
        let (post, _posted) = capture_posts();
        let (transport, inbound) = BridgeTransport::channel(post);
        let routing = Routing::to_native_shell("app-a");
        let shell_routing = routing.reversed();

        let (handler, mut seen) = collecting_handler();
        transport.recv(handler, &routing).unwrap();

        let envelope = Envelope::outbound("native-shell:notify:c0000000", json!(1), &shell_routing);
        let raw = serde_json::to_string(&envelope).unwrap();

        // Wrong origin token: dropped.
        inbound
            .send(BridgeMessage {
                raw: raw.clone(),
                origin: "https://somewhere.example".to_string(),
            })
            .unwrap();
        // Garbage: dropped.
        inbound.send(BridgeMessage::from_shell("not json")).unwrap();
        // Wrong receiver: dropped.
        let foreign = Envelope {
            receiver_app_id: "app-z".to_string(),
            ..envelope.clone()
        };
        inbound
            .send(BridgeMessage::from_shell(
                serde_json::to_string(&foreign).unwrap(),
            ))
            .unwrap();
        // Genuine message.
        inbound.send(BridgeMessage::from_shell(raw)).unwrap();

        let delivered = seen.recv().await.unwrap();
        assert_eq!(delivered.event, "native-shell:notify:c0000000");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(seen.try_recv().is_err());
    }
}
