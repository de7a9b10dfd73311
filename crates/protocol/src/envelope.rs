//! The wire envelope exchanged between the two sides of a link.
//!
//! An envelope exists only in transit: it is built immediately before a
//! send, serialized (or passed structurally, for transports with native
//! object passing), and discarded after dispatch. Nothing persists it and
//! nothing retries it - redelivery is a caller concern.

use crate::routing::Routing;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Constant protocol tag carried by every envelope.
///
/// Envelopes without this tag are foreign traffic on a shared channel and
/// are silently dropped by every transport.
pub const PROTOCOL_TAG: &str = "typed-transport";

/// Wire unit for one message on a link.
///
/// `event` carries the structured call id (see [`crate::CallId`]), which
/// doubles as the correlation key and the event-name carrier, so the
/// receiver needs no side table to route a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Call id: `{localAppId}:{eventName}:{random}`, optionally suffixed
    /// with `:processing` for liveness pulses.
    pub event: String,
    /// Request or response payload.
    pub data: Value,
    /// Protocol tag; always [`PROTOCOL_TAG`] for envelopes we emit.
    #[serde(rename = "libId")]
    pub lib_id: String,
    /// Application id of the intended recipient.
    #[serde(rename = "receiverAppId")]
    pub receiver_app_id: String,
    /// Application id of the sender.
    #[serde(rename = "senderAppId")]
    pub sender_app_id: String,
}

impl Envelope {
    /// Builds an outbound envelope for the given routing, stamping the
    /// protocol tag.
    pub fn outbound(event: impl Into<String>, data: Value, routing: &Routing) -> Self {
        Self {
            event: event.into(),
            data,
            lib_id: PROTOCOL_TAG.to_string(),
            receiver_app_id: routing.remote_app_id.clone(),
            sender_app_id: routing.local_app_id.clone(),
        }
    }

    /// Content-level acceptance check applied by every transport on
    /// receive: protocol tag present, addressed to us, sent by the expected
    /// counterpart. Channel-level checks (origin, source identity) are the
    /// transport's own business and happen before this.
    pub fn is_for(&self, routing: &Routing) -> bool {
        self.lib_id == PROTOCOL_TAG
            && self.receiver_app_id == routing.local_app_id
            && self.sender_app_id == routing.remote_app_id
    }
}
