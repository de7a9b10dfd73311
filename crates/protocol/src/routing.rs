//! Link identity.
//!
//! A link is the implicit pair `(localAppId, remoteAppId)`. Envelopes whose
//! id fields do not match the pair are background noise and are dropped
//! before dispatch. There is no persisted session: reconnecting simply
//! starts a new implicit link.

use serde::{Deserialize, Serialize};

/// Well-known application id of the platform host.
pub const HOST_APP_ID: &str = "platform-host";

/// Well-known application id of a native mobile shell, used when the
/// serialized bridge transport replaces cross-context messaging.
pub const NATIVE_SHELL_APP_ID: &str = "native-shell";

/// Synthetic origin token for the serialized bridge. Native bridges have no
/// real origin concept; inbound bridge messages must carry exactly this.
pub const BRIDGE_ORIGIN: &str = "bridge://native-shell";

/// Identity pair for one direction of a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routing {
    /// This side's declared application id.
    #[serde(rename = "localAppId")]
    pub local_app_id: String,
    /// The counterpart's application id.
    #[serde(rename = "remoteAppId")]
    pub remote_app_id: String,
}

impl Routing {
    /// Creates a routing pair. App ids containing `:` would corrupt call-id
    /// parsing and are a programming error.
    pub fn new(local_app_id: impl Into<String>, remote_app_id: impl Into<String>) -> Self {
        let local_app_id = local_app_id.into();
        let remote_app_id = remote_app_id.into();
        assert!(
            !local_app_id.contains(':') && !remote_app_id.contains(':'),
            "app ids must not contain ':'"
        );
        assert!(
            local_app_id != remote_app_id,
            "the two sides of a link need distinct app ids"
        );
        Self {
            local_app_id,
            remote_app_id,
        }
    }

    /// The same link as seen from the other side.
    pub fn reversed(&self) -> Self {
        Self {
            local_app_id: self.remote_app_id.clone(),
            remote_app_id: self.local_app_id.clone(),
        }
    }

    /// Routing for an embedded application talking to the platform host.
    pub fn to_host(local_app_id: impl Into<String>) -> Self {
        Self::new(local_app_id, HOST_APP_ID)
    }

    /// Routing for an embedded application talking to a native shell over
    /// the serialized bridge.
    pub fn to_native_shell(local_app_id: impl Into<String>) -> Self {
        Self::new(local_app_id, NATIVE_SHELL_APP_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_swaps_the_pair() {
        let r = Routing::new("app-a", "app-b");
        let rev = r.reversed();
        assert_eq!(rev.local_app_id, "app-b");
        assert_eq!(rev.remote_app_id, "app-a");
        assert_eq!(rev.reversed(), r);
    }

    #[test]
    fn well_known_constructors() {
        assert_eq!(Routing::to_host("app-a").remote_app_id, HOST_APP_ID);
        assert_eq!(
            Routing::to_native_shell("app-a").remote_app_id,
            NATIVE_SHELL_APP_ID
        );
    }

    #[test]
    #[should_panic(expected = "app ids must not contain ':'")]
    fn rejects_colons_in_app_ids() {
        let _ = Routing::new("app:a", "app-b");
    }
}
