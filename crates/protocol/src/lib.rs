//! Wire types for the typed-transport protocol.
//!
//! This crate contains the serde-serializable types exchanged between an
//! embedded application and its host over a typed-transport link. These
//! types represent the "protocol layer" - the shapes of data as they appear
//! on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization, parsing, and lookup
//! - **1:1 with the wire**: Field names match the envelope JSON exactly
//! - **Stable**: Changes only when the wire protocol changes
//!
//! The engine, transports, and middleware live in `tt-runtime`.

pub mod call_id;
pub mod envelope;
pub mod routing;
pub mod schema;

pub use call_id::{CallId, CallIdError, PROCESSING_MARKER};
pub use envelope::{Envelope, PROTOCOL_TAG};
pub use routing::{BRIDGE_ORIGIN, HOST_APP_ID, NATIVE_SHELL_APP_ID, Routing};
pub use schema::{EventDefinition, SchemaRegistry};
