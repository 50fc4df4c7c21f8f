//! Payload types crossing the gateway/transport boundary, plus builders for
//! the documents sent over the event side-channel.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A structured request/response payload. The gateway and the transport
/// exchange these as-is; neither side interprets the contents.
pub type Document = serde_json::Value;

/// Opaque correlation token owned by the gateway. Transports hand it back
/// unchanged on responses and never fabricate one for unsolicited inbound
/// messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        RequestId(id.into())
    }
}

// -----------------------------------------------------------------------------
// Event side-channel builders
// -----------------------------------------------------------------------------

pub const EVENT_CONNECTED: &str = "connected";
pub const EVENT_DISCONNECTED: &str = "disconnected";
pub const EVENT_PUBLISH_FAILED: &str = "publish_failed";
pub const EVENT_ADMIN_UNSUPPORTED: &str = "admin_unsupported";

/// A bare event notification, e.g. `{"event": "connected"}`.
pub fn build_event(event: &str) -> Document {
    json!({ "event": event })
}

/// An event notification carrying a failure reason.
pub fn build_failure_event(event: &str, reason: &str) -> Document {
    json!({ "event": event, "reason": reason })
}
