//! The messaging-runtime interface this transport consumes.
//!
//! The runtime is treated as a reliable, already-connected publish/subscribe
//! primitive: QoS, discovery and reconnection are its problem, not ours.
//! `spin` is blocking by design; it dispatches subscription callbacks on the
//! calling thread and returns only after `request_shutdown`.

use std::sync::Arc;

use transport_plugin::plugin::TransportError;

/// Callback fired by the runtime's own thread for every inbound payload.
pub type MessageCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

pub trait PubSubRuntime: Send + Sync {
    /// Register a named node on the runtime.
    fn create_node(&self, name: &str) -> Result<Arc<dyn PubSubNode>, TransportError>;

    /// Process-wide stop signal. The only way to make `spin` return.
    fn request_shutdown(&self);

    /// Release a node and everything it registered on the runtime.
    fn destroy_node(&self, node: &Arc<dyn PubSubNode>);
}

pub trait PubSubNode: Send + Sync {
    fn name(&self) -> &str;

    /// Open a long-lived outbound channel on `topic`.
    fn advertise(&self, topic: &str) -> Result<Arc<dyn Publication>, TransportError>;

    /// Register `callback` for inbound payloads on `topic`. Invoked from the
    /// thread running this node's `spin` loop.
    fn subscribe(&self, topic: &str, callback: MessageCallback) -> Result<(), TransportError>;

    /// Blocking event loop: dispatch inbound payloads until the runtime's
    /// shutdown signal arrives.
    fn spin(&self);
}

pub trait Publication: Send + Sync {
    /// Hand one payload to the transport layer. Fire-and-forget; safe to
    /// call from any thread.
    fn publish(&self, payload: &[u8]) -> Result<(), TransportError>;
}
