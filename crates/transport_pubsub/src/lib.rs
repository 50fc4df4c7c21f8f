//! Pub/sub transport plugin for the gateway API.
//!
//! Bridges the gateway's request/response plugin contract onto a
//! publish/subscribe messaging runtime: one node, one publication, one
//! subscription and one dedicated spin thread, all alive for exactly the
//! span between `init` and `destroy`.

pub mod bridge;
pub mod codec;
pub mod config;
pub mod endpoint;
pub mod loopback;
pub mod pubsub;
pub mod spin;

use std::sync::Arc;

use transport_plugin::plugin::{Transport, TransportDescriptor};

pub use bridge::PubSubTransport;
pub use loopback::LoopbackRuntime;

/// Plugin entry point: build the transport descriptor over the given
/// messaging runtime. The runtime handle is the one piece of process-global
/// context; making it an explicit argument keeps the singleton in the
/// gateway's loading layer instead of this crate.
pub fn create(runtime: Arc<dyn pubsub::PubSubRuntime>) -> TransportDescriptor {
    let plugin = Arc::new(PubSubTransport::new(runtime));
    TransportDescriptor {
        info: plugin.info().clone(),
        plugin,
    }
}
