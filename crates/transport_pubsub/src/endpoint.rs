//! The transport's single outbound/inbound channel pair on the messaging
//! runtime.

use std::sync::Arc;

use tracing::debug;
use transport_plugin::plugin::TransportError;

use crate::config::TransportConfig;
use crate::pubsub::{MessageCallback, PubSubNode, Publication};

/// Owns exactly one publication and has registered exactly one subscription,
/// both live for the whole session. The publication handle is taken once at
/// open and never refreshed, so there is no stale-handle race to guard.
#[derive(Clone)]
pub struct ChannelEndpoint {
    publication: Arc<dyn Publication>,
    publish_topic: String,
}

impl ChannelEndpoint {
    /// Advertise the outbound topic and subscribe the inbound one.
    /// `on_message` fires on the node's spin thread for every inbound
    /// payload.
    pub fn open(
        node: &Arc<dyn PubSubNode>,
        config: &TransportConfig,
        on_message: MessageCallback,
    ) -> Result<Self, TransportError> {
        let publication = node.advertise(&config.publish_topic)?;
        node.subscribe(&config.subscribe_topic, on_message)?;
        debug!(
            "channel endpoint open: publishing on '{}', subscribed to '{}'",
            config.publish_topic, config.subscribe_topic
        );
        Ok(ChannelEndpoint {
            publication,
            publish_topic: config.publish_topic.clone(),
        })
    }

    /// Hand one payload to the transport layer. Callable from any host
    /// thread; cross-thread synchronization is the runtime's contract.
    pub fn publish(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.publication.publish(payload)
    }

    pub fn publish_topic(&self) -> &str {
        &self.publish_topic
    }
}
