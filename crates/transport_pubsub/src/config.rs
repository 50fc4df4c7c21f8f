//! Transport configuration, read once at init from a KEY=VALUE file in the
//! directory the gateway hands us.

use std::path::Path;

use tracing::{debug, warn};
use transport_plugin::plugin::TransportError;

use crate::codec::JsonFormat;

/// File name looked up inside the gateway's config directory.
pub const CONFIG_FILE: &str = "transport_pubsub.cfg";

#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Name under which the node registers on the messaging runtime.
    pub node_name: String,
    /// Topic carrying gateway -> runtime messages.
    pub publish_topic: String,
    /// Topic carrying runtime -> gateway messages.
    pub subscribe_topic: String,
    /// Presentation of outbound documents.
    pub json_format: JsonFormat,
    /// Whether connectivity events are pushed over the side-channel.
    pub notify_events: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            node_name: "gateway".to_string(),
            publish_topic: "gateway_pub".to_string(),
            subscribe_topic: "gateway_sub".to_string(),
            json_format: JsonFormat::default(),
            notify_events: true,
        }
    }
}

impl TransportConfig {
    /// Read `<dir>/transport_pubsub.cfg`. A missing or unreadable file is not
    /// an error: the defaults apply and a warning is logged.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE);
        let mut config = TransportConfig::default();

        match dotenvy::from_path_iter(&path) {
            Ok(entries) => {
                for entry in entries {
                    match entry {
                        Ok((key, value)) => config.apply(&key, &value),
                        Err(e) => warn!("skipping malformed config line in {}: {e}", path.display()),
                    }
                }
            }
            Err(e) => {
                warn!("no config file at {}, using defaults: {e}", path.display());
            }
        }

        config
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "PUBSUB_NODE" => self.node_name = value.to_string(),
            "PUBSUB_PUBLISH_TOPIC" => self.publish_topic = value.to_string(),
            "PUBSUB_SUBSCRIBE_TOPIC" => self.subscribe_topic = value.to_string(),
            "PUBSUB_JSON" => match value.parse::<JsonFormat>() {
                Ok(format) => self.json_format = format,
                Err(_) => {
                    warn!("unsupported JSON format option '{value}', using default (indented)");
                }
            },
            "PUBSUB_EVENTS" => self.notify_events = is_true(value),
            other => debug!("ignoring unknown config key '{other}'"),
        }
    }

    /// Topic and node names must be non-empty; an empty value would register
    /// a channel nothing can address.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.node_name.is_empty() {
            return Err(TransportError::InvalidArgument("PUBSUB_NODE is empty".into()));
        }
        if self.publish_topic.is_empty() {
            return Err(TransportError::InvalidArgument(
                "PUBSUB_PUBLISH_TOPIC is empty".into(),
            ));
        }
        if self.subscribe_topic.is_empty() {
            return Err(TransportError::InvalidArgument(
                "PUBSUB_SUBSCRIBE_TOPIC is empty".into(),
            ));
        }
        Ok(())
    }
}

fn is_true(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}
