// Demo wiring: the transport plus a peer node on an in-process loopback
// runtime, exchanging one message in each direction.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use transport_plugin::message::{Document, RequestId};
use transport_plugin::plugin::{GatewayCallbacks, TransportInfo};
use transport_plugin::session::TransportSession;
use transport_pubsub::pubsub::PubSubNode;
use transport_pubsub::{LoopbackRuntime, create};

struct StdoutGateway;

impl GatewayCallbacks for StdoutGateway {
    fn incoming_request(
        &self,
        _transport: &TransportInfo,
        session: &Arc<TransportSession>,
        _request_id: Option<RequestId>,
        admin: bool,
        message: Document,
    ) {
        info!("incoming request on session {} (admin={admin}): {message}", session.id());
    }

    fn events_enabled(&self) -> bool {
        true
    }

    fn notify_event(
        &self,
        _transport: &TransportInfo,
        _session: &Arc<TransportSession>,
        event: Document,
    ) {
        info!("transport event: {event}");
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let runtime = Arc::new(LoopbackRuntime::new());
    let descriptor = create(runtime.clone());
    info!(
        "{} v{} ({})",
        descriptor.name(),
        descriptor.version_string(),
        descriptor.package()
    );

    descriptor
        .plugin
        .init(Arc::new(StdoutGateway), Some(Path::new(".")))?;

    // A peer on the loopback bus: listens where the transport publishes and
    // feeds the topic the transport subscribes to.
    let peer = runtime.create_loopback_node("peer");
    peer.subscribe(
        "gateway_pub",
        Arc::new(|payload: &[u8]| {
            info!("peer received: {}", String::from_utf8_lossy(payload));
        }),
    )?;
    let feed = peer.advertise("gateway_sub")?;

    feed.publish(br#"{"request": "ping"}"#)?;

    let session = Arc::new(TransportSession::new());
    descriptor.plugin.send_message(
        &session,
        Some(RequestId::new("demo-1")),
        false,
        Some(serde_json::json!({"response": "pong"})),
    )?;
    while peer.spin_once(Duration::from_millis(200)) {}

    // Let the spin thread deliver the inbound request before tearing down.
    thread::sleep(Duration::from_millis(200));

    descriptor.plugin.destroy();
    Ok(())
}
