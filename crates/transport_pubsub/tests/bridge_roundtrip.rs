//! Full-lifecycle tests driving the transport against the in-process
//! loopback runtime with a recording gateway.

use std::fs;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;
use transport_plugin::message::Document;
use transport_plugin::plugin::{
    GatewayCallbacks, TransportDescriptor, TransportError, TransportInfo,
    TRANSPORT_API_VERSION,
};
use transport_plugin::session::TransportSession;
use transport_pubsub::config::CONFIG_FILE;
use transport_pubsub::pubsub::{MessageCallback, PubSubNode, PubSubRuntime, Publication};
use transport_pubsub::{LoopbackRuntime, create};

#[derive(Default)]
struct RecordingGateway {
    requests: Mutex<Vec<(bool, Document)>>,
    events: Mutex<Vec<Document>>,
}

impl RecordingGateway {
    fn requests(&self) -> Vec<(bool, Document)> {
        self.requests.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<Document> {
        self.events.lock().unwrap().clone()
    }
}

impl GatewayCallbacks for RecordingGateway {
    fn incoming_request(
        &self,
        _transport: &TransportInfo,
        _session: &Arc<TransportSession>,
        request_id: Option<transport_plugin::message::RequestId>,
        admin: bool,
        message: Document,
    ) {
        assert!(request_id.is_none(), "inbound messages carry no request id");
        self.requests.lock().unwrap().push((admin, message));
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
        self.events.lock().unwrap().push(event);
    }
}

fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

struct Harness {
    runtime: Arc<LoopbackRuntime>,
    descriptor: TransportDescriptor,
    gateway: Arc<RecordingGateway>,
    config_dir: tempfile::TempDir,
}

/// Bring a transport up over a fresh loopback bus with default topics
/// (no config file in the temp dir, so the defaults apply).
fn bring_up() -> Harness {
    let runtime = Arc::new(LoopbackRuntime::new());
    let descriptor = create(runtime.clone());
    let gateway = Arc::new(RecordingGateway::default());
    let config_dir = tempfile::tempdir().unwrap();

    descriptor
        .plugin
        .init(gateway.clone(), Some(config_dir.path()))
        .expect("init should succeed");

    Harness { runtime, descriptor, gateway, config_dir }
}

fn event_names(events: &[Document]) -> Vec<String> {
    events
        .iter()
        .map(|e| e["event"].as_str().unwrap_or_default().to_string())
        .collect()
}

/// Loopback wrapper whose publications reject every payload, for driving the
/// outbound failure path.
struct RejectingRuntime {
    inner: Arc<LoopbackRuntime>,
}

impl RejectingRuntime {
    fn new() -> Self {
        RejectingRuntime { inner: Arc::new(LoopbackRuntime::new()) }
    }
}

impl PubSubRuntime for RejectingRuntime {
    fn create_node(&self, name: &str) -> Result<Arc<dyn PubSubNode>, TransportError> {
        Ok(Arc::new(RejectingNode { inner: self.inner.create_node(name)? }))
    }

    fn request_shutdown(&self) {
        self.inner.request_shutdown();
    }

    fn destroy_node(&self, node: &Arc<dyn PubSubNode>) {
        self.inner.destroy_node(node);
    }
}

struct RejectingNode {
    inner: Arc<dyn PubSubNode>,
}

impl PubSubNode for RejectingNode {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn advertise(&self, _topic: &str) -> Result<Arc<dyn Publication>, TransportError> {
        Ok(Arc::new(RejectingPublication))
    }

    fn subscribe(&self, topic: &str, callback: MessageCallback) -> Result<(), TransportError> {
        self.inner.subscribe(topic, callback)
    }

    fn spin(&self) {
        self.inner.spin();
    }
}

struct RejectingPublication;

impl Publication for RejectingPublication {
    fn publish(&self, _payload: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::Publish("broker rejected payload".to_string()))
    }
}

#[test]
fn init_reports_capabilities() {
    let h = bring_up();

    assert!(h.descriptor.plugin.is_primary_api_enabled());
    assert!(!h.descriptor.plugin.is_admin_api_enabled());
    assert_eq!(h.descriptor.api_compatibility(), TRANSPORT_API_VERSION);
    assert_eq!(h.descriptor.package(), "gateway.transport.pubsub");

    h.descriptor.plugin.destroy();
}

#[test]
fn inbound_document_reaches_gateway() {
    let h = bring_up();

    let feeder = h.runtime.create_loopback_node("feeder");
    let feed = feeder.advertise("gateway_sub").unwrap();
    feed.publish(br#"{"a":1}"#).unwrap();

    assert!(wait_for(|| !h.gateway.requests().is_empty(), Duration::from_secs(2)));
    let requests = h.gateway.requests();
    assert_eq!(requests.len(), 1);
    let (admin, document) = &requests[0];
    assert!(!admin);
    assert_eq!(document, &json!({"a": 1}));

    h.descriptor.plugin.destroy();
}

#[test]
fn undecodable_inbound_is_dropped() {
    let h = bring_up();

    let feeder = h.runtime.create_loopback_node("feeder");
    let feed = feeder.advertise("gateway_sub").unwrap();
    feed.publish(b"{invalid json").unwrap();

    // A valid follow-up proves the spin loop survived the bad payload.
    feed.publish(br#"{"ok":true}"#).unwrap();
    assert!(wait_for(|| !h.gateway.requests().is_empty(), Duration::from_secs(2)));

    let requests = h.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1, json!({"ok": true}));

    h.descriptor.plugin.destroy();
}

#[test]
fn send_publishes_encoded_document() {
    let h = bring_up();

    let observer = h.runtime.create_loopback_node("observer");
    let seen = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let sink = seen.clone();
    observer
        .subscribe("gateway_pub", Arc::new(move |p: &[u8]| sink.lock().unwrap().push(p.to_vec())))
        .unwrap();

    let session = Arc::new(TransportSession::new());
    h.descriptor
        .plugin
        .send_message(&session, None, false, Some(json!({"b": 2})))
        .expect("send should succeed");

    assert!(observer.spin_once(Duration::from_secs(1)));
    let payloads = seen.lock().unwrap();
    assert_eq!(payloads.len(), 1);
    let round_tripped: Document = serde_json::from_slice(&payloads[0]).unwrap();
    assert_eq!(round_tripped, json!({"b": 2}));

    h.descriptor.plugin.destroy();
}

#[test]
fn admin_send_is_a_loud_no_op() {
    let h = bring_up();

    let observer = h.runtime.create_loopback_node("observer");
    let seen = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let sink = seen.clone();
    observer
        .subscribe("gateway_pub", Arc::new(move |p: &[u8]| sink.lock().unwrap().push(p.to_vec())))
        .unwrap();

    let session = Arc::new(TransportSession::new());
    let result = h
        .descriptor
        .plugin
        .send_message(&session, None, true, Some(json!({"secret": true})));

    assert!(result.is_ok(), "admin sends report success");
    assert!(!observer.spin_once(Duration::from_millis(200)), "nothing may be published");
    assert!(event_names(&h.gateway.events()).contains(&"admin_unsupported".to_string()));

    h.descriptor.plugin.destroy();
}

#[test]
fn missing_document_is_rejected_without_side_effects() {
    let h = bring_up();

    let observer = h.runtime.create_loopback_node("observer");
    let seen = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let sink = seen.clone();
    observer
        .subscribe("gateway_pub", Arc::new(move |p: &[u8]| sink.lock().unwrap().push(p.to_vec())))
        .unwrap();

    let session = Arc::new(TransportSession::new());
    let result = h.descriptor.plugin.send_message(&session, None, false, None);

    assert!(matches!(result, Err(TransportError::InvalidArgument(_))));
    assert!(!observer.spin_once(Duration::from_millis(200)));
    assert!(h.gateway.requests().is_empty());

    h.descriptor.plugin.destroy();
}

#[test]
fn second_init_is_rejected() {
    let h = bring_up();

    let second = h
        .descriptor
        .plugin
        .init(h.gateway.clone(), Some(h.config_dir.path()));
    assert!(matches!(second, Err(TransportError::InvalidState)));

    h.descriptor.plugin.destroy();
}

#[test]
fn init_without_config_path_has_no_side_effects() {
    let runtime = Arc::new(LoopbackRuntime::new());
    let descriptor = create(runtime);
    let gateway = Arc::new(RecordingGateway::default());

    let result = descriptor.plugin.init(gateway.clone(), None);
    assert!(matches!(result, Err(TransportError::InvalidArgument(_))));
    assert!(gateway.events().is_empty());

    // The failed call retained nothing; a proper init still works.
    let config_dir = tempfile::tempdir().unwrap();
    descriptor
        .plugin
        .init(gateway, Some(config_dir.path()))
        .expect("init after a rejected call should succeed");
    descriptor.plugin.destroy();
}

#[test]
fn destroy_is_idempotent_and_safe_without_init() {
    // Never initialized: must be a harmless no-op.
    let fresh = create(Arc::new(LoopbackRuntime::new()));
    fresh.plugin.destroy();

    // Initialized: second destroy must not double-join or panic.
    let h = bring_up();
    h.descriptor.plugin.destroy();
    h.descriptor.plugin.destroy();
}

#[test]
fn publish_failure_returns_error_and_event() {
    let descriptor = create(Arc::new(RejectingRuntime::new()));
    let gateway = Arc::new(RecordingGateway::default());
    let config_dir = tempfile::tempdir().unwrap();
    descriptor
        .plugin
        .init(gateway.clone(), Some(config_dir.path()))
        .expect("init should succeed");

    let session = Arc::new(TransportSession::new());
    let result = descriptor
        .plugin
        .send_message(&session, None, false, Some(json!({"c": 3})));

    assert!(matches!(result, Err(TransportError::Publish(_))));
    let events = gateway.events();
    assert!(event_names(&events).contains(&"publish_failed".to_string()));
    let failed = events
        .iter()
        .find(|e| e["event"] == "publish_failed")
        .expect("publish_failed event present");
    assert_eq!(failed["reason"], "publish error: broker rejected payload");

    descriptor.plugin.destroy();
}

#[test]
fn publish_failure_event_is_gated_by_events_setting() {
    let descriptor = create(Arc::new(RejectingRuntime::new()));
    let gateway = Arc::new(RecordingGateway::default());
    let config_dir = tempfile::tempdir().unwrap();
    fs::write(config_dir.path().join(CONFIG_FILE), "PUBSUB_EVENTS=false\n").unwrap();
    descriptor
        .plugin
        .init(gateway.clone(), Some(config_dir.path()))
        .expect("init should succeed");

    let session = Arc::new(TransportSession::new());
    let result = descriptor
        .plugin
        .send_message(&session, None, false, Some(json!({"c": 3})));

    // The error still reaches the caller; only the side-channel goes quiet.
    assert!(matches!(result, Err(TransportError::Publish(_))));
    assert!(gateway.events().is_empty());

    descriptor.plugin.destroy();
}

#[test]
fn lifecycle_events_are_notified_in_order() {
    let h = bring_up();
    h.descriptor.plugin.destroy();

    let names = event_names(&h.gateway.events());
    assert_eq!(names.first().map(String::as_str), Some("connected"));
    assert!(names.contains(&"disconnected".to_string()));
}
