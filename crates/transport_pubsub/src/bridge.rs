//! The bridge controller: implements the gateway's plugin contract on top of
//! one pub/sub node, one channel endpoint and one dedicated spin thread.
//!
//! Two threads touch an active bridge: whatever thread(s) the gateway calls
//! in on, and the runtime's spin thread delivering inbound payloads. The
//! lifecycle lock protects transitions only; the inbound path runs entirely
//! off `Arc`s captured at init and never takes that lock, so `destroy` can
//! join the spin thread without deadlocking against an in-flight callback.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, trace, warn};
use transport_plugin::message::{
    Document, RequestId, build_event, build_failure_event, EVENT_ADMIN_UNSUPPORTED,
    EVENT_CONNECTED, EVENT_DISCONNECTED, EVENT_PUBLISH_FAILED,
};
use transport_plugin::plugin::{
    GatewayCallbacks, Transport, TransportError, TransportInfo,
};
use transport_plugin::session::TransportSession;

use crate::codec;
use crate::config::TransportConfig;
use crate::endpoint::ChannelEndpoint;
use crate::pubsub::{MessageCallback, PubSubNode, PubSubRuntime};
use crate::spin::SpinThread;

pub const TRANSPORT_VERSION: u32 = 1;
pub const TRANSPORT_VERSION_STRING: &str = "0.1.0";
pub const TRANSPORT_NAME: &str = "Gateway pub/sub transport";
pub const TRANSPORT_DESCRIPTION: &str =
    "Bridges the gateway API onto a publish/subscribe messaging runtime";
pub const TRANSPORT_AUTHOR: &str = "transport_pubsub maintainers";
pub const TRANSPORT_PACKAGE: &str = "gateway.transport.pubsub";

pub(crate) fn transport_info() -> TransportInfo {
    TransportInfo {
        name: TRANSPORT_NAME.to_string(),
        version: TRANSPORT_VERSION,
        version_string: TRANSPORT_VERSION_STRING.to_string(),
        description: TRANSPORT_DESCRIPTION.to_string(),
        author: TRANSPORT_AUTHOR.to_string(),
        package: TRANSPORT_PACKAGE.to_string(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything the subscription callback needs, captured once at init so the
/// runtime thread never touches the lifecycle lock.
struct InboundPath {
    info: TransportInfo,
    session: Arc<TransportSession>,
    callbacks: Arc<dyn GatewayCallbacks>,
}

impl InboundPath {
    fn dispatch(&self, payload: &[u8]) {
        match codec::decode(payload) {
            Ok(document) => {
                trace!("inbound message: {} byte(s)", payload.len());
                self.callbacks
                    .incoming_request(&self.info, &self.session, None, false, document);
            }
            Err(e) => {
                // Never escalate a parse failure to the gateway.
                warn!("dropping undecodable inbound message: {e}");
            }
        }
    }
}

struct ActiveBridge {
    session: Arc<TransportSession>,
    callbacks: Arc<dyn GatewayCallbacks>,
    config: TransportConfig,
    node: Arc<dyn PubSubNode>,
    endpoint: ChannelEndpoint,
    spin: SpinThread,
}

impl ActiveBridge {
    fn notify_events(&self) -> bool {
        self.config.notify_events && self.callbacks.events_enabled()
    }
}

enum Lifecycle {
    Uninitialized,
    Initializing,
    Active(Box<ActiveBridge>),
    ShuttingDown,
    Destroyed,
}

/// The transport plugin. One instance per process; the gateway drives it
/// through the `Transport` trait.
pub struct PubSubTransport {
    info: TransportInfo,
    runtime: Arc<dyn PubSubRuntime>,
    lifecycle: Mutex<Lifecycle>,
}

impl PubSubTransport {
    pub fn new(runtime: Arc<dyn PubSubRuntime>) -> Self {
        PubSubTransport {
            info: transport_info(),
            runtime,
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
        }
    }

    /// Construct every piece of an active bridge, in dependency order. The
    /// session and the inbound path exist before the subscription so a
    /// payload arriving immediately after `subscribe` already has a complete
    /// path to the gateway.
    fn bring_up(
        &self,
        callbacks: Arc<dyn GatewayCallbacks>,
        config_dir: &Path,
    ) -> Result<ActiveBridge, TransportError> {
        let config = TransportConfig::load(config_dir);
        config.validate()?;

        let node = self.runtime.create_node(&config.node_name)?;
        let session = Arc::new(TransportSession::new());

        let inbound = InboundPath {
            info: self.info.clone(),
            session: session.clone(),
            callbacks: callbacks.clone(),
        };
        let on_message: MessageCallback = Arc::new(move |payload: &[u8]| inbound.dispatch(payload));

        let endpoint = match ChannelEndpoint::open(&node, &config, on_message) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.runtime.destroy_node(&node);
                return Err(e);
            }
        };

        let mut spin = SpinThread::new();
        if let Err(e) = spin.start(node.clone()) {
            self.runtime.destroy_node(&node);
            return Err(e);
        }

        Ok(ActiveBridge { session, callbacks, config, node, endpoint, spin })
    }
}

impl Transport for PubSubTransport {
    fn info(&self) -> &TransportInfo {
        &self.info
    }

    fn init(
        &self,
        callbacks: Arc<dyn GatewayCallbacks>,
        config_path: Option<&Path>,
    ) -> Result<(), TransportError> {
        let Some(config_dir) = config_path else {
            error!("init called without a config path");
            return Err(TransportError::InvalidArgument("config_path".into()));
        };

        {
            let mut lifecycle = lock(&self.lifecycle);
            match *lifecycle {
                Lifecycle::Uninitialized => *lifecycle = Lifecycle::Initializing,
                _ => {
                    error!("init called on an already-initialized transport");
                    return Err(TransportError::InvalidState);
                }
            }
        }

        match self.bring_up(callbacks, config_dir) {
            Ok(active) => {
                let session = active.session.clone();
                let notify = active.notify_events();
                let callbacks = active.callbacks.clone();
                info!(
                    "transport up: node '{}', session {}",
                    active.config.node_name,
                    session.id()
                );
                *lock(&self.lifecycle) = Lifecycle::Active(Box::new(active));
                if notify {
                    callbacks.notify_event(&self.info, &session, build_event(EVENT_CONNECTED));
                }
                Ok(())
            }
            Err(e) => {
                *lock(&self.lifecycle) = Lifecycle::Uninitialized;
                error!("init failed, no state retained: {e}");
                Err(e)
            }
        }
    }

    fn destroy(&self) {
        let mut active = {
            let mut lifecycle = lock(&self.lifecycle);
            match std::mem::replace(&mut *lifecycle, Lifecycle::ShuttingDown) {
                Lifecycle::Active(active) => active,
                other => {
                    // No active bridge: restore whatever state we were in.
                    *lifecycle = other;
                    debug!("destroy called without an active bridge, nothing to do");
                    return;
                }
            }
        };

        // Ordering is load-bearing: tell the gateway the connection is gone,
        // signal the runtime to stop, and only then join; joining first would
        // wait forever on the blocking spin loop.
        if active.notify_events() {
            active.callbacks.notify_event(
                &self.info,
                &active.session,
                build_event(EVENT_DISCONNECTED),
            );
        }
        debug!("session {} closed", active.session.id());

        if let Err(e) = active.spin.request_stop(self.runtime.as_ref()) {
            error!("could not signal spin thread to stop: {e}");
        } else if let Err(e) = active.spin.join() {
            error!("spin thread did not shut down cleanly: {e}");
        }

        self.runtime.destroy_node(&active.node);
        drop(active);

        *lock(&self.lifecycle) = Lifecycle::Destroyed;
        info!("transport destroyed");
    }

    fn is_primary_api_enabled(&self) -> bool {
        true
    }

    fn is_admin_api_enabled(&self) -> bool {
        false
    }

    fn send_message(
        &self,
        session: &Arc<TransportSession>,
        _request_id: Option<RequestId>,
        admin: bool,
        message: Option<Document>,
    ) -> Result<(), TransportError> {
        // Ownership of `message` is ours on every path below.
        let Some(document) = message else {
            error!("send_message called without a document");
            return Err(TransportError::InvalidArgument("message".into()));
        };

        let (endpoint, format, callbacks, our_session, notify) = {
            let lifecycle = lock(&self.lifecycle);
            let Lifecycle::Active(active) = &*lifecycle else {
                error!("send_message called while transport is not active");
                return Err(TransportError::InvalidState);
            };
            (
                active.endpoint.clone(),
                active.config.json_format,
                active.callbacks.clone(),
                active.session.clone(),
                active.notify_events(),
            )
        };

        if admin {
            // The host contract has no "unsupported" return for this call
            // shape, so the admin channel reports success without publishing.
            // Loud, not silent: log it and push a side-channel event.
            warn!("admin API message dropped: admin channel is not supported");
            if notify {
                callbacks.notify_event(
                    &self.info,
                    &our_session,
                    build_event(EVENT_ADMIN_UNSUPPORTED),
                );
            }
            return Ok(());
        }

        let payload = match codec::encode(&document, format) {
            Ok(payload) => payload,
            Err(e) => {
                error!("could not encode outbound document: {e}");
                return Err(e);
            }
        };

        if let Err(e) = endpoint.publish(payload.as_bytes()) {
            // The gateway cannot observe this failure through the send
            // contract itself; surface it via log and side-channel.
            error!("publish on '{}' failed: {e}", endpoint.publish_topic());
            if notify {
                callbacks.notify_event(
                    &self.info,
                    &our_session,
                    build_failure_event(EVENT_PUBLISH_FAILED, &e.to_string()),
                );
            }
            return Err(e);
        }

        trace!(
            "published {} byte(s) on '{}' for session {}",
            payload.len(),
            endpoint.publish_topic(),
            session.id()
        );
        Ok(())
    }

    fn session_created(&self, _session: &Arc<TransportSession>, session_id: u64) {
        trace!("gateway session {session_id} created");
    }

    fn session_over(
        &self,
        _session: &Arc<TransportSession>,
        session_id: u64,
        timed_out: bool,
        claimed: bool,
    ) {
        trace!("gateway session {session_id} over (timed_out={timed_out}, claimed={claimed})");
    }

    fn session_claimed(&self, _session: &Arc<TransportSession>, session_id: u64) {
        trace!("gateway session {session_id} claimed");
    }
}
