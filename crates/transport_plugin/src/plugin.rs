//! The plugin contract the gateway requires every message transport to
//! implement, reshaped from the host's raw operation table into a trait plus
//! a metadata struct. The gateway loads a transport, obtains its
//! [`TransportDescriptor`], and from then on drives it exclusively through
//! these operations.

use std::path::Path;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::{Document, RequestId};
use crate::session::TransportSession;

/// Version of the gateway/transport contract itself. The gateway refuses
/// transports compiled against a different contract version.
pub const TRANSPORT_API_VERSION: u32 = 1;

/// Static metadata describing a transport implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TransportInfo {
    pub name: String,
    pub version: u32,
    pub version_string: String,
    pub description: String,
    pub author: String,
    pub package: String,
}

/// Errors a transport operation can return to the gateway.
#[derive(Error, Debug, Serialize, Deserialize, JsonSchema)]
pub enum TransportError {
    /// A required input was missing or empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The transport is not in a state where this operation is valid.
    #[error("invalid state for this operation")]
    InvalidState,

    /// A document could not be serialized to wire text.
    #[error("encode error: {0}")]
    Encode(String),

    /// Inbound wire text was not a valid document.
    #[error("decode error at line {line}, column {column}: {message}")]
    Decode {
        line: usize,
        column: usize,
        message: String,
    },

    /// The underlying pub/sub primitive rejected a publish.
    #[error("publish error: {0}")]
    Publish(String),

    /// The messaging runtime failed (node construction, thread start, ...).
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> TransportError {
        TransportError::Decode {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }
}

/// Callback table the gateway supplies to a transport at `init`.
///
/// `incoming_request` may be invoked from whatever thread the transport's
/// delivery machinery runs on; implementations must be thread-safe and are
/// responsible for any hand-off onto their own execution context.
pub trait GatewayCallbacks: Send + Sync {
    /// Deliver one decoded inbound document to the gateway's request router.
    fn incoming_request(
        &self,
        transport: &TransportInfo,
        session: &Arc<TransportSession>,
        request_id: Option<RequestId>,
        admin: bool,
        message: Document,
    );

    /// Whether the gateway wants connectivity-class event notifications.
    fn events_enabled(&self) -> bool {
        false
    }

    /// Observability side-channel; never required for correctness.
    fn notify_event(
        &self,
        _transport: &TransportInfo,
        _session: &Arc<TransportSession>,
        _event: Document,
    ) {
    }
}

/// The operations every transport exposes to the gateway.
pub trait Transport: Send + Sync {
    fn info(&self) -> &TransportInfo;

    fn api_compatibility(&self) -> u32 {
        TRANSPORT_API_VERSION
    }

    /// Bring the transport up. `config_path` points at the directory holding
    /// the transport's configuration file; `None` is rejected with
    /// `InvalidArgument` and no side effects. A failed init retains no
    /// partial state.
    fn init(
        &self,
        callbacks: Arc<dyn GatewayCallbacks>,
        config_path: Option<&Path>,
    ) -> Result<(), TransportError>;

    /// Tear the transport down. Safe to call without a prior successful
    /// `init` and safe to call more than once.
    fn destroy(&self);

    fn is_primary_api_enabled(&self) -> bool;
    fn is_admin_api_enabled(&self) -> bool;

    /// Push one outbound document. Ownership of `message` transfers to the
    /// transport on every path, success or failure.
    fn send_message(
        &self,
        session: &Arc<TransportSession>,
        request_id: Option<RequestId>,
        admin: bool,
        message: Option<Document>,
    ) -> Result<(), TransportError>;

    fn session_created(&self, session: &Arc<TransportSession>, session_id: u64);
    fn session_over(
        &self,
        session: &Arc<TransportSession>,
        session_id: u64,
        timed_out: bool,
        claimed: bool,
    );
    fn session_claimed(&self, session: &Arc<TransportSession>, session_id: u64);
}

/// What `create()` hands the gateway: metadata plus the operation table.
#[derive(Clone)]
pub struct TransportDescriptor {
    pub info: TransportInfo,
    pub plugin: Arc<dyn Transport>,
}

impl TransportDescriptor {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn version(&self) -> u32 {
        self.info.version
    }

    pub fn version_string(&self) -> &str {
        &self.info.version_string
    }

    pub fn description(&self) -> &str {
        &self.info.description
    }

    pub fn author(&self) -> &str {
        &self.info.author
    }

    pub fn package(&self) -> &str {
        &self.info.package
    }

    pub fn api_compatibility(&self) -> u32 {
        self.plugin.api_compatibility()
    }
}
