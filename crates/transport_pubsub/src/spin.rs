//! Ownership of the messaging runtime's dedicated execution thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;
use transport_plugin::plugin::TransportError;

use crate::pubsub::{PubSubNode, PubSubRuntime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinState {
    NotStarted,
    Running,
    StopRequested,
    Joined,
}

/// Exclusive owner of the thread running a node's blocking `spin` loop.
///
/// Transitions are one-way: `NotStarted -> Running -> StopRequested ->
/// Joined`. Joining before a stop was requested is rejected because the loop
/// only exits in response to the runtime's shutdown signal; the join would
/// block forever.
pub struct SpinThread {
    state: SpinState,
    handle: Option<JoinHandle<()>>,
}

impl SpinThread {
    pub fn new() -> Self {
        SpinThread { state: SpinState::NotStarted, handle: None }
    }

    pub fn state(&self) -> SpinState {
        self.state
    }

    /// Spawn the dedicated thread and enter the node's blocking event loop.
    /// Starting from any state but `NotStarted` is an explicit precondition
    /// violation.
    pub fn start(&mut self, node: Arc<dyn PubSubNode>) -> Result<(), TransportError> {
        if self.state != SpinState::NotStarted {
            return Err(TransportError::InvalidState);
        }
        let handle = thread::Builder::new()
            .name("pubsub-spin".to_string())
            .spawn(move || {
                debug!("entering pub/sub spin loop");
                node.spin();
                debug!("exited pub/sub spin loop");
            })
            .map_err(|e| TransportError::Runtime(format!("failed to spawn spin thread: {e}")))?;
        self.handle = Some(handle);
        self.state = SpinState::Running;
        Ok(())
    }

    /// Issue the runtime's shutdown signal. Must happen before `join`.
    pub fn request_stop(&mut self, runtime: &dyn PubSubRuntime) -> Result<(), TransportError> {
        if self.state != SpinState::Running {
            return Err(TransportError::InvalidState);
        }
        runtime.request_shutdown();
        self.state = SpinState::StopRequested;
        Ok(())
    }

    /// Block until the spin loop returns. There is no bounded wait: if the
    /// runtime's stop signal never unblocks its loop, this call hangs. That
    /// is an accepted risk of delegating the loop to the runtime.
    pub fn join(&mut self) -> Result<(), TransportError> {
        if self.state != SpinState::StopRequested {
            return Err(TransportError::InvalidState);
        }
        let handle = self
            .handle
            .take()
            .ok_or_else(|| TransportError::Runtime("spin thread handle missing".to_string()))?;
        handle
            .join()
            .map_err(|_| TransportError::Runtime("spin thread panicked".to_string()))?;
        self.state = SpinState::Joined;
        Ok(())
    }
}

impl Default for SpinThread {
    fn default() -> Self {
        Self::new()
    }
}
