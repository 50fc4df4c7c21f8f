//! In-process implementation of the pub/sub runtime interface.
//!
//! A shared topic bus routes published payloads onto the queue of every node
//! subscribed to the topic; each node's `spin` loop drains its own queue and
//! fires the subscription callbacks on the spinning thread. Used by the demo
//! binary and the test suite; anything honoring the `pubsub` traits can take
//! its place in a real deployment.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tracing::trace;
use transport_plugin::plugin::TransportError;

use crate::pubsub::{MessageCallback, PubSubNode, PubSubRuntime, Publication};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Delivery {
    callback: MessageCallback,
    payload: Vec<u8>,
}

/// One node's inbound queue. `pop` blocks until a payload or the shutdown
/// flag arrives; pending payloads are still drained after shutdown.
struct NodeQueue {
    pending: Mutex<VecDeque<Delivery>>,
    ready: Condvar,
    shutdown: AtomicBool,
}

impl NodeQueue {
    fn new() -> Self {
        NodeQueue {
            pending: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    fn push(&self, delivery: Delivery) {
        lock(&self.pending).push_back(delivery);
        self.ready.notify_all();
    }

    fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.ready.notify_all();
    }

    fn pop(&self, timeout: Option<Duration>) -> Option<Delivery> {
        let mut pending = lock(&self.pending);
        loop {
            if let Some(delivery) = pending.pop_front() {
                return Some(delivery);
            }
            if self.shutdown.load(Ordering::SeqCst) {
                return None;
            }
            match timeout {
                Some(t) => {
                    let (guard, result) = self
                        .ready
                        .wait_timeout(pending, t)
                        .unwrap_or_else(PoisonError::into_inner);
                    pending = guard;
                    if result.timed_out() {
                        return pending.pop_front();
                    }
                }
                None => {
                    pending = self.ready.wait(pending).unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }
}

struct Subscriber {
    node: String,
    queue: Arc<NodeQueue>,
    callback: MessageCallback,
}

#[derive(Default)]
struct Bus {
    topics: DashMap<String, Vec<Subscriber>>,
    queues: DashMap<String, Arc<NodeQueue>>,
}

pub struct LoopbackRuntime {
    bus: Arc<Bus>,
}

impl LoopbackRuntime {
    pub fn new() -> Self {
        LoopbackRuntime { bus: Arc::new(Bus::default()) }
    }

    /// Concrete-typed variant of `create_node`, for callers that want to
    /// drive dispatch manually via [`LoopbackNode::spin_once`].
    pub fn create_loopback_node(&self, name: &str) -> Arc<LoopbackNode> {
        let queue = Arc::new(NodeQueue::new());
        self.bus.queues.insert(name.to_string(), queue.clone());
        Arc::new(LoopbackNode {
            name: name.to_string(),
            queue,
            bus: self.bus.clone(),
        })
    }
}

impl Default for LoopbackRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSubRuntime for LoopbackRuntime {
    fn create_node(&self, name: &str) -> Result<Arc<dyn PubSubNode>, TransportError> {
        Ok(self.create_loopback_node(name))
    }

    fn request_shutdown(&self) {
        for queue in self.bus.queues.iter() {
            queue.value().request_shutdown();
        }
    }

    fn destroy_node(&self, node: &Arc<dyn PubSubNode>) {
        let name = node.name().to_string();
        if let Some((_, queue)) = self.bus.queues.remove(&name) {
            queue.request_shutdown();
        }
        for mut subscribers in self.bus.topics.iter_mut() {
            subscribers.value_mut().retain(|s| s.node != name);
        }
    }
}

pub struct LoopbackNode {
    name: String,
    queue: Arc<NodeQueue>,
    bus: Arc<Bus>,
}

impl LoopbackNode {
    /// Dispatch at most one pending payload, waiting up to `timeout` for one
    /// to arrive. Returns whether a payload was dispatched.
    pub fn spin_once(&self, timeout: Duration) -> bool {
        match self.queue.pop(Some(timeout)) {
            Some(delivery) => {
                (delivery.callback)(&delivery.payload);
                true
            }
            None => false,
        }
    }
}

impl PubSubNode for LoopbackNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn advertise(&self, topic: &str) -> Result<Arc<dyn Publication>, TransportError> {
        Ok(Arc::new(LoopbackPublication {
            topic: topic.to_string(),
            bus: self.bus.clone(),
        }))
    }

    fn subscribe(&self, topic: &str, callback: MessageCallback) -> Result<(), TransportError> {
        self.bus
            .topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber {
                node: self.name.clone(),
                queue: self.queue.clone(),
                callback,
            });
        Ok(())
    }

    fn spin(&self) {
        while let Some(delivery) = self.queue.pop(None) {
            (delivery.callback)(&delivery.payload);
        }
    }
}

struct LoopbackPublication {
    topic: String,
    bus: Arc<Bus>,
}

impl Publication for LoopbackPublication {
    fn publish(&self, payload: &[u8]) -> Result<(), TransportError> {
        let mut delivered = 0usize;
        if let Some(subscribers) = self.bus.topics.get(&self.topic) {
            for subscriber in subscribers.iter() {
                subscriber.queue.push(Delivery {
                    callback: subscriber.callback.clone(),
                    payload: payload.to_vec(),
                });
                delivered += 1;
            }
        }
        trace!("loopback publish on '{}' reached {delivered} subscriber(s)", self.topic);
        Ok(())
    }
}
