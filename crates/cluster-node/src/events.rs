//! # Node Events
//!
//! Notifications published by a node and its monitor. Listeners are shared
//! between every node of a cluster; the cluster typically subscribes to
//! `DescriptionChanged` to reclassify its topology.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::domain::{Address, NodeError, ServerDescription};

/// Something observable happened to a node.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// A heartbeat is about to be sent.
    HeartbeatStarted {
        address: Address,
    },
    /// A heartbeat completed.
    HeartbeatSucceeded {
        address: Address,
        duration: Duration,
    },
    /// A heartbeat failed or timed out.
    HeartbeatFailed {
        address: Address,
        duration: Duration,
        error: NodeError,
    },
    /// A new description replaced the previous one.
    DescriptionChanged {
        address: Address,
        previous: Arc<ServerDescription>,
        current: Arc<ServerDescription>,
    },
    /// The node was disconnected by its owner.
    Closed {
        address: Address,
    },
}

impl NodeEvent {
    /// Endpoint the event is about.
    pub fn address(&self) -> &Address {
        match self {
            Self::HeartbeatStarted { address }
            | Self::HeartbeatSucceeded { address, .. }
            | Self::HeartbeatFailed { address, .. }
            | Self::DescriptionChanged { address, .. }
            | Self::Closed { address } => address,
        }
    }
}

/// Receives node events.
///
/// Called synchronously on the publishing task; implementations must not
/// block.
pub trait NodeEventListener: Send + Sync {
    fn on_event(&self, event: &NodeEvent);
}

/// Set of listeners shared by a cluster's nodes and monitors.
#[derive(Default)]
pub struct EventListeners {
    listeners: RwLock<Vec<Arc<dyn NodeEventListener>>>,
}

impl EventListeners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for all subsequent events.
    pub fn subscribe(&self, listener: Arc<dyn NodeEventListener>) {
        self.listeners.write().push(listener);
    }

    /// Deliver `event` to every listener.
    pub fn publish(&self, event: NodeEvent) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_event(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl std::fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListeners")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl NodeEventListener for Counter {
        fn on_event(&self, _event: &NodeEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_publish_reaches_every_listener() {
        let listeners = EventListeners::new();
        let a = Arc::new(Counter::default());
        let b = Arc::new(Counter::default());
        listeners.subscribe(a.clone());
        listeners.subscribe(b.clone());

        listeners.publish(NodeEvent::Closed {
            address: Address::parse("h:1").unwrap(),
        });

        assert_eq!(listeners.len(), 2);
        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_address() {
        let address = Address::parse("h:2").unwrap();
        let event = NodeEvent::HeartbeatStarted {
            address: address.clone(),
        };
        assert_eq!(event.address(), &address);
    }

    #[test]
    fn test_empty_set_publishes_nothing() {
        let listeners = EventListeners::new();
        assert!(listeners.is_empty());
        listeners.publish(NodeEvent::Closed {
            address: Address::parse("h:1").unwrap(),
        });
    }
}
