use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::domain::{NodeError, ServerDescription};
use crate::events::NodeEvent;
use crate::service::Node;

impl Node {
    /// Stop the monitor loop, then disconnect the pool if one was created.
    ///
    /// Idempotent: only the first call after connecting does any work and
    /// publishes `NodeEvent::Closed`. Stopping waits at most
    /// `monitor_stop_timeout` for an in-flight scan.
    pub async fn disconnect(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // A forced stop is logged by the monitor itself.
        self.monitor.stop().await;
        if let Some(pool) = self.pool.get() {
            pool.disconnect().await;
        }

        self.listeners.publish(NodeEvent::Closed {
            address: self.address.clone(),
        });
    }

    /// Restart the monitor loop, keeping the pool as it is.
    pub fn reconnect(&self) {
        self.monitor.restart();
        self.closed.store(false, Ordering::SeqCst);
    }

    /// True between `disconnect` and the next `reconnect`.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Ask the monitor to refresh before its next regular heartbeat.
    pub fn request_scan(&self) {
        self.monitor.request_scan();
    }

    /// Refresh the description now and wait for the result.
    pub async fn scan(&self) -> Result<Arc<ServerDescription>, NodeError> {
        self.monitor.scan().await
    }
}
