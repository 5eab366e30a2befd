//! # Driven Ports (Outbound SPI)
//!
//! Collaborators a node depends on. The cluster (or a test) supplies the
//! implementations; this crate ships `HeartbeatMonitor` as the production
//! `Monitor`.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::config::PoolOptions;
use crate::domain::{Address, HelloReply, NodeError, ServerDescription};

/// One handshake round trip against an endpoint.
///
/// Wire exchange and reply decoding live behind this trait.
#[async_trait]
pub trait Heartbeat: Send + Sync {
    /// Send a handshake and return the decoded reply.
    ///
    /// Decoders build the reported range with `WireVersionRange::try_new`
    /// and propagate its error.
    async fn check(&self, address: &Address) -> Result<HelloReply, NodeError>;
}

/// Keeps the cached description of one endpoint fresh.
///
/// # Thread Safety
///
/// Reads (`current_description`, `last_scan_time`, `heartbeat_frequency`)
/// never block on I/O and may be called from any task while a scan is in
/// flight. Descriptions are replaced as whole values.
#[async_trait]
pub trait Monitor: Send + Sync {
    /// Force a refresh and wait until the result is cached.
    async fn scan(&self) -> Result<Arc<ServerDescription>, NodeError>;

    /// Start the background refresh loop. No-op when already running.
    fn run(&self);

    /// Stop the loop, waiting a bounded time for an in-flight scan.
    ///
    /// Returns `false` when the loop had to be aborted.
    async fn stop(&self) -> bool;

    /// Stop the loop without waiting and start a fresh one.
    fn restart(&self);

    /// Latest published description.
    fn current_description(&self) -> Arc<ServerDescription>;

    /// When the last scan completed, successfully or not.
    fn last_scan_time(&self) -> Option<SystemTime>;

    fn heartbeat_frequency(&self) -> Duration;

    /// Replace the cached description with an unknown one.
    fn mark_unknown(&self, reason: &str);

    /// Ask the loop to scan before the next regular heartbeat.
    fn request_scan(&self);
}

/// A physical connection owned by a pool.
#[async_trait]
pub trait Connection: Send {
    /// Pool-assigned identifier.
    fn id(&self) -> u64;

    /// Round trip proving the connection is alive.
    async fn ping(&mut self) -> Result<(), NodeError>;
}

/// Pool of connections to one endpoint.
///
/// The pool bounds its own concurrency; callers only check out and in.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Take a connection, opening one if the pool allows it.
    async fn check_out(&self) -> Result<Box<dyn Connection>, NodeError>;

    /// Return a connection taken with `check_out`.
    fn check_in(&self, connection: Box<dyn Connection>);

    /// Drop idle connections and retire checked-out ones on return.
    fn clear(&self);

    /// Close every connection. Idempotent.
    async fn disconnect(&self);
}

/// Creates the pool of a node on first use.
pub trait PoolFactory: Send + Sync {
    fn create(&self, address: &Address, options: &PoolOptions) -> Arc<dyn ConnectionPool>;
}

/// Cluster-wide facts a node may consult through its back-reference.
pub trait ClusterMetadata: Send + Sync {
    /// Replica set name the cluster was configured with.
    fn replica_set_name(&self) -> Option<String>;
}

#[async_trait]
impl<T: Heartbeat + ?Sized> Heartbeat for Arc<T> {
    async fn check(&self, address: &Address) -> Result<HelloReply, NodeError> {
        (**self).check(address).await
    }
}

#[async_trait]
impl<T: Monitor + ?Sized> Monitor for Arc<T> {
    async fn scan(&self) -> Result<Arc<ServerDescription>, NodeError> {
        (**self).scan().await
    }

    fn run(&self) {
        (**self).run()
    }

    async fn stop(&self) -> bool {
        (**self).stop().await
    }

    fn restart(&self) {
        (**self).restart()
    }

    fn current_description(&self) -> Arc<ServerDescription> {
        (**self).current_description()
    }

    fn last_scan_time(&self) -> Option<SystemTime> {
        (**self).last_scan_time()
    }

    fn heartbeat_frequency(&self) -> Duration {
        (**self).heartbeat_frequency()
    }

    fn mark_unknown(&self, reason: &str) {
        (**self).mark_unknown(reason)
    }

    fn request_scan(&self) {
        (**self).request_scan()
    }
}
