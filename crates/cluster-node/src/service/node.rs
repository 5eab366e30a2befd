use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, SystemTime};

use crate::adapters::HeartbeatMonitor;
use crate::config::NodeOptions;
use crate::domain::{Address, FeatureSet, NodeError, ServerDescription, ServerType, TagSet};
use crate::events::EventListeners;
use crate::ports::{ClusterMetadata, ConnectionPool, Heartbeat, Monitor, PoolFactory};

/// What a node borrows from the cluster that created it.
#[derive(Clone)]
pub struct NodeContext {
    /// Back-reference to the owning cluster. Never keeps it alive.
    pub cluster: Weak<dyn ClusterMetadata>,
    /// Listeners shared by every node of the cluster.
    pub listeners: Arc<EventListeners>,
    /// Creates this node's pool on first use.
    pub pool_factory: Arc<dyn PoolFactory>,
}

/// Handle for one remote endpoint.
///
/// Two nodes are equal when their addresses are equal; monitor state, pool
/// state and options play no part in identity.
///
/// # Example
///
/// ```rust,ignore
/// use cluster_node::{Address, Node, NodeOptions};
///
/// let address = Address::parse("db1.example.com:27017")?;
/// let node = Node::with_heartbeat(address, heartbeat, context, NodeOptions::default()).await?;
///
/// if node.eligible_for_retryable_writes() {
///     // dispatch with a transaction number
/// }
/// node.disconnect().await;
/// ```
pub struct Node {
    pub(crate) address: Address,
    pub(crate) options: NodeOptions,
    pub(crate) monitor: Box<dyn Monitor>,
    pub(crate) cluster: Weak<dyn ClusterMetadata>,
    pub(crate) listeners: Arc<EventListeners>,
    pub(crate) pool_factory: Arc<dyn PoolFactory>,
    pub(crate) pool: OnceLock<Arc<dyn ConnectionPool>>,
    pub(crate) closed: AtomicBool,
}

impl Node {
    /// Wrap `monitor` without scanning or starting its loop.
    ///
    /// The description stays whatever the monitor currently holds until
    /// someone scans. Clusters use `connect` instead.
    pub fn new(
        address: Address,
        monitor: Box<dyn Monitor>,
        context: NodeContext,
        options: NodeOptions,
    ) -> Self {
        Self {
            address,
            options,
            monitor,
            cluster: context.cluster,
            listeners: context.listeners,
            pool_factory: context.pool_factory,
            pool: OnceLock::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a node, run the first scan, then start the monitor loop.
    ///
    /// # Errors
    ///
    /// `NodeError::Compatibility` when the first scan finds a server this
    /// client cannot talk to. Any other scan failure leaves the node usable
    /// with an unknown description; the loop keeps retrying.
    pub async fn connect(
        address: Address,
        monitor: Box<dyn Monitor>,
        context: NodeContext,
        options: NodeOptions,
    ) -> Result<Self, NodeError> {
        let node = Self::new(address, monitor, context, options);

        // Other failures are already recorded in the unknown description.
        if let Err(e @ NodeError::Compatibility(_)) = node.monitor.scan().await {
            return Err(e);
        }

        node.monitor.run();
        Ok(node)
    }

    /// `connect` with a `HeartbeatMonitor` driving `heartbeat`.
    pub async fn with_heartbeat<H: Heartbeat + 'static>(
        address: Address,
        heartbeat: H,
        context: NodeContext,
        options: NodeOptions,
    ) -> Result<Self, NodeError> {
        let monitor = HeartbeatMonitor::new(
            address.clone(),
            heartbeat,
            options.clone(),
            Arc::clone(&context.listeners),
        );
        Self::connect(address, Box::new(monitor), context, options).await
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    /// The owning cluster, if it is still alive.
    pub fn cluster(&self) -> Option<Arc<dyn ClusterMetadata>> {
        self.cluster.upgrade()
    }

    // =========================================================================
    // CACHED READS
    // =========================================================================

    /// Latest description published by the monitor.
    pub fn description(&self) -> Arc<ServerDescription> {
        self.monitor.current_description()
    }

    pub fn features(&self) -> FeatureSet {
        self.description().features()
    }

    pub fn last_scan_time(&self) -> Option<SystemTime> {
        self.monitor.last_scan_time()
    }

    pub fn heartbeat_frequency(&self) -> Duration {
        self.monitor.heartbeat_frequency()
    }

    pub fn server_type(&self) -> ServerType {
        self.description().server_type()
    }

    pub fn tags(&self) -> TagSet {
        self.description().tags().clone()
    }

    pub fn round_trip_time(&self) -> Option<Duration> {
        self.description().round_trip_time()
    }

    pub fn is_unknown(&self) -> bool {
        self.description().is_unknown()
    }

    pub fn is_standalone(&self) -> bool {
        self.description().is_standalone()
    }

    pub fn is_router(&self) -> bool {
        self.description().is_router()
    }

    pub fn is_primary(&self) -> bool {
        self.description().is_primary()
    }

    pub fn is_secondary(&self) -> bool {
        self.description().is_secondary()
    }

    pub fn is_arbiter(&self) -> bool {
        self.description().is_arbiter()
    }

    pub fn is_data_bearing(&self) -> bool {
        self.description().is_data_bearing()
    }

    /// True iff every pair in `tag_set` is present in the cached tags with an
    /// equal value. An empty set always matches.
    pub fn matches_tag_set(&self, tag_set: &TagSet) -> bool {
        self.description().matches_tag_set(tag_set)
    }

    /// One-line status, e.g. `db1:27017 Primary replica_set=rs0 pool=open`.
    pub fn summary(&self) -> String {
        let description = self.description();
        let mut summary = format!("{} {}", self.address, description.server_type());
        if let Some(name) = description.set_name() {
            summary.push_str(&format!(" replica_set={name}"));
        }
        let pool = if self.pool.get().is_some() { "open" } else { "none" };
        summary.push_str(&format!(" pool={pool}"));
        summary
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("address", &self.address)
            .field("server_type", &self.server_type())
            .field("pool", &self.pool.get().is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}
