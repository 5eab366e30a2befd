//! Centralized Testing Utilities
//!
//! Mock collaborators for the node and its monitor. Available in unit tests
//! and with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use cluster_node::testing::{primary_reply, MockHeartbeat};
//!
//! let heartbeat = MockHeartbeat::new(primary_reply());
//! assert_eq!(heartbeat.calls(), 0);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::config::PoolOptions;
use crate::domain::{
    Address, CompatibilityError, HelloReply, NodeError, ServerDescription, ServerType,
    WireVersionRange, CLIENT_WIRE_VERSIONS,
};
use crate::events::{EventListeners, NodeEvent, NodeEventListener};
use crate::ports::{ClusterMetadata, Connection, ConnectionPool, Heartbeat, Monitor, PoolFactory};
use crate::service::NodeContext;

/// Reply of a primary speaking every wire version this client knows, with
/// sessions enabled.
pub fn primary_reply() -> HelloReply {
    HelloReply::new(ServerType::Primary, WireVersionRange::new(0, 6))
        .with_logical_session_timeout(Duration::from_secs(30 * 60))
        .with_set_name("rs0")
}

// =============================================================================
// HEARTBEAT
// =============================================================================

/// Heartbeat answering from a queue, then from a fallback reply.
pub struct MockHeartbeat {
    queued: Mutex<VecDeque<Result<HelloReply, NodeError>>>,
    fallback: Mutex<Result<HelloReply, NodeError>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockHeartbeat {
    /// Heartbeat that always answers `reply`.
    pub fn new(reply: HelloReply) -> Self {
        Self::with_fallback(Ok(reply))
    }

    /// Heartbeat that always fails with `error`.
    pub fn failing(error: NodeError) -> Self {
        Self::with_fallback(Err(error))
    }

    fn with_fallback(fallback: Result<HelloReply, NodeError>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer `result` once before falling back.
    pub fn push(&self, result: Result<HelloReply, NodeError>) {
        self.queued.lock().push_back(result);
    }

    /// Replace the fallback answer.
    pub fn set_fallback(&self, result: Result<HelloReply, NodeError>) {
        *self.fallback.lock() = result;
    }

    /// Sleep this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Heartbeat for MockHeartbeat {
    async fn check(&self, _address: &Address) -> Result<HelloReply, NodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.queued.lock().pop_front();
        match queued {
            Some(result) => result,
            None => self.fallback.lock().clone(),
        }
    }
}

// =============================================================================
// MONITOR
// =============================================================================

/// Monitor whose description is set by the test.
pub struct MockMonitor {
    address: Address,
    description: RwLock<Arc<ServerDescription>>,
    scan_error: Mutex<Option<NodeError>>,
    last_scan: RwLock<Option<SystemTime>>,
    frequency: Duration,
    running: AtomicBool,
    graceful_stop: AtomicBool,
    scans: AtomicUsize,
    runs: AtomicUsize,
    stops: AtomicUsize,
    restarts: AtomicUsize,
    marks: AtomicUsize,
    scan_requests: AtomicUsize,
}

impl MockMonitor {
    /// Stopped monitor with an unknown description.
    pub fn new(address: Address) -> Self {
        Self {
            description: RwLock::new(Arc::new(ServerDescription::unknown(address.clone()))),
            address,
            scan_error: Mutex::new(None),
            last_scan: RwLock::new(None),
            frequency: Duration::from_secs(10),
            running: AtomicBool::new(false),
            graceful_stop: AtomicBool::new(true),
            scans: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            restarts: AtomicUsize::new(0),
            marks: AtomicUsize::new(0),
            scan_requests: AtomicUsize::new(0),
        }
    }

    /// Publish the description built from `reply`.
    pub fn describe(&self, reply: HelloReply) -> Result<(), CompatibilityError> {
        let description =
            ServerDescription::from_reply(self.address.clone(), reply, CLIENT_WIRE_VERSIONS)?;
        self.set_description(description);
        Ok(())
    }

    pub fn set_description(&self, description: ServerDescription) {
        *self.description.write() = Arc::new(description);
    }

    /// Make every following scan fail with `error`; `None` to succeed again.
    pub fn set_scan_error(&self, error: Option<NodeError>) {
        *self.scan_error.lock() = error;
    }

    /// Value `stop()` reports.
    pub fn set_graceful_stop(&self, graceful: bool) {
        self.graceful_stop.store(graceful, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    pub fn marks(&self) -> usize {
        self.marks.load(Ordering::SeqCst)
    }

    pub fn scan_requests(&self) -> usize {
        self.scan_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Monitor for MockMonitor {
    async fn scan(&self) -> Result<Arc<ServerDescription>, NodeError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let error = self.scan_error.lock().clone();
        let result = match error {
            Some(e) => {
                self.set_description(ServerDescription::unknown_with_error(
                    self.address.clone(),
                    e.to_string(),
                ));
                Err(e)
            }
            None => Ok(self.current_description()),
        };
        *self.last_scan.write() = Some(SystemTime::now());
        result
    }

    fn run(&self) {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    async fn stop(&self) -> bool {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.graceful_stop.load(Ordering::SeqCst)
    }

    fn restart(&self) {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    fn current_description(&self) -> Arc<ServerDescription> {
        self.description.read().clone()
    }

    fn last_scan_time(&self) -> Option<SystemTime> {
        *self.last_scan.read()
    }

    fn heartbeat_frequency(&self) -> Duration {
        self.frequency
    }

    fn mark_unknown(&self, reason: &str) {
        self.marks.fetch_add(1, Ordering::SeqCst);
        self.set_description(ServerDescription::unknown_with_error(
            self.address.clone(),
            reason,
        ));
    }

    fn request_scan(&self) {
        self.scan_requests.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// CONNECTION POOL
// =============================================================================

/// Connection whose ping outcome is controlled by its pool.
pub struct MockConnection {
    id: u64,
    fail_ping: Arc<AtomicBool>,
}

#[async_trait]
impl Connection for MockConnection {
    fn id(&self) -> u64 {
        self.id
    }

    async fn ping(&mut self) -> Result<(), NodeError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(NodeError::connectivity(
                format!("mock#{}", self.id),
                "connection reset by peer",
            ));
        }
        Ok(())
    }
}

/// Pool counting every interaction.
#[derive(Default)]
pub struct MockConnectionPool {
    next_id: AtomicU64,
    outstanding: AtomicUsize,
    checkouts: AtomicUsize,
    checkins: AtomicUsize,
    clears: AtomicUsize,
    disconnects: AtomicUsize,
    checkout_error: Mutex<Option<NodeError>>,
    fail_ping: Arc<AtomicBool>,
    returned: Mutex<Vec<u64>>,
}

impl MockConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following checkout fail with `error`; `None` to succeed again.
    pub fn fail_checkout(&self, error: Option<NodeError>) {
        *self.checkout_error.lock() = error;
    }

    /// Make pings on connections from this pool fail.
    pub fn fail_ping(&self, fail: bool) {
        self.fail_ping.store(fail, Ordering::SeqCst);
    }

    /// Connections checked out and not yet returned.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn checkouts(&self) -> usize {
        self.checkouts.load(Ordering::SeqCst)
    }

    pub fn checkins(&self) -> usize {
        self.checkins.load(Ordering::SeqCst)
    }

    /// Ids of returned connections, in return order.
    pub fn returned_ids(&self) -> Vec<u64> {
        self.returned.lock().clone()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionPool for MockConnectionPool {
    async fn check_out(&self) -> Result<Box<dyn Connection>, NodeError> {
        let error = self.checkout_error.lock().clone();
        if let Some(e) = error {
            return Err(e);
        }
        self.checkouts.fetch_add(1, Ordering::SeqCst);
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            fail_ping: Arc::clone(&self.fail_ping),
        }))
    }

    fn check_in(&self, connection: Box<dyn Connection>) {
        self.returned.lock().push(connection.id());
        self.checkins.fetch_add(1, Ordering::SeqCst);
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory handing out one shared `MockConnectionPool`.
#[derive(Default)]
pub struct MockPoolFactory {
    pool: Arc<MockConnectionPool>,
    created: AtomicUsize,
    last_options: Mutex<Option<PoolOptions>>,
}

impl MockPoolFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pool every `create` call returns.
    pub fn pool(&self) -> &Arc<MockConnectionPool> {
        &self.pool
    }

    /// Number of `create` calls.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Options passed to the latest `create` call.
    pub fn last_options(&self) -> Option<PoolOptions> {
        self.last_options.lock().clone()
    }
}

impl PoolFactory for MockPoolFactory {
    fn create(&self, _address: &Address, options: &PoolOptions) -> Arc<dyn ConnectionPool> {
        self.created.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(options.clone());
        self.pool.clone()
    }
}

// =============================================================================
// CLUSTER AND LISTENERS
// =============================================================================

/// Cluster configured with a fixed replica set name.
#[derive(Debug, Default)]
pub struct StaticCluster {
    replica_set_name: Option<String>,
}

impl StaticCluster {
    pub fn new(replica_set_name: Option<&str>) -> Self {
        Self {
            replica_set_name: replica_set_name.map(str::to_string),
        }
    }
}

impl ClusterMetadata for StaticCluster {
    fn replica_set_name(&self) -> Option<String> {
        self.replica_set_name.clone()
    }
}

/// Listener keeping every event it receives.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<NodeEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NodeEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&NodeEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn closed(&self) -> usize {
        self.count(|e| matches!(e, NodeEvent::Closed { .. }))
    }

    pub fn description_changes(&self) -> usize {
        self.count(|e| matches!(e, NodeEvent::DescriptionChanged { .. }))
    }

    pub fn heartbeat_failures(&self) -> usize {
        self.count(|e| matches!(e, NodeEvent::HeartbeatFailed { .. }))
    }
}

impl NodeEventListener for RecordingListener {
    fn on_event(&self, event: &NodeEvent) {
        self.events.lock().push(event.clone());
    }
}

// =============================================================================
// FIXTURE
// =============================================================================

/// Everything a node needs from its cluster, with handles kept for
/// assertions. The fixture owns the cluster; dropping it leaves nodes with a
/// dangling back-reference.
pub struct ClusterFixture {
    pub cluster: Arc<StaticCluster>,
    pub listeners: Arc<EventListeners>,
    pub recorder: Arc<RecordingListener>,
    pub pools: Arc<MockPoolFactory>,
}

impl ClusterFixture {
    pub fn new() -> Self {
        let listeners = Arc::new(EventListeners::new());
        let recorder = Arc::new(RecordingListener::new());
        listeners.subscribe(recorder.clone());
        Self {
            cluster: Arc::new(StaticCluster::new(Some("rs0"))),
            listeners,
            recorder,
            pools: Arc::new(MockPoolFactory::new()),
        }
    }

    pub fn context(&self) -> NodeContext {
        let cluster: Arc<dyn ClusterMetadata> = self.cluster.clone();
        NodeContext {
            cluster: Arc::downgrade(&cluster),
            listeners: Arc::clone(&self.listeners),
            pool_factory: self.pools.clone(),
        }
    }
}

impl Default for ClusterFixture {
    fn default() -> Self {
        Self::new()
    }
}
