//! # Cluster Node
//!
//! Node-representation and health-monitoring layer of a database cluster
//! client. For every endpoint the client talks to, a `Node` owns:
//!
//! - the endpoint's canonical `Address` (parsing, default port, identity)
//! - a `Monitor` that keeps a `ServerDescription` fresh in the background
//! - a lazily created `ConnectionPool` used by request dispatch
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** addresses, wire-version ranges, the feature table,
//!   server descriptions, errors
//! - **Ports Layer:** traits for the heartbeat, monitor, pool and cluster
//! - **Service Layer:** `Node`, wiring the domain to the ports
//! - **Adapters Layer:** `HeartbeatMonitor`, the tokio-driven monitor
//!
//! ## Example
//!
//! ```rust
//! use cluster_node::{Address, Feature, FeatureSet, WireVersionRange, DEFAULT_PORT};
//!
//! let address: Address = "db1.example.com".parse().unwrap();
//! assert_eq!(address.port(), Some(DEFAULT_PORT));
//!
//! let features = FeatureSet::new(WireVersionRange::new(0, 2), WireVersionRange::new(0, 3)).unwrap();
//! assert!(features.supports(Feature::WriteCommand));
//! assert!(!features.supports(Feature::ListCollections));
//!
//! let err = FeatureSet::new(WireVersionRange::new(0, 6), WireVersionRange::new(0, 3)).unwrap_err();
//! assert!(err.to_string().contains("0..3"));
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod adapters;
pub mod config;
pub mod domain;
pub mod events;
pub mod ports;
pub mod service;

/// Mock collaborators (heartbeat, monitor, pool, cluster, listener).
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use adapters::HeartbeatMonitor;
pub use config::{ConfigError, NodeOptions, PoolOptions};
pub use domain::{
    Address, AddressError, AddressFamily, CompatibilityError, Feature, FeatureSet, HelloReply,
    NodeError, ServerDescription, ServerType, TagSet, WireVersionRange, WireVersionRangeError,
    CLIENT_WIRE_VERSIONS, DEFAULT_PORT,
};
pub use events::{EventListeners, NodeEvent, NodeEventListener};
pub use ports::{ClusterMetadata, Connection, ConnectionPool, Heartbeat, Monitor, PoolFactory};
pub use service::{Node, NodeContext};
