//! # Node Service
//!
//! `Node` is the handle a cluster keeps for one endpoint. It owns the
//! endpoint's monitor for its whole lifetime and creates the connection pool
//! on first use.
//!
//! ## Reads
//!
//! Every description-derived read (`description`, `features`, role
//! predicates, `tags`, retry eligibility) goes through the monitor's latest
//! published snapshot. Nothing is cached in the node, so a read may be stale
//! during an in-flight scan but never half-updated.
//!
//! ## Teardown
//!
//! Teardown is explicit: the cluster calls `disconnect()` when it drops the
//! endpoint. Dropping a `Node` without it still ends the monitor loop, since
//! the loop exits once its shutdown sender is gone.

// Semantic submodules
mod connection;
mod lifecycle;
mod node;
mod recovery;

// Re-export public API
pub use node::{Node, NodeContext};
