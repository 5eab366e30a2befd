//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! Trait definitions for the collaborators a node talks to:
//! - **Heartbeat:** handshake exchange used by the monitor
//! - **Monitor:** cached description and its refresh loop
//! - **ConnectionPool / Connection / PoolFactory:** pooled I/O
//! - **ClusterMetadata:** weak back-reference to the owning cluster

pub mod outbound;

pub use outbound::{ClusterMetadata, Connection, ConnectionPool, Heartbeat, Monitor, PoolFactory};
