//! # Adapters
//!
//! Concrete implementations of the outbound ports shipped with this crate.

pub mod monitor;

pub use monitor::HeartbeatMonitor;
