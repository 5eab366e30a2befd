//! # Domain Errors
//!
//! Error types surfaced by the node layer.
//!
//! | Error | Raised by | Recovery |
//! |-------|-----------|----------|
//! | `AddressError::Format` | `Address::parse` | none, surfaced immediately |
//! | `CompatibilityError` | `FeatureSet::new`, first scan | none, node unusable |
//! | `WireVersionRangeError` | `WireVersionRange::try_new` on handshake input | scan fails, description unknown |
//! | `NodeError::Connectivity` | pooled connections, heartbeats | absorbed only by `is_connectable` |
//! | `NodeError::Unauthorized` | pooled connections | description marked unknown, re-raised |

use std::time::Duration;

use thiserror::Error;

use super::value_objects::WireVersionRange;

/// Malformed endpoint specifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The specifier does not follow the `host[:port]`, `[v6][:port]` or
    /// `/path` grammar.
    #[error("invalid address '{specifier}': {reason}")]
    Format {
        /// Specifier as given by the caller
        specifier: String,
        /// What was wrong with it
        reason: String,
    },
}

impl AddressError {
    pub(crate) fn format(specifier: &str, reason: impl Into<String>) -> Self {
        Self::Format {
            specifier: specifier.to_string(),
            reason: reason.into(),
        }
    }
}

/// The server speaks wire versions this client cannot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "server reports wire versions {server}, but this client only supports wire versions {client}"
)]
pub struct CompatibilityError {
    /// Range reported by the server handshake
    pub server: WireVersionRange,
    /// Range built into this client
    pub client: WireVersionRange,
}

/// A handshake reported a minimum wire version above its maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid wire version range: min {min} is above max {max}")]
pub struct WireVersionRangeError {
    /// Reported minimum
    pub min: u32,
    /// Reported maximum
    pub max: u32,
}

/// Errors produced by node operations and by the collaborators behind them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// Address parsing failed.
    #[error(transparent)]
    Format(#[from] AddressError),

    /// Server and client wire versions are incompatible.
    #[error(transparent)]
    Compatibility(#[from] CompatibilityError),

    /// The handshake reply carried a malformed wire-version range.
    #[error(transparent)]
    InvalidWireVersions(#[from] WireVersionRangeError),

    /// Socket-level failure talking to the endpoint.
    #[error("connection to {address} failed: {reason}")]
    Connectivity {
        /// Endpoint that failed
        address: String,
        /// Underlying cause
        reason: String,
    },

    /// The endpoint did not answer in time.
    #[error("operation against {address} timed out after {after:?}")]
    Timeout {
        /// Endpoint that timed out
        address: String,
        /// Elapsed budget
        after: Duration,
    },

    /// Authentication was rejected by the endpoint.
    #[error("not authorized on {address}: {reason}")]
    Unauthorized {
        /// Endpoint that rejected the credentials
        address: String,
        /// Server-provided reason
        reason: String,
    },

    /// A command ran but the server reported a failure.
    #[error("command failed (code {code:?}): {message}")]
    Command {
        /// Server error code, if any
        code: Option<i32>,
        /// Server error message
        message: String,
    },

    /// The monitor loop is not running and cannot serve the request.
    #[error("monitor has been stopped")]
    MonitorStopped,
}

impl NodeError {
    /// True for authentication rejections.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// True for socket errors and timeouts.
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Connectivity { .. } | Self::Timeout { .. })
    }

    pub(crate) fn connectivity(address: impl ToString, reason: impl ToString) -> Self {
        Self::Connectivity {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}
