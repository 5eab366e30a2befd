//! Domain Layer - Node-state logic; I/O is limited to address resolution
//!
//! This module contains:
//! - Endpoint addresses (parsing, normalization, identity)
//! - Wire-version ranges and the feature table derived from them
//! - Server descriptions published by the monitor
//! - Error types shared by every layer

pub mod address;
pub mod description;
pub mod errors;
pub mod features;
pub mod value_objects;

pub use address::{Address, AddressFamily, DEFAULT_PORT};
pub use description::{HelloReply, ServerDescription};
pub use errors::{AddressError, CompatibilityError, NodeError, WireVersionRangeError};
pub use features::{Feature, FeatureSet, CLIENT_WIRE_VERSIONS};
pub use value_objects::{ServerType, TagSet, WireVersionRange};
