//! # Server Description
//!
//! Latest known state of one endpoint. Descriptions are immutable values; the
//! monitor replaces the whole value on every scan, so a reader never sees a
//! mix of old and new fields.

use std::time::Duration;

use super::address::Address;
use super::errors::CompatibilityError;
use super::features::FeatureSet;
use super::value_objects::{ServerType, TagSet, WireVersionRange};

/// Decoded handshake reply handed over by the heartbeat collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloReply {
    /// Role reported by the server
    pub server_type: ServerType,
    /// `minWireVersion..maxWireVersion`
    pub wire_versions: WireVersionRange,
    /// Member tags
    pub tags: TagSet,
    /// Session timeout, absent when sessions are unsupported
    pub logical_session_timeout: Option<Duration>,
    /// Replica set name, if the server is a member
    pub set_name: Option<String>,
    /// Measured round trip of the handshake
    pub round_trip_time: Option<Duration>,
}

impl HelloReply {
    /// Reply of a server with the given role and range, no tags or sessions.
    pub fn new(server_type: ServerType, wire_versions: WireVersionRange) -> Self {
        Self {
            server_type,
            wire_versions,
            tags: TagSet::new(),
            logical_session_timeout: None,
            set_name: None,
            round_trip_time: None,
        }
    }

    #[must_use]
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_logical_session_timeout(mut self, timeout: Duration) -> Self {
        self.logical_session_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_set_name(mut self, name: impl Into<String>) -> Self {
        self.set_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_round_trip_time(mut self, rtt: Duration) -> Self {
        self.round_trip_time = Some(rtt);
        self
    }
}

/// Cached state of one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerDescription {
    address: Address,
    server_type: ServerType,
    tags: TagSet,
    features: FeatureSet,
    logical_session_timeout: Option<Duration>,
    set_name: Option<String>,
    round_trip_time: Option<Duration>,
    error: Option<String>,
}

impl ServerDescription {
    /// Description of an endpoint that has not been reached.
    pub fn unknown(address: Address) -> Self {
        Self {
            address,
            server_type: ServerType::Unknown,
            tags: TagSet::new(),
            features: FeatureSet::unknown(),
            logical_session_timeout: None,
            set_name: None,
            round_trip_time: None,
            error: None,
        }
    }

    /// Unknown description remembering why the endpoint became unknown.
    pub fn unknown_with_error(address: Address, reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::unknown(address)
        }
    }

    /// Build from a handshake reply.
    ///
    /// # Errors
    ///
    /// `CompatibilityError` when the reply's wire range cannot be spoken with
    /// `client`.
    pub fn from_reply(
        address: Address,
        reply: HelloReply,
        client: WireVersionRange,
    ) -> Result<Self, CompatibilityError> {
        let features = FeatureSet::new(reply.wire_versions, client)?;
        Ok(Self {
            address,
            server_type: reply.server_type,
            tags: reply.tags,
            features,
            logical_session_timeout: reply.logical_session_timeout,
            set_name: reply.set_name,
            round_trip_time: reply.round_trip_time,
            error: None,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn server_type(&self) -> ServerType {
        self.server_type
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn features(&self) -> FeatureSet {
        self.features
    }

    pub fn logical_session_timeout(&self) -> Option<Duration> {
        self.logical_session_timeout
    }

    pub fn set_name(&self) -> Option<&str> {
        self.set_name.as_deref()
    }

    pub fn round_trip_time(&self) -> Option<Duration> {
        self.round_trip_time
    }

    /// Why the endpoint is unknown, if a failure made it so.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_unknown(&self) -> bool {
        self.server_type == ServerType::Unknown
    }

    pub fn is_standalone(&self) -> bool {
        self.server_type == ServerType::Standalone
    }

    pub fn is_router(&self) -> bool {
        self.server_type == ServerType::Router
    }

    pub fn is_primary(&self) -> bool {
        self.server_type == ServerType::Primary
    }

    pub fn is_secondary(&self) -> bool {
        self.server_type == ServerType::Secondary
    }

    pub fn is_arbiter(&self) -> bool {
        self.server_type == ServerType::Arbiter
    }

    pub fn is_ghost(&self) -> bool {
        self.server_type == ServerType::Ghost
    }

    pub fn is_data_bearing(&self) -> bool {
        self.server_type.is_data_bearing()
    }

    /// Equal in everything but the measured round trip time.
    pub fn same_state_as(&self, other: &ServerDescription) -> bool {
        self.address == other.address
            && self.server_type == other.server_type
            && self.tags == other.tags
            && self.features == other.features
            && self.logical_session_timeout == other.logical_session_timeout
            && self.set_name == other.set_name
            && self.error == other.error
    }

    /// True iff every pair in `tag_set` is present with an equal value.
    /// An empty set always matches.
    pub fn matches_tag_set(&self, tag_set: &TagSet) -> bool {
        tag_set
            .iter()
            .all(|(key, value)| self.tags.get(key) == Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::{Feature, CLIENT_WIRE_VERSIONS};

    fn address() -> Address {
        Address::parse("db1:27017").unwrap()
    }

    fn tags(pairs: &[(&str, &str)]) -> TagSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_unknown_description() {
        let desc = ServerDescription::unknown(address());
        assert!(desc.is_unknown());
        assert!(!desc.is_data_bearing());
        assert_eq!(desc.features(), FeatureSet::unknown());
        assert!(desc.error().is_none());
    }

    #[test]
    fn test_unknown_with_error_keeps_reason() {
        let desc = ServerDescription::unknown_with_error(address(), "auth failed");
        assert!(desc.is_unknown());
        assert_eq!(desc.error(), Some("auth failed"));
    }

    #[test]
    fn test_from_reply_copies_fields() {
        let reply = HelloReply::new(ServerType::Secondary, WireVersionRange::new(0, 6))
            .with_tags(tags(&[("dc", "east")]))
            .with_logical_session_timeout(Duration::from_secs(1800))
            .with_set_name("rs0");
        let desc = ServerDescription::from_reply(address(), reply, CLIENT_WIRE_VERSIONS).unwrap();

        assert!(desc.is_secondary());
        assert_eq!(desc.set_name(), Some("rs0"));
        assert!(desc.features().supports(Feature::Sessions));
        assert_eq!(
            desc.logical_session_timeout(),
            Some(Duration::from_secs(1800))
        );
    }

    #[test]
    fn test_from_reply_rejects_newer_server() {
        let reply = HelloReply::new(ServerType::Primary, WireVersionRange::new(0, 9));
        let err =
            ServerDescription::from_reply(address(), reply, CLIENT_WIRE_VERSIONS).unwrap_err();
        assert_eq!(err.server, WireVersionRange::new(0, 9));
    }

    #[test]
    fn test_tag_matching() {
        let reply = HelloReply::new(ServerType::Secondary, WireVersionRange::new(0, 6))
            .with_tags(tags(&[("dc", "east"), ("rack", "r1")]));
        let desc = ServerDescription::from_reply(address(), reply, CLIENT_WIRE_VERSIONS).unwrap();

        assert!(desc.matches_tag_set(&TagSet::new()));
        assert!(desc.matches_tag_set(&tags(&[("dc", "east")])));
        assert!(desc.matches_tag_set(&tags(&[("dc", "east"), ("rack", "r1")])));
        assert!(!desc.matches_tag_set(&tags(&[("dc", "west")])));
        assert!(!desc.matches_tag_set(&tags(&[("dc", "east"), ("disk", "ssd")])));
    }

    #[test]
    fn test_same_state_ignores_round_trip_time() {
        let reply = HelloReply::new(ServerType::Primary, WireVersionRange::new(0, 6));
        let a = ServerDescription::from_reply(
            address(),
            reply.clone().with_round_trip_time(Duration::from_millis(3)),
            CLIENT_WIRE_VERSIONS,
        )
        .unwrap();
        let b = ServerDescription::from_reply(
            address(),
            reply.with_round_trip_time(Duration::from_millis(9)),
            CLIENT_WIRE_VERSIONS,
        )
        .unwrap();
        assert!(a.same_state_as(&b));
        assert!(!a.same_state_as(&ServerDescription::unknown(address())));
    }

    #[test]
    fn test_unknown_matches_only_empty_tag_set() {
        let desc = ServerDescription::unknown(address());
        assert!(desc.matches_tag_set(&TagSet::new()));
        assert!(!desc.matches_tag_set(&tags(&[("dc", "east")])));
    }
}
