//! # Wire-Version Features
//!
//! Capability flags derived from the wire-version range a server reports.
//!
//! A feature is available when the server's range covers the feature's
//! minimum version. Adding a feature means adding a variant, its arms in
//! `min_wire_version` and `name` (the compiler insists on both), and its
//! entry in `ALL_FEATURES`.
//!
//! Construction fails fast when the server is newer than anything this
//! client speaks. A server older than the client is fine and merely turns the
//! newer features off.

use std::fmt;

use super::errors::CompatibilityError;
use super::value_objects::WireVersionRange;

/// Wire versions this client can speak.
pub const CLIENT_WIRE_VERSIONS: WireVersionRange = WireVersionRange::new(0, 6);

/// Named protocol capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    /// `usersInfo` command
    UsersInfo,
    /// Write commands instead of legacy opcodes
    WriteCommand,
    /// `listCollections` command
    ListCollections,
    /// `listIndexes` command
    ListIndexes,
    /// SCRAM-SHA-1 authentication
    ScramSha1,
    /// `find`/`getMore` commands
    FindCommand,
    /// Collation option
    Collation,
    /// `maxStalenessSeconds` read preference
    MaxStaleness,
    /// `arrayFilters` update option
    ArrayFilters,
    /// OP_MSG wire format
    OpMsg,
    /// Logical sessions
    Sessions,
}

/// Every variant, ordered by minimum wire version.
const ALL_FEATURES: [Feature; 11] = [
    Feature::UsersInfo,
    Feature::WriteCommand,
    Feature::ListCollections,
    Feature::ListIndexes,
    Feature::ScramSha1,
    Feature::FindCommand,
    Feature::Collation,
    Feature::MaxStaleness,
    Feature::ArrayFilters,
    Feature::OpMsg,
    Feature::Sessions,
];

impl Feature {
    /// Every known feature, ordered by minimum wire version.
    pub fn all() -> impl Iterator<Item = Feature> {
        ALL_FEATURES.into_iter()
    }

    /// Look a feature up by its snake_case name.
    pub fn from_name(name: &str) -> Option<Feature> {
        Self::all().find(|feature| feature.name() == name)
    }

    /// Minimum wire version the server must speak.
    pub const fn min_wire_version(self) -> u32 {
        match self {
            Self::UsersInfo | Self::WriteCommand => 2,
            Self::ListCollections | Self::ListIndexes | Self::ScramSha1 => 3,
            Self::FindCommand => 4,
            Self::Collation | Self::MaxStaleness => 5,
            Self::ArrayFilters | Self::OpMsg | Self::Sessions => 6,
        }
    }

    /// Snake_case name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::UsersInfo => "users_info",
            Self::WriteCommand => "write_command",
            Self::ListCollections => "list_collections",
            Self::ListIndexes => "list_indexes",
            Self::ScramSha1 => "scram_sha_1",
            Self::FindCommand => "find_command",
            Self::Collation => "collation",
            Self::MaxStaleness => "max_staleness",
            Self::ArrayFilters => "array_filters",
            Self::OpMsg => "op_msg",
            Self::Sessions => "sessions",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable capability view over one negotiated wire-version range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureSet {
    server: WireVersionRange,
    client: WireVersionRange,
}

impl FeatureSet {
    /// Derive the feature set for `server` against an explicit client range.
    ///
    /// # Errors
    ///
    /// `CompatibilityError` when the server's max exceeds the client's max,
    /// or when the server's max is below the client's min.
    pub fn new(
        server: WireVersionRange,
        client: WireVersionRange,
    ) -> Result<Self, CompatibilityError> {
        if client.max() < server.max() || !client.overlaps(&server) {
            return Err(CompatibilityError { server, client });
        }
        Ok(Self { server, client })
    }

    /// Derive the feature set against `CLIENT_WIRE_VERSIONS`.
    ///
    /// # Errors
    ///
    /// See [`FeatureSet::new`].
    pub fn for_server(server: WireVersionRange) -> Result<Self, CompatibilityError> {
        Self::new(server, CLIENT_WIRE_VERSIONS)
    }

    /// Feature set of an endpoint that has not answered a handshake (`0..0`).
    pub fn unknown() -> Self {
        Self {
            server: WireVersionRange::new(0, 0),
            client: CLIENT_WIRE_VERSIONS,
        }
    }

    pub fn server_wire_versions(&self) -> WireVersionRange {
        self.server
    }

    pub fn client_wire_versions(&self) -> WireVersionRange {
        self.client
    }

    /// True iff the server's range covers the feature's minimum version.
    pub fn supports(&self, feature: Feature) -> bool {
        self.server.contains(feature.min_wire_version())
    }

    /// Query by feature name; `None` for names not in the table.
    pub fn supports_named(&self, name: &str) -> Option<bool> {
        Feature::from_name(name).map(|feature| self.supports(feature))
    }

    /// Features available against this server.
    pub fn enabled(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::all().filter(move |feature| self.supports(*feature))
    }

    /// Logical sessions are available.
    pub fn sessions_enabled(&self) -> bool {
        self.supports(Feature::Sessions)
    }
}
