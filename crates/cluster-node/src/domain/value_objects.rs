//! Value Objects for the node layer

use std::collections::BTreeMap;
use std::fmt;

use super::errors::WireVersionRangeError;

/// Key/value pairs used to select endpoints by operational criteria.
pub type TagSet = BTreeMap<String, String>;

/// Inclusive `[min, max]` protocol version interval reported by a handshake.
///
/// `min <= max` always holds. `new` orders its arguments and is meant for
/// constants; handshake input goes through `try_new`, which rejects
/// inverted bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireVersionRange {
    min: u32,
    max: u32,
}

impl WireVersionRange {
    /// Create a range from its two bounds, in either order.
    pub const fn new(min: u32, max: u32) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Create a range from bounds reported by a server.
    ///
    /// # Errors
    ///
    /// `WireVersionRangeError` when `min > max`.
    pub const fn try_new(min: u32, max: u32) -> Result<Self, WireVersionRangeError> {
        if min > max {
            return Err(WireVersionRangeError { min, max });
        }
        Ok(Self { min, max })
    }

    /// Lowest supported version
    pub const fn min(&self) -> u32 {
        self.min
    }

    /// Highest supported version
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// True if `version` lies inside the range.
    pub const fn contains(&self, version: u32) -> bool {
        self.min <= version && version <= self.max
    }

    /// True if the two ranges share at least one version.
    pub const fn overlaps(&self, other: &WireVersionRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

impl fmt::Display for WireVersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.min, self.max)
    }
}

/// Role an endpoint reported in its last handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServerType {
    /// Not yet scanned, or the last scan failed
    #[default]
    Unknown,
    /// Single server outside any replica set
    Standalone,
    /// Query router in front of a sharded cluster
    Router,
    /// Replica set primary
    Primary,
    /// Replica set secondary
    Secondary,
    /// Voting member without data
    Arbiter,
    /// Hidden, starting up, or otherwise non-selectable member
    Other,
    /// Member that has not joined a replica set yet
    Ghost,
}

impl ServerType {
    /// Data-bearing roles can serve reads.
    pub fn is_data_bearing(&self) -> bool {
        matches!(
            self,
            Self::Standalone | Self::Router | Self::Primary | Self::Secondary
        )
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Standalone => write!(f, "Standalone"),
            Self::Router => write!(f, "Router"),
            Self::Primary => write!(f, "Primary"),
            Self::Secondary => write!(f, "Secondary"),
            Self::Arbiter => write!(f, "Arbiter"),
            Self::Other => write!(f, "Other"),
            Self::Ghost => write!(f, "Ghost"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_orders_bounds() {
        let range = WireVersionRange::new(6, 2);
        assert_eq!(range.min(), 2);
        assert_eq!(range.max(), 6);
    }

    #[test]
    fn test_reported_range_rejects_inverted_bounds() {
        let err = WireVersionRange::try_new(6, 2).unwrap_err();
        assert_eq!(err, WireVersionRangeError { min: 6, max: 2 });
        assert!(err.to_string().contains("min 6 is above max 2"));

        let range = WireVersionRange::try_new(2, 6).unwrap();
        assert_eq!((range.min(), range.max()), (2, 6));
        assert!(WireVersionRange::try_new(3, 3).is_ok());
    }

    #[test]
    fn test_range_contains_is_inclusive() {
        let range = WireVersionRange::new(2, 4);
        assert!(!range.contains(1));
        assert!(range.contains(2));
        assert!(range.contains(4));
        assert!(!range.contains(5));
    }

    #[test]
    fn test_range_overlap() {
        let client = WireVersionRange::new(0, 6);
        assert!(client.overlaps(&WireVersionRange::new(6, 9)));
        assert!(!client.overlaps(&WireVersionRange::new(7, 9)));
        assert!(!WireVersionRange::new(3, 5).overlaps(&WireVersionRange::new(0, 2)));
    }

    #[test]
    fn test_range_display() {
        assert_eq!(WireVersionRange::new(0, 3).to_string(), "0..3");
    }

    #[test]
    fn test_data_bearing_roles() {
        assert!(ServerType::Primary.is_data_bearing());
        assert!(ServerType::Router.is_data_bearing());
        assert!(!ServerType::Arbiter.is_data_bearing());
        assert!(!ServerType::Unknown.is_data_bearing());
    }
}
