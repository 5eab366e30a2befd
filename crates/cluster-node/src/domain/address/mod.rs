//! # Endpoint Address
//!
//! Parses an endpoint specifier into a canonical identity.
//!
//! ## Grammar
//!
//! ```text
//! [v6-literal][:port]   IPv6, brackets stripped
//! /path/to/socket       local socket, no port
//! host[:port]           IPv4 literal or DNS name, split on the last ':'
//! v6-literal            bare IPv6 literal, default port
//! ```
//!
//! Equality and hashing use the normalized `(host, port)` pair only. The
//! original specifier and the address family never take part in identity.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use super::errors::{AddressError, NodeError};

/// Port assumed when a TCP specifier omits one.
pub const DEFAULT_PORT: u16 = 27017;

/// How the host part of an address is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4 literal
    Ipv4,
    /// IPv6 literal
    Ipv6,
    /// Local socket path
    Unix,
    /// DNS name, resolved on connect
    Unresolved,
}

/// Canonical identity of one endpoint.
///
/// Immutable once parsed.
#[derive(Debug, Clone)]
pub struct Address {
    seed: String,
    host: String,
    port: Option<u16>,
    family: AddressFamily,
}

impl Address {
    /// Parse an endpoint specifier.
    ///
    /// # Errors
    ///
    /// `AddressError::Format` for an empty host, a malformed port, or bad
    /// bracket syntax.
    ///
    /// # Example
    ///
    /// ```rust
    /// use cluster_node::Address;
    ///
    /// let addr = Address::parse("[::1]:27018").unwrap();
    /// assert_eq!(addr.host(), "::1");
    /// assert_eq!(addr.port(), Some(27018));
    /// assert_eq!(Address::parse("db.local").unwrap().port(), Some(27017));
    /// ```
    pub fn parse(specifier: &str) -> Result<Self, AddressError> {
        let seed = specifier.trim();
        if seed.is_empty() {
            return Err(AddressError::format(specifier, "address is empty"));
        }

        if seed.starts_with('/') {
            return Ok(Self {
                seed: seed.to_string(),
                host: seed.to_string(),
                port: None,
                family: AddressFamily::Unix,
            });
        }

        if let Some(rest) = seed.strip_prefix('[') {
            return Self::parse_bracketed(seed, rest);
        }

        if let Ok(ip) = seed.parse::<Ipv6Addr>() {
            return Ok(Self::ipv6(seed, ip, DEFAULT_PORT));
        }

        let (host, port) = match seed.rsplit_once(':') {
            Some((host, port)) => (host, parse_port(seed, port)?),
            None => (seed, DEFAULT_PORT),
        };
        validate_host(seed, host)?;

        let (host, family) = match host.parse::<Ipv4Addr>() {
            Ok(ip) => (ip.to_string(), AddressFamily::Ipv4),
            Err(_) => (host.to_ascii_lowercase(), AddressFamily::Unresolved),
        };

        Ok(Self {
            seed: seed.to_string(),
            host,
            port: Some(port),
            family,
        })
    }

    fn parse_bracketed(seed: &str, rest: &str) -> Result<Self, AddressError> {
        let (inner, tail) = rest
            .split_once(']')
            .ok_or_else(|| AddressError::format(seed, "missing closing ']'"))?;
        let ip = inner
            .parse::<Ipv6Addr>()
            .map_err(|_| AddressError::format(seed, "bracketed host is not an IPv6 address"))?;

        let port = if tail.is_empty() {
            DEFAULT_PORT
        } else {
            let raw = tail
                .strip_prefix(':')
                .ok_or_else(|| AddressError::format(seed, "unexpected characters after ']'"))?;
            parse_port(seed, raw)?
        };

        Ok(Self::ipv6(seed, ip, port))
    }

    fn ipv6(seed: &str, ip: Ipv6Addr, port: u16) -> Self {
        Self {
            seed: seed.to_string(),
            host: ip.to_string(),
            port: Some(port),
            family: AddressFamily::Ipv6,
        }
    }

    /// The specifier this address was parsed from.
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Normalized host (socket path for local sockets).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port, absent for local sockets.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Port, falling back to `DEFAULT_PORT`.
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// The host as an IP literal, if it is one.
    pub fn ip(&self) -> Option<IpAddr> {
        match self.family {
            AddressFamily::Ipv4 | AddressFamily::Ipv6 => self.host.parse().ok(),
            AddressFamily::Unix | AddressFamily::Unresolved => None,
        }
    }

    /// Resolve to socket addresses.
    ///
    /// IP literals resolve without a lookup; DNS names go through the
    /// runtime's resolver.
    ///
    /// # Errors
    ///
    /// `NodeError::Connectivity` for local sockets and failed lookups.
    pub async fn resolve(&self) -> Result<Vec<SocketAddr>, NodeError> {
        let port = self.port_or_default();
        match self.family {
            AddressFamily::Unix => Err(NodeError::connectivity(
                self,
                "local socket paths have no network address",
            )),
            AddressFamily::Ipv4 | AddressFamily::Ipv6 => match self.ip() {
                Some(ip) => Ok(vec![SocketAddr::new(ip, port)]),
                None => Err(NodeError::connectivity(self, "invalid IP literal")),
            },
            AddressFamily::Unresolved => {
                let resolved = tokio::net::lookup_host((self.host.as_str(), port))
                    .await
                    .map_err(|e| NodeError::connectivity(self, e))?;
                Ok(resolved.collect())
            }
        }
    }
}

/// Port must be a decimal number in `1..=65535`.
fn parse_port(seed: &str, raw: &str) -> Result<u16, AddressError> {
    if raw.is_empty() {
        return Err(AddressError::format(seed, "port is empty"));
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddressError::format(seed, "port is not a number"));
    }
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => Err(AddressError::format(seed, "port is out of range")),
        Ok(port) => Ok(port),
    }
}

fn validate_host(seed: &str, host: &str) -> Result<(), AddressError> {
    if host.is_empty() {
        return Err(AddressError::format(seed, "host is empty"));
    }
    if host.contains(':') {
        return Err(AddressError::format(
            seed,
            "IPv6 hosts with a port must be bracketed",
        ));
    }
    if host
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '[' | ']' | '@' | '?' | '#'))
    {
        return Err(AddressError::format(seed, "host contains invalid characters"));
    }
    Ok(())
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family {
            AddressFamily::Unix => write!(f, "{}", self.host),
            AddressFamily::Ipv6 => write!(f, "[{}]:{}", self.host, self.port_or_default()),
            AddressFamily::Ipv4 | AddressFamily::Unresolved => {
                write!(f, "{}:{}", self.host, self.port_or_default())
            }
        }
    }
}
