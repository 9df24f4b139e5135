//! Virtual-host identity
//!
//! A hostname is a (name, port) pair where `*` stands for "any name" and
//! an absent port for "any port". The canonical text form is always
//! `name:(port|*)`; equality and ordering are defined over that form.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// The wildcard host name.
pub const ANY_NAME: &str = "*";

/// The unique identification of an HTTP hostname.
///
/// Immutable once constructed. Names are trimmed and case-folded on
/// construction, so `API.test` and `api.test` denote the same host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hostname {
    name: String,
    port: Option<u16>,
}

impl Hostname {
    /// Create a hostname from a name and an optional (wildcard) port.
    pub fn new(name: &str, port: Option<u16>) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidHostname(name.to_string()));
        }
        if name != ANY_NAME && name.contains([':', '/', ' ']) {
            return Err(Error::InvalidHostname(name.to_string()));
        }
        Ok(Self {
            name: name.to_ascii_lowercase(),
            port,
        })
    }

    /// The `*:*` hostname matching any host and any port.
    pub fn any() -> Self {
        Self {
            name: ANY_NAME.to_string(),
            port: None,
        }
    }

    /// Parse `name`, `name:port` or `name:*`.
    ///
    /// A bare `name` gets the wildcard port - the Host-header rule that a
    /// missing port means 80 belongs to the request layer, not here.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        match text.split_once(':') {
            None => Self::new(text, None),
            Some((name, port)) => {
                let port = port.trim();
                if port == "*" {
                    Self::new(name, None)
                } else {
                    let port = port
                        .parse::<u16>()
                        .map_err(|_| Error::InvalidHostname(text.to_string()))?;
                    Self::new(name, Some(port))
                }
            }
        }
    }

    /// The host name (already trimmed and case-folded).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The TCP port, `None` for the wildcard port.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Whether the name component is the wildcard.
    pub fn is_any_name(&self) -> bool {
        self.name == ANY_NAME
    }

    /// This hostname with a name wildcard, e.g. `*:443`.
    pub fn any_host(&self) -> Self {
        Self {
            name: ANY_NAME.to_string(),
            port: self.port,
        }
    }

    /// This hostname with a port wildcard, e.g. `localhost:*`.
    pub fn any_port(&self) -> Self {
        Self {
            name: self.name.clone(),
            port: None,
        }
    }

    /// Resolution candidates for an incoming host, most specific first:
    /// exact, name with any port, any name with this port, full wildcard.
    pub fn fallback_chain(&self) -> [Hostname; 4] {
        [
            self.clone(),
            self.any_port(),
            self.any_host(),
            Hostname::any(),
        ]
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.name, port),
            None => write!(f, "{}:*", self.name),
        }
    }
}

// Ordering is over the canonical string form (note "name:10" sorts
// before "name:9").
impl Ord for Hostname {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

impl PartialOrd for Hostname {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
