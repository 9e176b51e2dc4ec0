//! Hostnames that scope saved accounts.

use acctswap_core::{Error, Result};
use serde::{Deserialize, Serialize};

const MAX_HOST_LEN: usize = 253;

/// A validated, lower-cased hostname such as `www.example.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    /// Validate a bare hostname.
    pub fn parse(host: &str) -> Result<Self> {
        let host = host.trim().to_lowercase();
        if host.is_empty() {
            return Err(Error::InvalidDomain("empty hostname".into()));
        }
        if host.len() > MAX_HOST_LEN {
            return Err(Error::InvalidDomain(format!("hostname too long: {}", host.len())));
        }
        let valid = host.split('.').all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        });
        if !valid {
            return Err(Error::InvalidDomain(host));
        }
        Ok(Self(host))
    }

    /// Take the hostname of a page URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::InvalidDomain(format!("{url}: {e}")))?;
        match parsed.host_str() {
            Some(host) => Self::parse(host.trim_start_matches('[').trim_end_matches(']')),
            None => Err(Error::InvalidDomain(format!("{url}: no hostname"))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The domain with its left-most label dropped, if that still
    /// contains a dot. `www.example.com` → `example.com`, `example.com` → none.
    pub fn parent(&self) -> Option<&str> {
        let (_, rest) = self.0.split_once('.')?;
        rest.contains('.').then_some(rest)
    }

    /// Whether this host equals `other` or lies underneath it, on label
    /// boundaries. A leading dot on `other` is ignored.
    pub fn is_within(&self, other: &str) -> bool {
        let other = other.strip_prefix('.').unwrap_or(other);
        if other.is_empty() {
            return false;
        }
        self.0 == other
            || (self.0.len() > other.len()
                && self.0.ends_with(other)
                && self.0.as_bytes()[self.0.len() - other.len() - 1] == b'.')
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Domain {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Domain> for String {
    fn from(d: Domain) -> Self {
        d.0
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
