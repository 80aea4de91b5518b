//! Client identity value object

use std::{fmt, net::IpAddr};

use serde::{Deserialize, Serialize};

/// The rate-limit partition key for a caller
///
/// Usually the caller's network address, or an authenticated user id when an
/// upstream layer has already identified the caller. Any string is accepted,
/// including empty or unusual ones: they are simply treated as their own key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Identity used when nothing about the caller can be determined
    pub const UNKNOWN: &'static str = "unknown";

    /// Create an identity from any string key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Identity for a caller that could not be identified
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// Get the raw key
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for ClientIdentity {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

impl From<&str> for ClientIdentity {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ClientIdentity {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl AsRef<str> for ClientIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
