//! Client identity derivation.

use std::borrow::Borrow;
use std::fmt;
use std::net::IpAddr;

/// The key requests are counted against: the host part of the client's
/// origin address.
///
/// Two requests from the same host but different ports share an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Derive an identity from a raw `host:port` address.
    ///
    /// The port is stripped, and brackets around an IPv6 host are removed.
    /// When no host can be split off (no port, a bare IPv6 address, an empty
    /// host) the whole trimmed string becomes the identity. Returns `None`
    /// only for an empty address.
    pub fn from_remote_addr(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let host = split_host(raw).filter(|h| !h.is_empty()).unwrap_or(raw);
        Some(Self(host.to_owned()))
    }

    /// Identity for an already-parsed peer IP.
    pub fn from_ip(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }

    /// Get the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Split the host off `host:port` or `[host]:port`.
fn split_host(addr: &str) -> Option<&str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        return tail.starts_with(':').then_some(host);
    }

    let (host, _port) = addr.rsplit_once(':')?;
    if host.contains(':') {
        // Unbracketed IPv6, the port cannot be told apart.
        return None;
    }
    Some(host)
}

impl Borrow<str> for ClientIdentity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
