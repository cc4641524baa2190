//! Remote endpoint address.
//!
//! An [`Endpoint`] is parsed once at startup and never mutated. Only
//! WebSocket schemes are accepted.
//!
//! # Example
//!
//! ```
//! use wsline::Endpoint;
//!
//! let endpoint: Endpoint = "wss://example.com/feed?x=1".parse().unwrap();
//! assert_eq!(endpoint.host(), "example.com");
//! assert_eq!(endpoint.port(), 443);
//! assert_eq!(endpoint.path(), "/feed?x=1");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Scheme
// ============================================================================

/// URL scheme of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain WebSocket (`ws://`).
    Ws,
    /// WebSocket over TLS (`wss://`).
    Wss,
}

impl Scheme {
    /// Returns the scheme as written in a URL.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Wss => "wss",
        }
    }

    /// Returns `true` if the scheme requires TLS.
    #[inline]
    #[must_use]
    pub const fn is_secure(self) -> bool {
        matches!(self, Self::Wss)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Immutable address of the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
    /// Path plus query string, always starting with `/`.
    path: String,
    url: Url,
}

impl Endpoint {
    /// Parses an endpoint from a URL string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the URL is malformed, has no
    /// host, or uses a scheme other than `ws`/`wss`.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input.trim())
            .map_err(|e| Error::invalid_endpoint(input, e.to_string()))?;

        let scheme = match url.scheme() {
            "ws" => Scheme::Ws,
            "wss" => Scheme::Wss,
            other => {
                return Err(Error::invalid_endpoint(
                    input,
                    format!("unsupported scheme '{other}', expected ws or wss"),
                ));
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::invalid_endpoint(input, "missing host"))?
            .to_string();

        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::invalid_endpoint(input, "missing port"))?;

        let path = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };

        Ok(Self {
            scheme,
            host,
            port,
            path,
            url,
        })
    }

    /// Returns the scheme.
    #[inline]
    #[must_use]
    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns the host name or address.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port, defaulted from the scheme when absent.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the path including any query string.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the full URL.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
