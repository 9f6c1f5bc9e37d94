//! `host:port` peer address.
//!
//! Parsed once at startup from the command line.  The host is kept as a
//! string and resolved at bind/connect time, so both IP literals and hostnames
//! are accepted.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced when parsing an [`Address`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address '{0}' is missing a ':port' suffix")]
    MissingPort(String),
    #[error("address '{0}' has an empty host")]
    EmptyHost(String),
    #[error("address '{input}' has an invalid port '{port}'")]
    InvalidPort { input: String, port: String },
}

/// An immutable `(host, port)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    host: String,
    port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP literal, without IPv6 brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Tuple form accepted by `ToSocketAddrs` implementations.
    pub fn as_tuple(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    /// Splits on the last `:`, so `[::1]:9000` parses to host `::1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(AddressError::EmptyHost(s.to_string()));
        }

        let port = port.parse::<u16>().map_err(|_| AddressError::InvalidPort {
            input: s.to_string(),
            port: port.to_string(),
        })?;

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
