use std::fmt;

use crate::constant::{CAPABILITIES_DEFAULT, CapabilityFlags};

/// Server version as reported in the initial handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl ServerVersion {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the leading `major.minor.patch` of a version string such as
    /// `8.0.36-0ubuntu0.22.04.1` or `5.5.5-10.11.6-MariaDB`
    pub fn parse(version: &str) -> Option<Self> {
        let mut parts = version.split(|c: char| !c.is_ascii_digit());
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        Some(Self::new(major, minor, patch))
    }

    pub fn meets_minimum(&self, major: u16, minor: u16, patch: u16) -> bool {
        *self >= Self::new(major, minor, patch)
    }
}

impl Default for ServerVersion {
    fn default() -> Self {
        Self::new(8, 0, 0)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Connection facts established by the (external) handshake
#[derive(Debug, Clone)]
pub struct ServerSession {
    /// Negotiated capabilities (`server & client`)
    pub capabilities: CapabilityFlags,
    pub server_version: ServerVersion,
    /// `@@max_allowed_packet`, bounds LOCAL INFILE chunks
    pub max_allowed_packet: usize,
    /// Encoding of `character_set_results`, used to decode column names
    pub metadata_encoding: &'static str,
}

impl ServerSession {
    pub fn new(capabilities: CapabilityFlags, server_version: ServerVersion) -> Self {
        Self {
            capabilities,
            server_version,
            ..Default::default()
        }
    }

    pub fn is_eof_deprecated(&self) -> bool {
        self.capabilities
            .contains(CapabilityFlags::CLIENT_DEPRECATE_EOF)
    }

    pub fn has_long_column_info(&self) -> bool {
        self.capabilities.contains(CapabilityFlags::CLIENT_LONG_FLAG)
    }

    pub fn supports_multi_results(&self) -> bool {
        self.capabilities
            .contains(CapabilityFlags::CLIENT_MULTI_RESULTS)
    }

    /// Server-side cursors exist since 5.0.2
    pub fn supports_cursors(&self) -> bool {
        self.server_version.meets_minimum(5, 0, 2)
    }
}

impl Default for ServerSession {
    fn default() -> Self {
        Self {
            capabilities: CAPABILITIES_DEFAULT,
            server_version: ServerVersion::default(),
            max_allowed_packet: 64 * 1024 * 1024,
            metadata_encoding: "UTF-8",
        }
    }
}
