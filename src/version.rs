use std::fmt;
use std::str::FromStr;

use crate::error::LauncherError;

/// A `major.minor.patch` build version.
///
/// Ordering is lexicographic over the triple (derived field order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Stand-in for an install that carries no version marker.
    pub const BASELINE: Version = Version::new(0, 0, 0);

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }

    /// Parse a trimmed `major.minor.patch` token.
    ///
    /// Pre-release and build suffixes are rejected, the endpoints only ever
    /// serve plain triples.
    pub fn parse(text: &str) -> Result<Self, LauncherError> {
        let token = text.trim();
        let v = semver::Version::parse(token).map_err(|_| LauncherError::Parse(token.to_string()))?;
        if !v.pre.is_empty() || !v.build.is_empty() {
            return Err(LauncherError::Parse(token.to_string()));
        }
        Ok(Self::new(v.major, v.minor, v.patch))
    }
}

impl FromStr for Version {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
