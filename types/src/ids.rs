use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Globally unique, immutable identifier of a node.
///
/// Ids are never reused. Their total order (UUID byte order) is the global
/// lock-acquisition order for mutations that touch more than one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(Uuid);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid element id {raw:?}: {reason}")]
pub struct ElementIdError {
    pub raw: String,
    pub reason: String,
}

impl ElementId {
    /// Allocate a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Result<Self, ElementIdError> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|err| ElementIdError {
                raw: raw.to_owned(),
                reason: err.to_string(),
            })
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ElementId {
    type Err = ElementIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Monotonic per-node mutation counter.
///
/// Starts at [`Version::INITIAL`] and moves forward by exactly one on every
/// observable mutation. Pointers cache the `(id, version)` pair of their
/// target to audit staleness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version {raw:?}: expected a non-negative integer")]
pub struct VersionError {
    pub raw: String,
}

impl Version {
    pub const INITIAL: Self = Self(0);

    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn bump(&mut self) {
        *self = self.next();
    }

    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        raw.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_err| VersionError {
                raw: raw.to_owned(),
            })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
