//! Aggregate version counter.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A non-negative, monotonic sequence number within an aggregate stream.
///
/// `Version::ZERO` marks an aggregate with no history, or an event that has
/// not been assigned a position yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// The version of an aggregate with no history.
    pub const ZERO: Self = Self(0);

    /// The version of the first event in every stream.
    pub const FIRST: Self = Self(1);

    /// Creates a version from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns `true` for `Version::ZERO`.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns the version immediately after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the version immediately before this one.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidVersion` when called on `Version::ZERO`.
    pub fn previous(self) -> Result<Self, DomainError> {
        match self.0.checked_sub(1) {
            Some(value) => Ok(Self(value)),
            None => Err(DomainError::InvalidVersion(
                "version cannot be lowered below 0".to_owned(),
            )),
        }
    }
}

impl TryFrom<i64> for Version {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value).map(Self).map_err(|_| {
            DomainError::InvalidVersion(format!("version must be at least 0, {value} given"))
        })
    }
}

impl TryFrom<Version> for i64 {
    type Error = DomainError;

    fn try_from(version: Version) -> Result<Self, Self::Error> {
        i64::try_from(version.0).map_err(|_| {
            DomainError::InvalidVersion(format!("version {} does not fit a signed column", version.0))
        })
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
