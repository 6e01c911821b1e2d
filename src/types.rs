//! identifiers shared by every layer of the crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier of a repository.
///
/// Generated once when the repository is created and never reassigned.
/// The textual form is the lowercase ULID, which is also what the mount
/// layer uses to derive namespace paths, so it must stay canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId(Ulid);

impl RepoId {
    /// generate a fresh id
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// parse an id from its textual form (case-insensitive)
    pub fn parse(text: &str) -> Result<Self, InvalidIdError> {
        Ulid::from_string(text)
            .map(Self)
            .map_err(|_| InvalidIdError(text.to_string()))
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_string().to_lowercase())
    }
}

impl FromStr for RepoId {
    type Err = InvalidIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepoId {
    type Error = InvalidIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RepoId> for String {
    fn from(id: RepoId) -> Self {
        id.to_string()
    }
}

/// error returned when a string is not a valid repository id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidIdError(pub String);

impl fmt::Display for InvalidIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid repository id: '{}'", self.0)
    }
}

impl std::error::Error for InvalidIdError {}
