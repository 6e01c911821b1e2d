//! Repository naming and the read-only projections handed to callers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::RepoId;

/// Validated owner of a repository (a user or organisation handle).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoOwner(String);

/// Validated repository name, unique per owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoName(String);

/// longest accepted owner or repository name
const MAX_NAME_LEN: usize = 100;

/// Shared rules for owners and names.
///
/// ASCII alphanumerics plus `-`, `_` and `.`; must start with an
/// alphanumeric so names like `.git` or `..` never appear.
fn validate_name(name: &str) -> Result<(), InvalidNameError> {
    let first_char = match name.chars().next() {
        Some(c) => c,
        None => return Err(InvalidNameError::Empty),
    };

    if name.len() > MAX_NAME_LEN {
        return Err(InvalidNameError::TooLong(name.len()));
    }

    if !first_char.is_ascii_alphanumeric() {
        return Err(InvalidNameError::InvalidStart(first_char));
    }

    for (i, c) in name.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.') {
            return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
        }
    }

    Ok(())
}

macro_rules! validated_name {
    ($ty:ident) => {
        impl $ty {
            /// validate and wrap
            pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
                let name = name.into();
                validate_name(&name)?;
                Ok(Self(name))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $ty {
            type Error = InvalidNameError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }
    };
}

validated_name!(RepoOwner);
validated_name!(RepoName);

/// The `(owner, name)` pair that identifies a repository to humans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoSlug {
    pub owner: RepoOwner,
    pub name: RepoName,
}

impl RepoSlug {
    /// validate both parts
    pub fn parse(owner: &str, name: &str) -> Result<Self, InvalidNameError> {
        Ok(Self {
            owner: RepoOwner::new(owner)?,
            name: RepoName::new(name)?,
        })
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// error type for invalid owners and repository names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidStart(char),
    InvalidCharacter { char: char, position: usize },
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidStart(c) => write!(f, "name cannot start with '{}'", c),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
        }
    }
}

impl std::error::Error for InvalidNameError {}

/// Request to create a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRepo {
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
}

impl CreateRepo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            description: String::new(),
            link: String::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }
}

/// Read-only projection of a repository's descriptive fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoInfo {
    pub id: RepoId,
    pub name: RepoName,
    pub owner: RepoOwner,
    pub description: String,
    pub link: String,
    pub star_count: u64,
    pub fork_count: u64,
}

/// kind of an entry in the codebase listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Dir,
}

/// Commit fields shown next to the codebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestCommit {
    pub message: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    pub short_hash: String,
}

/// One entry of the codebase listing.
///
/// Directories carry their own listing in `children`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub file_type: FileType,
    pub latest_commit_message: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub latest_commit_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<BTreeMap<String, FileMetadata>>,
}

impl FileMetadata {
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Dir
    }
}

/// Projection of a repository's checked-out tree and its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodebaseMetadata {
    pub latest_commit: LatestCommit,
    pub total_commits: usize,
    pub files: BTreeMap<String, FileMetadata>,
}
