//! Runtime configuration.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::CodecKind;
use crate::git::{Author, GIT_DIR};
use crate::mount::{MountConfig, MountWait};
use crate::repo::RepoSlug;

/// configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a gitblock registry.
///
/// Every field has a default, so a config file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitblockConfig {
    /// where namespaces are materialized; a private temp dir when unset
    pub scratch_root: Option<PathBuf>,
    pub namespace_prefix: String,
    pub mount_wait: MountWait,
    /// branch created and checked out by the seed commit
    pub default_branch: String,
    /// path of the seed file, relative to the repository root
    pub seed_file: String,
    /// seed file contents; `{owner}` and `{name}` are substituted
    pub seed_contents: String,
    pub author: Author,
    pub commit_message: String,
    /// codec used when writing payloads (reading detects the codec)
    pub codec: CodecKind,
    /// state directory used by the command line tool
    pub state_dir: Option<PathBuf>,
}

impl Default for GitblockConfig {
    fn default() -> Self {
        let mount = MountConfig::default();
        Self {
            scratch_root: mount.root,
            namespace_prefix: mount.prefix,
            mount_wait: mount.wait,
            default_branch: "main".to_string(),
            seed_file: "README.md".to_string(),
            seed_contents: "# {name}\n".to_string(),
            author: Author::gitblock(),
            commit_message: "Initial commit".to_string(),
            codec: CodecKind::default(),
            state_dir: None,
        }
    }
}

impl GitblockConfig {
    /// Load a JSON config file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Set the scratch root.
    pub fn scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn mount_wait(mut self, wait: MountWait) -> Self {
        self.mount_wait = wait;
        self
    }

    pub fn codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    /// Set the seed file and its contents.
    pub fn seed(mut self, file: impl Into<String>, contents: impl Into<String>) -> Self {
        self.seed_file = file.into();
        self.seed_contents = contents.into();
        self
    }

    /// Check values that would otherwise only fail halfway through a
    /// repository creation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        let seed = Path::new(&self.seed_file);
        let plain = seed.components().next().is_some()
            && seed.components().all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            let msg = format!("seed_file '{}' must be a relative path", self.seed_file);
            return invalid(msg);
        }
        if seed.starts_with(GIT_DIR) {
            return invalid(format!("seed_file '{}' is inside {}", self.seed_file, GIT_DIR));
        }

        match git2::Branch::name_is_valid(&self.default_branch) {
            Ok(true) => {}
            _ => {
                let msg = format!(
                    "default_branch '{}' is not a valid branch name",
                    self.default_branch
                );
                return invalid(msg);
            }
        }

        if self.commit_message.trim().is_empty() {
            return invalid("commit_message cannot be empty".to_string());
        }
        if self.author.name.trim().is_empty() || self.author.email.trim().is_empty() {
            return invalid("author name and email cannot be empty".to_string());
        }
        if self.namespace_prefix.contains(|c| c == '/' || c == '\\') {
            let msg = format!("namespace_prefix '{}' contains a separator", self.namespace_prefix);
            return invalid(msg);
        }
        Ok(())
    }

    /// mount manager settings derived from this config
    pub fn mount_config(&self) -> MountConfig {
        MountConfig {
            root: self.scratch_root.clone(),
            prefix: self.namespace_prefix.clone(),
            wait: self.mount_wait,
        }
    }

    /// seed file contents for one repository
    pub fn render_seed(&self, slug: &RepoSlug) -> String {
        self.seed_contents
            .replace("{owner}", slug.owner.as_str())
            .replace("{name}", slug.name.as_str())
    }
}
