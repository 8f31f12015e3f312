//! Configuration for svnreplay.
//!
//! Loaded from a TOML file; every field has a default tuned to the Dojo
//! Toolkit repository the tool was originally built for, so a bare
//! `svnreplay <repo-path>` works without a config file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Source repository connection settings.
    #[serde(default)]
    pub svn: SvnConfig,

    /// Replay behaviour settings.
    #[serde(default)]
    pub replay: ReplaySection,
}

/// SVN repository connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvnConfig {
    /// Repository root URL. Module trunks, `branches/` and `tags/` live
    /// directly under it.
    #[serde(default = "default_svn_url")]
    pub url: String,

    /// SVN username; empty means anonymous access.
    #[serde(default)]
    pub username: String,

    /// Environment variable holding the SVN password, if any.
    #[serde(default)]
    pub password_env: Option<String>,

    /// Resolved password (populated by [`ReplayConfig::load`]).
    #[serde(skip)]
    pub password: Option<String>,
}

/// Replay behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySection {
    /// Module roots whose trunks are combined into the destination repo.
    /// Anything outside these, `branches/`, and `tags/` is ignored.
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,

    /// Name of the primary destination branch that receives trunk content
    /// and carries the watermark.
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// First revision of interest; the initial bulk checkout happens here.
    #[serde(default = "default_base_revision")]
    pub base_revision: i64,

    /// Maximum revisions fetched per `svn log` call, to bound memory.
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Email address used for replayed commit authors (SVN only records a
    /// username).
    #[serde(default = "default_author_email")]
    pub author_email: String,
}

fn default_svn_url() -> String {
    "http://svn.dojotoolkit.org/src".into()
}

fn default_modules() -> Vec<String> {
    ["dojo", "dijit", "dojox", "util", "demos"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_branch() -> String {
    "master".into()
}

fn default_base_revision() -> i64 {
    // Dojo release 1.2.
    15378
}

fn default_batch_size() -> i64 {
    100
}

fn default_author_email() -> String {
    "nobody@dojotoolkit.org".into()
}

impl Default for SvnConfig {
    fn default() -> Self {
        Self {
            url: default_svn_url(),
            username: String::new(),
            password_env: None,
            password: None,
        }
    }
}

impl Default for ReplaySection {
    fn default() -> Self {
        Self {
            modules: default_modules(),
            default_branch: default_branch(),
            base_revision: default_base_revision(),
            batch_size: default_batch_size(),
            author_email: default_author_email(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            svn: SvnConfig::default(),
            replay: ReplaySection::default(),
        }
    }
}

impl ReplayConfig {
    /// Load the config from `path`, resolve environment references, and
    /// validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let mut config: ReplayConfig =
            toml::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.resolve_env_vars();
        config.validate()?;
        debug!(path = %path.display(), "loaded replay config");
        Ok(config)
    }

    /// Resolve credential references from the environment.
    pub fn resolve_env_vars(&mut self) {
        if let Some(var) = &self.svn.password_env {
            self.svn.password = std::env::var(var).ok();
        }
    }

    /// Check that the configuration is internally consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.svn.url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "svn.url".into(),
                detail: "must not be empty".into(),
            });
        }
        if self.replay.modules.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "replay.modules".into(),
                detail: "at least one module root is required".into(),
            });
        }
        for module in &self.replay.modules {
            if module.is_empty() || module.contains('/') {
                return Err(ConfigError::InvalidValue {
                    field: "replay.modules".into(),
                    detail: format!("'{}' is not a valid module name", module),
                });
            }
        }
        if self.replay.default_branch.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "replay.default_branch".into(),
                detail: "must not be empty".into(),
            });
        }
        if self.replay.base_revision < 1 {
            return Err(ConfigError::InvalidValue {
                field: "replay.base_revision".into(),
                detail: "must be a positive revision number".into(),
            });
        }
        if self.replay.batch_size < 1 {
            return Err(ConfigError::InvalidValue {
                field: "replay.batch_size".into(),
                detail: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
