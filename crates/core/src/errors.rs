//! Error types for the svnreplay core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and the
//! top-level [`ReplayError`] unifies them for the engine and CLI. Fatal
//! errors abort the whole run; the watermark is only ever advanced inside a
//! durable commit, so every fatal error leaves the repository resumable at
//! the failing revision.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for a replay run.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Another replay instance holds the advisory lock on this repository.
    #[error("another replay instance is already running (lock file at '{0}')")]
    LockContention(String),

    /// The watermark file is missing or does not contain a valid revision.
    #[error("missing or invalid watermark file at '{path}': {detail}")]
    InvalidWatermark { path: String, detail: String },

    #[error(transparent)]
    Svn(#[from] SvnError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// SVN errors
// ---------------------------------------------------------------------------

/// Errors from SVN CLI operations.
#[derive(Debug, Error)]
pub enum SvnError {
    /// The `svn` binary was not found on `$PATH`.
    #[error("svn binary not found: {0}")]
    BinaryNotFound(String),

    /// An `svn` command exited with a non-zero status.
    #[error("svn command failed (exit {exit_code}): {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    /// Could not parse the XML output produced by `svn`.
    #[error("failed to parse svn XML output: {0}")]
    XmlParseError(String),

    /// The requested revision does not exist.
    #[error("svn revision {0} not found")]
    RevisionNotFound(i64),

    /// Generic I/O wrapper.
    #[error("svn I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local Git (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// A ref (branch, tag) could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// Push was rejected (e.g. non-fast-forward).
    #[error("git push rejected for '{refname}': {detail}")]
    PushRejected { refname: String, detail: String },

    /// A staged path escaped the working tree or was otherwise invalid.
    #[error("invalid repository path '{0}'")]
    InvalidPath(String),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
