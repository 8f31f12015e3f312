//! Destination-repository access: the [`ReplayTarget`] seam and its git2
//! implementation.

pub mod client;

pub use client::GitClient;

use crate::errors::GitError;

/// Write access to the destination repository, as the planner and executor
/// see it. [`GitClient`] is the production implementation; tests drive the
/// same trait against scratch repositories.
///
/// All methods are synchronous — git2 operates on the local filesystem and
/// the engine replays strictly sequentially.
pub trait ReplayTarget {
    fn branch_exists(&self, name: &str) -> Result<bool, GitError>;

    /// Create `name` pointing at the current HEAD commit.
    fn create_branch_at_head(&self, name: &str) -> Result<(), GitError>;

    fn delete_branch(&self, name: &str) -> Result<(), GitError>;

    /// Switch the working tree to branch `name`.
    fn checkout(&self, name: &str) -> Result<(), GitError>;

    /// Name of the branch HEAD currently points at.
    fn current_branch(&self) -> Result<String, GitError>;

    fn tag_exists(&self, name: &str) -> Result<bool, GitError>;

    /// Create an annotated tag at the current HEAD commit.
    fn create_tag(&self, name: &str, message: &str) -> Result<(), GitError>;

    fn delete_tag(&self, name: &str) -> Result<(), GitError>;

    /// Write `bytes` at `path` (relative to the repo root, parents created
    /// as needed) and stage it.
    fn stage_write(&self, path: &str, bytes: &[u8]) -> Result<(), GitError>;

    /// Remove `path` — file or directory — from the working tree and index.
    /// Removing a path that does not exist is a no-op.
    fn stage_delete(&self, path: &str) -> Result<(), GitError>;

    /// True when the working-tree directory at `path` holds no entries (or
    /// does not exist yet).
    fn dir_is_empty(&self, path: &str) -> Result<bool, GitError>;

    /// True when the index differs from the HEAD tree.
    fn has_staged_changes(&self) -> Result<bool, GitError>;

    /// Commit the index with an explicit author identity and timestamp
    /// (seconds since the epoch, UTC). Returns the commit id.
    fn commit(
        &self,
        message: &str,
        author_name: &str,
        author_email: &str,
        timestamp: i64,
    ) -> Result<String, GitError>;
}
