//! Advisory replay lock.
//!
//! A `.lock` marker file in the destination repository keeps two replay
//! processes from interleaving commits. It is a best-effort resource marker,
//! not crash-proof leader election: a killed process leaves the file behind
//! and an operator removes it by hand.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::ReplayError;

/// Name of the lock marker file inside the destination repository.
pub const LOCK_FILE: &str = ".lock";

/// RAII guard for the advisory lock. Dropping the guard releases the lock;
/// release failures are logged, not propagated, since the process is exiting
/// anyway.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
}

impl RepoLock {
    /// Acquire the lock for the repository at `repo_path`.
    pub fn acquire(repo_path: &Path) -> Result<Self, ReplayError> {
        let path = repo_path.join(LOCK_FILE);
        // create_new is the atomicity point: exactly one process wins.
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                use std::io::Write;
                let _ = writeln!(file, "Remove this file to unlock this repo");
                debug!(path = %path.display(), "acquired replay lock");
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(ReplayError::LockContention(path.display().to_string()))
            }
            Err(e) => Err(ReplayError::Git(crate::errors::GitError::IoError(e))),
        }
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release replay lock");
        } else {
            debug!(path = %self.path.display(), "released replay lock");
        }
    }
}
