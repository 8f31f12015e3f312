//! Watermark persistence.
//!
//! The last fully-committed source revision is stored as plain text in a
//! `.svnrev` file inside the destination working tree. It is never written
//! on its own: [`stage`] puts the updated value into the index so it lands
//! in the same commit as the revision's file changes, making the commit the
//! sole durability boundary for resumption.

use std::path::Path;

use tracing::debug;

use crate::errors::{GitError, ReplayError};
use crate::git::ReplayTarget;

/// Name of the watermark file inside the destination repository.
pub const WATERMARK_FILE: &str = ".svnrev";

/// Read the watermark from an existing destination repository.
pub fn load(repo_path: &Path) -> Result<i64, ReplayError> {
    let path = repo_path.join(WATERMARK_FILE);
    let raw = std::fs::read_to_string(&path).map_err(|e| ReplayError::InvalidWatermark {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    let rev = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| ReplayError::InvalidWatermark {
            path: path.display().to_string(),
            detail: format!("'{}' is not a revision number", raw.trim()),
        })?;
    if rev < 1 {
        return Err(ReplayError::InvalidWatermark {
            path: path.display().to_string(),
            detail: format!("revision {} out of range", rev),
        });
    }
    debug!(rev, "loaded watermark");
    Ok(rev)
}

/// Stage the watermark at `rev` so the next commit carries it. The file
/// holds the bare decimal number, no trailing newline.
pub fn stage<T: ReplayTarget>(target: &T, rev: i64) -> Result<(), GitError> {
    target.stage_write(WATERMARK_FILE, rev.to_string().as_bytes())
}
