//! Data model for revision replay.
//!
//! A [`Revision`] is the unit of replay. The classifier turns each of its
//! [`ChangedPath`] entries into a [`ClassifiedLocation`], the planner folds
//! those into one [`RevisionPlan`] (a per-branch set of [`FileOp`]s plus an
//! optional tag event), and the executor turns the plan into Git commits,
//! reporting back a [`RevisionSummary`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Source history
// ---------------------------------------------------------------------------

/// Action recorded for a changed path in an SVN revision.
///
/// SVN's `R` (replace) is parsed as [`PathAction::Add`]: a replace is a
/// delete plus an add of the same path within one revision, and the
/// last-write-wins rule collapses the pair to the add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathAction {
    Add,
    Modify,
    Delete,
}

/// One changed path within a revision, exactly as reported by the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedPath {
    /// Raw upstream path, e.g. `/dojo/trunk/parser.js`. Preserved verbatim
    /// so file exports can address the same node the log reported.
    pub path: String,
    pub action: PathAction,
}

/// One atomic changeset from the source history. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    /// Monotonically increasing revision number.
    pub number: i64,
    pub author: String,
    /// ISO-8601 timestamp string as reported by `svn log`.
    pub date: String,
    pub message: String,
    /// Changed paths in source order; not guaranteed branch-grouped.
    pub changed_paths: Vec<ChangedPath>,
}

/// Node kind in the source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Directory,
}

/// One entry of a recursive directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEntry {
    /// Path relative to the listed node, `/`-separated.
    pub path: String,
    pub kind: NodeKind,
}

/// Result of statting a source path at a revision: the node's own kind plus,
/// for directories, the recursive listing of its children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeListing {
    pub kind: NodeKind,
    /// Empty for files.
    pub entries: Vec<ListEntry>,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Top-level category a changed path falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCategory {
    /// The path names a branch container (`branches/<name>[/...]`): the
    /// branch itself when `relative_path` is empty, content within it
    /// otherwise.
    Branch,
    /// The path is under `tags/` — tag containers and anything inside them.
    Tag,
    /// Content under one of the configured module trunks.
    Module,
    /// Unrecognized top-level segment, or a path too shallow to act on.
    Ignored,
}

/// Structured location derived from a raw changed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLocation {
    pub category: PathCategory,
    /// Destination branch. The default branch for module content, the
    /// branch name for branch paths, the tag name for tag paths.
    pub branch: Option<String>,
    /// Module name for trunk content; `None` for branch/tag paths (module
    /// directories live directly under the branch root there).
    pub project: Option<String>,
    /// Remaining path below the branch/tag/version marker. Empty means the
    /// container itself.
    pub relative_path: String,
    /// The raw path exactly as the source reported it.
    pub raw_path: String,
}

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// Kind of a single file operation within a branch plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOpKind {
    Add,
    Modify,
    Delete,
}

/// One file operation to apply to the destination working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOp {
    pub kind: FileOpKind,
    /// Path relative to the repository root, e.g. `dojo/parser.js`.
    pub dest_path: String,
    /// Source repository path to export for add/modify; `None` for deletes.
    pub source_path: Option<String>,
}

/// Ordered operations for one destination branch within one revision.
#[derive(Debug, Clone, Default)]
pub struct BranchPlan {
    pub ops: Vec<FileOp>,
    /// Directories that may end up empty and need a placeholder file so Git
    /// retains them.
    pub empty_dirs: Vec<String>,
    pub is_new_branch: bool,
    pub is_deleted_branch: bool,
}

impl BranchPlan {
    /// Append an op, replacing any earlier op for the same destination path.
    /// Within one revision the later action in changed-path order wins —
    /// this is what makes an SVN delete-then-readd of the same path collapse
    /// to a single add.
    pub fn push_op(&mut self, op: FileOp) {
        self.ops.retain(|existing| existing.dest_path != op.dest_path);
        self.ops.push(op);
    }

    /// Record a directory as needing empty-directory preservation.
    pub fn push_empty_dir(&mut self, dir: String) {
        if !self.empty_dirs.contains(&dir) {
            self.empty_dirs.push(dir);
        }
    }
}

/// Tag lifecycle action scheduled by a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    Create,
    Delete,
}

/// A tag event carried by a revision plan, applied after the branch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEvent {
    pub name: String,
    pub action: TagAction,
}

/// The full plan for one revision: branch name → branch plan, plus at most
/// one tag event. `BTreeMap` keeps branch iteration in lexical order so
/// execution is deterministic.
#[derive(Debug, Clone, Default)]
pub struct RevisionPlan {
    pub revision: i64,
    pub branches: BTreeMap<String, BranchPlan>,
    pub tag_event: Option<TagEvent>,
}

impl RevisionPlan {
    pub fn new(revision: i64) -> Self {
        Self {
            revision,
            ..Default::default()
        }
    }

    /// Get or create the plan for `branch`.
    pub fn branch_mut(&mut self, branch: &str) -> &mut BranchPlan {
        self.branches.entry(branch.to_string()).or_default()
    }

    /// True when nothing at all was scheduled.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty() && self.tag_event.is_none()
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// The executor's view of destination working-tree state: which branch is
/// currently checked out. Passed in and returned explicitly so no hidden
/// destination-tool state is consulted between revisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingContext {
    pub current_branch: String,
}

impl WorkingContext {
    pub fn new(current_branch: impl Into<String>) -> Self {
        Self {
            current_branch: current_branch.into(),
        }
    }
}

/// What executing one revision plan actually did.
#[derive(Debug, Clone, Default)]
pub struct RevisionSummary {
    pub revision: i64,
    pub commits: u64,
    pub branches_touched: Vec<String>,
    pub branches_deleted: Vec<String>,
    pub tags_created: Vec<String>,
    pub tags_deleted: Vec<String>,
}

/// Aggregate outcome of a whole replay run, folded from per-revision
/// summaries by the engine.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub revisions_replayed: u64,
    pub commits: u64,
    pub last_revision: Option<i64>,
    pub branches_touched: Vec<String>,
    pub branches_deleted: Vec<String>,
    pub tags_created: Vec<String>,
    pub tags_deleted: Vec<String>,
}

impl RunReport {
    /// Fold one revision's summary into the report.
    pub fn absorb(&mut self, summary: RevisionSummary) {
        self.revisions_replayed += 1;
        self.commits += summary.commits;
        self.last_revision = Some(summary.revision);
        for branch in summary.branches_touched {
            if !self.branches_touched.contains(&branch) {
                self.branches_touched.push(branch);
            }
        }
        for branch in summary.branches_deleted {
            self.branches_touched.retain(|b| *b != branch);
            if !self.branches_deleted.contains(&branch) {
                self.branches_deleted.push(branch);
            }
        }
        self.tags_created.extend(summary.tags_created);
        self.tags_deleted.extend(summary.tags_deleted);
    }
}
