//! Revision planning.
//!
//! Consumes one revision's changed paths and produces a [`RevisionPlan`]:
//! per-branch file operations, branch create/delete markers, and at most one
//! tag event. Planning only reads — the destination is queried for branch
//! and tag existence, the source for node kinds and directory listings — and
//! all mutation is left to the executor.

use tracing::{debug, warn};

use crate::classifier::PathClassifier;
use crate::errors::ReplayError;
use crate::git::ReplayTarget;
use crate::models::{
    ClassifiedLocation, FileOp, FileOpKind, NodeKind, PathAction, PathCategory, Revision,
    RevisionPlan, TagAction, TagEvent,
};
use crate::svn::HistorySource;

/// Plans destination operations for one revision at a time.
pub struct RevisionPlanner<'a, S: HistorySource> {
    source: &'a S,
    classifier: PathClassifier,
}

impl<'a, S: HistorySource> RevisionPlanner<'a, S> {
    pub fn new(source: &'a S, modules: &[String], default_branch: &str) -> Self {
        Self {
            source,
            classifier: PathClassifier::new(modules, default_branch),
        }
    }

    /// Build the plan for `revision`, evaluating changed paths in source
    /// order.
    pub async fn plan<T: ReplayTarget>(
        &self,
        revision: &Revision,
        target: &T,
    ) -> Result<RevisionPlan, ReplayError> {
        let mut plan = RevisionPlan::new(revision.number);
        // True while a run of consecutive branch-root adds is signaling the
        // same new branch (an SVN branch copy can report the root more than
        // once, e.g. a copy followed by a property change).
        let mut new_branch_run = false;

        for changed in &revision.changed_paths {
            let loc = self.classifier.classify(&changed.path);
            debug!(rev = revision.number, path = %changed.path, action = ?changed.action,
                   category = ?loc.category, "classified changed path");

            match loc.category {
                PathCategory::Ignored => continue,
                PathCategory::Tag => {
                    self.plan_tag_path(&mut plan, &loc, changed.action, target)?;
                    continue;
                }
                PathCategory::Branch | PathCategory::Module => {}
            }

            // Branch is always present for branch and module paths.
            let branch = loc.branch.clone().unwrap_or_default();

            if loc.relative_path.is_empty() {
                match changed.action {
                    PathAction::Delete => {
                        if loc.category == PathCategory::Branch {
                            if target.branch_exists(&branch)? {
                                plan.branch_mut(&branch).is_deleted_branch = true;
                            } else {
                                debug!(branch = %branch, "branch does not exist, delete is a no-op");
                            }
                        } else {
                            warn!(path = %changed.path, "deleting module roots is not supported, skipping");
                        }
                        new_branch_run = false;
                    }
                    PathAction::Add | PathAction::Modify => {
                        if loc.category == PathCategory::Branch {
                            if !target.branch_exists(&branch)? || new_branch_run {
                                debug!(branch = %branch, "detected new branch");
                                plan.branch_mut(&branch).is_new_branch = true;
                                new_branch_run = true;
                            } else {
                                // Re-add of an existing branch root: resync
                                // the full branch tree.
                                new_branch_run = false;
                                self.expand_to_file_ops(
                                    &mut plan,
                                    &branch,
                                    &loc.raw_path,
                                    "",
                                    revision.number,
                                    op_kind(changed.action),
                                )
                                .await?;
                            }
                        } else {
                            // A module container entry only appears alongside
                            // individually-listed files; don't replay the
                            // directory as well.
                            debug!(path = %changed.path, "module container change, skipping");
                        }
                    }
                }
                continue;
            }

            new_branch_run = false;

            // Content can target a branch whose creation predates the replay
            // window (e.g. a branch cut before the base revision); it gets
            // materialized like any other new branch.
            if loc.category == PathCategory::Branch && !target.branch_exists(&branch)? {
                plan.branch_mut(&branch).is_new_branch = true;
            }

            let dest = dest_path(&loc);

            match changed.action {
                PathAction::Delete => {
                    plan.branch_mut(&branch).push_op(FileOp {
                        kind: FileOpKind::Delete,
                        dest_path: dest,
                        source_path: None,
                    });
                }
                PathAction::Add | PathAction::Modify => {
                    self.expand_to_file_ops(
                        &mut plan,
                        &branch,
                        &loc.raw_path,
                        &dest,
                        revision.number,
                        op_kind(changed.action),
                    )
                    .await?;
                }
            }
        }

        Ok(plan)
    }

    fn plan_tag_path<T: ReplayTarget>(
        &self,
        plan: &mut RevisionPlan,
        loc: &ClassifiedLocation,
        action: PathAction,
        target: &T,
    ) -> Result<(), ReplayError> {
        let name = loc.branch.clone().unwrap_or_default();
        match action {
            PathAction::Add => {
                if let Some(TagEvent { name: pending, .. }) = &plan.tag_event {
                    if *pending != name {
                        // Multiple tags in one revision are unsupported; the
                        // last one wins rather than guessing.
                        warn!(discarded = %pending, kept = %name,
                              "revision schedules more than one tag, keeping the last");
                    }
                }
                plan.tag_event = Some(TagEvent {
                    name,
                    action: TagAction::Create,
                });
            }
            PathAction::Delete => {
                if !loc.relative_path.is_empty() {
                    debug!(path = %loc.raw_path, "delete inside a tag, skipping");
                } else if target.tag_exists(&name)? {
                    plan.tag_event = Some(TagEvent {
                        name,
                        action: TagAction::Delete,
                    });
                } else {
                    debug!(tag = %name, "tag does not exist, delete is a no-op");
                }
            }
            PathAction::Modify => {
                debug!(tag = %name, "tags with a modify action are not supported, skipping");
            }
        }
        Ok(())
    }

    /// Resolve a source path that may be a file or a directory into file
    /// operations on `branch`. Directories are expanded recursively; their
    /// file-less subdirectories are recorded for placeholder preservation.
    async fn expand_to_file_ops(
        &self,
        plan: &mut RevisionPlan,
        branch: &str,
        source_root: &str,
        dest_root: &str,
        rev: i64,
        kind: FileOpKind,
    ) -> Result<(), ReplayError> {
        let listing = self.source.stat_at(source_root, rev).await?;

        if listing.kind == NodeKind::File {
            plan.branch_mut(branch).push_op(FileOp {
                kind,
                dest_path: dest_root.to_string(),
                source_path: Some(source_root.to_string()),
            });
            return Ok(());
        }

        debug!(path = source_root, entries = listing.entries.len(), "expanding directory");
        let branch_plan = plan.branch_mut(branch);

        for entry in &listing.entries {
            match entry.kind {
                NodeKind::File => {
                    branch_plan.push_op(FileOp {
                        kind,
                        dest_path: join_rel(dest_root, &entry.path),
                        source_path: Some(join_rel(source_root, &entry.path)),
                    });
                }
                NodeKind::Directory => {
                    let prefix = format!("{}/", entry.path);
                    let holds_file = listing
                        .entries
                        .iter()
                        .any(|e| e.kind == NodeKind::File && e.path.starts_with(&prefix));
                    if !holds_file {
                        branch_plan.push_empty_dir(join_rel(dest_root, &entry.path));
                    }
                }
            }
        }

        if listing.entries.is_empty() && !dest_root.is_empty() {
            branch_plan.push_empty_dir(dest_root.to_string());
        }

        Ok(())
    }
}

fn op_kind(action: PathAction) -> FileOpKind {
    match action {
        PathAction::Add => FileOpKind::Add,
        PathAction::Modify => FileOpKind::Modify,
        PathAction::Delete => FileOpKind::Delete,
    }
}

/// Destination path for a classified content location: module content lives
/// under its module directory, branch content already carries the module
/// directory in its relative path.
fn dest_path(loc: &ClassifiedLocation) -> String {
    match &loc.project {
        Some(project) => join_rel(project, &loc.relative_path),
        None => loc.relative_path.clone(),
    }
}

fn join_rel(base: &str, rest: &str) -> String {
    if base.is_empty() {
        rest.to_string()
    } else if rest.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), rest)
    }
}
