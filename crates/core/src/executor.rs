//! Plan execution.
//!
//! Applies one [`RevisionPlan`] to the destination repository: branch
//! lifecycle first, then file operations and placeholder files, one commit
//! per touched branch with the watermark staged into it, then the tag event.
//! The working-tree state flows through an explicit [`WorkingContext`] so a
//! revision always starts from a known checkout.

use tracing::{debug, info, instrument, warn};

use crate::commit_format::{self, WATERMARK_COMMIT_MESSAGE};
use crate::errors::ReplayError;
use crate::git::ReplayTarget;
use crate::models::{
    BranchPlan, FileOpKind, Revision, RevisionPlan, RevisionSummary, TagAction, WorkingContext,
};
use crate::svn::HistorySource;
use crate::watermark;

/// Placeholder staged into directories that would otherwise be empty, so Git
/// keeps them in the tree.
pub const PLACEHOLDER_FILE: &str = ".gitignore";

/// Executes revision plans against a [`ReplayTarget`].
pub struct PlanExecutor<'a, S: HistorySource> {
    source: &'a S,
    default_branch: String,
    author_email: String,
}

impl<'a, S: HistorySource> PlanExecutor<'a, S> {
    pub fn new(source: &'a S, default_branch: &str, author_email: &str) -> Self {
        Self {
            source,
            default_branch: default_branch.to_string(),
            author_email: author_email.to_string(),
        }
    }

    /// Apply `plan` for `revision`, returning the updated working context and
    /// a summary of what was committed.
    #[instrument(skip(self, revision, plan, target, ctx), fields(rev = plan.revision))]
    pub async fn execute<T: ReplayTarget>(
        &self,
        revision: &Revision,
        plan: &RevisionPlan,
        target: &T,
        mut ctx: WorkingContext,
    ) -> Result<(WorkingContext, RevisionSummary), ReplayError> {
        let mut summary = RevisionSummary {
            revision: plan.revision,
            ..Default::default()
        };
        let timestamp = self.commit_timestamp(revision);
        let mut committed_on_default = false;

        for (branch, branch_plan) in &plan.branches {
            if branch_plan.is_deleted_branch {
                if ctx.current_branch == *branch {
                    self.switch_to(target, &mut ctx, &self.default_branch)?;
                }
                info!(branch = %branch, "deleting branch");
                target.delete_branch(branch)?;
                summary.branches_deleted.push(branch.clone());
                continue;
            }

            if branch_plan.is_new_branch {
                // New branches fork from the default branch tip.
                self.switch_to(target, &mut ctx, &self.default_branch)?;
                info!(branch = %branch, "creating branch");
                target.create_branch_at_head(branch)?;
            }

            self.switch_to(target, &mut ctx, branch)?;
            self.apply_branch_plan(branch_plan, target, plan.revision).await?;
            watermark::stage(target, plan.revision)?;

            if target.has_staged_changes()? {
                let message = commit_format::format_commit_message(&revision.message, plan.revision);
                let id = target.commit(&message, &revision.author, &self.author_email, timestamp)?;
                debug!(branch = %branch, commit = %id, "committed");
                summary.commits += 1;
                summary.branches_touched.push(branch.clone());
                if *branch == self.default_branch {
                    committed_on_default = true;
                }
            } else {
                debug!(branch = %branch, "nothing staged, skipping commit");
            }
        }

        // The default branch carries the watermark for every revision, even
        // ones whose content landed elsewhere or nowhere at all.
        if !committed_on_default {
            self.switch_to(target, &mut ctx, &self.default_branch)?;
            watermark::stage(target, plan.revision)?;
            if target.has_staged_changes()? {
                target.commit(
                    WATERMARK_COMMIT_MESSAGE,
                    &revision.author,
                    &self.author_email,
                    timestamp,
                )?;
                summary.commits += 1;
                if !summary.branches_touched.iter().any(|b| *b == self.default_branch) {
                    summary.branches_touched.push(self.default_branch.clone());
                }
            }
        }

        if let Some(event) = &plan.tag_event {
            // Tags are cut from the default branch tip, after the revision's
            // commits so they include the watermark.
            match event.action {
                TagAction::Create => {
                    if target.tag_exists(&event.name)? {
                        debug!(tag = %event.name, "tag already exists, skipping");
                    } else {
                        self.switch_to(target, &mut ctx, &self.default_branch)?;
                        info!(tag = %event.name, "creating tag");
                        let message =
                            commit_format::format_commit_message(&revision.message, plan.revision);
                        target.create_tag(&event.name, &message)?;
                        summary.tags_created.push(event.name.clone());
                    }
                }
                TagAction::Delete => {
                    info!(tag = %event.name, "deleting tag");
                    target.delete_tag(&event.name)?;
                    summary.tags_deleted.push(event.name.clone());
                }
            }
        }

        Ok((ctx, summary))
    }

    async fn apply_branch_plan<T: ReplayTarget>(
        &self,
        branch_plan: &BranchPlan,
        target: &T,
        rev: i64,
    ) -> Result<(), ReplayError> {
        for op in &branch_plan.ops {
            match op.kind {
                FileOpKind::Add | FileOpKind::Modify => {
                    let source_path = op.source_path.as_deref().unwrap_or(&op.dest_path);
                    let bytes = self.source.read_file_at(source_path, rev).await?;
                    debug!(path = %op.dest_path, bytes = bytes.len(), "writing file");
                    target.stage_write(&op.dest_path, &bytes)?;
                }
                FileOpKind::Delete => {
                    debug!(path = %op.dest_path, "deleting path");
                    target.stage_delete(&op.dest_path)?;
                }
            }
        }

        for dir in &branch_plan.empty_dirs {
            if target.dir_is_empty(dir)? {
                debug!(dir = %dir, "placing empty-directory placeholder");
                target.stage_write(&format!("{dir}/{PLACEHOLDER_FILE}"), b"")?;
            }
        }

        Ok(())
    }

    fn switch_to<T: ReplayTarget>(
        &self,
        target: &T,
        ctx: &mut WorkingContext,
        branch: &str,
    ) -> Result<(), ReplayError> {
        if ctx.current_branch != branch {
            debug!(from = %ctx.current_branch, to = %branch, "switching branch");
            target.checkout(branch)?;
            ctx.current_branch = branch.to_string();
        }
        Ok(())
    }

    fn commit_timestamp(&self, revision: &Revision) -> i64 {
        commit_format::parse_svn_date(&revision.date).unwrap_or_else(|| {
            warn!(rev = revision.number, date = %revision.date,
                  "unparseable revision date, using current time");
            chrono::Utc::now().timestamp()
        })
    }
}
