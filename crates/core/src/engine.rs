//! Replay orchestration.
//!
//! The engine owns one full run: lock the repository, establish the local
//! watermark (bootstrapping a fresh repository if needed), fetch source
//! history in bounded batches, plan and execute each revision in order, and
//! finally push the touched refs. A run that dies mid-way leaves the
//! watermark at the last fully committed revision, so the next run resumes
//! exactly there.

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::bootstrap;
use crate::config::ReplayConfig;
use crate::errors::{GitError, ReplayError};
use crate::executor::PlanExecutor;
use crate::git::{GitClient, ReplayTarget};
use crate::lock::RepoLock;
use crate::models::{RunReport, WorkingContext};
use crate::planner::RevisionPlanner;
use crate::svn::HistorySource;
use crate::watermark;

/// Drives a full replay run against one destination repository.
pub struct ReplayEngine<'a, S: HistorySource> {
    source: &'a S,
    config: &'a ReplayConfig,
}

impl<'a, S: HistorySource> ReplayEngine<'a, S> {
    pub fn new(source: &'a S, config: &'a ReplayConfig) -> Self {
        Self { source, config }
    }

    /// Replay all outstanding revisions into `repo_path`. When
    /// `remote_account` is given and the run produced commits, the touched
    /// refs are pushed to `git@github.com:<account>/<repo-name>.git`.
    #[instrument(skip(self, repo_path, remote_account), fields(repo = %repo_path.display()))]
    pub async fn run(
        &self,
        repo_path: &Path,
        remote_account: Option<&str>,
    ) -> Result<RunReport, ReplayError> {
        let fresh = !repo_path.join(".git").exists();
        if fresh {
            std::fs::create_dir_all(repo_path).map_err(GitError::IoError)?;
        }
        let _lock = RepoLock::acquire(repo_path)?;

        let (target, mut local) = if fresh {
            let target = bootstrap::bootstrap(self.source, self.config, repo_path).await?;
            (target, self.config.replay.base_revision)
        } else {
            let target = GitClient::open(repo_path)?;
            let local = watermark::load(repo_path)?;
            let base = self.config.replay.base_revision;
            if local < base {
                return Err(ReplayError::InvalidWatermark {
                    path: repo_path.join(watermark::WATERMARK_FILE).display().to_string(),
                    detail: format!("revision {} predates base revision {}", local, base),
                });
            }
            info!(rev = local, "resuming from watermark");
            (target, local)
        };

        let default_branch = &self.config.replay.default_branch;
        let mut ctx = WorkingContext::new(target.current_branch()?);
        if ctx.current_branch != *default_branch {
            target.checkout(default_branch)?;
            ctx.current_branch = default_branch.clone();
        }

        let head = self.source.head_revision().await?;
        let mut report = RunReport::default();
        if local >= head {
            info!(rev = local, "already up-to-date");
            return Ok(report);
        }

        let planner =
            RevisionPlanner::new(self.source, &self.config.replay.modules, default_branch);
        let executor = PlanExecutor::new(
            self.source,
            default_branch,
            &self.config.replay.author_email,
        );

        while local < head {
            let from = local + 1;
            let to = (local + self.config.replay.batch_size).min(head);
            info!(from, to, "fetching log history");
            let revisions = self.source.list_revisions(from, to).await?;

            for revision in &revisions {
                info!(rev = revision.number, paths = revision.changed_paths.len(),
                      "replaying revision");
                let plan = planner.plan(revision, &target).await?;
                let (next_ctx, summary) = executor.execute(revision, &plan, &target, ctx).await?;
                ctx = next_ctx;
                local = revision.number;
                report.absorb(summary);
            }

            // Revisions that touched nothing under the source root don't
            // appear in the log at all; skip past them.
            if local < to {
                local = to;
            }
        }

        info!(rev = local, commits = report.commits, "repo is now synced");

        if report.commits > 0 {
            match remote_account {
                Some(account) => self.push_refs(&target, repo_path, account, &report)?,
                None => info!("no remote account given, skipping push"),
            }
        }

        Ok(report)
    }

    /// Push everything the run touched: the default branch first, then the
    /// other touched branches, deletions, and tags.
    fn push_refs(
        &self,
        target: &GitClient,
        repo_path: &Path,
        account: &str,
        report: &RunReport,
    ) -> Result<(), ReplayError> {
        let default_branch = &self.config.replay.default_branch;
        let url = remote_url(account, repo_path);
        info!(url = %url, "pushing changes to remote repository");
        target.ensure_remote(&url)?;

        target.push_branch(default_branch)?;
        for branch in &report.branches_touched {
            if branch != default_branch {
                target.push_branch(branch)?;
            }
        }
        for branch in &report.branches_deleted {
            if branch != default_branch {
                target.push_deleted_branch(branch)?;
            }
        }
        if !report.tags_created.is_empty() || !report.tags_deleted.is_empty() {
            target.push_tags()?;
        }
        Ok(())
    }
}

/// Remote URL derived from the account name and the repository directory
/// name, in GitHub SSH form.
fn remote_url(account: &str, repo_path: &Path) -> String {
    let name = repo_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| {
            warn!("repository path has no final component, using 'mirror'");
            "mirror".to_string()
        });
    format!("git@github.com:{account}/{name}.git")
}
