//! Initial checkout.
//!
//! Turns an empty directory into a replay destination: a fresh repository
//! seeded with a README and root `.gitignore`, then the configured module
//! trunks exported at the base revision and committed under that revision's
//! own log metadata, watermark included. After bootstrap the repository looks
//! exactly like one that has been replayed up to the base revision.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::commit_format;
use crate::config::ReplayConfig;
use crate::errors::{ReplayError, SvnError};
use crate::executor::PLACEHOLDER_FILE;
use crate::git::{GitClient, ReplayTarget};
use crate::models::NodeKind;
use crate::svn::HistorySource;
use crate::watermark;

const README_FILE: &str = "README";
const README_CONTENT: &str = "Unofficial Dojo Toolkit Mirror\nhttp://dojotoolkit.org/\n";
const IGNORE_FILE: &str = ".gitignore";
const IGNORE_CONTENT: &str = "._*\n.svn\n.lock\n";
const INIT_COMMIT_MESSAGE: &str =
    "Initialized repo and added README, .gitignore, and .svnrev files.";

/// Create and seed a new destination repository at `repo_path`.
#[instrument(skip(source, config), fields(base = config.replay.base_revision))]
pub async fn bootstrap<S: HistorySource>(
    source: &S,
    config: &ReplayConfig,
    repo_path: &Path,
) -> Result<GitClient, ReplayError> {
    let base = config.replay.base_revision;
    info!(path = %repo_path.display(), "creating new repository");
    let target = GitClient::init(repo_path, &config.replay.default_branch)?;

    // The base revision's log entry supplies author and timestamp for both
    // commits; without it the checkout cannot be attributed.
    let revision = source
        .list_revisions(base, base)
        .await?
        .into_iter()
        .next()
        .ok_or(ReplayError::Svn(SvnError::RevisionNotFound(base)))?;
    let timestamp = commit_format::parse_svn_date(&revision.date).unwrap_or(0);

    target.stage_write(README_FILE, README_CONTENT.as_bytes())?;
    target.stage_write(IGNORE_FILE, IGNORE_CONTENT.as_bytes())?;
    target.commit(
        INIT_COMMIT_MESSAGE,
        &revision.author,
        &config.replay.author_email,
        timestamp,
    )?;

    for module in &config.replay.modules {
        export_trunk(source, &target, module, base).await?;
    }

    watermark::stage(&target, base)?;
    let message = commit_format::format_commit_message(&revision.message, base);
    let id = target.commit(
        &message,
        &revision.author,
        &config.replay.author_email,
        timestamp,
    )?;
    info!(commit = %id, rev = base, "initial checkout committed");

    Ok(target)
}

/// Export one module's trunk tree at `rev` into `<module>/` in the working
/// tree, placing placeholders in file-less directories.
async fn export_trunk<S: HistorySource>(
    source: &S,
    target: &GitClient,
    module: &str,
    rev: i64,
) -> Result<(), ReplayError> {
    let trunk = format!("/{module}/trunk");
    let listing = source.stat_at(&trunk, rev).await?;
    if listing.kind != NodeKind::Directory {
        debug!(module, "trunk is not a directory, skipping");
        return Ok(());
    }

    info!(module, files = listing.entries.len(), "exporting trunk");
    for entry in &listing.entries {
        match entry.kind {
            NodeKind::File => {
                let bytes = source.read_file_at(&format!("{trunk}/{}", entry.path), rev).await?;
                target.stage_write(&format!("{module}/{}", entry.path), &bytes)?;
            }
            NodeKind::Directory => {
                let prefix = format!("{}/", entry.path);
                let holds_file = listing
                    .entries
                    .iter()
                    .any(|e| e.kind == NodeKind::File && e.path.starts_with(&prefix));
                if !holds_file {
                    target.stage_write(
                        &format!("{module}/{}/{PLACEHOLDER_FILE}", entry.path),
                        b"",
                    )?;
                }
            }
        }
    }

    if listing.entries.is_empty() {
        target.stage_write(&format!("{module}/{PLACEHOLDER_FILE}"), b"")?;
    }

    Ok(())
}
