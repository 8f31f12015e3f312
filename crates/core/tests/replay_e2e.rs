//! End-to-end replay runs: a scripted history source driving the full engine
//! against real scratch repositories.

use std::collections::HashMap;
use std::path::Path;

use tempfile::TempDir;

use svnreplay_core::config::ReplayConfig;
use svnreplay_core::engine::ReplayEngine;
use svnreplay_core::errors::SvnError;
use svnreplay_core::models::{
    ChangedPath, ListEntry, NodeKind, NodeListing, PathAction, Revision,
};
use svnreplay_core::svn::HistorySource;

/// In-memory stand-in for an SVN server: a revision log plus a flat node
/// table keyed by path (revision-independent, which is enough for replay
/// order tests).
#[derive(Default)]
struct ScriptedHistory {
    log: Vec<Revision>,
    nodes: HashMap<String, NodeListing>,
    files: HashMap<String, Vec<u8>>,
}

impl ScriptedHistory {
    fn push_revision(&mut self, number: i64, message: &str, paths: &[(&str, PathAction)]) {
        self.log.push(Revision {
            number,
            author: "alice".into(),
            date: format!("2009-01-{:02}T12:00:00.000000Z", (number % 27) + 1),
            message: message.into(),
            changed_paths: paths
                .iter()
                .map(|(p, a)| ChangedPath {
                    path: p.to_string(),
                    action: *a,
                })
                .collect(),
        });
    }

    fn file(&mut self, path: &str, content: &str) {
        self.nodes.insert(
            path.to_string(),
            NodeListing {
                kind: NodeKind::File,
                entries: Vec::new(),
            },
        );
        self.files.insert(path.to_string(), content.as_bytes().to_vec());
    }

    fn dir(&mut self, path: &str, entries: &[(&str, NodeKind)]) {
        self.nodes.insert(
            path.to_string(),
            NodeListing {
                kind: NodeKind::Directory,
                entries: entries
                    .iter()
                    .map(|(p, k)| ListEntry {
                        path: p.to_string(),
                        kind: *k,
                    })
                    .collect(),
            },
        );
    }
}

impl HistorySource for ScriptedHistory {
    async fn head_revision(&self) -> Result<i64, SvnError> {
        Ok(self.log.iter().map(|r| r.number).max().unwrap_or(0))
    }

    async fn list_revisions(&self, from: i64, to: i64) -> Result<Vec<Revision>, SvnError> {
        Ok(self
            .log
            .iter()
            .filter(|r| r.number >= from && r.number <= to)
            .cloned()
            .collect())
    }

    async fn stat_at(&self, path: &str, rev: i64) -> Result<NodeListing, SvnError> {
        self.nodes
            .get(path)
            .cloned()
            .ok_or(SvnError::RevisionNotFound(rev))
    }

    async fn read_file_at(&self, path: &str, rev: i64) -> Result<Vec<u8>, SvnError> {
        self.files
            .get(path)
            .cloned()
            .ok_or(SvnError::RevisionNotFound(rev))
    }
}

fn config() -> ReplayConfig {
    let mut config = ReplayConfig::default();
    config.replay.modules = vec!["dojo".into()];
    config.replay.base_revision = 10;
    config.replay.batch_size = 2;
    config
}

/// Base history: release at r10, a trunk change, a branch, a tag, and a
/// revision outside the watched tree.
fn scripted_history() -> ScriptedHistory {
    let mut source = ScriptedHistory::default();
    source.dir("/dojo/trunk", &[("dojo.js", NodeKind::File)]);
    source.file("/dojo/trunk/dojo.js", "dojo v1\n");
    source.file("/dojo/trunk/parser.js", "parser v1\n");
    source.file("/branches/1.3/dojo/parser.js", "parser 1.3\n");

    source.push_revision(10, "release 1.2", &[]);
    source.push_revision(11, "add parser", &[("/dojo/trunk/parser.js", PathAction::Add)]);
    source.push_revision(
        12,
        "branch 1.3",
        &[
            ("/branches/1.3", PathAction::Add),
            ("/branches/1.3/dojo/parser.js", PathAction::Add),
        ],
    );
    source.push_revision(13, "tag 1.3.0", &[("/tags/1.3.0", PathAction::Add)]);
    source.push_revision(14, "site tweak", &[("/website/index.html", PathAction::Modify)]);
    source
}

fn head_message(repo_path: &Path, branch: &str) -> String {
    let repo = git2::Repository::open(repo_path).unwrap();
    let branch = repo.find_branch(branch, git2::BranchType::Local).unwrap();
    let commit = branch.get().peel_to_commit().unwrap();
    commit.message().unwrap().to_string()
}

#[tokio::test]
async fn test_fresh_run_bootstraps_and_replays_to_head() {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().join("dojo-mirror");
    let source = scripted_history();
    let config = config();

    let engine = ReplayEngine::new(&source, &config);
    let report = engine.run(&repo_path, None).await.unwrap();

    assert_eq!(report.revisions_replayed, 4);
    // r11 commits on master; r12 commits on 1.3 plus the master watermark
    // commit; r13 and r14 each advance the watermark on master.
    assert_eq!(report.commits, 5);
    assert_eq!(report.last_revision, Some(14));
    assert!(report.branches_touched.contains(&"master".to_string()));
    assert!(report.branches_touched.contains(&"1.3".to_string()));
    assert_eq!(report.tags_created, vec!["1.3.0"]);

    // Bootstrap artifacts.
    assert!(repo_path.join("README").exists());
    assert_eq!(
        std::fs::read_to_string(repo_path.join("dojo/dojo.js")).unwrap(),
        "dojo v1\n"
    );
    // Replayed trunk content and the final watermark.
    assert_eq!(
        std::fs::read_to_string(repo_path.join("dojo/parser.js")).unwrap(),
        "parser v1\n"
    );
    assert_eq!(
        std::fs::read_to_string(repo_path.join(".svnrev")).unwrap(),
        "14"
    );
    // The lock is released when the run finishes.
    assert!(!repo_path.join(".lock").exists());

    assert_eq!(head_message(&repo_path, "master"), "Updating svn sync rev");
    assert_eq!(head_message(&repo_path, "1.3"), "branch 1.3 [[12]]");

    let repo = git2::Repository::open(&repo_path).unwrap();
    assert!(repo.find_reference("refs/tags/1.3.0").is_ok());

    // Branch content was exported from the branch path, not the trunk.
    let branch_tree = repo
        .find_branch("1.3", git2::BranchType::Local)
        .unwrap()
        .get()
        .peel_to_tree()
        .unwrap();
    let entry = branch_tree.get_path(Path::new("dojo/parser.js")).unwrap();
    let blob = repo.find_blob(entry.id()).unwrap();
    assert_eq!(blob.content(), b"parser 1.3\n");
}

#[tokio::test]
async fn test_second_run_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().join("dojo-mirror");
    let source = scripted_history();
    let config = config();

    let engine = ReplayEngine::new(&source, &config);
    engine.run(&repo_path, None).await.unwrap();
    let before = head_message(&repo_path, "master");

    let report = engine.run(&repo_path, None).await.unwrap();
    assert_eq!(report.revisions_replayed, 0);
    assert_eq!(report.commits, 0);
    assert_eq!(head_message(&repo_path, "master"), before);
}

#[tokio::test]
async fn test_resume_picks_up_new_revisions() {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().join("dojo-mirror");
    let mut source = scripted_history();
    let config = config();

    ReplayEngine::new(&source, &config)
        .run(&repo_path, None)
        .await
        .unwrap();

    // More history appears upstream: a trunk edit and the branch going away.
    source.file("/dojo/trunk/parser.js", "parser v2\n");
    source.push_revision(15, "fix parser", &[("/dojo/trunk/parser.js", PathAction::Modify)]);
    source.push_revision(16, "drop 1.3", &[("/branches/1.3", PathAction::Delete)]);

    let report = ReplayEngine::new(&source, &config)
        .run(&repo_path, None)
        .await
        .unwrap();

    assert_eq!(report.revisions_replayed, 2);
    assert_eq!(report.branches_deleted, vec!["1.3"]);
    assert_eq!(
        std::fs::read_to_string(repo_path.join("dojo/parser.js")).unwrap(),
        "parser v2\n"
    );
    assert_eq!(
        std::fs::read_to_string(repo_path.join(".svnrev")).unwrap(),
        "16"
    );
    // The branch deletion still advances the watermark on master.
    assert_eq!(head_message(&repo_path, "master"), "Updating svn sync rev");

    let repo = git2::Repository::open(&repo_path).unwrap();
    assert!(repo.find_branch("1.3", git2::BranchType::Local).is_err());
}

#[tokio::test]
async fn test_branch_created_from_content_without_root_add() {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().join("dojo-mirror");
    let mut source = scripted_history();
    let config = config();

    ReplayEngine::new(&source, &config)
        .run(&repo_path, None)
        .await
        .unwrap();

    // A fix lands on a branch cut before r10; the branch root never
    // appears in the replayed range.
    source.file("/branches/1.2/dojo/fix.js", "fix 1.2\n");
    source.push_revision(
        15,
        "backport fix",
        &[("/branches/1.2/dojo/fix.js", PathAction::Add)],
    );

    let report = ReplayEngine::new(&source, &config)
        .run(&repo_path, None)
        .await
        .unwrap();

    assert_eq!(report.revisions_replayed, 1);
    assert!(report.branches_touched.contains(&"1.2".to_string()));
    assert_eq!(head_message(&repo_path, "1.2"), "backport fix [[15]]");

    let repo = git2::Repository::open(&repo_path).unwrap();
    let branch = repo.find_branch("1.2", git2::BranchType::Local).unwrap();
    let tree = branch.get().peel_to_tree().unwrap();
    let entry = tree.get_path(Path::new("dojo/fix.js")).unwrap();
    let blob = repo.find_blob(entry.id()).unwrap();
    assert_eq!(blob.content(), b"fix 1.2\n");
}

#[tokio::test]
async fn test_watermark_below_base_revision_fails() {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().join("dojo-mirror");
    let source = scripted_history();
    let config = config();

    let engine = ReplayEngine::new(&source, &config);
    engine.run(&repo_path, None).await.unwrap();
    std::fs::write(repo_path.join(".svnrev"), "5").unwrap();

    let err = engine.run(&repo_path, None).await.unwrap_err();
    assert!(matches!(
        err,
        svnreplay_core::errors::ReplayError::InvalidWatermark { .. }
    ));
}

#[tokio::test]
async fn test_lock_contention_aborts_run() {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().join("dojo-mirror");
    let source = scripted_history();
    let config = config();

    let engine = ReplayEngine::new(&source, &config);
    engine.run(&repo_path, None).await.unwrap();

    std::fs::write(repo_path.join(".lock"), "Remove this file to unlock this repo").unwrap();
    let err = engine.run(&repo_path, None).await.unwrap_err();
    assert!(matches!(
        err,
        svnreplay_core::errors::ReplayError::LockContention(_)
    ));
    // A contended run must not delete the foreign lock.
    assert!(repo_path.join(".lock").exists());
}

#[tokio::test]
async fn test_resume_without_watermark_fails() {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().join("dojo-mirror");
    let source = scripted_history();
    let config = config();

    let engine = ReplayEngine::new(&source, &config);
    engine.run(&repo_path, None).await.unwrap();
    std::fs::remove_file(repo_path.join(".svnrev")).unwrap();

    let err = engine.run(&repo_path, None).await.unwrap_err();
    assert!(matches!(
        err,
        svnreplay_core::errors::ReplayError::InvalidWatermark { .. }
    ));
}
