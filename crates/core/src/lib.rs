//! svnreplay core library.
//!
//! Incrementally replays the revision history of a Subversion repository —
//! organized as independent per-module trunks, branches, and tags — into a
//! single Git repository, preserving authorship, timestamps, commit messages,
//! and branch/tag topology. Replay is resumable and idempotent: the last
//! synced revision is recorded in a watermark file committed alongside every
//! primary-branch commit.

pub mod bootstrap;
pub mod classifier;
pub mod commit_format;
pub mod config;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod git;
pub mod lock;
pub mod models;
pub mod planner;
pub mod svn;
pub mod watermark;

// Re-exports for convenience.
pub use config::ReplayConfig;
pub use engine::ReplayEngine;
pub use errors::ReplayError;
pub use git::GitClient;
pub use svn::SvnClient;
