//! Source-history access: the [`HistorySource`] seam and its SVN CLI
//! implementation.

pub mod client;
pub mod parser;

pub use client::SvnClient;

use crate::errors::SvnError;
use crate::models::{NodeListing, Revision};

/// Read access to the source repository's history.
///
/// The planner and executor only ever talk to the source through this trait,
/// which keeps them testable against scripted histories. [`SvnClient`] is
/// the production implementation.
#[allow(async_fn_in_trait)]
pub trait HistorySource {
    /// Latest revision number of the source repository.
    async fn head_revision(&self) -> Result<i64, SvnError>;

    /// Fetch revisions `from..=to` in ascending order, with changed paths.
    /// Callers bound the range to keep memory flat.
    async fn list_revisions(&self, from: i64, to: i64) -> Result<Vec<Revision>, SvnError>;

    /// Stat `path` at `rev`: the node's kind plus, for a directory, the
    /// recursive listing of everything beneath it.
    async fn stat_at(&self, path: &str, rev: i64) -> Result<NodeListing, SvnError>;

    /// Export the contents of the file at `path` as of `rev`.
    async fn read_file_at(&self, path: &str, rev: i64) -> Result<Vec<u8>, SvnError>;
}
