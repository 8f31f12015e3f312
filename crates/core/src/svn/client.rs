//! Asynchronous SVN CLI client.

use std::process::Stdio;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::parser::{parse_svn_info, parse_svn_list, parse_svn_log, SvnInfo};
use super::HistorySource;
use crate::errors::SvnError;
use crate::models::{NodeKind, NodeListing, Revision};

/// Characters percent-encoded when a repository path is embedded in a URL.
/// Every URL-reserved byte is covered, not just spaces.
const URL_PATH_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'%')
    .add(b'{')
    .add(b'}')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'|')
    .add(b'\\');

/// Asynchronous client for a remote SVN repository via the `svn` CLI.
#[derive(Debug, Clone)]
pub struct SvnClient {
    url: String,
    username: String,
    password: String,
}

impl SvnClient {
    /// Create a new client targeting the repository root `url`. Empty
    /// credentials mean anonymous access.
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let client = Self {
            url: url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        };
        info!(url = %client.url, "created SvnClient");
        client
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Absolute, percent-encoded URL for a repository path.
    pub fn url_for(&self, path: &str) -> String {
        let trimmed = path.trim_start_matches('/');
        if trimmed.is_empty() {
            return self.url.clone();
        }
        let encoded = utf8_percent_encode(trimmed, URL_PATH_ENCODE).to_string();
        format!("{}/{}", self.url, encoded)
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn info(&self) -> Result<SvnInfo, SvnError> {
        let output = self.run_svn(&["info", "--xml", &self.url]).await?;
        parse_svn_info(&String::from_utf8_lossy(&output))
    }

    async fn info_at(&self, path: &str, rev: i64) -> Result<SvnInfo, SvnError> {
        let rev_str = rev.to_string();
        let target = format!("{}@{}", self.url_for(path), rev);
        let output = self
            .run_svn(&["info", "--xml", "-r", &rev_str, &target])
            .await?;
        parse_svn_info(&String::from_utf8_lossy(&output))
    }

    async fn run_svn(&self, args: &[&str]) -> Result<Vec<u8>, SvnError> {
        let mut cmd = Command::new("svn");
        cmd.args(args).arg("--non-interactive");
        if !self.username.is_empty() {
            cmd.arg("--no-auth-cache")
                .arg("--username")
                .arg(&self.username)
                .arg("--password")
                .arg(&self.password);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        debug!(cmd = ?format!("svn {}", args.join(" ")), "running svn command");
        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SvnError::BinaryNotFound("svn".into())
            } else {
                SvnError::IoError(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, %stderr, "svn command failed");
            return Err(SvnError::CommandFailed { exit_code, stderr });
        }
        Ok(output.stdout)
    }
}

impl HistorySource for SvnClient {
    async fn head_revision(&self) -> Result<i64, SvnError> {
        Ok(self.info().await?.latest_rev)
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn list_revisions(&self, from: i64, to: i64) -> Result<Vec<Revision>, SvnError> {
        let range = format!("{}:{}", from, to);
        let output = self
            .run_svn(&["log", "--xml", "--verbose", "-r", &range, &self.url])
            .await?;
        let revisions = parse_svn_log(&String::from_utf8_lossy(&output))?;
        debug!(count = revisions.len(), from, to, "fetched revision batch");
        Ok(revisions)
    }

    #[instrument(skip(self), fields(path, rev))]
    async fn stat_at(&self, path: &str, rev: i64) -> Result<NodeListing, SvnError> {
        let node = self.info_at(path, rev).await?;
        if node.kind == NodeKind::File {
            return Ok(NodeListing {
                kind: NodeKind::File,
                entries: Vec::new(),
            });
        }

        let rev_str = rev.to_string();
        let target = format!("{}@{}", self.url_for(path), rev);
        let output = self
            .run_svn(&["list", "--xml", "--recursive", "-r", &rev_str, &target])
            .await?;
        let entries = parse_svn_list(&String::from_utf8_lossy(&output))?;
        Ok(NodeListing {
            kind: NodeKind::Directory,
            entries,
        })
    }

    #[instrument(skip(self), fields(path, rev))]
    async fn read_file_at(&self, path: &str, rev: i64) -> Result<Vec<u8>, SvnError> {
        let rev_str = rev.to_string();
        let target = format!("{}@{}", self.url_for(path), rev);
        self.run_svn(&["cat", "-r", &rev_str, &target]).await
    }
}
