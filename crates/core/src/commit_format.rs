//! Commit message formatting for replayed revisions.
//!
//! Every replayed commit carries a machine-readable `[[<rev>]]` suffix naming
//! the source revision, which makes the history auditable and lets tooling
//! map any destination commit back to its origin.

use chrono::DateTime;

/// Message used for commits that only advance the watermark.
pub const WATERMARK_COMMIT_MESSAGE: &str = "Updating svn sync rev";

/// Format a replayed commit message: the source message, trimmed, with the
/// revision tag appended.
pub fn format_commit_message(message: &str, revision: i64) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        format!("[[{}]]", revision)
    } else {
        format!("{} [[{}]]", trimmed, revision)
    }
}

/// Extract the source revision from a replayed commit message's `[[N]]` tag.
pub fn extract_revision(message: &str) -> Option<i64> {
    let start = message.rfind("[[")?;
    let rest = &message[start + 2..];
    let end = rest.find("]]")?;
    rest[..end].parse::<i64>().ok()
}

/// Parse an SVN log timestamp (ISO-8601, e.g. `2009-01-10T12:00:00.000000Z`)
/// into seconds since the epoch.
pub fn parse_svn_date(date: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(date)
        .ok()
        .map(|dt| dt.timestamp())
}
