//! Parsers for SVN XML output.
//!
//! `svn` is driven with `--xml` and the output is picked apart with plain
//! string scanning — the fragments involved (`info`, `log --verbose`,
//! `list --recursive`) are shallow and regular enough that a full XML
//! dependency buys nothing.

use tracing::{debug, warn};

use crate::errors::SvnError;
use crate::models::{ChangedPath, ListEntry, NodeKind, PathAction, Revision};

/// Repository facts from `svn info --xml`.
#[derive(Debug, Clone)]
pub struct SvnInfo {
    pub url: String,
    pub latest_rev: i64,
    pub kind: NodeKind,
}

/// Parse `svn info --xml` output.
pub fn parse_svn_info(xml: &str) -> Result<SvnInfo, SvnError> {
    debug!("parsing svn info XML ({} bytes)", xml.len());
    let url = extract_tag_content(xml, "url")
        .ok_or_else(|| SvnError::XmlParseError("missing <url> in svn info".into()))?;
    let latest_rev = extract_attribute(xml, "commit", "revision")
        .or_else(|| extract_attribute(xml, "entry", "revision"))
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| SvnError::XmlParseError("missing revision in svn info".into()))?;
    let kind = match extract_attribute(xml, "entry", "kind").as_deref() {
        Some("file") => NodeKind::File,
        _ => NodeKind::Directory,
    };
    Ok(SvnInfo {
        url,
        latest_rev,
        kind,
    })
}

/// Parse `svn log --xml --verbose` output into replay [`Revision`]s,
/// ascending by revision number as requested from the CLI.
pub fn parse_svn_log(xml: &str) -> Result<Vec<Revision>, SvnError> {
    debug!("parsing svn log XML ({} bytes)", xml.len());
    let mut revisions = Vec::new();
    for part in xml.split("<logentry").skip(1) {
        let entry_xml = match part.find("</logentry>") {
            Some(pos) => &part[..pos],
            None => part,
        };
        let number = match extract_attr_from_str(entry_xml, "revision")
            .and_then(|s| s.parse::<i64>().ok())
        {
            Some(rev) => rev,
            None => {
                warn!("skipping log entry with missing or unparseable revision attribute");
                continue;
            }
        };
        revisions.push(Revision {
            number,
            author: extract_tag_content(entry_xml, "author").unwrap_or_default(),
            date: extract_tag_content(entry_xml, "date").unwrap_or_default(),
            message: extract_tag_content(entry_xml, "msg").unwrap_or_default(),
            changed_paths: parse_changed_paths(entry_xml),
        });
    }
    debug!(count = revisions.len(), "parsed svn log entries");
    Ok(revisions)
}

/// Parse `svn list --xml --recursive` output into listing entries. Entry
/// names are paths relative to the listed node.
pub fn parse_svn_list(xml: &str) -> Result<Vec<ListEntry>, SvnError> {
    debug!("parsing svn list XML ({} bytes)", xml.len());
    let mut entries = Vec::new();
    for part in xml.split("<entry").skip(1) {
        let fragment = match part.find("</entry>") {
            Some(pos) => &part[..pos],
            None => continue,
        };
        let kind = match extract_attr_from_str(fragment, "kind").as_deref() {
            Some("file") => NodeKind::File,
            Some("dir") => NodeKind::Directory,
            other => {
                warn!(kind = ?other, "skipping list entry with unknown node kind");
                continue;
            }
        };
        let path = match extract_tag_content(fragment, "name") {
            Some(name) if !name.is_empty() => name,
            _ => {
                warn!("skipping list entry without a name");
                continue;
            }
        };
        entries.push(ListEntry { path, kind });
    }
    debug!(count = entries.len(), "parsed svn list entries");
    Ok(entries)
}

fn parse_changed_paths(entry_xml: &str) -> Vec<ChangedPath> {
    let paths_block = match entry_xml.find("<paths>") {
        Some(start) => {
            let rest = &entry_xml[start..];
            match rest.find("</paths>") {
                Some(end) => &rest[..end],
                None => return Vec::new(),
            }
        }
        None => return Vec::new(),
    };

    let mut paths = Vec::new();
    for part in paths_block.split("<path").skip(1) {
        let fragment = match part.find("</path>") {
            Some(pos) => &part[..pos],
            None => continue,
        };
        let action = match extract_attr_from_str(fragment, "action").as_deref() {
            Some("A") => PathAction::Add,
            Some("M") => PathAction::Modify,
            Some("D") => PathAction::Delete,
            // Replace is delete+add of the same path; last-write-wins
            // collapses it to the add.
            Some("R") => PathAction::Add,
            other => {
                warn!(action = ?other, "skipping changed path with unknown action");
                continue;
            }
        };
        let path = match fragment.find('>') {
            Some(pos) => xml_unescape(fragment[pos + 1..].trim()),
            None => continue,
        };
        paths.push(ChangedPath { path, action });
    }
    paths
}

fn extract_tag_content(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut search_from = 0;
    while let Some(rel_pos) = xml[search_from..].find(&open) {
        let start_pos = search_from + rel_pos;
        let after_open = &xml[start_pos + open.len()..];
        // Reject prefix matches (e.g. <msg> matching <msgid>): the next
        // character must close the tag or start an attribute list.
        if let Some(ch) = after_open.chars().next() {
            if ch != '>' && !ch.is_ascii_whitespace() {
                search_from = start_pos + open.len();
                continue;
            }
        }
        let content_start = match after_open.find('>') {
            Some(pos) => pos + 1,
            None => return None,
        };
        let content = &after_open[content_start..];
        let end_pos = content.find(&close)?;
        return Some(xml_unescape(content[..end_pos].trim()));
    }
    None
}

fn extract_attribute(xml: &str, tag: &str, attr: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let start_pos = xml.find(&open)?;
    let after_tag = &xml[start_pos + open.len()..];
    let tag_end = after_tag.find('>')?;
    extract_attr_from_str(&after_tag[..tag_end], attr)
}

fn extract_attr_from_str(s: &str, attr: &str) -> Option<String> {
    for quote in ['"', '\''] {
        let pattern = format!("{}={}", attr, quote);
        if let Some(pos) = s.find(&pattern) {
            let after = &s[pos + pattern.len()..];
            let end = after.find(quote)?;
            return Some(after[..end].to_string());
        }
    }
    None
}

/// Unescape standard XML entities.
fn xml_unescape(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_svn_info() {
        let xml = r#"<info><entry kind="dir" path="src" revision="46000">
<url>http://svn.dojotoolkit.org/src</url>
<repository><root>http://svn.dojotoolkit.org/src</root>
<uuid>a1b2c3d4</uuid></repository>
<commit revision="45999"></commit></entry></info>"#;
        let info = parse_svn_info(xml).unwrap();
        assert_eq!(info.latest_rev, 45999);
        assert_eq!(info.url, "http://svn.dojotoolkit.org/src");
        assert_eq!(info.kind, NodeKind::Directory);
    }

    #[test]
    fn test_parse_svn_info_file_kind() {
        let xml = r#"<info><entry kind="file" path="parser.js" revision="100">
<url>http://svn.example.com/dojo/trunk/parser.js</url>
<commit revision="100"></commit></entry></info>"#;
        let info = parse_svn_info(xml).unwrap();
        assert_eq!(info.kind, NodeKind::File);
    }

    #[test]
    fn test_parse_svn_log_actions() {
        let xml = r#"<log><logentry revision="100"><author>alice</author>
<date>2009-01-10T12:00:00.000000Z</date>
<paths>
<path action="A" kind="file">/dojo/trunk/new.js</path>
<path action="M" kind="file">/dojo/trunk/parser.js</path>
<path action="D" kind="file">/dojo/trunk/old.js</path>
<path action="R" kind="file">/dojo/trunk/swapped.js</path>
</paths><msg>rework parser</msg></logentry></log>"#;
        let revisions = parse_svn_log(xml).unwrap();
        assert_eq!(revisions.len(), 1);
        let rev = &revisions[0];
        assert_eq!(rev.number, 100);
        assert_eq!(rev.author, "alice");
        assert_eq!(rev.message, "rework parser");
        assert_eq!(rev.changed_paths.len(), 4);
        assert_eq!(rev.changed_paths[0].action, PathAction::Add);
        assert_eq!(rev.changed_paths[1].action, PathAction::Modify);
        assert_eq!(rev.changed_paths[2].action, PathAction::Delete);
        // Replace parses as Add.
        assert_eq!(rev.changed_paths[3].action, PathAction::Add);
    }

    #[test]
    fn test_parse_svn_log_multiple_entries_in_order() {
        let xml = r#"<log>
<logentry revision="100"><author>alice</author><date>d1</date><msg>one</msg></logentry>
<logentry revision="101"><author>bob</author><date>d2</date><msg>two</msg></logentry>
</log>"#;
        let revisions = parse_svn_log(xml).unwrap();
        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[0].number, 100);
        assert_eq!(revisions[1].number, 101);
    }

    #[test]
    fn test_parse_svn_log_skips_invalid_revision() {
        let xml = r#"<log>
<logentry><author>alice</author><msg>no rev</msg></logentry>
<logentry revision="101"><author>bob</author><msg>good</msg></logentry>
</log>"#;
        let revisions = parse_svn_log(xml).unwrap();
        assert_eq!(revisions.len(), 1);
        assert_eq!(revisions[0].number, 101);
    }

    #[test]
    fn test_parse_svn_log_unescapes_entities() {
        let xml = r#"<log><logentry revision="50"><author>alice</author><date>d</date>
<paths><path action="M" kind="file">/dojo/trunk/foo &amp; bar.js</path></paths>
<msg>fix &lt;bug&gt; &amp; improve</msg></logentry></log>"#;
        let revisions = parse_svn_log(xml).unwrap();
        assert_eq!(revisions[0].message, "fix <bug> & improve");
        assert_eq!(revisions[0].changed_paths[0].path, "/dojo/trunk/foo & bar.js");
    }

    #[test]
    fn test_parse_svn_log_empty() {
        assert!(parse_svn_log("<log></log>").unwrap().is_empty());
    }

    #[test]
    fn test_parse_svn_list_recursive() {
        let xml = r#"<lists><list path="http://svn.example.com/dojo/trunk/tests">
<entry kind="dir"><name>unit</name></entry>
<entry kind="file"><name>unit/runner.js</name><size>120</size></entry>
<entry kind="file"><name>harness.js</name><size>40</size></entry>
</list></lists>"#;
        let entries = parse_svn_list(xml).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].path, "unit");
        assert_eq!(entries[0].kind, NodeKind::Directory);
        assert_eq!(entries[1].path, "unit/runner.js");
        assert_eq!(entries[1].kind, NodeKind::File);
    }

    #[test]
    fn test_parse_svn_list_empty_dir() {
        let xml = r#"<lists><list path="http://svn.example.com/x"></list></lists>"#;
        assert!(parse_svn_list(xml).unwrap().is_empty());
    }

    #[test]
    fn test_extract_tag_content_no_prefix_match() {
        let xml = r#"<urlencoded>wrong</urlencoded><url>right</url>"#;
        assert_eq!(extract_tag_content(xml, "url"), Some("right".to_string()));
    }

    #[test]
    fn test_xml_unescape() {
        assert_eq!(xml_unescape("foo &amp; bar"), "foo & bar");
        assert_eq!(xml_unescape("a &lt; b &gt; c"), "a < b > c");
        assert_eq!(xml_unescape("it&apos;s &quot;fine&quot;"), "it's \"fine\"");
        assert_eq!(xml_unescape("no entities"), "no entities");
    }
}
