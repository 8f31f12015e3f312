//! Path classification.
//!
//! Maps a raw changed-path string from the source history to a structured
//! [`ClassifiedLocation`]: which branch it targets, which module it belongs
//! to, and the path remaining below the container. Pure — no I/O, no state
//! beyond the configured module set.

use tracing::debug;

use crate::models::{ClassifiedLocation, PathCategory};

/// Reserved top-level segment for branch containers.
const BRANCHES_ROOT: &str = "branches";
/// Reserved top-level segment for tag containers.
const TAGS_ROOT: &str = "tags";

/// Classifies raw source paths against a fixed set of module roots.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    modules: Vec<String>,
    default_branch: String,
}

impl PathClassifier {
    pub fn new(modules: &[String], default_branch: &str) -> Self {
        Self {
            modules: modules.iter().map(|m| m.to_lowercase()).collect(),
            default_branch: default_branch.to_string(),
        }
    }

    /// Classify one raw changed path.
    ///
    /// The layout is `<top>/<marker>/<relative...>` where `<top>` selects the
    /// category: `branches` and `tags` use `<marker>` as the branch/tag name,
    /// a module root uses it as the version marker (`trunk`), which only
    /// matters for the initial checkout — incremental module content always
    /// lands on the default branch. Paths with no `<marker>` segment target
    /// nothing actionable and classify as [`PathCategory::Ignored`].
    pub fn classify(&self, raw_path: &str) -> ClassifiedLocation {
        let trimmed = raw_path.trim_matches('/');
        let mut segments = trimmed.split('/').filter(|s| !s.is_empty());

        let ignored = |raw: &str| ClassifiedLocation {
            category: PathCategory::Ignored,
            branch: None,
            project: None,
            relative_path: String::new(),
            raw_path: raw.to_string(),
        };

        let top = match segments.next() {
            Some(top) => top.to_lowercase(),
            None => return ignored(raw_path),
        };

        let marker = match segments.next() {
            Some(marker) => marker.to_string(),
            None => {
                debug!(path = raw_path, "path not deep enough, ignoring");
                return ignored(raw_path);
            }
        };

        let relative_path = segments.collect::<Vec<_>>().join("/");

        if top == BRANCHES_ROOT {
            return ClassifiedLocation {
                category: PathCategory::Branch,
                branch: Some(marker),
                project: None,
                relative_path,
                raw_path: raw_path.to_string(),
            };
        }

        if top == TAGS_ROOT {
            return ClassifiedLocation {
                category: PathCategory::Tag,
                branch: Some(marker),
                project: None,
                relative_path,
                raw_path: raw_path.to_string(),
            };
        }

        if self.modules.iter().any(|m| *m == top) {
            // The version marker (`trunk`) is dropped: module content always
            // maps onto the default branch for incremental replay.
            return ClassifiedLocation {
                category: PathCategory::Module,
                branch: Some(self.default_branch.clone()),
                project: Some(top),
                relative_path,
                raw_path: raw_path.to_string(),
            };
        }

        debug!(path = raw_path, top = %top, "unrecognized top-level segment, ignoring");
        ignored(raw_path)
    }
}
