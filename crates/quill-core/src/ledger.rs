//! Version Ledger: one cumulative tree snapshot per assistant turn.
//!
//! Each `advance` extracts blocks from a turn, builds a partial tree and merges
//! it over the newest snapshot. Turns that carry no artifacts still consume a
//! turn number, so ids and labels track conversation position rather than
//! the count of versions.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{QuillError, QuillResult};
use crate::extract::BlockExtractor;
use crate::merge::merge_trees;
use crate::outline::{parse_outline, OutlineNode};
use crate::tree::{collect_files, find_file, find_file_mut, ArtifactNode, TreeBuilder};

pub const DEFAULT_LABEL_PREFIX: &str = "Version";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// `v<turn>-<epoch_ms>`
    pub id: String,
    pub label: String,
    pub ordinal: u64,
    pub tree: Vec<ArtifactNode>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionLedger {
    versions: Vec<Version>,
    selected: Option<String>,
    turns: u64,
    #[serde(default)]
    outline: Vec<OutlineNode>,
    #[serde(default = "default_label_prefix")]
    label_prefix: String,
}

fn default_label_prefix() -> String {
    DEFAULT_LABEL_PREFIX.to_string()
}

impl Default for VersionLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionLedger {
    pub fn new() -> Self {
        Self::with_label_prefix(DEFAULT_LABEL_PREFIX)
    }

    pub fn with_label_prefix(prefix: impl Into<String>) -> Self {
        Self {
            versions: Vec::new(),
            selected: None,
            turns: 0,
            outline: Vec::new(),
            label_prefix: prefix.into(),
        }
    }

    /// Fold one assistant turn in, stamped with the current time.
    pub fn advance(&mut self, text: &str) -> Option<&Version> {
        self.advance_at(text, Utc::now())
    }

    /// Fold one assistant turn in. Returns the new Version, or `None` when the
    /// turn produced no artifacts (the turn counter still moves).
    pub fn advance_at(&mut self, text: &str, at: DateTime<Utc>) -> Option<&Version> {
        self.turns += 1;
        let turn = self.turns;

        let outline = parse_outline(text);
        if !outline.is_empty() {
            self.outline = outline;
        }

        let candidate = TreeBuilder::build(BlockExtractor::extract(text));
        if candidate.is_empty() {
            debug!(target: "quill::ledger", turn, "Turn produced no artifacts");
            return None;
        }

        let base = self.versions.last().map(|v| v.tree.as_slice()).unwrap_or(&[]);
        let tree = merge_trees(base, &candidate);
        let version = Version {
            id: format!("v{}-{}", turn, at.timestamp_millis()),
            label: format!("{} {}", self.label_prefix, turn),
            ordinal: turn,
            tree,
            created_at: at,
        };
        info!(target: "quill::ledger", id = %version.id, files = collect_files(&version.tree).len(), "Recorded version");
        self.selected = Some(version.id.clone());
        self.versions.push(version);
        self.versions.last()
    }

    /// Select a version by id. Unknown ids leave the selection unchanged.
    pub fn select(&mut self, id: &str) -> bool {
        if self.versions.iter().any(|v| v.id == id) {
            self.selected = Some(id.to_string());
            true
        } else {
            debug!(target: "quill::ledger", id, "Ignoring selection of unknown version");
            false
        }
    }

    /// Selected version, falling back to the newest.
    pub fn current(&self) -> Option<&Version> {
        self.current_index().map(|i| &self.versions[i])
    }

    fn current_index(&self) -> Option<usize> {
        self.selected
            .as_deref()
            .and_then(|id| self.versions.iter().position(|v| v.id == id))
            .or_else(|| self.versions.len().checked_sub(1))
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.current().map(|v| v.id.as_str())
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn version(&self, id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Advance calls seen so far, including those that produced nothing.
    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Most recent non-empty project outline seen in any turn.
    pub fn outline(&self) -> &[OutlineNode] {
        &self.outline
    }

    /// Replace a file's text inside the selected version. Not a new version.
    pub fn edit_file(&mut self, name: &str, text: impl Into<String>) -> QuillResult<()> {
        let index = self.current_index().ok_or(QuillError::NoVersions)?;
        let version = &mut self.versions[index];
        match find_file_mut(&mut version.tree, name) {
            Some(ArtifactNode::File { text: slot, .. }) => {
                *slot = text.into();
                debug!(target: "quill::ledger", id = %version.id, name, "Edited file in place");
                Ok(())
            }
            _ => Err(QuillError::FileNotFound(name.to_string())),
        }
    }

    /// File nodes of the selected version, depth-first.
    pub fn files(&self) -> Vec<&ArtifactNode> {
        self.current().map(|v| collect_files(&v.tree)).unwrap_or_default()
    }

    pub fn find_file(&self, name: &str) -> Option<&ArtifactNode> {
        self.current().and_then(|v| find_file(&v.tree, name))
    }

    // -------------------------------------------------------------------------
    // Snapshot persistence
    // -------------------------------------------------------------------------

    pub fn save_to_path(&self, path: &Path) -> QuillResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        info!(target: "quill::ledger", path = %path.display(), versions = self.versions.len(), "Saved ledger snapshot");
        Ok(())
    }

    pub fn load_from_path(path: &Path) -> QuillResult<Self> {
        let content = fs::read_to_string(path)?;
        let ledger: VersionLedger = serde_json::from_str(&content)?;
        debug!(target: "quill::ledger", path = %path.display(), versions = ledger.versions.len(), "Loaded ledger snapshot");
        Ok(ledger)
    }

    /// Load when the snapshot exists, otherwise start empty.
    pub fn load_or_default(path: &Path, label_prefix: &str) -> QuillResult<Self> {
        if path.exists() {
            Self::load_from_path(path)
        } else {
            Ok(Self::with_label_prefix(label_prefix))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap()
    }

    #[test]
    fn empty_turn_consumes_ordinal_only() {
        let mut ledger = VersionLedger::new();
        assert!(ledger.advance_at("just chatting", at(1)).is_none());
        assert!(ledger.is_empty());

        let v = ledger
            .advance_at("```md a.md\nhi\n```", at(2_000))
            .unwrap()
            .clone();
        assert_eq!(v.id, "v2-2000");
        assert_eq!(v.label, "Version 2");
        assert_eq!(ledger.turns(), 2);
    }

    #[test]
    fn identical_content_gets_distinct_ids() {
        let mut ledger = VersionLedger::new();
        let text = "```md a.md\nsame\n```";
        let first = ledger.advance_at(text, at(5)).unwrap().id.clone();
        let second = ledger.advance_at(text, at(5)).unwrap().id.clone();
        assert_ne!(first, second);
    }

    #[test]
    fn selection_follows_new_versions_and_ignores_unknown_ids() {
        let mut ledger = VersionLedger::new();
        let first = ledger.advance_at("```md a.md\n1\n```", at(1)).unwrap().id.clone();
        let second = ledger.advance_at("```md a.md\n2\n```", at(2)).unwrap().id.clone();
        assert_eq!(ledger.selected_id(), Some(second.as_str()));

        assert!(ledger.select(&first));
        assert!(!ledger.select("v99-0"));
        assert_eq!(ledger.selected_id(), Some(first.as_str()));
        assert_eq!(ledger.find_file("a.md").and_then(ArtifactNode::text), Some("1"));
    }

    #[test]
    fn edit_file_changes_selected_version_only() {
        let mut ledger = VersionLedger::new();
        ledger.advance_at("```md a.md\n1\n```", at(1));
        let first = ledger.versions()[0].id.clone();
        ledger.advance_at("```md b.md\n2\n```", at(2));
        ledger.select(&first);

        ledger.edit_file("a.md", "edited").unwrap();
        assert_eq!(ledger.versions()[0].tree[0].text(), Some("edited"));
        assert_eq!(ledger.versions()[1].tree[0].text(), Some("1"));
        assert_eq!(ledger.len(), 2);

        assert!(matches!(
            ledger.edit_file("missing.md", "x"),
            Err(QuillError::FileNotFound(_))
        ));
        assert!(matches!(
            VersionLedger::new().edit_file("a.md", "x"),
            Err(QuillError::NoVersions)
        ));
    }

    #[test]
    fn outline_is_remembered_across_turns() {
        let mut ledger = VersionLedger::new();
        ledger.advance_at("```txt\napp/\n└── main.ts\n```", at(1));
        ledger.advance_at("no outline this time", at(2));
        assert_eq!(ledger.outline()[0].name, "app");
    }

    #[test]
    fn custom_label_prefix() {
        let mut ledger = VersionLedger::with_label_prefix("Draft");
        let v = ledger.advance_at("```md a.md\nx\n```", at(1)).unwrap();
        assert_eq!(v.label, "Draft 1");
    }
}
