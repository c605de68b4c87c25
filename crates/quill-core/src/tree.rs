//! Tree Builder: flat blocks → nested file/folder tree.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extract::ContentBlock;

static LEADING_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:#|//)\s*").expect("leading marker pattern"));

/// Kind reported for folder nodes.
pub const FOLDER_KIND: &str = "folder";

/// One node of an artifact tree. Names are unique within a `children` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ArtifactNode {
    File {
        kind: String,
        name: String,
        text: String,
    },
    Folder {
        name: String,
        children: Vec<ArtifactNode>,
    },
}

impl ArtifactNode {
    pub fn file(kind: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        ArtifactNode::File {
            kind: kind.into(),
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn folder(name: impl Into<String>, children: Vec<ArtifactNode>) -> Self {
        ArtifactNode::Folder {
            name: name.into(),
            children,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ArtifactNode::File { name, .. } | ArtifactNode::Folder { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            ArtifactNode::File { kind, .. } => kind,
            ArtifactNode::Folder { .. } => FOLDER_KIND,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, ArtifactNode::Folder { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ArtifactNode::File { text, .. } => Some(text),
            ArtifactNode::Folder { .. } => None,
        }
    }

    pub fn children(&self) -> &[ArtifactNode] {
        match self {
            ArtifactNode::Folder { children, .. } => children,
            ArtifactNode::File { .. } => &[],
        }
    }
}

// -----------------------------------------------------------------------------
// Builder
// -----------------------------------------------------------------------------

enum Draft {
    File { kind: String, text: String },
    Folder(IndexMap<String, Draft>),
}

pub struct TreeBuilder;

impl TreeBuilder {
    /// Nameless blocks and names that normalize to no segments are skipped.
    pub fn build(blocks: Vec<ContentBlock>) -> Vec<ArtifactNode> {
        let mut root: IndexMap<String, Draft> = IndexMap::new();
        for block in blocks {
            let Some(name) = block.name.as_deref() else {
                debug!(target: "quill::tree", kind = %block.kind, "Skipping nameless block");
                continue;
            };
            let segments = path_segments(name);
            if segments.is_empty() {
                debug!(target: "quill::tree", name = %name, "Skipping block with empty path");
                continue;
            }
            insert(&mut root, &segments, block.kind, block.text);
        }
        let tree = finish(root);
        debug!(target: "quill::tree", roots = tree.len(), "Built artifact tree");
        tree
    }
}

/// Convenience wrapper around [`TreeBuilder::build`].
pub fn build_tree(blocks: Vec<ContentBlock>) -> Vec<ArtifactNode> {
    TreeBuilder::build(blocks)
}

/// Strip a leading `#` or `//` marker and split on `/`, dropping empty, `.`
/// and `..` segments.
pub fn path_segments(name: &str) -> Vec<String> {
    LEADING_MARKER
        .replace(name.trim(), "")
        .split('/')
        .map(str::trim)
        .filter(|s| !matches!(*s, "" | "." | ".."))
        .map(str::to_string)
        .collect()
}

fn insert(level: &mut IndexMap<String, Draft>, segments: &[String], kind: String, text: String) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        // IndexMap::insert keeps the original slot, so replaced entries keep their position.
        level.insert(head.clone(), Draft::File { kind, text });
        return;
    }
    let slot = level
        .entry(head.clone())
        .or_insert_with(|| Draft::Folder(IndexMap::new()));
    if let Draft::File { .. } = slot {
        *slot = Draft::Folder(IndexMap::new());
    }
    if let Draft::Folder(children) = slot {
        insert(children, rest, kind, text);
    }
}

fn finish(level: IndexMap<String, Draft>) -> Vec<ArtifactNode> {
    level
        .into_iter()
        .map(|(name, draft)| match draft {
            Draft::File { kind, text } => ArtifactNode::File { kind, name, text },
            Draft::Folder(children) => ArtifactNode::Folder {
                name,
                children: finish(children),
            },
        })
        .collect()
}

// -----------------------------------------------------------------------------
// Traversal
// -----------------------------------------------------------------------------

/// All File nodes, depth-first, with their slash-joined paths.
pub fn walk_files(tree: &[ArtifactNode]) -> Vec<(String, &ArtifactNode)> {
    fn visit<'a>(nodes: &'a [ArtifactNode], prefix: &str, out: &mut Vec<(String, &'a ArtifactNode)>) {
        for node in nodes {
            let path = if prefix.is_empty() {
                node.name().to_string()
            } else {
                format!("{prefix}/{}", node.name())
            };
            match node {
                ArtifactNode::File { .. } => out.push((path, node)),
                ArtifactNode::Folder { children, .. } => visit(children, &path, out),
            }
        }
    }
    let mut out = Vec::new();
    visit(tree, "", &mut out);
    out
}

pub fn collect_files(tree: &[ArtifactNode]) -> Vec<&ArtifactNode> {
    walk_files(tree).into_iter().map(|(_, node)| node).collect()
}

/// First File (depth-first) whose name or full path equals `name`.
pub fn find_file<'a>(tree: &'a [ArtifactNode], name: &str) -> Option<&'a ArtifactNode> {
    walk_files(tree)
        .into_iter()
        .find(|(path, node)| node.name() == name || path == name)
        .map(|(_, node)| node)
}

pub fn find_file_mut<'a>(tree: &'a mut [ArtifactNode], name: &str) -> Option<&'a mut ArtifactNode> {
    fn visit<'a>(
        nodes: &'a mut [ArtifactNode],
        prefix: &str,
        name: &str,
    ) -> Option<&'a mut ArtifactNode> {
        for node in nodes.iter_mut() {
            let path = if prefix.is_empty() {
                node.name().to_string()
            } else {
                format!("{prefix}/{}", node.name())
            };
            if !node.is_folder() && (node.name() == name || path == name) {
                return Some(node);
            }
            if let ArtifactNode::Folder { children, .. } = node {
                if let Some(found) = visit(children, &path, name) {
                    return Some(found);
                }
            }
        }
        None
    }
    visit(tree, "", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(kind: &str, name: &str, text: &str) -> ContentBlock {
        ContentBlock::new(kind, Some(name.to_string()), text)
    }

    fn depth(nodes: &[ArtifactNode]) -> usize {
        nodes
            .iter()
            .map(|n| 1 + depth(n.children()))
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn nested_path_creates_folders() {
        let tree = TreeBuilder::build(vec![block("md", "a/b/c.md", "deep")]);
        assert_eq!(depth(&tree), 3);
        assert_eq!(
            tree,
            vec![ArtifactNode::folder(
                "a",
                vec![ArtifactNode::folder(
                    "b",
                    vec![ArtifactNode::file("md", "c.md", "deep")]
                )]
            )]
        );
    }

    #[test]
    fn marker_and_empty_segments_are_stripped() {
        assert_eq!(path_segments("# src//App.tsx"), vec!["src", "App.tsx"]);
        assert_eq!(path_segments("// lib/util.ts"), vec!["lib", "util.ts"]);
        assert!(path_segments("//").is_empty());
        assert!(path_segments("  ").is_empty());
        assert_eq!(path_segments("../../x.md"), vec!["x.md"]);
        assert_eq!(path_segments("./src/../App.tsx"), vec!["src", "App.tsx"]);
    }

    #[test]
    fn nameless_and_empty_paths_are_skipped() {
        let blocks = vec![
            ContentBlock::new("text", None, "loose"),
            block("text", "/", "nothing"),
            block("md", "kept.md", "yes"),
        ];
        let tree = TreeBuilder::build(blocks);
        assert_eq!(tree, vec![ArtifactNode::file("md", "kept.md", "yes")]);
    }

    #[test]
    fn later_block_overwrites_in_place() {
        let tree = TreeBuilder::build(vec![
            block("md", "x.md", "one"),
            block("md", "y.md", "other"),
            block("md", "x.md", "two"),
        ]);
        let names: Vec<_> = tree.iter().map(ArtifactNode::name).collect();
        assert_eq!(names, vec!["x.md", "y.md"]);
        assert_eq!(tree[0].text(), Some("two"));
    }

    #[test]
    fn file_replaces_folder_and_folder_replaces_file() {
        let tree = TreeBuilder::build(vec![block("md", "docs/a.md", "a"), block("md", "docs", "flat")]);
        assert_eq!(tree, vec![ArtifactNode::file("md", "docs", "flat")]);

        let tree = TreeBuilder::build(vec![block("md", "docs", "flat"), block("md", "docs/a.md", "a")]);
        assert!(tree[0].is_folder());
        assert_eq!(tree[0].children().len(), 1);
    }

    #[test]
    fn find_file_matches_name_or_path() {
        let tree = TreeBuilder::build(vec![
            block("ts", "src/App.tsx", "app"),
            block("ts", "lib/App.tsx", "other"),
        ]);
        assert_eq!(find_file(&tree, "App.tsx").and_then(ArtifactNode::text), Some("app"));
        assert_eq!(
            find_file(&tree, "lib/App.tsx").and_then(ArtifactNode::text),
            Some("other")
        );
        let paths: Vec<_> = walk_files(&tree).into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["src/App.tsx", "lib/App.tsx"]);
    }
}
