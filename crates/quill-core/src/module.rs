//! Virtual modules handed to the preview runtime.

use serde::{Deserialize, Serialize};

use crate::tree::{walk_files, ArtifactNode};

/// Extensions treated as executable script sources.
pub const SCRIPT_EXTENSIONS: [&str; 5] = ["js", "jsx", "ts", "tsx", "mjs"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualModule {
    /// Slash-separated logical id, e.g. `src/components/Button.tsx`.
    pub path: String,
    pub source: String,
}

impl VirtualModule {
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub fn is_script_path(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(stem, ext)| !stem.is_empty() && SCRIPT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Script files of a tree, keyed by their tree path.
pub fn modules_from_tree(tree: &[ArtifactNode]) -> Vec<VirtualModule> {
    walk_files(tree)
        .into_iter()
        .filter(|(path, _)| is_script_path(path))
        .filter_map(|(path, node)| node.text().map(|text| VirtualModule::new(path, text)))
        .collect()
}
