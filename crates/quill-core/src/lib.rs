//! quill-core: text-to-artifact pipeline.
//!
//! Model output flows extract → build → merge into a [`VersionLedger`] that keeps
//! one cumulative file tree per assistant turn. Trees export to zip archives and
//! hand their script files to the preview runtime as [`VirtualModule`]s.

mod config;
mod error;
mod export;
mod extract;
mod ledger;
mod merge;
mod module;
mod outline;
mod platform;
mod profile;
mod tree;

// Pipeline
pub use extract::{extract_blocks, BlockExtractor, ContentBlock, DEFAULT_KIND};
pub use ledger::{Version, VersionLedger, DEFAULT_LABEL_PREFIX};
pub use merge::merge_trees;
pub use platform::Platform;
pub use tree::{
    build_tree, collect_files, find_file, find_file_mut, path_segments, walk_files, ArtifactNode,
    TreeBuilder, FOLDER_KIND,
};

// Outlines
pub use outline::{outline_paths, parse_outline, parse_outline_lines, OutlineNode};

// Export
pub use export::{
    export_files, export_tree, export_tree_to_path, export_tree_to_vec, normalize_entry_name,
    DEFAULT_ARCHIVE_NAME,
};

// Runtime hand-off
pub use module::{is_script_path, modules_from_tree, VirtualModule, SCRIPT_EXTENSIONS};

// Configuration & errors
pub use config::{
    ExportSettings, LedgerSettings, QuillConfig, RuntimeSettings, StorageSettings,
    DEFAULT_CONFIG_PATH,
};
pub use error::{QuillError, QuillResult};
pub use profile::{compose_prompt, ContentType, RequestProfile, Tone};
