//! Zip export of artifact trees.

use std::fs;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::error::QuillResult;
use crate::tree::ArtifactNode;

static ENTRY_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[#/\s]+").expect("entry prefix pattern"));

pub const DEFAULT_ARCHIVE_NAME: &str = "content-structure.zip";

fn options() -> FileOptions {
    FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644)
}

/// Archive entry name for a node: leading `#`, `/` and whitespace stripped and
/// `.` / `..` components dropped, with `file` / `folder` standing in for names
/// that strip to nothing.
pub fn normalize_entry_name(node: &ArtifactNode) -> String {
    let stripped = ENTRY_PREFIX.replace(node.name(), "");
    let kept: Vec<&str> = stripped
        .split(|c: char| c == '/' || c == '\\')
        .map(str::trim)
        .filter(|part| !matches!(*part, "" | "." | ".."))
        .collect();
    if !kept.is_empty() {
        return kept.join("/");
    }
    if node.is_folder() { "folder" } else { "file" }.to_string()
}

/// Write the tree as a zip archive: folders become directories, files become
/// entries holding their text.
pub fn export_tree<W: Write + Seek>(tree: &[ArtifactNode], writer: W) -> QuillResult<W> {
    let mut zip = ZipWriter::new(writer);
    let mut entries = 0usize;
    write_level(&mut zip, tree, "", &mut entries)?;
    let writer = zip.finish()?;
    info!(target: "quill::export", entries, "Exported artifact tree");
    Ok(writer)
}

pub fn export_tree_to_vec(tree: &[ArtifactNode]) -> QuillResult<Vec<u8>> {
    Ok(export_tree(tree, Cursor::new(Vec::new()))?.into_inner())
}

pub fn export_tree_to_path(tree: &[ArtifactNode], path: &Path) -> QuillResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    export_tree(tree, fs::File::create(path)?)?;
    Ok(())
}

/// Selected files flattened into the archive root.
pub fn export_files<'a, W, I>(files: I, writer: W) -> QuillResult<W>
where
    W: Write + Seek,
    I: IntoIterator<Item = &'a ArtifactNode>,
{
    let mut zip = ZipWriter::new(writer);
    let mut entries = 0usize;
    for node in files {
        if let ArtifactNode::File { text, .. } = node {
            zip.start_file(normalize_entry_name(node), options())?;
            zip.write_all(text.as_bytes())?;
            entries += 1;
        }
    }
    let writer = zip.finish()?;
    info!(target: "quill::export", entries, "Exported selected files");
    Ok(writer)
}

fn write_level<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    nodes: &[ArtifactNode],
    prefix: &str,
    entries: &mut usize,
) -> QuillResult<()> {
    for node in nodes {
        let path = format!("{prefix}{}", normalize_entry_name(node));
        match node {
            ArtifactNode::File { text, .. } => {
                zip.start_file(path, options())?;
                zip.write_all(text.as_bytes())?;
                *entries += 1;
            }
            ArtifactNode::Folder { children, .. } => {
                let dir = format!("{path}/");
                zip.add_directory(dir.clone(), options())?;
                write_level(zip, children, &dir, entries)?;
            }
        }
    }
    Ok(())
}
