//! Integration test: model turns → ledger versions → archive.
//!
//! Verifies that:
//! 1. A fenced post becomes a single-file version.
//! 2. Successive turns accumulate files and later text wins.
//! 3. Selection and in-place edits survive a snapshot round trip.
//! 4. The selected version exports as a zip mirroring the tree.

use std::io::{Cursor, Read};

use quill_core::{
    export_tree_to_path, ArtifactNode, QuillError, VersionLedger,
};

const TURN_ONE: &str = "Sure! Here is your post:\n\n```twitter twitter-content.md\nHello world\n```\n";

const TURN_TWO: &str = "Updated version plus a long read.\n\n\
```twitter twitter-content.md\nHello again\n```\n\n\
```medium medium-content.md\n# Title\n\nBody\n```\n";

const PROJECT_TURN: &str = "Layout first:\n\n```txt\nsite/\n├── src/\n│   └── App.tsx\n└── README.md\n```\n\n\
```tsx\n// site/src/App.tsx\nexport default function App() { return <h1>Hi</h1>; }\n```\n\n\
```md site/README.md\nRun it.\n```\n";

#[test]
fn single_fenced_post_becomes_version() {
    let mut ledger = VersionLedger::new();
    let version = ledger.advance(TURN_ONE).expect("turn with a fence yields a version");
    assert_eq!(
        version.tree,
        vec![ArtifactNode::file("twitter", "twitter-content.md", "Hello world")]
    );
    assert_eq!(version.label, "Version 1");
    assert!(version.id.starts_with("v1-"));
}

#[test]
fn turns_accumulate_and_later_text_wins() {
    let mut ledger = VersionLedger::new();
    ledger.advance(TURN_ONE);
    assert!(ledger.advance("No files, just a thought.").is_none());
    let second = ledger.advance(TURN_TWO).unwrap().clone();

    assert_eq!(ledger.len(), 2);
    assert_eq!(second.label, "Version 3");
    let names: Vec<_> = second.tree.iter().map(ArtifactNode::name).collect();
    assert_eq!(names, vec!["twitter-content.md", "medium-content.md"]);
    assert_eq!(second.tree[0].text(), Some("Hello again"));

    // The earlier snapshot is untouched.
    assert_eq!(ledger.versions()[0].tree[0].text(), Some("Hello world"));
}

#[test]
fn labeled_sections_merge_with_fences() {
    let mut ledger = VersionLedger::new();
    let text = "```linkedin linkedin-content.md\nfenced draft\n```\n\n**Platform:** LinkedIn\nLabeled final\n";
    let v = ledger.advance(text).unwrap();
    assert_eq!(v.tree.len(), 1);
    assert_eq!(
        v.tree[0].text(),
        Some("**Platform:** LinkedIn\n\nLabeled final")
    );
}

#[test]
fn project_turn_builds_nested_tree_and_outline() {
    let mut ledger = VersionLedger::new();
    let v = ledger.advance(PROJECT_TURN).unwrap();
    assert_eq!(v.tree.len(), 1);
    let site = &v.tree[0];
    assert!(site.is_folder());
    let child_names: Vec<_> = site.children().iter().map(ArtifactNode::name).collect();
    assert_eq!(child_names, vec!["src", "README.md"]);
    assert_eq!(ledger.outline()[0].name, "site");
    assert!(ledger.find_file("site/src/App.tsx").is_some());
}

#[test]
fn snapshot_round_trip_keeps_selection_and_edits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data/ledger.json");

    let mut ledger = VersionLedger::new();
    let first = ledger.advance(TURN_ONE).unwrap().id.clone();
    ledger.advance(TURN_TWO);
    assert!(ledger.select(&first));
    ledger.edit_file("twitter-content.md", "Edited by hand").unwrap();
    ledger.save_to_path(&path).unwrap();

    let loaded = VersionLedger::load_from_path(&path).unwrap();
    assert_eq!(loaded.selected_id(), Some(first.as_str()));
    assert_eq!(loaded.len(), 2);
    assert_eq!(
        loaded.find_file("twitter-content.md").and_then(ArtifactNode::text),
        Some("Edited by hand")
    );
    assert_eq!(loaded.turns(), 2);
}

#[test]
fn loading_missing_snapshot_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = VersionLedger::load_from_path(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, QuillError::Io(_)));
}

#[test]
fn selected_version_exports_as_zip() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out/content-structure.zip");

    let mut ledger = VersionLedger::new();
    ledger.advance(PROJECT_TURN);
    let tree = &ledger.current().unwrap().tree;
    export_tree_to_path(tree, &out).unwrap();

    let bytes = std::fs::read(&out).unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entry = archive.by_name("site/src/App.tsx").unwrap();
    let mut source = String::new();
    entry.read_to_string(&mut source).unwrap();
    assert!(source.starts_with("export default function App()"));
}
