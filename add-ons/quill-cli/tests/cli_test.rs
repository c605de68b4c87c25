//! Integration test: the `quill` binary end to end.
//!
//! Verifies that:
//! 1. Ingesting a directory of turns records versions in path order.
//! 2. `select` moves the selection and `versions` marks it.
//! 3. `export` writes the selected tree as a zip archive.
//! 4. `preview` renders the generated project's entry module.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn quill(workdir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_quill"))
        .current_dir(workdir)
        .env("QUILL_CONFIG", workdir.join("quill.toml"))
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("run quill")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "quill failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write_turns(dir: &Path) {
    let turns = dir.join("turns");
    fs::create_dir_all(&turns).unwrap();
    fs::write(
        turns.join("01.md"),
        "Here you go:\n\n```tsx\n// app/App.tsx\nexport default function App() {\n  return <p className=\"hi\">Hello</p>;\n}\n```\n",
    )
    .unwrap();
    fs::write(turns.join("02.md"), "Anything else?").unwrap();
    fs::write(
        turns.join("03.md"),
        "```md app/README.md\nRun it.\n```\n",
    )
    .unwrap();
}

#[test]
fn ingest_select_export_preview() {
    let dir = tempfile::tempdir().unwrap();
    write_turns(dir.path());

    let out = stdout(&quill(dir.path(), &["ingest", "turns", "--snapshot", "ledger.json"]));
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("Version 1"));
    assert!(lines[1].contains("(no artifacts)"));
    assert!(lines[2].contains("Version 3") && lines[2].contains("2 file(s)"));

    let first_id = lines[0].split('\t').next().unwrap().to_string();
    stdout(&quill(dir.path(), &["select", &first_id, "--snapshot", "ledger.json"]));
    let listing = stdout(&quill(dir.path(), &["versions", "--snapshot", "ledger.json"]));
    assert!(listing.lines().next().unwrap().starts_with(&format!("* {first_id}")));

    stdout(&quill(
        dir.path(),
        &["export", "--snapshot", "ledger.json", "--out", "out/site.zip"],
    ));
    let bytes = fs::read(dir.path().join("out/site.zip")).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    assert!(archive.by_name("app/App.tsx").is_ok());
    assert!(archive.by_name("app/README.md").is_err());

    let html = stdout(&quill(
        dir.path(),
        &["preview", "--snapshot", "ledger.json", "--entry", "app/App.tsx"],
    ));
    assert_eq!(html.trim(), "<p class=\"hi\">Hello</p>");
}

#[test]
fn select_unknown_version_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = quill(dir.path(), &["select", "v9-0", "--snapshot", "ledger.json"]);
    assert!(!output.status.success());
}

#[test]
fn init_config_writes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    stdout(&quill(dir.path(), &["init-config", "conf/quill.toml"]));
    let written = fs::read_to_string(dir.path().join("conf/quill.toml")).unwrap();
    assert!(written.contains("label_prefix = \"Version\""));
    assert!(written.contains("snapshot_path"));
}
