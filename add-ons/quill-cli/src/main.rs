//! Quill CLI
//!
//! Feeds saved assistant turns through the artifact ledger, lists and selects
//! versions, exports them as zip archives and renders live previews of the
//! generated script files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use quill_core::{
    collect_files, compose_prompt, export_tree_to_path, modules_from_tree, ArtifactNode,
    QuillConfig, QuillError, VersionLedger, DEFAULT_CONFIG_PATH,
};
use quill_runtime::{render_preview, PreviewOutcome, RuntimeOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "quill", version, about = "Artifact ledger and live preview for generated content")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record assistant turns (one file per turn; directories are walked in path order)
    Ingest(IngestArgs),
    /// List recorded versions
    Versions(SnapshotArgs),
    /// Select the version exports and previews act on
    Select(SelectArgs),
    /// Write a version's tree to a zip archive
    Export(ExportArgs),
    /// Render a version's script files and print the HTML
    Preview(PreviewArgs),
    /// Print the generation prompt for a content request
    Prompt(PromptArgs),
    /// Write the default configuration file
    InitConfig(InitConfigArgs),
}

#[derive(Parser)]
struct SnapshotArgs {
    /// Ledger snapshot (default: storage.snapshot_path from config)
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,
}

#[derive(Parser)]
struct IngestArgs {
    /// Turn files or directories of turn files
    #[arg(required = true, value_name = "PATH")]
    inputs: Vec<PathBuf>,
    #[command(flatten)]
    snapshot: SnapshotArgs,
}

#[derive(Parser)]
struct SelectArgs {
    /// Version id, as printed by `quill versions`
    id: String,
    #[command(flatten)]
    snapshot: SnapshotArgs,
}

#[derive(Parser)]
struct ExportArgs {
    /// Archive path (default: export.archive_name from config)
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,
    /// Version id (default: the selected version)
    #[arg(long = "version", value_name = "ID")]
    version_id: Option<String>,
    #[command(flatten)]
    snapshot: SnapshotArgs,
}

#[derive(Parser)]
struct PreviewArgs {
    /// Entry module path inside the tree, e.g. src/App.tsx
    #[arg(long, value_name = "PATH")]
    entry: String,
    /// Version id (default: the selected version)
    #[arg(long = "version", value_name = "ID")]
    version_id: Option<String>,
    #[command(flatten)]
    snapshot: SnapshotArgs,
}

#[derive(Parser)]
struct PromptArgs {
    /// What to write, in plain words
    request: String,
    /// Extra background for the model
    #[arg(long)]
    context: Option<String>,
}

#[derive(Parser)]
struct InitConfigArgs {
    #[arg(value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    path: PathBuf,
}

fn main() -> CliResult<()> {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[quill] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = QuillConfig::load()?;

    match cli.command {
        Commands::Ingest(args) => run_ingest(&config, args),
        Commands::Versions(args) => run_versions(&config, args),
        Commands::Select(args) => run_select(&config, args),
        Commands::Export(args) => run_export(&config, args),
        Commands::Preview(args) => run_preview(&config, args),
        Commands::Prompt(args) => {
            println!("{}", compose_prompt(&args.request, args.context.as_deref()));
            Ok(())
        }
        Commands::InitConfig(args) => {
            config.save_to_path(&args.path)?;
            println!("wrote {}", args.path.display());
            Ok(())
        }
    }
}

fn snapshot_path(config: &QuillConfig, args: &SnapshotArgs) -> PathBuf {
    args.snapshot
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.storage.snapshot_path))
}

fn load_ledger(config: &QuillConfig, args: &SnapshotArgs) -> CliResult<(VersionLedger, PathBuf)> {
    let path = snapshot_path(config, args);
    let ledger = VersionLedger::load_or_default(&path, &config.ledger.label_prefix)?;
    Ok((ledger, path))
}

/// Turn files in the order they are given; directory contents sorted by path.
fn collect_turn_files(inputs: &[PathBuf]) -> CliResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn turn_timestamp(path: &Path) -> DateTime<Utc> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

fn run_ingest(config: &QuillConfig, args: IngestArgs) -> CliResult<()> {
    let (mut ledger, path) = load_ledger(config, &args.snapshot)?;
    let files = collect_turn_files(&args.inputs)?;
    tracing::info!(turns = files.len(), snapshot = %path.display(), "ingesting turns");

    for file in &files {
        let text = fs::read_to_string(file)?;
        match ledger.advance_at(&text, turn_timestamp(file)) {
            Some(version) => println!(
                "{}\t{}\t{} file(s)\t{}",
                version.id,
                version.label,
                collect_files(&version.tree).len(),
                file.display()
            ),
            None => println!("-\t(no artifacts)\t{}", file.display()),
        }
    }

    ledger.save_to_path(&path)?;
    Ok(())
}

fn run_versions(config: &QuillConfig, args: SnapshotArgs) -> CliResult<()> {
    let (ledger, _) = load_ledger(config, &args)?;
    if ledger.is_empty() {
        println!("no versions recorded");
        return Ok(());
    }
    let selected = ledger.current().map(|v| v.id.as_str());
    for version in ledger.versions() {
        let marker = if Some(version.id.as_str()) == selected { "*" } else { " " };
        println!(
            "{} {}\t{}\t{}",
            marker,
            version.id,
            version.label,
            version.created_at.to_rfc3339()
        );
    }
    Ok(())
}

fn run_select(config: &QuillConfig, args: SelectArgs) -> CliResult<()> {
    let (mut ledger, path) = load_ledger(config, &args.snapshot)?;
    if !ledger.select(&args.id) {
        return Err(QuillError::VersionNotFound(args.id).into());
    }
    ledger.save_to_path(&path)?;
    println!("selected {}", args.id);
    Ok(())
}

fn version_tree<'a>(
    ledger: &'a VersionLedger,
    id: Option<&str>,
) -> CliResult<&'a [ArtifactNode]> {
    let version = match id {
        Some(id) => ledger
            .version(id)
            .ok_or_else(|| QuillError::VersionNotFound(id.to_string()))?,
        None => ledger.current().ok_or(QuillError::NoVersions)?,
    };
    Ok(&version.tree)
}

fn run_export(config: &QuillConfig, args: ExportArgs) -> CliResult<()> {
    let (ledger, _) = load_ledger(config, &args.snapshot)?;
    let tree = version_tree(&ledger, args.version_id.as_deref())?;
    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(&config.export.archive_name));
    export_tree_to_path(tree, &out)?;
    println!("wrote {}", out.display());
    Ok(())
}

fn run_preview(config: &QuillConfig, args: PreviewArgs) -> CliResult<()> {
    let (ledger, _) = load_ledger(config, &args.snapshot)?;
    let tree = version_tree(&ledger, args.version_id.as_deref())?;
    let modules = modules_from_tree(tree);
    let options = RuntimeOptions::from(&config.runtime);

    match render_preview(&modules, &args.entry, &options) {
        PreviewOutcome::Rendered { html, .. } => println!("{html}"),
        PreviewOutcome::Failed { message } => eprintln!("preview error: {message}"),
    }
    Ok(())
}
