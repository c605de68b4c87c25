//! Layered configuration: defaults, then an optional TOML file, then
//! `QUILL__SECTION__KEY` environment overrides.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::QuillResult;
use crate::export::DEFAULT_ARCHIVE_NAME;
use crate::ledger::DEFAULT_LABEL_PREFIX;

pub const DEFAULT_CONFIG_PATH: &str = "config/quill.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Element factory emitted for JSX elements.
    pub pragma: String,
    /// Fragment type emitted for `<>...</>`.
    pub pragma_frag: String,
    /// Suffixes probed when an import names no extension.
    pub resolve_extensions: Vec<String>,
    /// Iterations any single script loop may run before the preview is aborted.
    #[serde(default = "default_loop_iteration_limit")]
    pub loop_iteration_limit: u64,
}

fn default_loop_iteration_limit() -> u64 {
    1_000_000
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            pragma: "React.createElement".to_string(),
            pragma_frag: "React.Fragment".to_string(),
            resolve_extensions: [".tsx", ".ts", ".jsx", ".js"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            loop_iteration_limit: default_loop_iteration_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSettings {
    pub label_prefix: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub archive_name: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    pub snapshot_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            snapshot_path: "data/quill/ledger.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuillConfig {
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

impl QuillConfig {
    /// Precedence: env `QUILL_CONFIG` path > `config/quill.toml` > defaults,
    /// with `QUILL__*` variables applied last.
    pub fn load() -> QuillResult<Self> {
        let config_path =
            std::env::var("QUILL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&config_path))
    }

    pub fn load_from(path: &Path) -> QuillResult<Self> {
        let defaults = RuntimeSettings::default();
        let builder = config::Config::builder()
            .set_default("runtime.pragma", defaults.pragma)?
            .set_default("runtime.pragma_frag", defaults.pragma_frag)?
            .set_default("runtime.resolve_extensions", defaults.resolve_extensions)?
            .set_default("ledger.label_prefix", DEFAULT_LABEL_PREFIX)?
            .set_default("export.archive_name", DEFAULT_ARCHIVE_NAME)?
            .set_default("storage.snapshot_path", StorageSettings::default().snapshot_path)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("QUILL")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(built.try_deserialize()?)
    }

    pub fn save_to_path(&self, path: &Path) -> QuillResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        Ok(())
    }
}
