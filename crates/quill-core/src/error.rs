//! Error type for the artifact pipeline.
//!
//! Extraction, tree building and merging never fail (malformed input is skipped
//! or resolved by last-write-wins); only disk, archive and ledger lookups do.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuillError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),
    #[error("version not found: {0}")]
    VersionNotFound(String),
    #[error("file not found in selected version: {0}")]
    FileNotFound(String),
    #[error("ledger has no versions")]
    NoVersions,
}

pub type QuillResult<T> = Result<T, QuillError>;
