use thiserror::Error;

/// Rejected module source, with a 1-based position into the linked source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({line}:{column})")]
pub struct TranspileError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),
    #[error("Failed to compile {path}: {cause}")]
    CompileFailed { path: String, cause: String },
    #[error("Cyclic import of {0}")]
    CyclicImport(String),
    #[error("Error executing {path}: {message}")]
    Execution { path: String, message: String },
    #[error("No component exported from {0}")]
    NoComponent(String),
    #[error("Render failed: {0}")]
    Render(String),
    #[error("Script engine error: {0}")]
    Engine(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
