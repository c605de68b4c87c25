//! quill-runtime: in-process execution of generated multi-file projects.
//!
//! Virtual modules are linked (imports and exports rewritten), transpiled from
//! TSX to plain script and parsed into lazily executed factories inside an
//! embedded engine. A module that fails to compile only fails when required.

mod engine;
mod error;
mod link;
mod preview;
mod render;
mod runtime;
mod transpile;

// Runtime
pub use engine::ScriptEngine;
pub use runtime::{
    ModuleRuntime, ModuleSlot, ModuleValue, RenderOutput, RuntimeOptions, BUILTIN_MODULES,
};

// Source transforms
pub use link::{link_module, resolve_specifier, LinkedModule};
pub use transpile::{transpile, TranspileOptions, MAX_JSX_DEPTH};

// Rendering
pub use preview::{render_preview, PreviewOutcome, PREVIEW_STACK_SIZE};
pub use render::{to_html, RenderNode};

// Errors
pub use error::{RuntimeError, RuntimeResult, TranspileError};
