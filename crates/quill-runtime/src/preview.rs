//! Render boundary: one-shot previews that never fail the caller.

use std::thread;

use quill_core::VirtualModule;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{RuntimeError, RuntimeResult};
use crate::render::RenderNode;
use crate::runtime::{ModuleRuntime, RenderOutput, RuntimeOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PreviewOutcome {
    Rendered { html: String, nodes: Vec<RenderNode> },
    Failed { message: String },
}

impl PreviewOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, PreviewOutcome::Rendered { .. })
    }
}

/// Stack for the preview worker. The engine's parser and renderer recurse per
/// nesting level of the generated code.
pub const PREVIEW_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Registers `modules` in a fresh runtime and renders `entry`, on a worker
/// thread with [`PREVIEW_STACK_SIZE`] of stack.
pub fn render_preview(
    modules: &[VirtualModule],
    entry: &str,
    options: &RuntimeOptions,
) -> PreviewOutcome {
    let result = thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name("quill-preview".to_string())
            .stack_size(PREVIEW_STACK_SIZE)
            .spawn_scoped(scope, || try_render(modules, entry, options));
        match worker {
            Ok(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(RuntimeError::Engine("preview worker panicked".into()))),
            Err(e) => Err(RuntimeError::Engine(format!(
                "preview worker failed to start: {e}"
            ))),
        }
    });

    match result {
        Ok(RenderOutput { nodes, html }) => {
            info!(target: "quill::preview", entry = %entry, bytes = html.len(), "preview rendered");
            PreviewOutcome::Rendered { html, nodes }
        }
        Err(err) => {
            warn!(target: "quill::preview", entry = %entry, error = %err, "preview failed");
            PreviewOutcome::Failed {
                message: err.to_string(),
            }
        }
    }
}

fn try_render(
    modules: &[VirtualModule],
    entry: &str,
    options: &RuntimeOptions,
) -> RuntimeResult<RenderOutput> {
    let mut runtime = ModuleRuntime::new(options.clone())?;
    runtime.register(modules)?;
    runtime.render(entry)
}
