//! Module runtime: registry lifecycle over the script engine.

use indexmap::IndexMap;
use quill_core::{RuntimeSettings, VirtualModule};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::ScriptEngine;
use crate::error::RuntimeResult;
use crate::link::link_module;
use crate::render::{to_html, RenderNode};
use crate::transpile::{transpile, TranspileOptions};

/// Modules the registry is seeded with before any user module.
pub const BUILTIN_MODULES: &[&str] = &["react"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub pragma: String,
    pub pragma_frag: String,
    pub resolve_extensions: Vec<String>,
    /// Upper bound on iterations of any one loop.
    pub loop_iteration_limit: u64,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self::from(&RuntimeSettings::default())
    }
}

impl From<&RuntimeSettings> for RuntimeOptions {
    fn from(settings: &RuntimeSettings) -> Self {
        Self {
            pragma: settings.pragma.clone(),
            pragma_frag: settings.pragma_frag.clone(),
            resolve_extensions: settings.resolve_extensions.clone(),
            loop_iteration_limit: settings.loop_iteration_limit,
        }
    }
}

impl RuntimeOptions {
    fn transpile_options(&self) -> TranspileOptions {
        TranspileOptions {
            pragma: self.pragma.clone(),
            pragma_frag: self.pragma_frag.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSlot {
    Builtin,
    Compiled,
    /// Raises `cause` on first use.
    Failed { cause: String },
}

/// What `require` handed back, as seen from outside the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModuleValue {
    Undefined,
    Function {
        #[serde(default)]
        name: String,
    },
    Value {
        json: serde_json::Value,
    },
}

impl ModuleValue {
    pub fn is_callable(&self) -> bool {
        matches!(self, ModuleValue::Function { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub nodes: Vec<RenderNode>,
    pub html: String,
}

pub struct ModuleRuntime {
    options: RuntimeOptions,
    engine: ScriptEngine,
    slots: IndexMap<String, ModuleSlot>,
}

impl ModuleRuntime {
    pub fn new(options: RuntimeOptions) -> RuntimeResult<Self> {
        let engine = ScriptEngine::new(&options.resolve_extensions, options.loop_iteration_limit)?;
        Ok(Self {
            options,
            engine,
            slots: builtin_slots(),
        })
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Replaces the registry with `modules`. Nothing is executed; each module is
    /// linked, transpiled and parsed, and a failure in one is recorded against
    /// that module alone.
    pub fn register(&mut self, modules: &[VirtualModule]) -> RuntimeResult<()> {
        self.engine = ScriptEngine::new(
            &self.options.resolve_extensions,
            self.options.loop_iteration_limit,
        )?;
        self.slots = builtin_slots();
        let transpile_options = self.options.transpile_options();

        for module in modules {
            let linked = link_module(&module.path, &module.source);
            let slot = match transpile(&linked.body, &transpile_options) {
                Ok(body) => {
                    let script = if linked.epilogue.is_empty() {
                        body
                    } else {
                        format!("{body}\n{}", linked.epilogue)
                    };
                    match self.engine.compile(&module.path, &script)? {
                        None => ModuleSlot::Compiled,
                        Some(cause) => ModuleSlot::Failed { cause },
                    }
                }
                Err(err) => {
                    let cause = err.to_string();
                    self.engine.mark_failed(&module.path, &cause)?;
                    ModuleSlot::Failed { cause }
                }
            };
            if let ModuleSlot::Failed { cause } = &slot {
                warn!(target: "quill::runtime", path = %module.path, cause = %cause, "module failed to compile");
            } else {
                debug!(target: "quill::runtime", path = %module.path, "module compiled");
            }
            self.slots.insert(module.path.clone(), slot);
        }

        info!(
            target: "quill::runtime",
            count = modules.len(),
            failed = self.failures().len(),
            "registry populated"
        );
        Ok(())
    }

    /// Executes `path` (every call re-runs the module) and returns its default
    /// export, or the whole export bag when there is none.
    pub fn require(&mut self, path: &str) -> RuntimeResult<ModuleValue> {
        self.engine.require(path)
    }

    pub fn render(&mut self, entry: &str) -> RuntimeResult<RenderOutput> {
        let nodes = self.engine.render(entry)?;
        let html = to_html(&nodes);
        Ok(RenderOutput { nodes, html })
    }

    pub fn slots(&self) -> &IndexMap<String, ModuleSlot> {
        &self.slots
    }

    /// Modules whose compile step failed, with the recorded cause.
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.slots
            .iter()
            .filter_map(|(path, slot)| match slot {
                ModuleSlot::Failed { cause } => Some((path.as_str(), cause.as_str())),
                _ => None,
            })
            .collect()
    }
}

fn builtin_slots() -> IndexMap<String, ModuleSlot> {
    BUILTIN_MODULES
        .iter()
        .map(|name| (name.to_string(), ModuleSlot::Builtin))
        .collect()
}
