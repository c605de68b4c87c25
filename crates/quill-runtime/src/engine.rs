//! Script engine boundary.
//!
//! Every piece of dynamic execution goes through [`ScriptEngine`]: one boa
//! realm holding the module registry and the static React host from
//! `prelude.js`. Calls cross the boundary as JSON envelopes so the Rust side
//! never holds engine values.
//!
//! The interpreter can panic on valid input. A panic is caught at this
//! boundary and poisons the realm: every later call fails with
//! [`RuntimeError::Engine`] until a fresh engine replaces it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use boa_engine::{Context, JsResult, JsValue, Source};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{RuntimeError, RuntimeResult};
use crate::render::RenderNode;
use crate::runtime::ModuleValue;

const PRELUDE: &str = include_str!("prelude.js");

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    ok: Value,
    #[serde(default)]
    error: Option<ScriptFailure>,
    #[serde(default)]
    logs: Vec<ConsoleLine>,
}

#[derive(Debug, Deserialize)]
struct ScriptFailure {
    kind: String,
    #[serde(default)]
    path: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ConsoleLine {
    level: String,
    message: String,
}

impl ScriptFailure {
    fn into_error(self) -> RuntimeError {
        let path = self.path.unwrap_or_default();
        match self.kind.as_str() {
            "not-found" => RuntimeError::ModuleNotFound(path),
            "compile" => RuntimeError::CompileFailed {
                path,
                cause: self.message,
            },
            "cycle" => RuntimeError::CyclicImport(path),
            "execution" => RuntimeError::Execution {
                path,
                message: self.message,
            },
            "no-component" => RuntimeError::NoComponent(path),
            "render" => RuntimeError::Render(self.message),
            _ => RuntimeError::Engine(self.message),
        }
    }
}

fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

pub struct ScriptEngine {
    context: Context,
    /// Panic message that took the realm down.
    poisoned: Option<String>,
}

impl ScriptEngine {
    /// Fresh realm with the prelude loaded. `extensions` are the suffixes
    /// probed by module lookup; `loop_limit` caps iterations of any single loop.
    pub fn new(extensions: &[String], loop_limit: u64) -> RuntimeResult<Self> {
        let mut context = Context::default();
        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(loop_limit);

        let mut engine = Self {
            context,
            poisoned: None,
        };
        let config = serde_json::json!({ "extensions": extensions });
        let script = format!("var __quill_config = {config};\n{PRELUDE}");
        engine
            .eval(&script)
            .map_err(|cause| RuntimeError::Engine(format!("prelude failed to load: {cause}")))?;

        Ok(engine)
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Runs `f` against the realm, turning a panic inside the interpreter into
    /// an error and poisoning the engine.
    fn guarded<T>(&mut self, f: impl FnOnce(&mut Context) -> JsResult<T>) -> Result<T, String> {
        if let Some(reason) = &self.poisoned {
            return Err(format!("engine unavailable after an earlier panic: {reason}"));
        }
        let context = &mut self.context;
        match panic::catch_unwind(AssertUnwindSafe(|| f(context))) {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                warn!(target: "quill::runtime", reason = %reason, "script engine panicked, realm discarded");
                self.poisoned = Some(reason.clone());
                Err(format!("engine panicked: {reason}"))
            }
        }
    }

    fn eval(&mut self, source: &str) -> Result<JsValue, String> {
        self.guarded(|context| context.eval(Source::from_bytes(source)))
    }

    fn call(&mut self, expr: &str) -> RuntimeResult<Value> {
        let result = self.eval(expr).map_err(RuntimeError::Engine)?;
        let raw = result
            .as_string()
            .map(|s| s.to_std_string_escaped())
            .ok_or_else(|| RuntimeError::Engine("engine returned a non-string envelope".into()))?;
        let envelope: Envelope = serde_json::from_str(&raw)
            .map_err(|e| RuntimeError::Engine(format!("malformed envelope: {e}")))?;

        for line in &envelope.logs {
            debug!(target: "quill::runtime", level = %line.level, "console: {}", line.message);
        }
        match envelope.error {
            Some(failure) => Err(failure.into_error()),
            None => Ok(envelope.ok),
        }
    }

    /// Parses `body` into a module factory. Returns the parse failure instead of
    /// raising it; the failed entry is recorded under `path` either way.
    pub fn compile(&mut self, path: &str, body: &str) -> RuntimeResult<Option<String>> {
        let value = self.call(&format!(
            "__quill.compile({}, {})",
            js_string(path),
            js_string(body)
        ))?;
        Ok(match value {
            Value::String(cause) => Some(cause),
            _ => None,
        })
    }

    /// Records `path` as a module that raises `cause` when required.
    pub fn mark_failed(&mut self, path: &str, cause: &str) -> RuntimeResult<()> {
        self.call(&format!(
            "__quill.fail({}, {})",
            js_string(path),
            js_string(cause)
        ))?;
        Ok(())
    }

    pub fn require(&mut self, path: &str) -> RuntimeResult<ModuleValue> {
        let value = self.call(&format!("__quill.require({})", js_string(path)))?;
        serde_json::from_value(value)
            .map_err(|e| RuntimeError::Engine(format!("unexpected module value: {e}")))
    }

    pub fn render(&mut self, path: &str) -> RuntimeResult<Vec<RenderNode>> {
        let value = self.call(&format!("__quill.render({})", js_string(path)))?;
        serde_json::from_value(value).map_err(|e| {
            warn!(target: "quill::runtime", path = %path, error = %e, "render tree did not decode");
            RuntimeError::Render(format!("unexpected render tree: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ScriptEngine {
        ScriptEngine::new(&[".js".to_string()], 10_000).unwrap()
    }

    #[test]
    fn interpreter_panic_poisons_the_realm() {
        let mut engine = engine();
        let cause = engine
            .guarded(|_| -> JsResult<()> { panic!("boom") })
            .unwrap_err();
        assert!(cause.contains("boom"), "{cause}");
        assert!(engine.is_poisoned());

        match engine.require("anything.js") {
            Err(RuntimeError::Engine(message)) => {
                assert!(message.contains("earlier panic"), "{message}")
            }
            other => panic!("expected engine error, got {other:?}"),
        }
    }

    #[test]
    fn script_errors_do_not_poison() {
        let mut engine = engine();
        assert!(matches!(
            engine.call("throw new Error('x')"),
            Err(RuntimeError::Engine(_))
        ));
        assert!(!engine.is_poisoned());
        assert_eq!(
            engine.require("missing.js"),
            Err(RuntimeError::ModuleNotFound("missing.js".into()))
        );
    }
}
