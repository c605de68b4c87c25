//! Import/export linking.
//!
//! Rewrites ES module syntax into calls against the factory's `require`
//! parameter and assignments on its `exports` bag, so a linked module runs as a
//! plain function body. Only the static import forms
//! `import X from`, `import { a, b as c } from` and `import X, { a } from` are
//! rewritten; anything else is left for the engine to reject.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static TYPE_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s+type\s[^;]*?from\s*['"][^'"\n]+['"][ \t]*;?"#)
        .expect("type import pattern")
});

static TYPE_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*export\s+type\s*\{[^}]*\}(?:\s*from\s*['"][^'"\n]+['"])?[ \t]*;?"#)
        .expect("type export pattern")
});

static VALUE_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*import\s+(?:([A-Za-z_$][\w$]*)\s*,?\s*)?(?:\{([^}]*)\})?\s*from\s*(['"])([^'"\n]+)['"][ \t]*;?"#,
    )
    .expect("import pattern")
});

static EXPORT_DEFAULT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^([ \t]*)export\s+default\s+((?:async\s+)?function\s*\*?\s*|(?:abstract\s+)?class\s+)([A-Za-z_$][\w$]*)",
    )
    .expect("default declaration pattern")
});

static EXPORT_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([ \t]*)export\s+default\s+").expect("default export pattern")
});

static EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^([ \t]*)export\s+((?:async\s+)?function\s*\*?\s*|(?:abstract\s+)?class\s+)([A-Za-z_$][\w$]*)",
    )
    .expect("declaration export pattern")
});

static EXPORT_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([ \t]*)export\s+(const|let|var)\s+(\{[^}]*\}|\[[^\]]*\]|[A-Za-z_$][\w$]*)")
        .expect("binding export pattern")
});

static EXPORT_TYPE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([ \t]*)export\s+((?:declare|interface|type|enum|namespace)\b)")
        .expect("type declaration export pattern")
});

static EXPORT_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*export\s*\{([^}]*)\}(\s*from\s*['"][^'"\n]*['"])?[ \t]*;?"#)
        .expect("export list pattern")
});

static IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][\w$]*$").expect("identifier pattern"));

static COMPONENT_CANDIDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^(?:export\s+)?(?:default\s+)?(?:async\s+)?(?:function\s*\*?\s*|(?:abstract\s+)?class\s+|(?:const|let|var)\s+)([A-Z][\w$]*)",
    )
    .expect("component candidate pattern")
});

/// A module body ready for transpilation, plus the statements appended after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedModule {
    pub body: String,
    /// Export assignments and the default-export fallback. Plain script.
    pub epilogue: String,
}

pub fn link_module(path: &str, source: &str) -> LinkedModule {
    let mut tails: Vec<String> = Vec::new();

    let text = TYPE_IMPORT.replace_all(source, "");
    let text = TYPE_EXPORT.replace_all(&text, "");

    let mut import_index = 0usize;
    let text = VALUE_IMPORT.replace_all(&text, |caps: &Captures| {
        let default_name = caps.get(1).map(|m| m.as_str());
        let named = caps.get(2).map(|m| m.as_str());
        if default_name.is_none() && named.is_none() {
            return caps[0].to_string();
        }
        let binding = format!("__quill_mod_{import_index}");
        import_index += 1;
        let target = resolve_specifier(path, &caps[4]);
        let mut line = format!("const {binding} = require({}, true);", quote(&target));
        if let Some(name) = default_name {
            line.push_str(&format!(
                " var {name} = {binding}.default !== undefined ? {binding}.default : {binding};"
            ));
        }
        let pairs: Vec<String> = named
            .map(specifier_pairs)
            .unwrap_or_default()
            .into_iter()
            .map(|(imported, local)| format!("{local} = {binding}.{imported}"))
            .collect();
        if !pairs.is_empty() {
            line.push_str(&format!(" var {};", pairs.join(", ")));
        }
        line
    });

    let text = EXPORT_DEFAULT_DECL.replace_all(&text, |caps: &Captures| {
        tails.push(format!("exports.default = {};", &caps[3]));
        format!("{}{}{}", &caps[1], &caps[2], &caps[3])
    });
    let text = EXPORT_DEFAULT.replace_all(&text, "${1}exports.default = ");
    let text = EXPORT_DECL.replace_all(&text, |caps: &Captures| {
        tails.push(format!("exports.{0} = {0};", &caps[3]));
        format!("{}{}{}", &caps[1], &caps[2], &caps[3])
    });
    let text = EXPORT_BINDING.replace_all(&text, |caps: &Captures| {
        for name in binding_names(&caps[3]) {
            tails.push(format!("exports.{name} = {name};"));
        }
        format!("{}{} {}", &caps[1], &caps[2], &caps[3])
    });
    let text = EXPORT_TYPE_DECL.replace_all(&text, "${1}${2}");
    let text = EXPORT_LIST.replace_all(&text, |caps: &Captures| {
        if caps.get(2).is_some() {
            return caps[0].to_string();
        }
        for (local, exported) in specifier_pairs(&caps[1]) {
            tails.push(format!("exports.{exported} = {local};"));
        }
        String::new()
    });

    let mut epilogue = tails.join("\n");
    if let Some(fallback) = default_fallback(source) {
        if !epilogue.is_empty() {
            epilogue.push('\n');
        }
        epilogue.push_str(&fallback);
    }

    LinkedModule {
        body: text.into_owned(),
        epilogue,
    }
}

/// Resolves an import specifier against the importing module's path.
/// Relative specifiers use path-stack semantics; a leading `/` is
/// workspace-absolute; bare specifiers are returned unchanged.
pub fn resolve_specifier(importer: &str, specifier: &str) -> String {
    if specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
    {
        let mut stack: Vec<&str> = importer.split('/').filter(|s| !s.is_empty()).collect();
        stack.pop();
        for segment in specifier.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    stack.pop();
                }
                other => stack.push(other),
            }
        }
        return stack.join("/");
    }
    if let Some(absolute) = specifier.strip_prefix('/') {
        return absolute.trim_start_matches('/').to_string();
    }
    specifier.to_string()
}

/// `a, b as c, type T` → `[(a, a), (b, c)]`; inline type specifiers are dropped.
fn specifier_pairs(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| !s.starts_with("type "))
        .filter_map(|spec| {
            let mut parts = spec.split_whitespace();
            let first = parts.next()?;
            let local = match (parts.next(), parts.next()) {
                (Some("as"), Some(alias)) => alias,
                _ => first,
            };
            (IDENT.is_match(first) && IDENT.is_match(local))
                .then(|| (first.to_string(), local.to_string()))
        })
        .collect()
}

/// Names bound by `x`, `{ a, b: c, d = 1 }` or `[a, , b]`.
fn binding_names(pattern: &str) -> Vec<String> {
    let inner = pattern.trim_matches(|c| matches!(c, '{' | '}' | '[' | ']'));
    if inner.len() == pattern.len() {
        return vec![pattern.to_string()];
    }
    inner
        .split(',')
        .filter_map(|part| {
            let part = part.trim().trim_start_matches("...");
            let bound = part.rsplit_once(':').map(|(_, b)| b).unwrap_or(part);
            let bound = bound.split('=').next().unwrap_or("").trim();
            IDENT.is_match(bound).then(|| bound.to_string())
        })
        .collect()
}

fn default_fallback(source: &str) -> Option<String> {
    let mut candidates: Vec<&str> = Vec::new();
    for caps in COMPONENT_CANDIDATE.captures_iter(source) {
        if let Some(name) = caps.get(1).map(|m| m.as_str()) {
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }
    }
    if candidates.is_empty() {
        return None;
    }
    let checks: Vec<String> = candidates
        .iter()
        .map(|name| format!("if (typeof {name} === \"function\") {{ exports.default = {name}; }}"))
        .collect();
    Some(format!(
        "if (Object.keys(exports).length === 0) {{ {} }}",
        checks.join(" else ")
    ))
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_specifiers_use_path_stack() {
        assert_eq!(resolve_specifier("a/b/x", "./y"), "a/b/y");
        assert_eq!(resolve_specifier("a/b/x", "../c/./y"), "a/c/y");
        assert_eq!(resolve_specifier("x", "./y"), "y");
        assert_eq!(resolve_specifier("a/x", "../../y"), "y");
        assert_eq!(resolve_specifier("src/app.tsx", "/lib/util"), "lib/util");
        assert_eq!(resolve_specifier("src/app.tsx", "react"), "react");
    }

    #[test]
    fn imports_become_require_calls() {
        let linked = link_module(
            "src/App.tsx",
            "import React, { useState, useMemo as memo } from 'react';\nimport Button from \"./Button\";\n",
        );
        assert_eq!(
            linked.body,
            "const __quill_mod_0 = require(\"react\", true); \
var React = __quill_mod_0.default !== undefined ? __quill_mod_0.default : __quill_mod_0; \
var useState = __quill_mod_0.useState, memo = __quill_mod_0.useMemo;\n\
const __quill_mod_1 = require(\"src/Button\", true); \
var Button = __quill_mod_1.default !== undefined ? __quill_mod_1.default : __quill_mod_1;\n"
        );
    }

    #[test]
    fn type_imports_are_dropped_and_side_effect_imports_kept() {
        let linked = link_module(
            "a.ts",
            "import type { P } from './types';\nimport { type Q, r } from './r';\nimport './styles.css';\n",
        );
        assert!(!linked.body.contains("types"));
        assert!(linked.body.contains("var r = __quill_mod_0.r;"));
        assert!(!linked.body.contains("Q ="));
        assert!(linked.body.contains("import './styles.css';"));
    }

    #[test]
    fn exports_assign_to_the_bag() {
        let linked = link_module(
            "m.ts",
            "export default function App() {}\nexport const a = 1;\nexport const { b, c: d } = obj;\nexport class K {}\nconst e = 2;\nexport { e, e as f };\nexport interface I { x: number }\n",
        );
        assert_eq!(
            linked.body,
            "function App() {}\nconst a = 1;\nconst { b, c: d } = obj;\nclass K {}\nconst e = 2;\n\ninterface I { x: number }\n"
        );
        let tails: Vec<&str> = linked.epilogue.lines().collect();
        assert_eq!(
            &tails[..7],
            &[
                "exports.default = App;",
                "exports.K = K;",
                "exports.a = a;",
                "exports.b = b;",
                "exports.d = d;",
                "exports.e = e;",
                "exports.f = e;",
            ]
        );
    }

    #[test]
    fn anonymous_default_and_reexports() {
        let linked = link_module("m.js", "export default () => 1;\nexport { x } from './x';\n");
        assert_eq!(linked.body, "exports.default = () => 1;\nexport { x } from './x';\n");
        assert!(linked.epilogue.is_empty());
    }

    #[test]
    fn fallback_names_capitalized_bindings_in_order() {
        let linked = link_module("c.jsx", "const helper = 1;\nconst Card = () => null;\nfunction Page() {}\n");
        assert_eq!(
            linked.epilogue,
            "if (Object.keys(exports).length === 0) { if (typeof Card === \"function\") { exports.default = Card; } else if (typeof Page === \"function\") { exports.default = Page; } }"
        );
    }
}
