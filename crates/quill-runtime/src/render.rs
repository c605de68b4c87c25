//! Static render trees and their HTML serialization.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RenderNode {
    Element {
        tag: String,
        #[serde(default)]
        attrs: IndexMap<String, Value>,
        #[serde(default)]
        children: Vec<RenderNode>,
    },
    Text {
        text: String,
    },
}

impl RenderNode {
    pub fn text(text: impl Into<String>) -> Self {
        RenderNode::Text { text: text.into() }
    }

    pub fn element(tag: impl Into<String>, children: Vec<RenderNode>) -> Self {
        RenderNode::Element {
            tag: tag.into(),
            attrs: IndexMap::new(),
            children,
        }
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// CSS properties whose numeric values carry no implicit `px`.
const UNITLESS: &[&str] = &[
    "animation-iteration-count", "column-count", "flex", "flex-grow", "flex-shrink", "font-weight",
    "grid-column", "grid-row", "line-height", "opacity", "order", "orphans", "tab-size", "widows",
    "z-index", "zoom",
];

pub fn to_html(nodes: &[RenderNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &RenderNode, out: &mut String) {
    match node {
        RenderNode::Text { text } => out.push_str(&escape(text)),
        RenderNode::Element {
            tag,
            attrs,
            children,
        } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                write_attr(name, value, out);
            }
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn write_attr(name: &str, value: &Value, out: &mut String) {
    let is_handler = name.len() > 2
        && name.starts_with("on")
        && name[2..].starts_with(|c: char| c.is_ascii_uppercase());
    if is_handler || name == "key" || name == "ref" {
        return;
    }
    let name = match name {
        "className" => "class",
        "htmlFor" => "for",
        other => other,
    };
    let text = match value {
        Value::Null | Value::Bool(false) => return,
        Value::Bool(true) => {
            out.push(' ');
            out.push_str(name);
            return;
        }
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) if name == "style" => style_text(map),
        other => other.to_string(),
    };
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape(&text));
    out.push('"');
}

fn style_text(map: &serde_json::Map<String, Value>) -> String {
    map.iter()
        .filter_map(|(key, value)| {
            let property = kebab_case(key);
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => {
                    let zero = n.as_f64() == Some(0.0);
                    if zero || UNITLESS.contains(&property.as_str()) {
                        n.to_string()
                    } else {
                        format!("{n}px")
                    }
                }
                _ => return None,
            };
            Some(format!("{property}:{value}"))
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn kebab_case(name: &str) -> String {
    if name.starts_with("--") {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else if i == 0 && name.starts_with("ms") {
            out.push('-');
            out.push(c);
        } else {
            out.push(c);
        }
    }
    out
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_attributes_and_text() {
        let nodes: Vec<RenderNode> = serde_json::from_value(json!([
            {
                "tag": "label",
                "attrs": { "className": "field", "htmlFor": "name", "onClick": "x", "hidden": true, "title": null },
                "children": [{ "text": "Name <required>" }]
            },
            { "tag": "br", "attrs": {}, "children": [] }
        ]))
        .unwrap();
        assert_eq!(
            to_html(&nodes),
            "<label class=\"field\" for=\"name\" hidden>Name &lt;required&gt;</label><br/>"
        );
    }

    #[test]
    fn style_objects_become_css() {
        let mut attrs = IndexMap::new();
        attrs.insert(
            "style".to_string(),
            json!({ "marginTop": 4, "opacity": 0.5, "padding": 0, "color": "red" }),
        );
        let node = RenderNode::Element {
            tag: "div".into(),
            attrs,
            children: vec![RenderNode::text("it's")],
        };
        assert_eq!(
            to_html(&[node]),
            "<div style=\"margin-top:4px;opacity:0.5;padding:0;color:red\">it&#x27;s</div>"
        );
    }
}
