//! Project outline parser for ASCII/Unicode directory listings.
//!
//! Models often describe a project layout before emitting its files:
//!
//! ```text
//! my-app/
//! ├── src/
//! │   ├── App.tsx      # root component
//! │   └── index.ts
//! └── package.json
//! ```
//!
//! Only fenced blocks containing at least one branch glyph are read; when several
//! qualify the last one wins.

use serde::{Deserialize, Serialize};

use crate::extract::BlockExtractor;

const BRANCHES: [&str; 7] = ["├──", "└──", "├─", "└─", "|--", "`--", "+--"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub name: String,
    pub is_folder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OutlineNode>,
}

/// Outline from the last fenced listing in `text`, or empty.
pub fn parse_outline(text: &str) -> Vec<OutlineNode> {
    BlockExtractor::fenced(text)
        .into_iter()
        .rev()
        .find(|block| BRANCHES.iter().any(|b| block.text.contains(b)))
        .map(|block| parse_outline_lines(&block.text))
        .unwrap_or_default()
}

/// Parse a bare listing. Branch lines take their level from the rail prefix;
/// other lines use two spaces of indent per level.
pub fn parse_outline_lines(listing: &str) -> Vec<OutlineNode> {
    let mut roots = Vec::new();
    let mut stack: Vec<(usize, OutlineNode)> = Vec::new();

    for raw in listing.lines() {
        let Some((level, entry)) = split_level(raw.trim_end()) else {
            continue;
        };
        let Some(node) = parse_entry(entry) else {
            continue;
        };
        while let Some((top_level, top)) = stack.last() {
            if *top_level >= level || !top.is_folder {
                pop_into(&mut stack, &mut roots);
            } else {
                break;
            }
        }
        stack.push((level, node));
    }
    while !stack.is_empty() {
        pop_into(&mut stack, &mut roots);
    }
    roots
}

/// Slash-joined paths of every node, folders suffixed with `/`.
pub fn outline_paths(nodes: &[OutlineNode]) -> Vec<String> {
    fn visit(nodes: &[OutlineNode], prefix: &str, out: &mut Vec<String>) {
        for node in nodes {
            let path = if prefix.is_empty() {
                node.name.clone()
            } else {
                format!("{prefix}/{}", node.name)
            };
            out.push(if node.is_folder { format!("{path}/") } else { path.clone() });
            visit(&node.children, &path, out);
        }
    }
    let mut out = Vec::new();
    visit(nodes, "", &mut out);
    out
}

fn pop_into(stack: &mut Vec<(usize, OutlineNode)>, roots: &mut Vec<OutlineNode>) {
    if let Some((_, node)) = stack.pop() {
        match stack.last_mut() {
            Some((_, parent)) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}

fn is_rail(c: char) -> bool {
    matches!(c, '│' | '|' | ' ' | '\t' | '\u{a0}')
}

fn split_level(line: &str) -> Option<(usize, &str)> {
    if line.trim().is_empty() {
        return None;
    }
    for branch in BRANCHES {
        if let Some(at) = line.find(branch) {
            let prefix = &line[..at];
            if prefix.chars().all(is_rail) {
                let width = branch.chars().count() + 1;
                let level = prefix.chars().count() / width + 1;
                return Some((level, &line[at + branch.len()..]));
            }
        }
    }
    if line.chars().all(is_rail) {
        return None;
    }
    let indent = line.chars().take_while(|c| *c == ' ' || *c == '\t').count();
    Some((indent / 2, line))
}

fn parse_entry(entry: &str) -> Option<OutlineNode> {
    let entry = entry.trim();
    let (name, comment) = match find_comment(entry) {
        Some(at) => {
            let comment = entry[at + 1..].trim();
            (entry[..at].trim(), (!comment.is_empty()).then(|| comment.to_string()))
        }
        None => (entry, None),
    };
    let is_folder = name.ends_with('/');
    let name = name.trim_end_matches('/').trim();
    if name.is_empty() {
        return None;
    }
    Some(OutlineNode {
        name: name.to_string(),
        is_folder,
        comment,
        children: Vec::new(),
    })
}

/// Byte offset of a `#` preceded by whitespace.
fn find_comment(entry: &str) -> Option<usize> {
    let mut prev_space = false;
    for (i, c) in entry.char_indices() {
        if c == '#' && prev_space {
            return Some(i);
        }
        prev_space = c.is_whitespace();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "my-app/\n├── src/\n│   ├── App.tsx      # root component\n│   └── index.ts\n└── package.json\n";

    #[test]
    fn unicode_tree_nests_by_rail_depth() {
        let nodes = parse_outline_lines(LISTING);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].is_folder);
        assert_eq!(
            outline_paths(&nodes),
            vec![
                "my-app/",
                "my-app/src/",
                "my-app/src/App.tsx",
                "my-app/src/index.ts",
                "my-app/package.json",
            ]
        );
        let app = &nodes[0].children[0].children[0];
        assert_eq!(app.comment.as_deref(), Some("root component"));
        assert!(!app.is_folder);
    }

    #[test]
    fn ascii_branches_and_plain_indent() {
        let ascii = "app/\n|-- lib/\n|   `-- util.js\n+-- main.js";
        assert_eq!(
            outline_paths(&parse_outline_lines(ascii)),
            vec!["app/", "app/lib/", "app/lib/util.js", "app/main.js"]
        );

        let plain = "docs/\n  intro.md\n  guide/\n    setup.md\nREADME.md";
        assert_eq!(
            outline_paths(&parse_outline_lines(plain)),
            vec!["docs/", "docs/intro.md", "docs/guide/", "docs/guide/setup.md", "README.md"]
        );
    }

    #[test]
    fn children_of_files_attach_to_nearest_folder() {
        let listing = "src/\n  a.ts\n    b.ts";
        assert_eq!(
            outline_paths(&parse_outline_lines(listing)),
            vec!["src/", "src/a.ts", "src/b.ts"]
        );
    }

    #[test]
    fn only_fenced_listings_with_glyphs_count() {
        let text = format!(
            "Intro\n```bash\nnpm install\n```\n```txt\n{LISTING}```\n├── stray.txt outside a fence"
        );
        let nodes = parse_outline(&text);
        assert_eq!(nodes[0].name, "my-app");
        assert!(parse_outline("no listing here").is_empty());
    }
}
