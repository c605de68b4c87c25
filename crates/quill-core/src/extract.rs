//! Block Extractor: raw model output → flat [`ContentBlock`] sequence.
//!
//! Two passes run over the same text and are concatenated in this order:
//!
//! 1. **Fenced blocks**: ```` ```<kind> [name] ```` … ```` ``` ````.
//!    When the opening line has no name, a comment-marked path on the first
//!    payload line (`// src/App.tsx`, `# backend/main.py`) names the block.
//! 2. **Labeled sections**: `**Platform:** <Medium | X (Twitter) | Threads | LinkedIn>`
//!    followed by free text up to the next label or end of input.
//!
//! Downstream merging is "last name wins", so the order is part of the contract.
//! Extraction never fails: anything unrecognized is skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::platform::Platform;

static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```([^\s`]*)([^\n]*)\n(.*?)```").expect("fence pattern")
});

static NAME_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*(?:#|//|/\*|<!--)[ \t]*([^\s*]+?)[ \t]*(?:\*/|-->)?[ \t]*$")
        .expect("name comment pattern")
});

static LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\*\*platform:\*\*").expect("label pattern"));

static LABEL_PLATFORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[ \t]*(medium|x[ \t]*\(twitter\)|threads|linkedin)")
        .expect("platform pattern")
});

/// Kind used for fences that carry no tag.
pub const DEFAULT_KIND: &str = "text";

/// A flat, named, typed chunk of text extracted from model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub text: String,
}

impl ContentBlock {
    pub fn new(kind: impl Into<String>, name: Option<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name,
            text: text.into(),
        }
    }
}

pub struct BlockExtractor;

impl BlockExtractor {
    /// Fenced blocks first, then labeled sections.
    pub fn extract(text: &str) -> Vec<ContentBlock> {
        let mut blocks = Self::fenced(text);
        blocks.extend(Self::labeled_sections(text));
        debug!(target: "quill::extract", count = blocks.len(), "Extracted content blocks");
        blocks
    }

    pub fn fenced(text: &str) -> Vec<ContentBlock> {
        let mut blocks = Vec::new();
        for caps in FENCE.captures_iter(text) {
            let kind = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let header = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
            let mut payload = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
            payload = strip_single_trailing_newline(payload);

            let mut name = (!header.is_empty()).then(|| header.to_string());
            if name.is_none() {
                if let Some((path, rest)) = name_from_first_line(payload) {
                    name = Some(path);
                    payload = rest;
                }
            }

            if payload.trim().is_empty() {
                debug!(target: "quill::extract", ?name, "Skipping empty fenced block");
                continue;
            }

            let kind = if kind.is_empty() { DEFAULT_KIND } else { kind };
            blocks.push(ContentBlock::new(kind, name, payload));
        }
        blocks
    }

    /// Sections grouped by platform in [`Platform::ALL`] order, input order
    /// within a platform. A section ends at the next `**Platform:**` label even
    /// when that label names an unknown platform.
    pub fn labeled_sections(text: &str) -> Vec<ContentBlock> {
        let starts: Vec<(usize, usize)> = LABEL
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect();

        let mut sections: Vec<(Platform, ContentBlock)> = Vec::new();
        for (i, &(_, label_end)) in starts.iter().enumerate() {
            let section_end = starts.get(i + 1).map(|&(s, _)| s).unwrap_or(text.len());
            let tail = &text[label_end..section_end];
            let Some(m) = LABEL_PLATFORM.captures(tail).and_then(|c| c.get(1)) else {
                continue;
            };
            let Some(platform) = Platform::from_label(m.as_str()) else {
                continue;
            };
            let body = tail[m.end()..].trim();
            if body.is_empty() {
                continue;
            }
            let block = ContentBlock::new(
                platform.tag(),
                Some(platform.content_file_name()),
                format!("**Platform:** {}\n\n{}", platform.display_name(), body),
            );
            sections.push((platform, block));
        }
        sections.sort_by_key(|(platform, _)| platform.rank());
        sections.into_iter().map(|(_, block)| block).collect()
    }
}

/// Convenience wrapper around [`BlockExtractor::extract`].
pub fn extract_blocks(text: &str) -> Vec<ContentBlock> {
    BlockExtractor::extract(text)
}

fn strip_single_trailing_newline(s: &str) -> &str {
    let s = s.strip_suffix('\n').unwrap_or(s);
    s.strip_suffix('\r').unwrap_or(s)
}

/// First payload line as a file name when it is a comment holding a path.
/// Returns the path and the payload without that line.
fn name_from_first_line(payload: &str) -> Option<(String, &str)> {
    let (first, rest) = match payload.split_once('\n') {
        Some((first, rest)) => (first.trim_end_matches('\r'), rest),
        None => (payload, ""),
    };
    let path = NAME_COMMENT.captures(first)?.get(1)?.as_str();
    if !path.contains('.') && !path.contains('/') {
        return None;
    }
    Some((path.to_string(), rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_prose_yields_nothing() {
        assert!(BlockExtractor::extract("Just a friendly answer with no structure.").is_empty());
        assert!(BlockExtractor::extract("").is_empty());
    }

    #[test]
    fn fence_with_kind_and_name() {
        let text = "Here:\n```twitter twitter-content.md\nHello world\n```\nbye";
        let blocks = BlockExtractor::extract(text);
        assert_eq!(
            blocks,
            vec![ContentBlock::new(
                "twitter",
                Some("twitter-content.md".into()),
                "Hello world"
            )]
        );
    }

    #[test]
    fn payload_keeps_inner_blank_lines() {
        let text = "```md notes.md\n\nfirst\n\nsecond\n\n```";
        let blocks = BlockExtractor::extract(text);
        assert_eq!(blocks[0].text, "\nfirst\n\nsecond\n");
    }

    #[test]
    fn name_taken_from_comment_line() {
        let text = "```tsx\n// src/App.tsx\nexport default function App() {}\n```";
        let blocks = BlockExtractor::extract(text);
        assert_eq!(blocks[0].name.as_deref(), Some("src/App.tsx"));
        assert_eq!(blocks[0].text, "export default function App() {}");

        let css = "```css\n/* styles/site.css */\nbody {}\n```";
        assert_eq!(
            BlockExtractor::extract(css)[0].name.as_deref(),
            Some("styles/site.css")
        );
    }

    #[test]
    fn markdown_heading_is_not_a_name() {
        let text = "```md\n# Introduction\nSome words\n```";
        let blocks = BlockExtractor::extract(text);
        assert_eq!(blocks[0].name, None);
        assert!(blocks[0].text.starts_with("# Introduction"));
    }

    #[test]
    fn empty_fence_is_skipped() {
        assert!(BlockExtractor::extract("```txt empty.txt\n\n```").is_empty());
    }

    #[test]
    fn untagged_fence_gets_default_kind() {
        let blocks = BlockExtractor::extract("```\nraw\n```");
        assert_eq!(blocks[0].kind, DEFAULT_KIND);
        assert_eq!(blocks[0].name, None);
    }

    #[test]
    fn labeled_sections_split_on_next_label() {
        let text = "**Platform:** LinkedIn\nBig news today.\n\n**platform:** x (twitter)\nShort take\n";
        let blocks = BlockExtractor::extract(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind, "twitter");
        assert_eq!(blocks[0].text, "**Platform:** X (Twitter)\n\nShort take");
        assert_eq!(blocks[1].kind, "linkedin");
        assert_eq!(blocks[1].name.as_deref(), Some("linkedin-content.md"));
        assert_eq!(blocks[1].text, "**Platform:** LinkedIn\n\nBig news today.");
    }

    #[test]
    fn labeled_sections_group_by_platform() {
        let text = "**Platform:** LinkedIn\nfirst\n**Platform:** Threads\nsecond\n\
**Platform:** Medium\nthird\n**Platform:** LinkedIn\nfourth";
        let kinds: Vec<(String, String)> = BlockExtractor::labeled_sections(text)
            .into_iter()
            .map(|b| (b.kind, b.text.rsplit('\n').next().unwrap_or_default().to_string()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("medium".to_string(), "third".to_string()),
                ("threads".to_string(), "second".to_string()),
                ("linkedin".to_string(), "first".to_string()),
                ("linkedin".to_string(), "fourth".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_platform_label_still_ends_previous_section() {
        let text = "**Platform:** Threads\nthread body\n**Platform:** Mastodon\ntoot";
        let blocks = BlockExtractor::extract(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "**Platform:** Threads\n\nthread body");
    }

    #[test]
    fn fenced_blocks_precede_labeled_sections() {
        let text = "**Platform:** Medium\nLong read\n```medium medium-content.md\nfenced\n```";
        let blocks = BlockExtractor::extract(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "fenced");
        assert!(blocks[1].text.starts_with("**Platform:** Medium"));
    }
}
