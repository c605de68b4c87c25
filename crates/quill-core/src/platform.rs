//! Publishing platforms recognized in labeled sections and request profiles.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Medium,
    Twitter,
    Threads,
    LinkedIn,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Medium,
        Platform::Twitter,
        Platform::Threads,
        Platform::LinkedIn,
    ];

    /// Position in [`Platform::ALL`], which is also the order labeled sections
    /// are emitted in.
    pub fn rank(self) -> usize {
        self as usize
    }

    /// Canonical lowercase tag, used as block kind and file-name stem.
    pub fn tag(self) -> &'static str {
        match self {
            Platform::Medium => "medium",
            Platform::Twitter => "twitter",
            Platform::Threads => "threads",
            Platform::LinkedIn => "linkedin",
        }
    }

    /// Name as it appears after a `**Platform:**` label.
    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Medium => "Medium",
            Platform::Twitter => "X (Twitter)",
            Platform::Threads => "Threads",
            Platform::LinkedIn => "LinkedIn",
        }
    }

    /// `<tag>-content.md`
    pub fn content_file_name(self) -> String {
        format!("{}-content.md", self.tag())
    }

    /// Parse a label value such as `X (Twitter)` or `linkedin`. Case and inner
    /// whitespace are ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        let folded: String = label
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "medium" => Some(Platform::Medium),
            "x(twitter)" | "twitter" | "x" => Some(Platform::Twitter),
            "threads" => Some(Platform::Threads),
            "linkedin" => Some(Platform::LinkedIn),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
