//! Request profiling and prompt composition.
//!
//! The composed prompt asks the model for exactly the fence syntax the block
//! extractor understands, so generated posts land as named files.

use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::platform::Platform;

fn pattern(src: &str) -> Regex {
    Regex::new(&format!("(?i){src}")).expect("profile pattern")
}

static TWITTER: Lazy<Regex> = Lazy::new(|| pattern(r"twitter|x\.com|tweet|\bthread\b"));
static MEDIUM: Lazy<Regex> = Lazy::new(|| pattern(r"medium|blog"));
static THREADS: Lazy<Regex> = Lazy::new(|| pattern(r"\bthreads\b|meta threads"));
static LINKEDIN: Lazy<Regex> = Lazy::new(|| pattern(r"linkedin|professional"));

static STORY: Lazy<Regex> = Lazy::new(|| pattern(r"story|storytelling|narrative"));
static THREAD_TYPE: Lazy<Regex> = Lazy::new(|| pattern(r"\bthread\b|series|multi-part"));
static ARTICLE: Lazy<Regex> = Lazy::new(|| pattern(r"article|long form|essay"));

static PROFESSIONAL: Lazy<Regex> = Lazy::new(|| pattern(r"professional|business|corporate"));
static CASUAL: Lazy<Regex> = Lazy::new(|| pattern(r"casual|friendly|informal"));
static ENGAGING: Lazy<Regex> = Lazy::new(|| pattern(r"engaging|viral|catchy"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Story,
    Thread,
    Article,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Professional,
    Casual,
    Engaging,
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestProfile {
    /// `None` means a general request not aimed at one platform.
    pub platform: Option<Platform>,
    pub content_type: ContentType,
    pub tone: Tone,
    pub has_context: bool,
}

impl RequestProfile {
    pub fn analyze(request: &str, context: Option<&str>) -> Self {
        let platform = if TWITTER.is_match(request) {
            Some(Platform::Twitter)
        } else if MEDIUM.is_match(request) {
            Some(Platform::Medium)
        } else if THREADS.is_match(request) {
            Some(Platform::Threads)
        } else if LINKEDIN.is_match(request) {
            Some(Platform::LinkedIn)
        } else {
            None
        };

        let content_type = if STORY.is_match(request) {
            ContentType::Story
        } else if THREAD_TYPE.is_match(request) {
            ContentType::Thread
        } else if ARTICLE.is_match(request) {
            ContentType::Article
        } else {
            ContentType::Post
        };

        let tone = if PROFESSIONAL.is_match(request) {
            Tone::Professional
        } else if CASUAL.is_match(request) {
            Tone::Casual
        } else if ENGAGING.is_match(request) {
            Tone::Engaging
        } else {
            Tone::Balanced
        };

        Self {
            platform,
            content_type,
            tone,
            has_context: context.is_some_and(|c| !c.trim().is_empty()),
        }
    }

    /// Lowercase platform tag, `general` when untargeted.
    pub fn platform_tag(&self) -> &'static str {
        self.platform.map(Platform::tag).unwrap_or("general")
    }
}

const PREAMBLE: &str = "You write social content for Medium, X (Twitter), Threads and LinkedIn. \
Produce publish-ready posts that respect each platform's conventions.

### Structure

Shape the piece as an essay that moves through these stages:
1. Opening: a hook (a fact, a question or a short anecdote) and the central claim.
2. Situation: what is happening now, with evidence.
3. Drivers: two or three forces behind the change, each with a concrete example.
4. Consequences: how those forces change day-to-day practice.
5. Actions: two or three recommendations and why they work.
6. Illustration (optional): a real example that embodies the claim.
7. Outlook: what comes next.
8. Close: restate the claim and end on a call to action or a question.

Keep sentences short and active. Prefer real people and events over invented ones. \
Shorter formats may fold stages together.";

fn platform_guidance(platform: Platform) -> &'static str {
    match platform {
        Platform::Twitter => "**X (Twitter):**\n\
- At most 280 characters per post\n\
- Lead with the strongest hook\n\
- Split longer material into a numbered thread\n\
- Two or three hashtags at most\n\
- Finish with a question or call to action",
        Platform::Medium => "**Medium:**\n\
- Long-form blog post with headings\n\
- Support claims with data and industry context\n\
- Use narrative and first-hand cases\n\
- Close with concrete takeaways",
        Platform::Threads => "**Threads:**\n\
- At most 500 characters per post\n\
- Visual, carousel-like pacing\n\
- A few relevant hashtags\n\
- Invite replies",
        Platform::LinkedIn => "**LinkedIn:**\n\
- Written for a business audience\n\
- Lead with an insight backed by data\n\
- Actionable takeaways\n\
- Invite professional discussion",
    }
}

fn content_type_guidance(content_type: ContentType) -> Option<&'static str> {
    match content_type {
        ContentType::Story => Some(
            "**Story:**\n- Follow the eight stages above\n- Build an emotional arc around a real case",
        ),
        ContentType::Thread => Some(
            "**Thread:**\n- Number each part (1/n, 2/n)\n- Keep each part self-contained but connected\n- End with a summary",
        ),
        ContentType::Article | ContentType::Post => None,
    }
}

fn tone_guidance(tone: Tone) -> Option<&'static str> {
    match tone {
        Tone::Professional => Some(
            "**Tone (professional):**\n- Precise, authoritative language\n- Cite figures where possible",
        ),
        Tone::Engaging => Some(
            "**Tone (engaging):**\n- Conversational voice\n- Questions and hooks that invite sharing",
        ),
        Tone::Casual | Tone::Balanced => None,
    }
}

/// Instruction text for a content request, ending with the required output
/// format and the request itself.
pub fn compose_prompt(request: &str, context: Option<&str>) -> String {
    let profile = RequestProfile::analyze(request, context);
    let mut prompt = String::from(PREAMBLE);

    let guidance = [
        profile.platform.map(platform_guidance),
        content_type_guidance(profile.content_type),
        tone_guidance(profile.tone),
    ];
    if guidance.iter().any(Option::is_some) {
        prompt.push_str("\n\n### Guidance");
        for section in guidance.into_iter().flatten() {
            prompt.push_str("\n\n");
            prompt.push_str(section);
        }
    }

    prompt.push_str(
        "\n\n### Output format (required)\n\n\
Return every post in its own fenced code block, tagged with the platform and file name exactly as below:\n",
    );
    for platform in Platform::ALL {
        // Writing to a String cannot fail.
        let _ = write!(
            prompt,
            "\n```{} {}\n[{} post]\n```\n",
            platform.tag(),
            platform.content_file_name(),
            platform.display_name()
        );
    }
    prompt.push_str(
        "\nOne block per platform. Keep the tags and file names unchanged and put only the final post text inside each block.",
    );

    let _ = write!(prompt, "\n\n### Request\n{request}");
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        let _ = write!(prompt, "\n\n### Additional context\n{context}");
    }
    prompt
}
