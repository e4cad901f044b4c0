//! Title generation for worker-turn summaries.
//!
//! The store is deliberately decoupled from the LLM Gateway: callers supply
//! a `TitleGenerator` implementation (the gateway crate adapts its
//! `LlmRouter` to this trait) so the artifact layer has no dependency on
//! provider wiring.

use wk_domain::error::Result;

/// Longer previews are truncated before being sent to the LLM; the
/// artifact itself always holds the worker's full, untruncated output.
pub const TITLE_PREVIEW_CHARS: usize = 1000;

#[async_trait::async_trait]
pub trait TitleGenerator: Send + Sync {
    /// Produce a short (<=50 char), path-safe title for a worker's output.
    /// `content_preview` is already capped to `TITLE_PREVIEW_CHARS`.
    async fn generate_title(&self, worker: &str, content_preview: &str) -> Result<String>;
}

/// A generator that never calls out; always falls back. Useful for tests
/// and for `doctor`/offline runs where no provider is configured.
pub struct NullTitleGenerator;

#[async_trait::async_trait]
impl TitleGenerator for NullTitleGenerator {
    async fn generate_title(&self, _worker: &str, _content_preview: &str) -> Result<String> {
        Err(wk_domain::error::Error::Other("no title generator configured".into()))
    }
}

/// Strip path-hostile characters and collapse whitespace, per the naming
/// rule in the artifact layout.
pub fn sanitize_title(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();

    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim().to_string()
}

/// Enforce a max character length on a title, truncating with a `...`
/// marker rather than a flat cut when it's too long (so a reader can tell
/// the title was shortened, not that it's simply short).
pub fn truncate_title(title: &str, max_length: usize) -> String {
    if title.chars().count() <= max_length {
        return title.to_string();
    }
    let keep = max_length.saturating_sub(3);
    let mut truncated: String = title.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}

/// Truncate a content preview to at most `TITLE_PREVIEW_CHARS` characters,
/// respecting char boundaries.
pub fn preview(content: &str) -> String {
    if content.chars().count() <= TITLE_PREVIEW_CHARS {
        return content.to_string();
    }
    content.chars().take(TITLE_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_hostile_chars() {
        assert_eq!(sanitize_title("db/query: results*"), "dbquery results");
    }

    #[test]
    fn sanitize_collapses_whitespace() {
        assert_eq!(sanitize_title("  too   many   spaces  "), "too many spaces");
    }

    #[test]
    fn sanitize_can_collapse_to_empty() {
        assert_eq!(sanitize_title("///:::"), "");
    }

    #[test]
    fn preview_truncates_long_content() {
        let long = "x".repeat(TITLE_PREVIEW_CHARS + 500);
        assert_eq!(preview(&long).chars().count(), TITLE_PREVIEW_CHARS);
    }

    #[test]
    fn preview_keeps_short_content_whole() {
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn truncate_title_keeps_short_title_whole() {
        assert_eq!(truncate_title("short title", 50), "short title");
    }

    #[test]
    fn truncate_title_marks_long_title_with_ellipsis() {
        let long = "x".repeat(60);
        let truncated = truncate_title(&long, 50);
        assert_eq!(truncated.chars().count(), 50);
        assert!(truncated.ends_with("..."));
        assert_eq!(&truncated[..47], &"x".repeat(47));
    }
}
