//! Planner JSON cleaner: strips a markdown code-fence wrapper
//! (``` with an optional language tag) a planning LLM may wrap its JSON
//! plan in despite being asked for raw JSON.
//!
//! Tries a single full-block regex match first: fenced content that
//! starts and ends the whole (trimmed) string; if that doesn't match,
//! falls back to independently trimming a leading fence and a trailing
//! fence.

use regex::Regex;
use std::sync::OnceLock;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^```(?:\w+\s*)?\n?(.*?)\n?```$").expect("valid regex"))
}

pub fn clean_json_response(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Some(caps) = fence_re().captures(trimmed) {
        return caps[1].trim().to_string();
    }

    let mut cleaned = trimmed.to_string();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest.trim().to_string();
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = match rest.find('\n') {
            Some(idx) => rest[idx + 1..].trim().to_string(),
            None => rest.trim().to_string(),
        };
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest.trim().to_string();
    }
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_json_passes_through() {
        assert_eq!(clean_json_response(r#"{"steps":[]}"#), r#"{"steps":[]}"#);
    }

    #[test]
    fn strips_plain_fence() {
        let wrapped = "```\n{\"steps\":[]}\n```";
        assert_eq!(clean_json_response(wrapped), r#"{"steps":[]}"#);
    }

    #[test]
    fn strips_json_tagged_fence() {
        let wrapped = "```json\n{\"steps\":[]}\n```";
        assert_eq!(clean_json_response(wrapped), r#"{"steps":[]}"#);
    }

    #[test]
    fn strips_fence_without_trailing_newline() {
        let wrapped = "```json{\"steps\":[]}```";
        assert_eq!(clean_json_response(wrapped), r#"{"steps":[]}"#);
    }

    #[test]
    fn leaves_non_json_text_trimmed_only() {
        assert_eq!(clean_json_response("  not json at all  "), "not json at all");
    }

    #[test]
    fn round_trips_every_wrapper_variant() {
        let plan = r#"{"steps":[{"worker_name":"researcher","description":"go"}]}"#;
        for wrapped in [
            plan.to_string(),
            format!("```\n{plan}\n```"),
            format!("```json\n{plan}\n```"),
        ] {
            let cleaned = clean_json_response(&wrapped);
            let parsed: serde_json::Value = serde_json::from_str(&cleaned).unwrap();
            let expected: serde_json::Value = serde_json::from_str(plan).unwrap();
            assert_eq!(parsed, expected);
        }
    }
}
