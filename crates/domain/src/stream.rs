use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for LLM streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// One token-level delta from a streaming completion. `content` carries
/// ordinary output text; `reasoning_content` carries a separate
/// "thinking" channel some providers expose. A chunk may carry either,
/// both, or (rarely) neither.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    /// Set on the terminal chunk of a stream.
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl Chunk {
    /// True when both channels are empty — these are skipped downstream.
    pub fn is_empty(&self) -> bool {
        self.content.as_deref().unwrap_or("").is_empty()
            && self.reasoning_content.as_deref().unwrap_or("").is_empty()
    }
}

/// Token usage for a completion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_with_only_reasoning_is_not_empty() {
        let c = Chunk {
            id: "1".into(),
            content: None,
            reasoning_content: Some("thinking...".into()),
            done: false,
            usage: None,
        };
        assert!(!c.is_empty());
    }

    #[test]
    fn chunk_with_neither_channel_is_empty() {
        let c = Chunk {
            id: "1".into(),
            content: Some(String::new()),
            reasoning_content: None,
            done: false,
            usage: None,
        };
        assert!(c.is_empty());
    }
}
