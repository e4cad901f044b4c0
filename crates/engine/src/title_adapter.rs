//! Adapts the LLM Gateway to the artifact store's [`TitleGenerator`] seam:
//! title generation via a short, non-streaming LLM call.

use wk_artifacts::title::{sanitize_title, truncate_title, TitleGenerator};
use wk_domain::capability::ModelRole;
use wk_domain::error::Result;
use wk_domain::message::Message;
use wk_providers::{InvokeOptions, LlmRouter};

const TITLE_PROMPT: &str = "Produce a short title, at most 50 characters, for the \
    following worker output. Respond with the title text only, no quotes, no \
    punctuation beyond what the title itself needs, and no path-hostile \
    characters (/ \\ : * ? \" < > |).";

pub struct RouterTitleGenerator {
    router: LlmRouter,
}

impl RouterTitleGenerator {
    pub fn new(router: LlmRouter) -> Self {
        Self { router }
    }
}

#[async_trait::async_trait]
impl TitleGenerator for RouterTitleGenerator {
    async fn generate_title(&self, worker: &str, content_preview: &str) -> Result<String> {
        let messages = vec![
            Message::system(TITLE_PROMPT),
            Message::user(format!("Worker: {worker}\n\n{content_preview}")),
        ];
        let resp = self.router.invoke(ModelRole::Basic, messages, &InvokeOptions::default()).await?;
        let title = sanitize_title(&resp.content.extract_all_text());
        let title = truncate_title(&title, 50);
        if title.is_empty() {
            return Err(wk_domain::error::Error::Other("title generator returned an empty title".into()));
        }
        Ok(title)
    }
}
