//! `web_search` and `crawl` tools, backed by the Tavily search API and the
//! Firecrawl scrape API as direct REST calls.

use serde::Deserialize;
use serde_json::Value;

use wk_domain::error::{Error, Result};

use crate::registry::Tool;

const TAVILY_URL: &str = "https://api.tavily.com/search";
const FIRECRAWL_URL: &str = "https://api.firecrawl.dev/v1/scrape";

pub struct WebSearchTool {
    api_key: String,
    max_results: u32,
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(api_key: impl Into<String>, max_results: u32) -> Self {
        Self {
            api_key: api_key.into(),
            max_results,
            client: reqwest::Client::new(),
        }
    }

    /// `TAVILY_API_KEY` / `TAVILY_MAX_RESULTS` (default 5).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("TAVILY_API_KEY")
            .map_err(|_| Error::Config("TAVILY_API_KEY is not set".into()))?;
        let max_results = std::env::var("TAVILY_MAX_RESULTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        Ok(Self::new(api_key, max_results))
    }
}

#[derive(Debug, Deserialize)]
struct WebSearchArgs {
    query: String,
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }
    fn description(&self) -> &str {
        "Search the web and return a ranked list of results with titles, URLs, and snippets."
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "the search query"},
            },
            "required": ["query"],
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let args: WebSearchArgs = serde_json::from_value(arguments)?;

        let resp = self
            .client
            .post(TAVILY_URL)
            .json(&serde_json::json!({
                "api_key": self.api_key,
                "query": args.query,
                "max_results": self.max_results,
            }))
            .send()
            .await
            .map_err(|e| Error::Tool { tool: "web_search".into(), message: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(Error::Tool {
                tool: "web_search".into(),
                message: format!("tavily returned HTTP {}", resp.status()),
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| Error::Tool { tool: "web_search".into(), message: e.to_string() })?;

        Ok(serde_json::json!({
            "query": args.query,
            "results": body.get("results").cloned().unwrap_or(Value::Array(vec![])),
        }))
    }
}

pub struct CrawlTool {
    api_key: String,
    client: reqwest::Client,
}

impl CrawlTool {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("FIRECRAWL_API_KEY")
            .map_err(|_| Error::Config("FIRECRAWL_API_KEY is not set".into()))?;
        Ok(Self::new(api_key))
    }
}

#[derive(Debug, Deserialize)]
struct CrawlArgs {
    url: String,
}

#[async_trait::async_trait]
impl Tool for CrawlTool {
    fn name(&self) -> &str {
        "crawl"
    }
    fn description(&self) -> &str {
        "Fetch a URL and return its main content as markdown."
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "the URL to fetch"},
            },
            "required": ["url"],
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let args: CrawlArgs = serde_json::from_value(arguments)?;

        let resp = self
            .client
            .post(FIRECRAWL_URL)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "url": args.url,
                "formats": ["markdown"],
            }))
            .send()
            .await
            .map_err(|e| Error::Tool { tool: "crawl".into(), message: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(Error::Tool {
                tool: "crawl".into(),
                message: format!("firecrawl returned HTTP {}", resp.status()),
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| Error::Tool { tool: "crawl".into(), message: e.to_string() })?;

        let markdown = body
            .get("data")
            .and_then(|d| d.get("markdown"))
            .and_then(|m| m.as_str())
            .unwrap_or_default();

        Ok(serde_json::json!({
            "url": args.url,
            "markdown": markdown,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_search_schema_requires_query() {
        let tool = WebSearchTool::new("key", 5);
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"][0], "query");
    }

    #[test]
    fn crawl_schema_requires_url() {
        let tool = CrawlTool::new("key");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"][0], "url");
    }
}
