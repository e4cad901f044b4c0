//! `document_analyze` tool.
//!
//! Accepts a UUID file id, an internal `/api/documents/<id>/*` URL, or a
//! publicly fetchable URL; downloads (with bounded retries) and parses by
//! extension: `pdf-extract` for PDF text, and a `zip`+`quick-xml` read of
//! `word/document.xml` for `.docx`, since no single crate here plays both
//! roles.

use std::time::Duration;

use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader as XmlReader;
use serde::Deserialize;
use serde_json::Value;

use wk_domain::error::{Error, Result};

use crate::registry::Tool;

const MAX_DOWNLOAD_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    FileId,
    InternalUrl,
    PublicUrl,
}

fn classify(url_or_id: &str) -> SourceKind {
    if uuid::Uuid::parse_str(url_or_id).is_ok() {
        return SourceKind::FileId;
    }
    if url_or_id.contains("/api/documents/") {
        return SourceKind::InternalUrl;
    }
    SourceKind::PublicUrl
}

fn extension_of(name_or_url: &str) -> String {
    name_or_url
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

pub struct DocumentAnalyzeTool {
    /// Base URL for the internal documents API, e.g. `http://localhost:8080`.
    internal_base_url: String,
    client: reqwest::Client,
}

impl DocumentAnalyzeTool {
    pub fn new(internal_base_url: impl Into<String>) -> Self {
        Self {
            internal_base_url: internal_base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        let base = std::env::var("DOCUMENTS_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());
        Self::new(base)
    }

    fn resolve_url(&self, url_or_id: &str) -> (String, SourceKind) {
        match classify(url_or_id) {
            SourceKind::FileId => (
                format!("{}/api/documents/{}/download", self.internal_base_url, url_or_id),
                SourceKind::FileId,
            ),
            kind => (url_or_id.to_string(), kind),
        }
    }

    async fn download_with_retries(&self, url: &str) -> Result<bytes::Bytes> {
        let mut attempt = 0;
        loop {
            match self.client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .bytes()
                        .await
                        .map_err(|e| Error::Tool { tool: "document_analyze".into(), message: e.to_string() });
                }
                Ok(resp) => {
                    if attempt >= MAX_DOWNLOAD_RETRIES {
                        return Err(Error::Tool {
                            tool: "document_analyze".into(),
                            message: format!("download failed with HTTP {}", resp.status()),
                        });
                    }
                }
                Err(e) => {
                    if attempt >= MAX_DOWNLOAD_RETRIES {
                        return Err(Error::Tool { tool: "document_analyze".into(), message: e.to_string() });
                    }
                }
            }
            attempt += 1;
            tokio::time::sleep(Duration::from_millis(RETRY_BASE_DELAY_MS * 2u64.pow(attempt))).await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct DocumentAnalyzeArgs {
    url_or_id: String,
    #[serde(default)]
    request: Option<String>,
}

#[async_trait::async_trait]
impl Tool for DocumentAnalyzeTool {
    fn name(&self) -> &str {
        "document_analyze"
    }
    fn description(&self) -> &str {
        "Download and extract the text content of a PDF or Word document, given a file id or URL."
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url_or_id": {
                    "type": "string",
                    "description": "a UUID file id, an internal /api/documents/<id> URL, or a public URL",
                },
                "request": {"type": "string", "description": "what to look for in the document"},
            },
            "required": ["url_or_id"],
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let args: DocumentAnalyzeArgs = serde_json::from_value(arguments)?;
        let (url, kind) = self.resolve_url(&args.url_or_id);

        let bytes = self.download_with_retries(&url).await?;
        let ext = extension_of(&args.url_or_id);

        let content = match ext.as_str() {
            "pdf" => extract_pdf(&bytes)?,
            "docx" | "doc" => extract_docx(&bytes)?,
            _ => {
                return Err(Error::Tool {
                    tool: "document_analyze".into(),
                    message: format!("unsupported document extension: '{ext}'"),
                })
            }
        };

        Ok(serde_json::json!({
            "source": args.url_or_id,
            "source_kind": format!("{kind:?}"),
            "file_type": ext,
            "content": content,
            "content_length": content.chars().count(),
            "request": args.request,
        }))
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::Tool { tool: "document_analyze".into(), message: format!("PDF parse error: {e}") })
}

/// `.docx` is a zip archive; `word/document.xml` holds the body. This pulls
/// plain text out of `<w:t>` runs, matching `python-docx`'s paragraph text
/// extraction without reconstructing full table layout.
fn extract_docx(bytes: &[u8]) -> Result<String> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|e| Error::Tool { tool: "document_analyze".into(), message: format!("not a valid docx (zip): {e}") })?;

    let mut xml = String::new();
    {
        let mut entry = archive
            .by_name("word/document.xml")
            .map_err(|e| Error::Tool { tool: "document_analyze".into(), message: format!("missing word/document.xml: {e}") })?;
        std::io::Read::read_to_string(&mut entry, &mut xml)
            .map_err(|e| Error::Tool { tool: "document_analyze".into(), message: format!("failed to read document.xml: {e}") })?;
    }

    let mut reader = XmlReader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut text = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(XmlEvent::End(e)) if e.name().as_ref() == b"w:t" => in_text_run = false,
            Ok(XmlEvent::Start(e)) if e.name().as_ref() == b"w:p" => {
                if !text.is_empty() {
                    text.push('\n');
                }
            }
            Ok(XmlEvent::Text(t)) if in_text_run => {
                text.push_str(
                    &t.unescape()
                        .map_err(|e| Error::Tool { tool: "document_analyze".into(), message: e.to_string() })?,
                );
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => {
                return Err(Error::Tool { tool: "document_analyze".into(), message: format!("xml parse error: {e}") })
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_uuid_as_file_id() {
        assert_eq!(classify("7f9c2ba4-1b2c-4e2d-9a3a-0f0e9d8c7b6a"), SourceKind::FileId);
    }

    #[test]
    fn classifies_internal_documents_url() {
        assert_eq!(classify("http://host/api/documents/abc/download"), SourceKind::InternalUrl);
    }

    #[test]
    fn classifies_everything_else_as_public() {
        assert_eq!(classify("https://example.com/report.pdf"), SourceKind::PublicUrl);
    }

    #[test]
    fn extension_of_handles_query_free_filename() {
        assert_eq!(extension_of("report.PDF"), "pdf");
        assert_eq!(extension_of("notes.docx"), "docx");
    }
}
