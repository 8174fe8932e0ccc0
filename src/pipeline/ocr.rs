//! OCR stage: count words per page through a vendor API.
//!
//! Both vendors return deeply nested JSON. The HTTP wrappers here only send
//! the request and hand the body to a pure `summarize_*` function, so the
//! counting rules can be tested against recorded responses without a network.
//!
//! ## Counting rules
//!
//! * **Google Vision** — a word is an entry in
//!   `pages[].blocks[].paragraphs[].words[]`. Language comes from the first
//!   page's `property.detectedLanguages`.
//! * **Document AI** — a word is a token that does not end in a plain space
//!   break and that is anchored to the document text. Document AI reports no
//!   language on the OCR processor, so a keyword check over the opening text
//!   picks between Spanish, French and the English default.

use crate::config::{DocumentAiSettings, QuoteConfig};
use crate::error::{FileError, QuoteError};
use crate::intake::UploadedFile;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Normalised OCR result for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrSummary {
    pub page_count: u32,
    pub total_word_count: u64,
    pub words_per_page: Vec<u32>,
    /// ISO-639-1 code, or `"unknown"`.
    pub detected_language: String,
}

impl OcrSummary {
    fn from_pages(words_per_page: Vec<u32>, detected_language: String) -> Self {
        Self {
            page_count: words_per_page.len() as u32,
            total_word_count: words_per_page.iter().map(|&w| u64::from(w)).sum(),
            words_per_page,
            detected_language,
        }
    }
}

/// A word-counting OCR backend.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short service name used in logs and timeout errors.
    fn name(&self) -> &'static str;

    async fn extract(&self, file: &UploadedFile) -> Result<OcrSummary, FileError>;
}

/// Build the engine selected in the config.
pub fn engine_from_config(config: &QuoteConfig) -> Result<Box<dyn OcrEngine>, QuoteError> {
    let timeout = Duration::from_secs(config.api_timeout_secs);
    match config.ocr_backend {
        crate::config::OcrBackend::GoogleVision => {
            let key = config.google_api_key.clone().ok_or_else(|| {
                QuoteError::MissingCredentials {
                    service: "Google Vision".into(),
                    hint: "GOOGLE_API_KEY".into(),
                }
            })?;
            Ok(Box::new(GoogleVisionOcr::new(key, timeout)?))
        }
        crate::config::OcrBackend::DocumentAi => {
            let settings = config.document_ai.clone().ok_or_else(|| {
                QuoteError::MissingCredentials {
                    service: "Document AI".into(),
                    hint: "GOOGLE_CLOUD_PROJECT_ID, GOOGLE_DOCUMENT_AI_PROCESSOR_ID and GOOGLE_ACCESS_TOKEN".into(),
                }
            })?;
            Ok(Box::new(DocumentAiOcr::new(settings, timeout)?))
        }
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, QuoteError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| QuoteError::Internal(format!("HTTP client: {e}")))
}

/// Turn a transport error into the per-file error the pipeline records.
fn transport_error(file: &str, service: &str, timeout: Duration, e: reqwest::Error) -> FileError {
    if e.is_timeout() {
        FileError::Timeout {
            file: file.to_string(),
            service: service.to_string(),
            secs: timeout.as_secs(),
        }
    } else {
        // Vision takes its key in the query string
        FileError::OcrFailed {
            file: file.to_string(),
            detail: e.without_url().to_string(),
        }
    }
}

/// POST a JSON body and return the parsed JSON response.
async fn post_json(
    request: reqwest::RequestBuilder,
    body: &Value,
    file: &str,
    service: &str,
    timeout: Duration,
) -> Result<Value, FileError> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| transport_error(file, service, timeout, e))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(FileError::OcrFailed {
            file: file.to_string(),
            detail: format!("{service} HTTP {}: {}", status.as_u16(), first_line(&text)),
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| transport_error(file, service, timeout, e))
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}

// ── Google Vision ────────────────────────────────────────────────────────

/// `images:annotate` with `DOCUMENT_TEXT_DETECTION`, keyed by API key.
pub struct GoogleVisionOcr {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    timeout: Duration,
}

impl GoogleVisionOcr {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, QuoteError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.into(),
            endpoint: VISION_ENDPOINT.to_string(),
            timeout,
        })
    }

    /// Point at a different endpoint (a proxy or a local stub).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl OcrEngine for GoogleVisionOcr {
    fn name(&self) -> &'static str {
        "google-vision"
    }

    async fn extract(&self, file: &UploadedFile) -> Result<OcrSummary, FileError> {
        debug!("Vision OCR: {} ({} bytes)", file.name, file.size);
        let body = json!({
            "requests": [{
                "image": { "content": STANDARD.encode(&file.bytes) },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
            }]
        });
        let request = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())]);
        let value = post_json(request, &body, &file.name, self.name(), self.timeout).await?;

        if let Some(message) = value.pointer("/responses/0/error/message").and_then(Value::as_str) {
            return Err(FileError::OcrFailed {
                file: file.name.clone(),
                detail: message.to_string(),
            });
        }

        let summary = summarize_vision_response(&value);
        info!(
            "{}: {} words across {} pages ({})",
            file.name, summary.total_word_count, summary.page_count, summary.detected_language
        );
        Ok(summary)
    }
}

/// Count words in an `images:annotate` response.
///
/// Accepts either the whole batch response (`{"responses": [...]}`) or a
/// single `AnnotateImageResponse`. No `fullTextAnnotation` means no text was
/// found: zero pages, zero words, language `"unknown"`.
pub fn summarize_vision_response(value: &Value) -> OcrSummary {
    let response = value.pointer("/responses/0").unwrap_or(value);
    let Some(annotation) = response.get("fullTextAnnotation") else {
        return OcrSummary {
            detected_language: "unknown".into(),
            ..OcrSummary::default()
        };
    };

    let pages = array(annotation, "pages");
    let words_per_page = pages
        .iter()
        .map(|page| {
            array(page, "blocks")
                .iter()
                .flat_map(|block| array(block, "paragraphs"))
                .map(|paragraph| array(paragraph, "words").len() as u32)
                .sum()
        })
        .collect();

    let detected_language = pages
        .first()
        .and_then(|p| p.pointer("/property/detectedLanguages/0/languageCode"))
        .and_then(Value::as_str)
        .filter(|code| !code.is_empty())
        .unwrap_or("unknown")
        .to_string();

    OcrSummary::from_pages(words_per_page, detected_language)
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

// ── Document AI ──────────────────────────────────────────────────────────

/// A Document AI OCR processor, called with an OAuth bearer token.
pub struct DocumentAiOcr {
    client: reqwest::Client,
    settings: DocumentAiSettings,
    timeout: Duration,
}

impl DocumentAiOcr {
    pub fn new(settings: DocumentAiSettings, timeout: Duration) -> Result<Self, QuoteError> {
        Ok(Self {
            client: http_client(timeout)?,
            settings,
            timeout,
        })
    }

    /// The regional `:process` endpoint for the configured processor.
    pub fn endpoint(&self) -> String {
        let s = &self.settings;
        format!(
            "https://{loc}-documentai.googleapis.com/v1/projects/{p}/locations/{loc}/processors/{id}:process",
            loc = s.location,
            p = s.project_id,
            id = s.processor_id
        )
    }
}

#[async_trait]
impl OcrEngine for DocumentAiOcr {
    fn name(&self) -> &'static str {
        "document-ai"
    }

    async fn extract(&self, file: &UploadedFile) -> Result<OcrSummary, FileError> {
        debug!("Document AI OCR: {} ({} bytes)", file.name, file.size);
        let body = json!({
            "rawDocument": {
                "content": STANDARD.encode(&file.bytes),
                "mimeType": file.mime_type,
            }
        });
        let request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.access_token);
        let value = post_json(request, &body, &file.name, self.name(), self.timeout).await?;

        let summary = summarize_document_ai_response(&value).ok_or_else(|| FileError::OcrFailed {
            file: file.name.clone(),
            detail: "No document data returned from Document AI".into(),
        })?;
        info!(
            "{}: {} words across {} pages ({})",
            file.name, summary.total_word_count, summary.page_count, summary.detected_language
        );
        Ok(summary)
    }
}

/// Count words in a Document AI `:process` response.
///
/// Returns `None` when the response carries no `document`.
pub fn summarize_document_ai_response(value: &Value) -> Option<OcrSummary> {
    let document = value.get("document")?;
    let pages = array(document, "pages");

    let words_per_page = pages
        .iter()
        .map(|page| array(page, "tokens").iter().filter(|t| is_word_token(t)).count() as u32)
        .collect();

    let text = document.get("text").and_then(Value::as_str).unwrap_or("");
    let detected_language = if pages.is_empty() {
        "en"
    } else {
        guess_language(text)
    };

    Some(OcrSummary::from_pages(words_per_page, detected_language.to_string()))
}

fn is_word_token(token: &Value) -> bool {
    let break_type = token.pointer("/detectedBreak/type").and_then(Value::as_str);
    let anchored = token
        .pointer("/layout/textAnchor/textSegments/0/endIndex")
        .map(|end| match end {
            // int64 fields arrive as JSON strings
            Value::String(s) => !s.is_empty() && s != "0",
            Value::Number(n) => n.as_u64().is_some_and(|n| n > 0),
            _ => false,
        })
        .unwrap_or(false);
    break_type != Some("SPACE") && anchored
}

/// Keyword guess over the first 1000 characters. Defaults to `"en"`.
fn guess_language(text: &str) -> &'static str {
    let head: String = text.chars().take(1000).collect::<String>().to_lowercase();
    if ["español", "señor", "documento"].iter().any(|k| head.contains(k)) {
        "es"
    } else if ["français", "monsieur", "madame"].iter().any(|k| head.contains(k)) {
        "fr"
    } else {
        "en"
    }
}
