//! LLM analysis: per-page complexity, document type, names and languages.
//!
//! The whole file goes to the model inline (base64) together with
//! [`crate::prompts::ANALYSIS_PROMPT`]. Files over `max_analysis_bytes` are
//! uploaded through the Gemini Files API instead and referenced by URI; with
//! no Gemini key configured they are rejected and priced at the default. Model replies are not reliable JSON,
//! so [`parse_analysis`] accepts fenced JSON, JSON embedded in prose, two
//! different reply shapes, and finally falls back to a single Medium page
//! rather than failing the file.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 from the provider are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) spaces the attempts: with 500 ms base and
//! 2 retries the waits are 500 ms → 1 s. A "payload too large" reply is
//! permanent and is not retried.

use crate::config::QuoteConfig;
use crate::error::{FileError, QuoteError};
use crate::intake::UploadedFile;
use crate::pricing::Complexity;
use crate::pipeline::files_api::GeminiFilesClient;
use crate::prompts::{analysis_prompt, ANALYSIS_SYSTEM_PROMPT};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// What the model said about one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInsight {
    pub complexity: Complexity,
    pub document_type: String,
    pub names: Vec<String>,
    pub languages: Vec<String>,
    pub confidence: f64,
}

impl PageInsight {
    fn fallback(complexity: Complexity, confidence: f64) -> Self {
        Self {
            complexity,
            document_type: "Document".into(),
            names: Vec::new(),
            languages: vec!["unknown".into()],
            confidence,
        }
    }
}

/// What the model said about one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub languages_all: Vec<String>,
    /// Keyed by 1-based page number.
    pub pages: BTreeMap<u32, PageInsight>,
    /// The model's reply, kept when it could not be read as JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    #[serde(default)]
    pub input_tokens: usize,
    #[serde(default)]
    pub output_tokens: usize,
}

impl DocumentAnalysis {
    /// Complexity to price page `n` with: that page's, else the first page's,
    /// else Medium.
    pub fn complexity_for_page(&self, n: u32) -> Complexity {
        self.pages
            .get(&n)
            .or_else(|| self.pages.values().next())
            .map(|p| p.complexity)
            .unwrap_or_default()
    }

    /// Most common document type across pages, if any.
    pub fn document_type(&self) -> Option<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for page in self.pages.values() {
            *counts.entry(page.document_type.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .max_by_key(|(_, n)| *n)
            .map(|(t, _)| t)
    }

    fn fallback(text: &str, confidence: f64, parse_error: Option<String>) -> Self {
        let lower = text.to_lowercase();
        let complexity = if lower.contains("high") {
            Complexity::Hard
        } else if lower.contains("low") {
            Complexity::Easy
        } else {
            Complexity::Medium
        };
        let mut pages = BTreeMap::new();
        pages.insert(1, PageInsight::fallback(complexity, confidence));
        Self {
            languages_all: vec!["unknown".into()],
            pages,
            raw_analysis: Some(text.to_string()),
            parse_error,
            ..Self::default()
        }
    }
}

/// A per-file document analyzer.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// `ocr_pages` is the page count OCR found, when known.
    async fn analyze(
        &self,
        file: &UploadedFile,
        ocr_pages: Option<u32>,
    ) -> Result<DocumentAnalysis, FileError>;
}

// ── Reply parsing ────────────────────────────────────────────────────────

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").unwrap());

/// Read a model reply into a [`DocumentAnalysis`].
///
/// Only a gateway "payload too large" reply is an error; everything else
/// yields an analysis, possibly the single-page fallback.
pub fn parse_analysis(text: &str) -> Result<DocumentAnalysis, String> {
    let trimmed = text.trim();
    if trimmed.starts_with("Request En") || trimmed.contains("FUNCTION_PAYLOAD_TOO_LARGE") {
        return Err(format!(
            "provider rejected the file: {}",
            trimmed.lines().next().unwrap_or("")
        ));
    }

    let Some(json_text) = extract_json(trimmed) else {
        debug!("No JSON in analysis reply, using text fallback");
        return Ok(DocumentAnalysis::fallback(trimmed, 0.8, None));
    };

    match serde_json::from_str::<Value>(json_text) {
        Ok(v @ Value::Object(_)) => Ok(read_object(&v)),
        Ok(other) => Ok(DocumentAnalysis::fallback(
            trimmed,
            0.5,
            Some(format!("expected a JSON object, got {}", json_kind(&other))),
        )),
        Err(e) => {
            warn!("Malformed JSON in analysis reply: {}", e);
            Ok(DocumentAnalysis::fallback(trimmed, 0.5, Some(e.to_string())))
        }
    }
}

/// JSON inside a code fence, else the outermost `{…}` span.
fn extract_json(text: &str) -> Option<&str> {
    if let Some(inner) = RE_FENCE.captures(text).and_then(|c| c.get(1)) {
        if inner.as_str().contains('{') {
            return Some(inner.as_str());
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn read_object(v: &Value) -> DocumentAnalysis {
    match v.get("pages").and_then(Value::as_object) {
        Some(pages) => {
            let pages = pages
                .iter()
                .filter_map(|(k, page)| {
                    let n = k.trim().parse::<u32>().ok().filter(|&n| n > 0)?;
                    Some((n, read_page(page, "document_type", "names", 0.0)))
                })
                .collect();
            DocumentAnalysis {
                languages_all: strings(v.get("languages_all")),
                pages,
                ..DocumentAnalysis::default()
            }
        }
        None => {
            let page = read_page(v, "documentType", "personNames", 0.8);
            let mut pages = BTreeMap::new();
            let languages_all = page.languages.clone();
            pages.insert(1, page);
            DocumentAnalysis {
                languages_all,
                pages,
                ..DocumentAnalysis::default()
            }
        }
    }
}

fn read_page(v: &Value, type_key: &str, names_key: &str, default_confidence: f64) -> PageInsight {
    let complexity = v
        .get("complexity")
        .and_then(Value::as_str)
        .and_then(Complexity::from_label)
        .unwrap_or_default();
    let document_type = v
        .get(type_key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Unknown Document")
        .to_string();
    let confidence = v
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(default_confidence);
    PageInsight {
        complexity,
        document_type,
        names: strings(v.get(names_key)),
        languages: strings(v.get("languages")),
        confidence,
    }
}

fn strings(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ── LLM-backed analyzer ──────────────────────────────────────────────────

/// Analyzer that calls an `edgequake_llm` provider (Gemini by default).
pub struct LlmAnalyzer {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    max_inline_bytes: u64,
    files_api: Option<GeminiFilesClient>,
}

/// What one analysis attempt sends: the file inline, or a Files API upload.
enum Payload<'a> {
    Inline(Vec<ChatMessage>),
    Uploaded(&'a GeminiFilesClient),
}

struct Reply {
    content: String,
    prompt_tokens: usize,
    completion_tokens: usize,
}

impl LlmAnalyzer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &QuoteConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            max_inline_bytes: config.max_analysis_bytes,
            files_api: None,
        }
    }

    /// Build from config, resolving the provider. The Files API route is
    /// enabled when a Gemini key (or, like the Gemini provider, the Google
    /// key) is configured.
    pub fn from_config(config: &QuoteConfig) -> Result<Self, QuoteError> {
        let provider = resolve_provider(config)?;
        let mut analyzer = Self::new(provider, config);
        if let Some(key) = config.gemini_api_key.as_ref().or(config.google_api_key.as_ref()) {
            let model = config
                .model
                .as_deref()
                .unwrap_or(crate::config::DEFAULT_GEMINI_MODEL);
            let timeout = Duration::from_secs(config.api_timeout_secs);
            analyzer = analyzer.with_files_api(GeminiFilesClient::new(key.as_str(), model, timeout)?);
        }
        Ok(analyzer)
    }

    /// Send files over the inline limit through the Gemini Files API.
    pub fn with_files_api(mut self, client: GeminiFilesClient) -> Self {
        self.files_api = Some(client);
        self
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for LlmAnalyzer {
    async fn analyze(
        &self,
        file: &UploadedFile,
        ocr_pages: Option<u32>,
    ) -> Result<DocumentAnalysis, FileError> {
        let start = Instant::now();
        let prompt = analysis_prompt(ocr_pages);
        let payload = if file.size <= self.max_inline_bytes {
            let attachment = ImageData::new(STANDARD.encode(&file.bytes), file.mime_type.as_str());
            Payload::Inline(vec![
                ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
                ChatMessage::user_with_images(&prompt, vec![attachment]),
            ])
        } else if let Some(ref files_api) = self.files_api {
            debug!("{}: over the inline limit, using the Files API", file.name);
            Payload::Uploaded(files_api)
        } else {
            return Err(FileError::Rejected {
                file: file.name.clone(),
                reason: format!(
                    "{:.1} MB is too large for inline analysis (limit {:.0} MB) and no Gemini key is set",
                    file.size as f64 / 1024.0 / 1024.0,
                    self.max_inline_bytes as f64 / 1024.0 / 1024.0
                ),
            });
        };

        // an upload survives failed generate calls
        let mut uploaded: Option<String> = None;
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: analysis retry {}/{} after {}ms",
                    file.name, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.attempt(file, &prompt, &payload, &mut uploaded).await {
                Ok(response) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        file.name,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    let mut analysis =
                        parse_analysis(&response.content).map_err(|detail| {
                            FileError::AnalysisFailed {
                                file: file.name.clone(),
                                retries: attempt,
                                detail,
                            }
                        })?;
                    analysis.input_tokens = response.prompt_tokens;
                    analysis.output_tokens = response.completion_tokens;
                    return Ok(analysis);
                }
                Err(err_msg) => {
                    warn!("{}: analysis attempt {} failed — {}", file.name, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(FileError::AnalysisFailed {
            file: file.name.clone(),
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

impl LlmAnalyzer {
    async fn attempt(
        &self,
        file: &UploadedFile,
        prompt: &str,
        payload: &Payload<'_>,
        uploaded: &mut Option<String>,
    ) -> Result<Reply, String> {
        match payload {
            Payload::Inline(messages) => {
                let response = self
                    .provider
                    .chat(messages, Some(&self.options()))
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(Reply {
                    content: response.content,
                    prompt_tokens: response.prompt_tokens as usize,
                    completion_tokens: response.completion_tokens as usize,
                })
            }
            Payload::Uploaded(files_api) => {
                let uri = match uploaded.clone() {
                    Some(uri) => uri,
                    None => {
                        let uri = files_api.upload(file).await?;
                        debug!("{}: uploaded as {}", file.name, uri);
                        *uploaded = Some(uri.clone());
                        uri
                    }
                };
                let reply = files_api
                    .generate(
                        ANALYSIS_SYSTEM_PROMPT,
                        prompt,
                        &file.mime_type,
                        &uri,
                        self.temperature,
                        self.max_tokens,
                    )
                    .await?;
                Ok(Reply {
                    content: reply.content,
                    prompt_tokens: reply.prompt_tokens,
                    completion_tokens: reply.completion_tokens,
                })
            }
        }
    }
}

/// Resolve the LLM provider, most specific first.
///
/// 1. A pre-built provider in `config.provider`.
/// 2. `config.provider_name` + `config.model` through the factory, which
///    reads that provider's API key from the environment.
/// 3. Gemini with `config.model` (or [`crate::config::DEFAULT_GEMINI_MODEL`]).
pub fn resolve_provider(config: &QuoteConfig) -> Result<Arc<dyn LLMProvider>, QuoteError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }
    let name = config.provider_name.as_deref().unwrap_or("gemini");
    let model = config
        .model
        .as_deref()
        .unwrap_or(crate::config::DEFAULT_GEMINI_MODEL);
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        QuoteError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("Set the API key for '{name}' (GEMINI_API_KEY for gemini). {e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_page_shape() {
        let reply = r#"{
            "languages_all": ["Spanish", "English"],
            "pages": {
                "1": {"complexity": "Low", "document_type": "Certificate",
                      "names": ["Ana Pérez"], "languages": ["Spanish"], "confidence": 0.93},
                "2": {"complexity": "High", "document_type": "Certificate",
                      "names": [], "languages": ["Spanish", "English"], "confidence": 0.7}
            }
        }"#;
        let a = parse_analysis(reply).unwrap();
        assert_eq!(a.languages_all, vec!["Spanish", "English"]);
        assert_eq!(a.pages.len(), 2);
        assert_eq!(a.pages[&1].complexity, Complexity::Easy);
        assert_eq!(a.pages[&1].names, vec!["Ana Pérez"]);
        assert_eq!(a.pages[&2].complexity, Complexity::Hard);
        assert_eq!(a.pages[&2].confidence, 0.7);
        assert!(a.raw_analysis.is_none());
        assert!(a.parse_error.is_none());
    }

    #[test]
    fn flat_shape() {
        let reply = r#"{"complexity": "Medium", "documentType": "Contract",
            "personNames": ["John Roe"], "languages": ["en"]}"#;
        let a = parse_analysis(reply).unwrap();
        let p = &a.pages[&1];
        assert_eq!(p.complexity, Complexity::Medium);
        assert_eq!(p.document_type, "Contract");
        assert_eq!(p.names, vec!["John Roe"]);
        assert_eq!(p.confidence, 0.8);
        assert_eq!(a.languages_all, vec!["en"]);
    }

    #[test]
    fn fenced_json_with_prose() {
        let reply = "Here is the analysis:\n```json\n{\"pages\": {\"1\": {\"complexity\": \"very complex\"}}}\n```\nLet me know!";
        let a = parse_analysis(reply).unwrap();
        assert_eq!(a.pages[&1].complexity, Complexity::Hard);
        assert_eq!(a.pages[&1].document_type, "Unknown Document");
        assert_eq!(a.pages[&1].confidence, 0.0);
    }

    #[test]
    fn embedded_json_without_fence() {
        let reply = "Sure. {\"pages\": {\"1\": {\"complexity\": \"Simple\"}}} Done.";
        assert_eq!(parse_analysis(reply).unwrap().pages[&1].complexity, Complexity::Easy);
    }

    #[test]
    fn no_json_falls_back_with_keyword_guess() {
        let a = parse_analysis("This birth certificate has a high density of stamps.").unwrap();
        assert_eq!(a.pages.len(), 1);
        assert_eq!(a.pages[&1].complexity, Complexity::Hard);
        assert_eq!(a.pages[&1].document_type, "Document");
        assert_eq!(a.pages[&1].confidence, 0.8);
        assert_eq!(a.languages_all, vec!["unknown"]);
        assert!(a.raw_analysis.is_some());
        assert!(a.parse_error.is_none());

        let a = parse_analysis("A plain, simple letter.").unwrap();
        assert_eq!(a.pages[&1].complexity, Complexity::Medium);
    }

    #[test]
    fn malformed_json_falls_back_with_error() {
        let a = parse_analysis("{\"pages\": {\"1\": {\"complexity\": }").unwrap();
        assert_eq!(a.pages[&1].confidence, 0.5);
        assert!(a.parse_error.is_some());
        assert!(a.raw_analysis.is_some());
    }

    #[test]
    fn payload_too_large_is_an_error() {
        assert!(parse_analysis("Request Entity Too Large\n<html>").is_err());
        assert!(parse_analysis("error: FUNCTION_PAYLOAD_TOO_LARGE").is_err());
    }

    #[test]
    fn non_numeric_page_keys_are_ignored() {
        let a = parse_analysis(r#"{"pages": {"cover": {}, "2": {"complexity": "Low"}}}"#).unwrap();
        assert_eq!(a.pages.keys().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn complexity_lookup_falls_back_to_first_page_then_medium() {
        let a = parse_analysis(r#"{"pages": {"1": {"complexity": "High"}, "3": {"complexity": "Low"}}}"#)
            .unwrap();
        assert_eq!(a.complexity_for_page(3), Complexity::Easy);
        assert_eq!(a.complexity_for_page(2), Complexity::Hard);
        assert_eq!(DocumentAnalysis::default().complexity_for_page(1), Complexity::Medium);
    }

    #[test]
    fn most_common_document_type() {
        let a = parse_analysis(
            r#"{"pages": {"1": {"document_type": "Invoice"}, "2": {"document_type": "Contract"}, "3": {"document_type": "Contract"}}}"#,
        )
        .unwrap();
        assert_eq!(a.document_type(), Some("Contract"));
        assert_eq!(DocumentAnalysis::default().document_type(), None);
    }

    // ── Files API route ──────────────────────────────────────────────────

    use edgequake_llm::MockProvider;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Answer one request per reply, in order, and hand back what was sent.
    async fn stub_server(replies: Vec<Value>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for reply in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                seen.push(read_request(&mut socket).await);
                let body = reply.to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
            seen
        });
        (base, handle)
    }

    fn small_inline_limit() -> QuoteConfig {
        QuoteConfig::builder()
            .max_analysis_bytes(16)
            .max_retries(0)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn large_file_goes_through_upload_and_file_reference() {
        let model_text = json!({"pages": {"1": {"complexity": "High", "document_type": "Diploma"}}}).to_string();
        let (base, server) = stub_server(vec![
            json!({"file": {"name": "files/xyz", "uri": "https://files.example/v1beta/files/xyz", "state": "ACTIVE"}}),
            json!({
                "candidates": [{"content": {"parts": [{"text": model_text}]}}],
                "usageMetadata": {"promptTokenCount": 1200, "candidatesTokenCount": 80}
            }),
        ])
        .await;

        let config = small_inline_limit();
        let files_api = GeminiFilesClient::new("GKEY", "gemini-2.0-flash", Duration::from_secs(5))
            .unwrap()
            .with_base_url(base);
        let analyzer = LlmAnalyzer::new(Arc::new(MockProvider::new()), &config).with_files_api(files_api);
        let file = UploadedFile::new("diploma.pdf", None, b"%PDF-1.7 0123456789abcdef0123456789".to_vec());

        let analysis = analyzer.analyze(&file, Some(1)).await.unwrap();
        assert_eq!(analysis.pages[&1].complexity, Complexity::Hard);
        assert_eq!(analysis.input_tokens, 1200);
        assert_eq!(analysis.output_tokens, 80);

        let seen = server.await.unwrap();
        assert_eq!(seen.len(), 2);
        let upload = seen[0].to_ascii_lowercase();
        assert!(upload.starts_with("post /upload/v1beta/files "), "{upload}");
        assert!(upload.contains("x-goog-upload-protocol: multipart"));
        assert!(upload.contains("x-goog-api-key: gkey"));
        assert!(upload.contains("content-type: multipart/related; boundary="));
        assert!(seen[0].contains("%PDF-1.7 0123456789abcdef0123456789"));

        let generate = &seen[1];
        assert!(generate.starts_with("POST /v1beta/models/gemini-2.0-flash:generateContent "), "{generate}");
        let request_line = generate.lines().next().unwrap();
        assert!(!request_line.contains("GKEY"), "{request_line}");
        assert!(generate.contains(r#""fileUri":"https://files.example/v1beta/files/xyz""#));
        assert!(!generate.contains("inlineData"));
    }

    #[tokio::test]
    async fn large_file_without_files_api_is_rejected() {
        let config = small_inline_limit();
        let analyzer = LlmAnalyzer::new(Arc::new(MockProvider::new()), &config);
        let file = UploadedFile::new("big.pdf", None, vec![0; 64]);
        let err = analyzer.analyze(&file, None).await.unwrap_err();
        assert!(matches!(err, FileError::Rejected { .. }), "{err:?}");
        assert!(err.to_string().contains("no Gemini key"));
    }
}
