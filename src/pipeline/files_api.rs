//! Gemini Files API: the route for files too large to send inline.
//!
//! The file is uploaded once (`upload/v1beta/files`, multipart/related) and
//! the returned URI is referenced from a `fileData` part in
//! `generateContent`. `edgequake_llm` only carries inline attachments, so
//! both calls go straight through `reqwest`. The key travels in the
//! `x-goog-api-key` header, never in a URL.

use crate::error::QuoteError;
use crate::intake::UploadedFile;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Model reply plus token usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesReply {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// Upload-then-generate client keyed by a Gemini API key.
pub struct GeminiFilesClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiFilesClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, QuoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QuoteError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: GEMINI_API_BASE.to_string(),
            model: model.into(),
        })
    }

    /// Point at a different host (a proxy or a local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/v1beta/files", self.base_url)
    }

    fn generate_url(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    /// Upload the file and return its `file.uri`.
    pub async fn upload(&self, file: &UploadedFile) -> Result<String, String> {
        let boundary = format!("certquote-{:016x}", rand::random::<u64>());
        let body = multipart_related(&boundary, &file.name, &file.mime_type, &file.bytes);
        debug!("Files API upload: {} ({} bytes)", file.name, file.size);

        let response = self
            .client
            .post(self.upload_url())
            .header("x-goog-api-key", &self.api_key)
            .header("x-goog-upload-protocol", "multipart")
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| format!("upload: {}", e.without_url()))?;
        let value = json_or_status(response, "upload").await?;
        file_uri(&value)
            .map(str::to_string)
            .ok_or_else(|| "upload: response has no file.uri".to_string())
    }

    /// Ask the model about an uploaded file.
    pub async fn generate(
        &self,
        system: &str,
        prompt: &str,
        mime_type: &str,
        uri: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<FilesReply, String> {
        let body = generate_body(system, prompt, mime_type, uri, temperature, max_tokens);
        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("generateContent: {}", e.without_url()))?;
        let value = json_or_status(response, "generateContent").await?;
        parse_reply(&value)
    }
}

async fn json_or_status(response: reqwest::Response, call: &str) -> Result<Value, String> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let line = text.lines().next().unwrap_or("").trim();
        return Err(format!("{call}: HTTP {}: {}", status.as_u16(), line));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| format!("{call}: {}", e.without_url()))
}

/// Metadata part then media part, as the Files API multipart upload expects.
pub fn multipart_related(boundary: &str, display_name: &str, mime_type: &str, bytes: &[u8]) -> Vec<u8> {
    let metadata = json!({ "file": { "displayName": display_name, "mimeType": mime_type } });
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
             --{boundary}\r\nContent-Type: {mime_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

pub fn file_uri(upload_response: &Value) -> Option<&str> {
    upload_response
        .pointer("/file/uri")
        .and_then(Value::as_str)
        .filter(|uri| !uri.is_empty())
}

pub fn generate_body(
    system: &str,
    prompt: &str,
    mime_type: &str,
    uri: &str,
    temperature: f32,
    max_tokens: usize,
) -> Value {
    json!({
        "systemInstruction": { "parts": [{ "text": system }] },
        "contents": [{
            "role": "user",
            "parts": [
                { "text": prompt },
                { "fileData": { "mimeType": mime_type, "fileUri": uri } },
            ],
        }],
        "generationConfig": {
            "temperature": temperature,
            "topK": 1,
            "topP": 0.8,
            "maxOutputTokens": max_tokens,
        },
    })
}

/// Text of the first candidate (all its text parts) plus usage metadata.
pub fn parse_reply(value: &Value) -> Result<FilesReply, String> {
    let parts = value
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| match value.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
            Some(reason) => format!("generateContent: blocked ({reason})"),
            None => "generateContent: no candidates in response".to_string(),
        })?;
    let content: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    let tokens = |key: &str| {
        value
            .pointer(&format!("/usageMetadata/{key}"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize
    };
    Ok(FilesReply {
        content,
        prompt_tokens: tokens("promptTokenCount"),
        completion_tokens: tokens("candidatesTokenCount"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_body_has_metadata_then_media() {
        let body = multipart_related("B0", "acta.pdf", "application/pdf", b"%PDF-1.7");
        let text = String::from_utf8(body).unwrap();
        let expected = "--B0\r\n\
            Content-Type: application/json; charset=UTF-8\r\n\r\n\
            {\"file\":{\"displayName\":\"acta.pdf\",\"mimeType\":\"application/pdf\"}}\r\n\
            --B0\r\n\
            Content-Type: application/pdf\r\n\r\n\
            %PDF-1.7\r\n\
            --B0--\r\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn upload_response_uri() {
        let ok = json!({"file": {"name": "files/abc", "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc", "state": "ACTIVE"}});
        assert_eq!(
            file_uri(&ok),
            Some("https://generativelanguage.googleapis.com/v1beta/files/abc")
        );
        assert_eq!(file_uri(&json!({"file": {"uri": ""}})), None);
        assert_eq!(file_uri(&json!({"error": {"code": 400}})), None);
    }

    #[test]
    fn generate_request_references_the_upload() {
        let body = generate_body("sys", "analyze", "application/pdf", "files/abc", 0.1, 2048);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], "analyze");
        assert_eq!(parts[1]["fileData"]["fileUri"], "files/abc");
        assert_eq!(parts[1]["fileData"]["mimeType"], "application/pdf");
        assert!(parts[1].get("inlineData").is_none());
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(body["generationConfig"]["topK"], 1);
    }

    #[test]
    fn reply_text_and_usage() {
        let response = json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "{\"pages\":"}, {"text": "{}}"}]}}],
            "usageMetadata": {"promptTokenCount": 1800, "candidatesTokenCount": 95, "totalTokenCount": 1895}
        });
        let reply = parse_reply(&response).unwrap();
        assert_eq!(reply.content, "{\"pages\":{}}");
        assert_eq!(reply.prompt_tokens, 1800);
        assert_eq!(reply.completion_tokens, 95);
    }

    #[test]
    fn blocked_reply_is_an_error() {
        let err = parse_reply(&json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap_err();
        assert!(err.contains("SAFETY"));
        assert!(parse_reply(&json!({})).unwrap_err().contains("no candidates"));
    }

    #[test]
    fn endpoints() {
        let client = GeminiFilesClient::new("k", "models/gemini-2.0-flash", Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://127.0.0.1:9/");
        assert_eq!(client.upload_url(), "http://127.0.0.1:9/upload/v1beta/files");
        assert_eq!(
            client.generate_url(),
            "http://127.0.0.1:9/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
