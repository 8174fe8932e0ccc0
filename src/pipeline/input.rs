//! Input resolution: turn a user-supplied path or URL into an [`UploadedFile`].
//!
//! URLs are usually signed storage links; the object name in the path is
//! the original filename, and the `Content-Type` header is trusted over the
//! extension when it is specific.

use crate::config::QuoteConfig;
use crate::error::QuoteError;
use crate::intake::UploadedFile;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to file bytes.
///
/// If the input is a URL, download it within `config.download_timeout_secs`.
/// If it is a local file, read it.
pub async fn resolve_input(input: &str, config: &QuoteConfig) -> Result<UploadedFile, QuoteError> {
    if is_url(input) {
        download_url(input, config.download_timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<UploadedFile, QuoteError> {
    let path = PathBuf::from(path_str);
    if !path.is_file() {
        return Err(QuoteError::FileNotFound { path });
    }

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| QuoteError::ReadFailed {
            path: path.clone(),
            source: e,
        })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());
    debug!("Read local file: {} ({} bytes)", path.display(), bytes.len());
    Ok(UploadedFile::new(name, None, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<UploadedFile, QuoteError> {
    info!("Downloading: {}", redact_query(url));
    let failed = |reason: String| QuoteError::DownloadFailed {
        url: redact_query(url).to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.without_url().to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            // the error's Display carries the full URL, token included
            failed(e.without_url().to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| failed(e.without_url().to_string()))?;

    let name = extract_filename(url);
    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(UploadedFile::new(name, mime_type, bytes.to_vec()))
}

/// Last path segment of the URL, percent-decoded, or `download`.
pub fn extract_filename(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty())
        .map(|last| percent_decode(&last))
        .unwrap_or_else(|| "download".to_string())
}

/// Signed URLs carry their token in the query string; keep it out of logs.
fn redact_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
            if let Ok(b) = u8::from_str_radix(hex, 16) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
