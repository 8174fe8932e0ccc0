//! Signed upload/download URLs against a Supabase Storage bucket.
//!
//! Objects are keyed `<quoteId>/<sanitized filename>`. Signing needs the
//! service-role key, so it happens server-side; the signed URLs themselves
//! are safe to hand to a browser or to the OCR stage.

use crate::error::QuoteError;
use crate::intake::sanitize_for_path;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Default bucket for customer uploads.
pub const DEFAULT_BUCKET: &str = "orders";

/// Shortest and longest lifetime a download link may have, in seconds.
pub const MIN_TTL_SECS: u64 = 60;
pub const MAX_TTL_SECS: u64 = 3600;

/// Storage endpoint and credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`.
    pub url: String,
    pub service_key: String,
    pub bucket: String,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("url", &self.url)
            .field("service_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl StorageConfig {
    /// Read `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY` and `ORDERS_BUCKET`.
    pub fn from_env() -> Result<Self, QuoteError> {
        let missing = || QuoteError::MissingCredentials {
            service: "Supabase Storage".into(),
            hint: "SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY".into(),
        };
        let url = std::env::var("SUPABASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(missing)?;
        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(missing)?;
        let bucket = std::env::var("ORDERS_BUCKET")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BUCKET.to_string());
        Ok(Self {
            url,
            service_key,
            bucket,
        })
    }
}

/// Object key for an uploaded file.
pub fn object_path(quote_id: &str, filename: &str) -> String {
    format!("{}/{}", quote_id, sanitize_for_path(filename))
}

/// Object keys for a batch of files, one per name and in the same order.
///
/// Names that sanitize to the same key get `_2`, `_3`, ... before the
/// extension so no two files in a quote share an object.
pub fn unique_object_paths<'a>(
    quote_id: &str,
    filenames: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut taken = std::collections::HashSet::new();
    let mut paths = Vec::new();
    for filename in filenames {
        let mut path = object_path(quote_id, filename);
        let mut n = 2;
        while taken.contains(&path) {
            let base = sanitize_for_path(filename);
            let numbered = match base.rfind('.') {
                Some(dot) if dot > 0 => format!("{}_{}{}", &base[..dot], n, &base[dot..]),
                _ => format!("{}_{}", base, n),
            };
            path = format!("{}/{}", quote_id, numbered);
            n += 1;
        }
        taken.insert(path.clone());
        paths.push(path);
    }
    paths
}

/// Clamp a requested link lifetime into the allowed window.
pub fn clamp_ttl(secs: u64) -> u64 {
    secs.clamp(MIN_TTL_SECS, MAX_TTL_SECS)
}

/// A signed URL plus where the object lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
    /// Always `SUPABASE`.
    pub storage_backend: String,
    /// `supabase://<bucket>/<path>`.
    pub source_uri: String,
}

/// Thin client for the three storage calls the quote flow needs.
pub struct StorageClient {
    client: reqwest::Client,
    config: StorageConfig,
}

impl StorageClient {
    pub fn new(config: StorageConfig, timeout: Duration) -> Result<Self, QuoteError> {
        Url::parse(&config.url)
            .map_err(|e| QuoteError::InvalidConfig(format!("storage url '{}': {}", config.url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QuoteError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// A time-limited download link. `ttl_secs` is clamped to 60..=3600.
    pub async fn sign_download(&self, path: &str, ttl_secs: u64) -> Result<SignedUrl, QuoteError> {
        let endpoint = self.endpoint(&["object", "sign"], path)?;
        let body = json!({ "expiresIn": clamp_ttl(ttl_secs) });
        let value = self.post(endpoint, &body, false).await?;
        let relative = value
            .get("signedURL")
            .or_else(|| value.get("signedUrl"))
            .and_then(Value::as_str)
            .ok_or_else(|| storage_error(502, "response has no signedURL"))?;
        debug!("Signed download for {}", path);
        Ok(self.signed(relative, path))
    }

    /// A one-shot upload link that overwrites any existing object.
    pub async fn sign_upload(&self, path: &str) -> Result<SignedUrl, QuoteError> {
        let endpoint = self.endpoint(&["object", "upload", "sign"], path)?;
        let value = self.post(endpoint, &json!({}), true).await?;
        let relative = value
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| storage_error(502, "response has no url"))?;
        debug!("Signed upload for {}", path);
        Ok(self.signed(relative, path))
    }

    /// PUT bytes to a signed upload URL.
    pub async fn upload(
        &self,
        signed: &SignedUrl,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<(), QuoteError> {
        let size = bytes.len();
        let response = self
            .client
            .put(&signed.url)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| storage_error(0, e.to_string()))?;
        check_status(response).await?;
        info!("Uploaded {} ({} bytes)", signed.source_uri, size);
        Ok(())
    }

    /// `{url}/storage/v1/{action…}/{bucket}/{path…}`, each segment escaped.
    fn endpoint(&self, action: &[&str], path: &str) -> Result<Url, QuoteError> {
        let mut url = Url::parse(&self.config.url)
            .map_err(|e| QuoteError::InvalidConfig(format!("storage url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| QuoteError::InvalidConfig("storage url cannot be a base".into()))?
            .pop_if_empty()
            .extend(["storage", "v1"])
            .extend(action)
            .push(&self.config.bucket)
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    async fn post(&self, endpoint: Url, body: &Value, upsert: bool) -> Result<Value, QuoteError> {
        let mut request = self
            .client
            .post(endpoint)
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
            .json(body);
        if upsert {
            request = request.header("x-upsert", "true");
        }
        let response = request
            .send()
            .await
            .map_err(|e| storage_error(0, e.to_string()))?;
        let response = check_status(response).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| storage_error(502, format!("invalid JSON: {e}")))
    }

    fn signed(&self, url: &str, path: &str) -> SignedUrl {
        SignedUrl {
            url: absolutize(&self.config.url, url),
            storage_backend: "SUPABASE".into(),
            source_uri: format!("supabase://{}/{}", self.config.bucket, path),
        }
    }
}

fn storage_error(status: u16, message: impl Into<String>) -> QuoteError {
    QuoteError::Storage {
        status,
        message: message.into(),
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, QuoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(text);
    Err(storage_error(status.as_u16(), message))
}

/// Storage returns signed paths relative to `/storage/v1`.
fn absolutize(base: &str, signed: &str) -> String {
    if signed.starts_with("http://") || signed.starts_with("https://") {
        return signed.to_string();
    }
    let base = base.trim_end_matches('/');
    let signed = signed.trim_start_matches('/');
    format!("{base}/storage/v1/{signed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> StorageClient {
        StorageClient::new(
            StorageConfig {
                url: "https://abcd.supabase.co/".into(),
                service_key: "service-role".into(),
                bucket: DEFAULT_BUCKET.into(),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn object_paths_are_sanitized() {
        assert_eq!(object_path("CS00001", "acta #1.pdf"), "CS00001/acta -1.pdf");
        assert_eq!(object_path("CSA1B2C", "../etc/passwd"), "CSA1B2C/..-etc-passwd");
    }

    #[test]
    fn colliding_names_get_numbered_paths() {
        let paths = unique_object_paths(
            "CS00001",
            ["a.pdf", "a.pdf", "b.pdf", "a#.pdf", "a-.pdf", "a.pdf", "README"],
        );
        assert_eq!(
            paths,
            vec![
                "CS00001/a.pdf",
                "CS00001/a_2.pdf",
                "CS00001/b.pdf",
                "CS00001/a-.pdf",
                "CS00001/a-_2.pdf",
                "CS00001/a_3.pdf",
                "CS00001/README",
            ]
        );
        assert_eq!(unique_object_paths("CS00001", ["x", "x"]), vec!["CS00001/x", "CS00001/x_2"]);
    }

    #[test]
    fn ttl_is_clamped() {
        assert_eq!(clamp_ttl(0), 60);
        assert_eq!(clamp_ttl(600), 600);
        assert_eq!(clamp_ttl(86_400), 3600);
    }

    #[test]
    fn endpoints_escape_segments() {
        let c = client();
        let url = c.endpoint(&["object", "sign"], "CS00001/acta de nacimiento.pdf").unwrap();
        assert_eq!(
            url.as_str(),
            "https://abcd.supabase.co/storage/v1/object/sign/orders/CS00001/acta%20de%20nacimiento.pdf"
        );
        let url = c.endpoint(&["object", "upload", "sign"], "CS00001/a.pdf").unwrap();
        assert!(url.path().starts_with("/storage/v1/object/upload/sign/orders/"));
    }

    #[test]
    fn signed_urls_become_absolute() {
        let c = client();
        let s = c.signed("/object/sign/orders/CS00001/a.pdf?token=t", "CS00001/a.pdf");
        assert_eq!(
            s.url,
            "https://abcd.supabase.co/storage/v1/object/sign/orders/CS00001/a.pdf?token=t"
        );
        assert_eq!(s.storage_backend, "SUPABASE");
        assert_eq!(s.source_uri, "supabase://orders/CS00001/a.pdf");

        assert_eq!(absolutize("https://x", "https://cdn/y"), "https://cdn/y");
    }

    #[test]
    fn bad_url_is_config_error() {
        let err = StorageClient::new(
            StorageConfig {
                url: "not a url".into(),
                service_key: "k".into(),
                bucket: "b".into(),
            },
            Duration::from_secs(1),
        )
        .err()
        .unwrap();
        assert!(matches!(err, QuoteError::InvalidConfig(_)));
    }

    #[test]
    fn debug_hides_service_key() {
        assert!(!format!("{:?}", client().config).contains("service-role"));
    }
}
