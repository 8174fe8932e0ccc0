//! Configuration types for quote preparation.
//!
//! All pipeline behaviour is controlled through [`QuoteConfig`], built via its
//! [`QuoteConfigBuilder`]. Keeping every knob in one struct makes it easy to
//! share a config across concurrent quotes and to log exactly what a run used.
//!
//! Vendor credentials can come from the builder or from the environment via
//! [`QuoteConfig::from_env`], which reads the same variable names the
//! deployed functions always used.

use crate::error::QuoteError;
use crate::intake::MAX_FILE_BYTES;
use crate::jobs::JobStore;
use crate::progress::ProgressCallback;
use crate::rates::RateTable;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default Gemini model for document analysis.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Configuration for preparing a quote.
///
/// Built via [`QuoteConfig::builder()`] or using [`QuoteConfig::default()`].
///
/// # Example
/// ```rust
/// use certquote::{OcrBackend, QuoteConfig};
///
/// let config = QuoteConfig::builder()
///     .concurrency(2)
///     .ocr_backend(OcrBackend::GoogleVision)
///     .google_api_key("test-key")
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 2);
/// ```
#[derive(Clone)]
pub struct QuoteConfig {
    /// Number of files processed at once. Default: 4.
    ///
    /// Every file costs one OCR call and one LLM call; the vendors rate-limit
    /// per key, so a large upload is fanned out in bounded batches instead of
    /// all at once.
    pub concurrency: usize,

    /// Which OCR vendor extracts word counts. Default: Google Vision.
    pub ocr_backend: OcrBackend,

    /// API key for Google Vision (`GOOGLE_API_KEY`).
    pub google_api_key: Option<String>,

    /// Document AI settings, used when `ocr_backend` is `DocumentAi`.
    pub document_ai: Option<DocumentAiSettings>,

    /// LLM provider name for analysis (e.g. "gemini", "openai"). Default: "gemini".
    pub provider_name: Option<String>,

    /// LLM model identifier. Default: [`DEFAULT_GEMINI_MODEL`].
    pub model: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Gemini API key (`GEMINI_API_KEY`) for the Files API, which carries
    /// files over `max_analysis_bytes` to the model. Falls back to
    /// `google_api_key`; with neither, those files are priced at the default
    /// complexity.
    pub gemini_api_key: Option<String>,

    /// Skip LLM analysis entirely; every page is priced as Medium. Default: false.
    pub skip_analysis: bool,

    /// Sampling temperature for the analysis call. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the analysis may generate. Default: 2048.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient LLM failure. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-vendor-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Largest file sent inline to the LLM. Default: 4 MiB.
    ///
    /// Inline attachments travel base64-encoded inside the JSON body, which
    /// grows them by a third; larger files fail with "payload too large" on
    /// the vendor side, so they are rejected before the call.
    pub max_analysis_bytes: u64,

    /// Largest file accepted at intake. Default: 10 MiB.
    pub max_file_bytes: u64,

    /// Prices, tiers and certification fees.
    pub rates: RateTable,

    /// Where job progress is recorded. If None, no job rows are written.
    pub job_store: Option<Arc<dyn JobStore>>,

    /// Per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

/// Document AI processor coordinates.
#[derive(Clone, Serialize, Deserialize)]
pub struct DocumentAiSettings {
    pub project_id: String,
    /// Processor location, e.g. "us" or "eu". Default: "us".
    pub location: String,
    pub processor_id: String,
    /// OAuth bearer token (`gcloud auth print-access-token`).
    pub access_token: String,
}

impl fmt::Debug for DocumentAiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentAiSettings")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("processor_id", &self.processor_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            ocr_backend: OcrBackend::default(),
            google_api_key: None,
            document_ai: None,
            provider_name: None,
            model: None,
            provider: None,
            gemini_api_key: None,
            skip_analysis: false,
            temperature: 0.1,
            max_tokens: 2048,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            max_analysis_bytes: 4 * 1024 * 1024,
            max_file_bytes: MAX_FILE_BYTES,
            rates: RateTable::default(),
            job_store: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for QuoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuoteConfig")
            .field("concurrency", &self.concurrency)
            .field("ocr_backend", &self.ocr_backend)
            .field("google_api_key", &self.google_api_key.as_ref().map(|_| "<redacted>"))
            .field("document_ai", &self.document_ai)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("skip_analysis", &self.skip_analysis)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("rates", &self.rates)
            .field("job_store", &self.job_store.as_ref().map(|_| "<dyn JobStore>"))
            .finish()
    }
}

impl QuoteConfig {
    /// Create a new builder for `QuoteConfig`.
    pub fn builder() -> QuoteConfigBuilder {
        QuoteConfigBuilder {
            config: Self::default(),
        }
    }

    /// Builder pre-filled from the environment.
    ///
    /// Reads `GOOGLE_API_KEY`, `GEMINI_API_KEY`, `GEMINI_MODEL`, `GOOGLE_CLOUD_PROJECT_ID`,
    /// `GOOGLE_DOCUMENT_AI_PROCESSOR_ID`, `GOOGLE_DOCUMENT_AI_LOCATION` and
    /// `GOOGLE_ACCESS_TOKEN`. Document AI settings are only filled when the
    /// project, processor and token are all present.
    pub fn from_env() -> QuoteConfigBuilder {
        let mut builder = Self::builder();
        if let Some(key) = env_non_empty("GOOGLE_API_KEY") {
            builder = builder.google_api_key(key);
        }
        if let Some(key) = env_non_empty("GEMINI_API_KEY") {
            builder = builder.gemini_api_key(key);
        }
        if let Some(model) = env_non_empty("GEMINI_MODEL") {
            builder = builder.model(model);
        }
        if let (Some(project_id), Some(processor_id), Some(access_token)) = (
            env_non_empty("GOOGLE_CLOUD_PROJECT_ID"),
            env_non_empty("GOOGLE_DOCUMENT_AI_PROCESSOR_ID"),
            env_non_empty("GOOGLE_ACCESS_TOKEN"),
        ) {
            builder = builder.document_ai(DocumentAiSettings {
                project_id,
                location: env_non_empty("GOOGLE_DOCUMENT_AI_LOCATION")
                    .unwrap_or_else(|| "us".to_string()),
                processor_id,
                access_token,
            });
        }
        builder
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Builder for [`QuoteConfig`].
#[derive(Debug)]
pub struct QuoteConfigBuilder {
    config: QuoteConfig,
}

impl QuoteConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn ocr_backend(mut self, backend: OcrBackend) -> Self {
        self.config.ocr_backend = backend;
        self
    }

    pub fn google_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.google_api_key = Some(key.into());
        self
    }

    pub fn document_ai(mut self, settings: DocumentAiSettings) -> Self {
        self.config.document_ai = Some(settings);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.gemini_api_key = Some(key.into());
        self
    }

    pub fn skip_analysis(mut self, v: bool) -> Self {
        self.config.skip_analysis = v;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_analysis_bytes(mut self, bytes: u64) -> Self {
        self.config.max_analysis_bytes = bytes;
        self
    }

    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_bytes = bytes;
        self
    }

    pub fn rates(mut self, rates: RateTable) -> Self {
        self.config.rates = rates;
        self
    }

    pub fn job_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.config.job_store = Some(store);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<QuoteConfig, QuoteError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(QuoteError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.max_file_bytes == 0 {
            return Err(QuoteError::InvalidConfig(
                "max_file_bytes must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(QuoteError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(QuoteError::InvalidConfig(
                "download_timeout_secs must be ≥ 1".into(),
            ));
        }
        c.rates.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// OCR vendor used to count words.
///
/// | Backend | Credentials | Notes |
/// |---------|-------------|-------|
/// | `GoogleVision` | API key | Images and single-page documents; `DOCUMENT_TEXT_DETECTION` |
/// | `DocumentAi` | bearer token + processor | Multi-page PDFs; token-level counts |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcrBackend {
    #[default]
    GoogleVision,
    DocumentAi,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = QuoteConfig::default();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.ocr_backend, OcrBackend::GoogleVision);
        assert_eq!(config.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(config.max_analysis_bytes, 4 * 1024 * 1024);
        assert_eq!(config.rates.base_rate, 65.0);
    }

    #[test]
    fn builder_clamps() {
        let config = QuoteConfig::builder()
            .concurrency(0)
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.temperature, 2.0);
    }

    #[test]
    fn build_rejects_bad_rates() {
        let rates = RateTable {
            base_rate: -1.0,
            ..RateTable::default()
        };
        assert!(QuoteConfig::builder().rates(rates).build().is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = QuoteConfig::builder()
            .google_api_key("AIza-secret")
            .document_ai(DocumentAiSettings {
                project_id: "p".into(),
                location: "us".into(),
                processor_id: "x".into(),
                access_token: "ya29.secret".into(),
            })
            .build()
            .unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("AIza-secret"));
        assert!(!dbg.contains("ya29.secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
