//! Error types for the certquote library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`QuoteError`] — **Fatal**: no quote can be produced at all (invalid
//!   request, missing credentials, every file failed). Returned as
//!   `Err(QuoteError)` from [`crate::quote::prepare_quote`] and friends.
//!
//! * [`FileError`] — **Non-fatal**: a single document failed (OCR vendor
//!   returned 500, the LLM answered garbage, the file was too large) but the
//!   rest of the batch is fine. Stored inside [`crate::output::FileOutcome`]
//!   so the customer still gets a quote for the documents that worked.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the certquote library.
///
/// Per-file failures use [`FileError`] and are stored in
/// [`crate::output::FileOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum QuoteError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The quote request failed form validation.
    #[error("Invalid quote request: {}", errors.join("; "))]
    InvalidRequest { errors: Vec<String> },

    /// The input string is not a readable file path or a valid HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    // ── Pricing errors ────────────────────────────────────────────────────
    /// No file in the quote contributed a single page.
    #[error("Quote has no billable pages")]
    NoBillablePages,

    /// Every file failed; there is nothing to price.
    #[error("All {total} files failed.\nFirst error: {first_error}")]
    AllFilesFailed { total: usize, first_error: String },

    // ── Vendor / credential errors ────────────────────────────────────────
    /// A vendor integration is selected but its credentials are absent.
    #[error("Missing credentials for {service}: set {hint}")]
    MissingCredentials { service: String, hint: String },

    /// The configured LLM provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The object store rejected a signing or upload call.
    #[error("Storage error ({status}): {message}")]
    Storage { status: u16, message: String },

    // ── Job store errors ──────────────────────────────────────────────────
    /// The job id is unknown to the store.
    #[error("Job '{job_id}' not found")]
    JobNotFound { job_id: String },

    /// A terminal job cannot be ended a second time.
    #[error("Job '{job_id}' already finished with status {status}")]
    JobAlreadyFinished { job_id: String, status: String },

    /// The poll loop gave up before the job reached a terminal status.
    #[error("Job '{job_id}' still running after {polls} polls")]
    PollingExhausted { job_id: String, polls: u32 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read a rate table or other local input.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write the quote output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or rate-table validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document.
///
/// Stored in [`crate::output::FileOutcome`]. The quote continues unless ALL
/// files fail.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// The file was rejected before any vendor call (type, size).
    #[error("{file}: rejected: {reason}")]
    Rejected { file: String, reason: String },

    /// The OCR vendor call failed.
    #[error("{file}: OCR failed: {detail}")]
    OcrFailed { file: String, detail: String },

    /// The LLM analysis call failed after retries.
    #[error("{file}: analysis failed after {retries} retries: {detail}")]
    AnalysisFailed {
        file: String,
        retries: u32,
        detail: String,
    },

    /// A vendor call timed out.
    #[error("{file}: {service} timed out after {secs}s")]
    Timeout {
        file: String,
        service: String,
        secs: u64,
    },
}

impl FileError {
    /// Name of the file the error belongs to.
    pub fn file(&self) -> &str {
        match self {
            FileError::Rejected { file, .. }
            | FileError::OcrFailed { file, .. }
            | FileError::AnalysisFailed { file, .. }
            | FileError::Timeout { file, .. } => file,
        }
    }
}
