//! # certquote
//!
//! Certified-translation quotes from uploaded documents.
//!
//! A customer uploads scans or PDFs and names a language pair and an intended
//! use. Each file is OCR'd for per-page word counts, a multimodal LLM rates
//! every page's complexity, and the words are turned into billable pages and a
//! price from a tiered rate table plus a certification fee.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Intake    validate customer fields, dedupe files, size/type checks
//!  ├─ 2. OCR       Google Vision or Document AI → words per page
//!  ├─ 3. Analysis  Gemini (or any edgequake-llm provider) → complexity per page
//!  ├─ 4. Pricing   ceil(words × multiplier / 240, 0.1) pages, one-page minimum
//!  └─ 5. Output    quote totals, per-file outcomes, job events
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use certquote::{prepare_quote, Customer, QuoteConfig, QuoteRequest, UploadedFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // GOOGLE_API_KEY is used for both Vision OCR and Gemini analysis.
//!     let config = QuoteConfig::from_env().build()?;
//!     let request = QuoteRequest {
//!         quote_id: None,
//!         customer: Customer {
//!             name: "Ana Pérez".into(),
//!             email: "ana@example.com".into(),
//!             phone: None,
//!         },
//!         source_language: "es".into(),
//!         target_language: "en".into(),
//!         intended_use: "USCIS".into(),
//!         files: vec![UploadedFile::new("acta.pdf", None, std::fs::read("acta.pdf")?)],
//!     };
//!     let quote = prepare_quote(request, &config).await?;
//!     println!("{}: ${:.2}", quote.quote_id, quote.totals.quote_total);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `certquote` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! certquote = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod display;
pub mod error;
pub mod intake;
pub mod jobs;
pub mod output;
pub mod payment;
pub mod pipeline;
pub mod pricing;
pub mod progress;
pub mod prompts;
pub mod quote;
pub mod rates;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DocumentAiSettings, OcrBackend, QuoteConfig, QuoteConfigBuilder};
pub use error::{FileError, QuoteError};
pub use intake::{Customer, QuoteRequest, UploadedFile};
pub use jobs::{InMemoryJobStore, Job, JobEvent, JobSnapshot, JobStatus, JobStore};
pub use output::{FileOutcome, FileStatus, QuoteOutput, QuoteStats};
pub use pipeline::analysis::{DocumentAnalysis, DocumentAnalyzer, PageInsight};
pub use pipeline::ocr::{OcrEngine, OcrSummary};
pub use pricing::{calculate_quote, Complexity, FileAnalysis, PageAnalysis, QuoteTerms, QuoteTotals};
pub use progress::{NoopProgressCallback, ProgressCallback, QuoteProgressCallback};
pub use quote::{prepare_quote, prepare_quote_sync, prepare_quote_to_file, prepare_quote_with};
pub use rates::{RateTable, Tier};
pub use storage::{SignedUrl, StorageClient, StorageConfig};
