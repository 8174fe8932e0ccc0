//! Per-file stages of quote preparation.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ ocr ──▶ analysis ──▶ (pricing)
//! (URL/path) (words)  (complexity)
//! ```
//!
//! 1. [`input`]    — turn a path or signed URL into an upload
//! 2. [`ocr`]      — page count and per-page word counts from Google Vision or
//!    Document AI; the only number pricing cannot do without
//! 3. [`analysis`] — per-page complexity, document type, names and languages
//!    from a multimodal LLM, with retry/backoff; files over the inline limit
//!    go through the Gemini Files API ([`files_api`])
//!
//! Pricing itself is pure arithmetic and lives in [`crate::pricing`].

pub mod analysis;
pub mod files_api;
pub mod input;
pub mod ocr;
