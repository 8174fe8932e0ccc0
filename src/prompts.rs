//! Prompts for LLM document analysis.
//!
//! Every prompt lives here so a wording change touches exactly one place and
//! the tests can inspect the text without a live model.
//!
//! The reply shape requested by [`ANALYSIS_PROMPT`] is the per-page shape that
//! [`crate::pipeline::analysis::parse_analysis`] reads first. The parser also
//! accepts the older flat shape, so a custom prompt may ask for either.

/// System prompt: role and output discipline.
pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are a document analysis specialist for a certified translation service. \
You inspect scanned or digital documents and report, page by page, how hard they are to translate. \
Return ONLY JSON conforming to the requested structure. No prose, no markdown fences.";

/// User prompt sent alongside the attached document.
pub const ANALYSIS_PROMPT: &str = r#"Analyze this document and provide a JSON response with the following structure:
{
  "languages_all": ["language1", "language2"],
  "pages": {
    "1": {
      "complexity": "Low|Medium|High",
      "document_type": "Contract|Legal Document|Certificate|Invoice|Academic Document|Personal Document|Business Document|Other",
      "names": ["name1", "name2"],
      "languages": ["language1"],
      "confidence": 0.95
    }
  }
}

Complexity guide:
- Low: simple forms, certificates, clean single-column text
- Medium: contracts, academic documents, some tables or mixed content
- High: legal documents, technical manuals, dense layouts, handwriting, poor scans

Add one entry under "pages" for every page, keyed by its 1-based page number.
Extract every person name mentioned, detect all languages present and give a
confidence score between 0 and 1 for each page."#;

/// The user prompt with a hint about the page count from OCR, when known.
///
/// Models sometimes stop after the first page of a long PDF; naming the
/// count up front reduces that.
pub fn analysis_prompt(page_count: Option<u32>) -> String {
    match page_count {
        Some(n) if n > 1 => format!("{ANALYSIS_PROMPT}\n\nThe document has {n} pages."),
        _ => ANALYSIS_PROMPT.to_string(),
    }
}
