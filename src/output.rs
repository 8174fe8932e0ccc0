//! Output types returned by [`crate::quote::prepare_quote`].

use crate::error::FileError;
use crate::intake::Customer;
use crate::pipeline::analysis::DocumentAnalysis;
use crate::pipeline::ocr::OcrSummary;
use crate::pricing::{FileAnalysis, QuoteTerms, QuoteTotals};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing status of one uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    /// OCR ran but found no pages, so there is nothing to bill.
    Skipped,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileStatus::Pending => "pending",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
            FileStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Everything the pipeline learned about one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub file_id: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub status: FileStatus,
    /// Why the file failed or was skipped.
    pub message: Option<String>,
    pub error: Option<FileError>,
    pub ocr: Option<OcrSummary>,
    pub analysis: Option<DocumentAnalysis>,
    /// Analysis failed; the file was priced at the default complexity.
    pub analysis_error: Option<FileError>,
    /// Per-page pricing. Present only for `Completed` files.
    pub pricing: Option<FileAnalysis>,
}

impl FileOutcome {
    pub(crate) fn pending(file_id: String, filename: &str, mime_type: &str, size: u64) -> Self {
        Self {
            file_id,
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            size,
            status: FileStatus::Pending,
            message: None,
            error: None,
            ocr: None,
            analysis: None,
            analysis_error: None,
            pricing: None,
        }
    }

    pub(crate) fn fail(mut self, error: FileError) -> Self {
        self.status = FileStatus::Failed;
        self.message = Some(error.to_string());
        self.error = Some(error);
        self
    }

    pub fn word_count(&self) -> u64 {
        self.ocr.as_ref().map(|o| o.total_word_count).unwrap_or(0)
    }

    pub fn page_count(&self) -> u32 {
        self.ocr.as_ref().map(|o| o.page_count).unwrap_or(0)
    }
}

/// Run statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteStats {
    pub total_files: usize,
    pub priced_files: usize,
    pub failed_files: usize,
    pub skipped_files: usize,
    /// Files dropped at intake as repeats.
    pub duplicate_files: usize,
    pub total_pages: u64,
    pub total_words: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

/// A finished quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteOutput {
    pub quote_id: String,
    pub job_id: Option<String>,
    pub customer: Customer,
    pub terms: QuoteTerms,
    /// In upload order.
    pub files: Vec<FileOutcome>,
    pub totals: QuoteTotals,
    pub stats: QuoteStats,
}

impl QuoteOutput {
    /// Pricing of the files that were billed, in upload order.
    pub fn priced_files(&self) -> impl Iterator<Item = &FileAnalysis> {
        self.files.iter().filter_map(|f| f.pricing.as_ref())
    }

    /// Files that failed or were skipped.
    pub fn problems(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Failed | FileStatus::Skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&FileStatus::Skipped).unwrap(), "\"skipped\"");
        assert_eq!(FileStatus::default(), FileStatus::Pending);
        assert_eq!(FileStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn failing_a_file_keeps_the_message() {
        let outcome = FileOutcome::pending("f1".into(), "a.pdf", "application/pdf", 10).fail(
            FileError::OcrFailed {
                file: "a.pdf".into(),
                detail: "HTTP 500".into(),
            },
        );
        assert_eq!(outcome.status, FileStatus::Failed);
        assert!(outcome.message.as_deref().unwrap().contains("HTTP 500"));
        assert_eq!(outcome.word_count(), 0);
        assert_eq!(outcome.page_count(), 0);
    }
}
