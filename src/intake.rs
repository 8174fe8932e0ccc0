//! Quote request intake: customer fields, uploaded files, validation.
//!
//! Everything here runs before a single vendor call is made. Errors are
//! collected rather than returned on the first failure so a caller can show
//! every problem with the form at once.

use crate::error::{FileError, QuoteError};
use crate::pricing::QuoteTerms;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Largest file accepted by the form (10 MiB).
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Who is asking for the quote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// A document as received from the customer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl UploadedFile {
    /// Build a file from bytes, guessing the MIME type from the name when
    /// `mime_type` is `None`.
    pub fn new(name: impl Into<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_type
            .filter(|m| !m.is_empty() && m != "application/octet-stream")
            .or_else(|| mime_from_extension(&name).map(str::to_string))
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Self {
            size: bytes.len() as u64,
            name,
            mime_type,
            bytes,
        }
    }

    /// `name:size`, the identity used to drop duplicate uploads.
    pub fn dedupe_key(&self) -> String {
        format!("{}:{}", self.name, self.size)
    }
}

/// MIME types the form accepts, keyed by extension.
const ACCEPTED_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
];

/// MIME type for an accepted extension, or `None`.
pub fn mime_from_extension(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    ACCEPTED_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

fn is_accepted_mime(mime: &str) -> bool {
    ACCEPTED_TYPES.iter().any(|(_, m)| *m == mime)
}

/// Reject files the form would not have accepted.
pub fn validate_file(file: &UploadedFile, max_bytes: u64) -> Result<(), FileError> {
    if file.size == 0 {
        return Err(FileError::Rejected {
            file: file.name.clone(),
            reason: "file is empty".into(),
        });
    }
    if file.size > max_bytes {
        return Err(FileError::Rejected {
            file: file.name.clone(),
            reason: format!(
                "{:.1} MB exceeds the {:.0} MB limit",
                file.size as f64 / 1024.0 / 1024.0,
                max_bytes as f64 / 1024.0 / 1024.0
            ),
        });
    }
    if !is_accepted_mime(&file.mime_type) {
        return Err(FileError::Rejected {
            file: file.name.clone(),
            reason: format!("unsupported file type '{}'", file.mime_type),
        });
    }
    Ok(())
}

/// Drop repeated uploads (same `name:size`), keeping the first.
pub fn dedupe_files(files: Vec<UploadedFile>) -> Vec<UploadedFile> {
    let mut seen = HashSet::new();
    files
        .into_iter()
        .filter(|f| seen.insert(f.dedupe_key()))
        .collect()
}

/// A complete quote request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    /// Reuse an id issued earlier (e.g. by the upload step); generated when absent.
    #[serde(default)]
    pub quote_id: Option<String>,
    pub customer: Customer,
    pub source_language: String,
    pub target_language: String,
    pub intended_use: String,
    pub files: Vec<UploadedFile>,
}

static RE_EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

impl QuoteRequest {
    /// Validate every field, returning all problems together.
    pub fn validate(&self) -> Result<(), QuoteError> {
        let mut errors = Vec::new();

        if self.customer.name.trim().is_empty() {
            errors.push("Name is required".to_string());
        }
        let email = self.customer.email.trim();
        if email.is_empty() {
            errors.push("Email is required".to_string());
        } else if !RE_EMAIL.is_match(email) {
            errors.push("Please enter a valid email address".to_string());
        }
        if self.intended_use.trim().is_empty() {
            errors.push("Please select intended use".to_string());
        }
        if self.source_language.trim().is_empty() {
            errors.push("Please select source language".to_string());
        }
        if self.target_language.trim().is_empty() {
            errors.push("Please select target language".to_string());
        }
        if self.files.is_empty() {
            errors.push("Please upload at least one file".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(QuoteError::InvalidRequest { errors })
        }
    }

    /// The fields that drive pricing.
    pub fn terms(&self) -> QuoteTerms {
        QuoteTerms {
            source_language: self.source_language.trim().to_string(),
            target_language: self.target_language.trim().to_string(),
            intended_use: self.intended_use.trim().to_string(),
        }
    }
}

// ── Object names ─────────────────────────────────────────────────────────────

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9 \-_.]").unwrap());
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

/// Make a filename safe to use as a storage object name.
///
/// Keeps letters, digits, space, dash, underscore and dot; anything else
/// becomes `-`. Whitespace runs collapse to one space and dash runs to one
/// dash.
pub fn sanitize_for_path(name: &str) -> String {
    let s = RE_UNSAFE.replace_all(name.trim(), "-");
    let s = RE_SPACES.replace_all(&s, " ");
    RE_DASHES.replace_all(&s, "-").into_owned()
}

// ── Quote IDs ────────────────────────────────────────────────────────────────

const QUOTE_ID_PREFIX: &str = "CS";
const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A short, human-friendly quote id: `CS` + 5 random base-36 characters.
pub fn generate_quote_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..5)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{QUOTE_ID_PREFIX}{suffix}")
}

/// The next id in the sequential `CS00001` scheme.
///
/// `last` is the highest id issued so far; `None` or an id without a numeric
/// suffix starts the sequence at 1.
pub fn next_sequential_quote_id(last: Option<&str>) -> String {
    let current = last
        .and_then(|id| id.strip_prefix(QUOTE_ID_PREFIX))
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{QUOTE_ID_PREFIX}{:05}", current + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, len: usize) -> UploadedFile {
        UploadedFile::new(name, None, vec![b'x'; len])
    }

    fn request() -> QuoteRequest {
        QuoteRequest {
            quote_id: None,
            customer: Customer {
                name: "Ana Pérez".into(),
                email: "ana@example.com".into(),
                phone: None,
            },
            source_language: "Spanish".into(),
            target_language: "English".into(),
            intended_use: "USCIS".into(),
            files: vec![file("acta.pdf", 10)],
        }
    }

    #[test]
    fn valid_request_passes() {
        request().validate().unwrap();
    }

    #[test]
    fn every_missing_field_is_reported() {
        let req = QuoteRequest {
            quote_id: None,
            customer: Customer::default(),
            source_language: "".into(),
            target_language: " ".into(),
            intended_use: "".into(),
            files: vec![],
        };
        match req.validate().unwrap_err() {
            QuoteError::InvalidRequest { errors } => {
                assert_eq!(errors.len(), 6, "{errors:?}");
                assert!(errors.contains(&"Name is required".to_string()));
                assert!(errors.contains(&"Email is required".to_string()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_email_rejected() {
        let mut req = request();
        req.customer.email = "ana@example".into();
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("valid email"));
    }

    #[test]
    fn mime_guessed_from_extension() {
        assert_eq!(file("scan.PDF", 1).mime_type, "application/pdf");
        assert_eq!(file("photo.jpeg", 1).mime_type, "image/jpeg");
        assert_eq!(file("notes.txt", 1).mime_type, "application/octet-stream");
        let explicit = UploadedFile::new("blob", Some("image/png".into()), vec![1]);
        assert_eq!(explicit.mime_type, "image/png");
    }

    #[test]
    fn file_validation() {
        validate_file(&file("a.pdf", 100), MAX_FILE_BYTES).unwrap();
        assert!(validate_file(&file("a.pdf", 0), MAX_FILE_BYTES).is_err());
        assert!(validate_file(&file("a.txt", 10), MAX_FILE_BYTES).is_err());

        let err = validate_file(&file("big.pdf", 2048), 1024).unwrap_err();
        assert_eq!(err.file(), "big.pdf");
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn only_listed_image_types_are_accepted() {
        let with_mime = |name: &str, mime: &str| {
            UploadedFile::new(name, Some(mime.to_string()), vec![0; 16])
        };
        validate_file(&with_mime("p.png", "image/png"), MAX_FILE_BYTES).unwrap();
        validate_file(&with_mime("p.jpg", "image/jpeg"), MAX_FILE_BYTES).unwrap();
        for (name, mime) in [
            ("p.gif", "image/gif"),
            ("p.svg", "image/svg+xml"),
            ("p.webp", "image/webp"),
            ("p.heic", "image/heic"),
        ] {
            let err = validate_file(&with_mime(name, mime), MAX_FILE_BYTES).unwrap_err();
            assert!(err.to_string().contains("unsupported file type"), "{mime}: {err}");
        }
    }

    #[test]
    fn duplicates_dropped_by_name_and_size() {
        let files = vec![file("a.pdf", 3), file("a.pdf", 3), file("a.pdf", 4), file("b.pdf", 3)];
        let kept = dedupe_files(files);
        let keys: Vec<String> = kept.iter().map(UploadedFile::dedupe_key).collect();
        assert_eq!(keys, vec!["a.pdf:3", "a.pdf:4", "b.pdf:3"]);
    }

    #[test]
    fn sanitize_replaces_and_collapses() {
        assert_eq!(sanitize_for_path("  my file.pdf "), "my file.pdf");
        assert_eq!(sanitize_for_path("acta#nacimiento(1).pdf"), "acta-nacimiento-1-.pdf");
        assert_eq!(sanitize_for_path("a   b\tc.png"), "a b-c.png");
        assert_eq!(sanitize_for_path("día/../x.pdf"), "d-a-..-x.pdf");
    }

    #[test]
    fn random_quote_id_shape() {
        for _ in 0..50 {
            let id = generate_quote_id();
            assert_eq!(id.len(), 7);
            assert!(id.starts_with("CS"));
            assert!(id[2..].bytes().all(|b| BASE36.contains(&b)));
        }
    }

    #[test]
    fn sequential_quote_ids() {
        assert_eq!(next_sequential_quote_id(None), "CS00001");
        assert_eq!(next_sequential_quote_id(Some("CS00041")), "CS00042");
        assert_eq!(next_sequential_quote_id(Some("garbage")), "CS00001");
    }

    #[test]
    fn terms_are_trimmed() {
        let mut req = request();
        req.intended_use = " Court ".into();
        assert_eq!(req.terms().intended_use, "Court");
    }
}
