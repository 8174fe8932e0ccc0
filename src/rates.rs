//! Rate table: base rate, language tiers and certification fees.
//!
//! The defaults mirror the price list the quote form has always shown. A
//! deployment can override any of it with a JSON file loaded through
//! [`RateTable::from_json_file`]; the table is validated before use so a typo
//! in the file surfaces at startup rather than as a zero-dollar quote.
//!
//! Multipliers are integer percentages. Pricing works in tenths of a page and
//! whole percentages so that `65 × 140 / 100` is exactly `91`, not
//! `90.99999999999999`.

use crate::error::QuoteError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Pricing bracket for a language. Ordered from cheapest to most expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
}

impl Tier {
    /// Multiplier applied to the base rate, as a whole percentage.
    pub fn multiplier_percent(self) -> u32 {
        match self {
            Tier::A => 100,
            Tier::B => 120,
            Tier::C => 140,
        }
    }

    /// Multiplier applied to the base rate (1.0 / 1.2 / 1.4).
    pub fn multiplier(self) -> f64 {
        f64::from(self.multiplier_percent()) / 100.0
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
        };
        f.write_str(s)
    }
}

/// A language offered on the form and its pricing tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageRate {
    pub language_name: String,
    pub tier: Tier,
}

/// A certification product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub price: f64,
    pub description: String,
}

/// Certification type used when an intended use is not in the table.
pub const DEFAULT_CERT_TYPE: &str = "standard";

/// Everything the pricing function needs besides the documents themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    /// Price of one billable page at tier A. Default: 65.
    pub base_rate: f64,
    /// Words that make up one billable page. Default: 240.
    pub words_per_page: u32,
    pub languages: Vec<LanguageRate>,
    /// Certification type name → product.
    pub certifications: BTreeMap<String, Certification>,
    /// Intended use (e.g. `USCIS`) → certification type name.
    pub intended_uses: BTreeMap<String, String>,
}

impl Default for RateTable {
    fn default() -> Self {
        let languages = [
            ("English", Tier::A),
            ("Spanish", Tier::A),
            ("French", Tier::B),
            ("German", Tier::B),
            ("Japanese", Tier::C),
        ]
        .into_iter()
        .map(|(name, tier)| LanguageRate {
            language_name: name.to_string(),
            tier,
        })
        .collect();

        let mut certifications = BTreeMap::new();
        certifications.insert(
            "standard".to_string(),
            Certification {
                price: 20.0,
                description: "Standard certification".to_string(),
            },
        );
        certifications.insert(
            "notarized".to_string(),
            Certification {
                price: 40.0,
                description: "Notarized certification".to_string(),
            },
        );

        let mut intended_uses = BTreeMap::new();
        intended_uses.insert("USCIS".to_string(), "standard".to_string());
        intended_uses.insert("Court".to_string(), "notarized".to_string());

        Self {
            base_rate: 65.0,
            words_per_page: 240,
            languages,
            certifications,
            intended_uses,
        }
    }
}

impl RateTable {
    /// Load a table from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, QuoteError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| QuoteError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let table: RateTable = serde_json::from_str(&raw).map_err(|e| {
            QuoteError::InvalidConfig(format!("rate table {}: {}", path.display(), e))
        })?;
        table.validate()?;
        Ok(table)
    }

    /// Check the table is internally consistent.
    pub fn validate(&self) -> Result<(), QuoteError> {
        if !(self.base_rate.is_finite() && self.base_rate > 0.0) {
            return Err(QuoteError::InvalidConfig(format!(
                "base_rate must be > 0, got {}",
                self.base_rate
            )));
        }
        if self.words_per_page == 0 {
            return Err(QuoteError::InvalidConfig(
                "words_per_page must be ≥ 1".into(),
            ));
        }
        if !self.certifications.contains_key(DEFAULT_CERT_TYPE) {
            return Err(QuoteError::InvalidConfig(format!(
                "certification '{}' is required as the fallback",
                DEFAULT_CERT_TYPE
            )));
        }
        for (use_name, cert) in &self.intended_uses {
            if !self.certifications.contains_key(cert) {
                return Err(QuoteError::InvalidConfig(format!(
                    "intended use '{}' points at unknown certification '{}'",
                    use_name, cert
                )));
            }
        }
        Ok(())
    }

    /// Tier for a language name or ISO-639-1 code. Unknown languages are tier A.
    pub fn tier_for(&self, language: &str) -> Tier {
        let name = language_name(language.trim());
        self.languages
            .iter()
            .find(|l| l.language_name.eq_ignore_ascii_case(&name))
            .map(|l| l.tier)
            .unwrap_or(Tier::A)
    }

    /// The more expensive tier of a source/target pair.
    pub fn pair_tier(&self, source: &str, target: &str) -> Tier {
        self.tier_for(source).max(self.tier_for(target))
    }

    /// Certification type and price for an intended use.
    ///
    /// Unknown uses fall back to [`DEFAULT_CERT_TYPE`].
    pub fn certification_for(&self, intended_use: &str) -> (String, f64) {
        let cert_type = self
            .intended_uses
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(intended_use.trim()))
            .map(|(_, v)| v.as_str())
            .unwrap_or(DEFAULT_CERT_TYPE);
        let price = self
            .certifications
            .get(cert_type)
            .map(|c| c.price)
            .unwrap_or(0.0);
        (cert_type.to_string(), price)
    }
}

/// Map an ISO-639-1 code to an English language name.
///
/// Full names pass through title-cased, so `"JAPANESE"`, `"japanese"` and
/// `"ja"` all become `"Japanese"`.
pub fn language_name(code_or_name: &str) -> String {
    let lower = code_or_name.to_ascii_lowercase();
    let known = match lower.as_str() {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "zh" => "Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "tr" => "Turkish",
        "pl" => "Polish",
        "nl" => "Dutch",
        "sv" => "Swedish",
        "da" => "Danish",
        "no" => "Norwegian",
        "fi" => "Finnish",
        "hr" => "Croatian",
        "sr" => "Serbian",
        "bg" => "Bulgarian",
        "ro" => "Romanian",
        "hu" => "Hungarian",
        "cs" => "Czech",
        "sk" => "Slovak",
        "sl" => "Slovenian",
        "et" => "Estonian",
        "lv" => "Latvian",
        "lt" => "Lithuanian",
        "uk" => "Ukrainian",
        "be" => "Belarusian",
        "mk" => "Macedonian",
        "sq" => "Albanian",
        "mt" => "Maltese",
        "ga" => "Irish",
        "cy" => "Welsh",
        "is" => "Icelandic",
        "fo" => "Faroese",
        "eu" => "Basque",
        "ca" => "Catalan",
        "gl" => "Galician",
        "pa" => "Punjabi",
        "ur" => "Urdu",
        "fa" => "Persian",
        "he" => "Hebrew",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "id" => "Indonesian",
        "ms" => "Malay",
        "tl" => "Filipino",
        "sw" => "Swahili",
        "am" => "Amharic",
        "yo" => "Yoruba",
        "ig" => "Igbo",
        "ha" => "Hausa",
        "zu" => "Zulu",
        "xh" => "Xhosa",
        "af" => "Afrikaans",
        _ => "",
    };
    if !known.is_empty() {
        return known.to_string();
    }

    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_table_is_valid() {
        RateTable::default().validate().expect("defaults must validate");
    }

    #[test]
    fn tier_uses_the_more_expensive_side() {
        let rates = RateTable::default();
        assert_eq!(rates.pair_tier("English", "Japanese"), Tier::C);
        assert_eq!(rates.pair_tier("Japanese", "English"), Tier::C);
        assert_eq!(rates.pair_tier("French", "Spanish"), Tier::B);
        assert_eq!(rates.pair_tier("English", "Spanish"), Tier::A);
    }

    #[test]
    fn tier_accepts_codes_and_any_case() {
        let rates = RateTable::default();
        assert_eq!(rates.tier_for("ja"), Tier::C);
        assert_eq!(rates.tier_for("GERMAN"), Tier::B);
        assert_eq!(rates.tier_for(" french "), Tier::B);
    }

    #[test]
    fn unknown_language_defaults_to_tier_a() {
        assert_eq!(RateTable::default().tier_for("Klingon"), Tier::A);
    }

    #[test]
    fn certification_lookup() {
        let rates = RateTable::default();
        assert_eq!(rates.certification_for("USCIS"), ("standard".into(), 20.0));
        assert_eq!(rates.certification_for("Court"), ("notarized".into(), 40.0));
        assert_eq!(rates.certification_for("court"), ("notarized".into(), 40.0));
        assert_eq!(
            rates.certification_for("Personal"),
            ("standard".into(), 20.0)
        );
    }

    #[test]
    fn language_names() {
        assert_eq!(language_name("en"), "English");
        assert_eq!(language_name("ZH"), "Chinese");
        assert_eq!(language_name("tagalog"), "Tagalog");
        assert_eq!(language_name("Japanese"), "Japanese");
        assert_eq!(language_name(""), "");
    }

    #[test]
    fn tier_multipliers() {
        assert_eq!(Tier::A.multiplier(), 1.0);
        assert_eq!(Tier::B.multiplier(), 1.2);
        assert_eq!(Tier::C.multiplier(), 1.4);
        assert!(Tier::C > Tier::B && Tier::B > Tier::A);
    }

    #[test]
    fn validate_rejects_dangling_intended_use() {
        let mut rates = RateTable::default();
        rates
            .intended_uses
            .insert("Embassy".into(), "apostille".into());
        let err = rates.validate().unwrap_err();
        assert!(err.to_string().contains("apostille"));
    }

    #[test]
    fn validate_rejects_zero_words_per_page() {
        let rates = RateTable {
            words_per_page: 0,
            ..RateTable::default()
        };
        assert!(rates.validate().is_err());
    }

    #[test]
    fn loads_from_json_file() {
        let mut rates = RateTable::default();
        rates.base_rate = 80.0;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(serde_json::to_string(&rates).unwrap().as_bytes())
            .unwrap();

        let loaded = RateTable::from_json_file(f.path()).unwrap();
        assert_eq!(loaded.base_rate, 80.0);
        assert_eq!(loaded.words_per_page, 240);
    }

    #[test]
    fn missing_rate_file_is_read_error() {
        let err = RateTable::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, QuoteError::ReadFailed { .. }));
    }
}
