//! Quote pricing: word counts + complexity + language tier → price.
//!
//! This is the only self-contained business rule in the quote flow, and the
//! one every customer sees, so it is a pure function with no I/O:
//!
//! ```text
//! ppwc            = words × complexity multiplier
//! billable pages  = ceil(ppwc / words_per_page × 10) / 10      (never rounds down)
//! per-page rate   = base rate × tier multiplier(max(source tier, target tier))
//! quote total     = Σ billable pages × per-page rate + certification fee
//! ```
//!
//! with a minimum charge of one page per quote.
//!
//! Billable pages are computed in integer tenths. `240 × 1.1` in floating
//! point is `264.00000000000006`, which a float ceiling turns into 1.2 pages
//! instead of 1.1; integer arithmetic has no such edge.

use crate::error::QuoteError;
use crate::rates::{RateTable, Tier};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-page translation difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Complexity {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Complexity {
    pub const ALL: [Complexity; 3] = [Complexity::Easy, Complexity::Medium, Complexity::Hard];

    /// Multiplier as a whole percentage (100 / 110 / 120).
    pub fn multiplier_percent(self) -> u32 {
        match self {
            Complexity::Easy => 100,
            Complexity::Medium => 110,
            Complexity::Hard => 120,
        }
    }

    /// Multiplier applied to the word count (1.0 / 1.1 / 1.2).
    pub fn multiplier(self) -> f64 {
        f64::from(self.multiplier_percent()) / 100.0
    }

    /// Map the many labels LLMs use for difficulty onto the three buckets.
    ///
    /// Returns `None` for labels that carry no difficulty information.
    pub fn from_label(label: &str) -> Option<Self> {
        let l = label.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match l.as_str() {
            "easy" | "low" | "simple" => Some(Complexity::Easy),
            "medium" | "moderate" | "standard" => Some(Complexity::Medium),
            "hard" | "high" | "complex" | "very_complex" | "difficult" => Some(Complexity::Hard),
            _ => None,
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Complexity::Easy => "Easy",
            Complexity::Medium => "Medium",
            Complexity::Hard => "Hard",
        };
        f.write_str(s)
    }
}

/// Pricing breakdown for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAnalysis {
    /// 1-indexed page number within its file.
    pub page_number: u32,
    pub word_count: u32,
    pub complexity: Complexity,
    pub complexity_multiplier: f64,
    /// Complexity-weighted word count.
    pub ppwc: f64,
    /// Billable pages, a multiple of 0.1.
    pub billable_pages: f64,
}

impl PageAnalysis {
    /// Billable pages in integer tenths.
    pub fn billable_tenths(&self) -> u64 {
        (self.billable_pages * 10.0).round() as u64
    }

    fn set_billable_tenths(&mut self, tenths: u64) {
        self.billable_pages = tenths as f64 / 10.0;
    }
}

/// Pricing breakdown for one uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub file_id: String,
    pub filename: String,
    pub page_count: u32,
    pub pages: Vec<PageAnalysis>,
}

impl FileAnalysis {
    /// Price every page of a file from `(word_count, complexity)` pairs.
    pub fn from_pages(
        file_id: impl Into<String>,
        filename: impl Into<String>,
        pages: &[(u32, Complexity)],
        words_per_page: u32,
    ) -> Self {
        let pages: Vec<PageAnalysis> = pages
            .iter()
            .enumerate()
            .map(|(i, (words, complexity))| {
                price_page(i as u32 + 1, *words, *complexity, words_per_page)
            })
            .collect();
        Self {
            file_id: file_id.into(),
            filename: filename.into(),
            page_count: pages.len() as u32,
            pages,
        }
    }

    /// Sum of billable pages in tenths.
    pub fn billable_tenths(&self) -> u64 {
        self.pages.iter().map(PageAnalysis::billable_tenths).sum()
    }

    pub fn total_words(&self) -> u64 {
        self.pages.iter().map(|p| u64::from(p.word_count)).sum()
    }
}

/// Customer choices that affect the price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTerms {
    pub source_language: String,
    pub target_language: String,
    /// Declared purpose, e.g. `USCIS` or `Court`.
    pub intended_use: String,
}

/// Quote-level totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteTotals {
    /// Tier that set the rate (the more expensive of the pair).
    pub tier: Tier,
    pub per_page_rate: f64,
    pub total_billable_pages: f64,
    pub cert_type: String,
    pub cert_price: f64,
    /// Not rounded to cents; that is the display layer's job.
    pub quote_total: f64,
}

/// Price a single page.
///
/// `billable_pages = ceil(words × multiplier / words_per_page × 10) / 10`,
/// evaluated as `ceil(words × percent / (words_per_page × 10))` tenths.
pub fn price_page(
    page_number: u32,
    word_count: u32,
    complexity: Complexity,
    words_per_page: u32,
) -> PageAnalysis {
    let percent = u64::from(complexity.multiplier_percent());
    let weighted = u64::from(word_count) * percent;
    let divisor = u64::from(words_per_page.max(1)) * 10;
    let tenths = weighted.div_ceil(divisor);

    PageAnalysis {
        page_number,
        word_count,
        complexity,
        complexity_multiplier: complexity.multiplier(),
        ppwc: weighted as f64 / 100.0,
        billable_pages: tenths as f64 / 10.0,
    }
}

/// Minimum billable quantity per quote, in tenths of a page.
pub const MINIMUM_BILLABLE_TENTHS: u64 = 10;

/// Compute the quote totals, applying the one-page minimum charge.
///
/// When the quote sums to less than one page, the shortfall is added to the
/// first page of the first file that has pages, so the page table and the
/// total agree. That is why `files` is taken mutably.
///
/// # Errors
/// [`QuoteError::NoBillablePages`] when no file has a single page, and
/// [`QuoteError::InvalidConfig`] when `rates` fails validation.
pub fn calculate_quote(
    files: &mut [FileAnalysis],
    terms: &QuoteTerms,
    rates: &RateTable,
) -> Result<QuoteTotals, QuoteError> {
    rates.validate()?;

    if files.iter().all(|f| f.pages.is_empty()) {
        return Err(QuoteError::NoBillablePages);
    }

    let mut total_tenths: u64 = files.iter().map(FileAnalysis::billable_tenths).sum();
    if total_tenths < MINIMUM_BILLABLE_TENTHS {
        let deficit = MINIMUM_BILLABLE_TENTHS - total_tenths;
        if let Some(first) = files.iter_mut().find_map(|f| f.pages.first_mut()) {
            let raised = first.billable_tenths() + deficit;
            first.set_billable_tenths(raised);
        }
        total_tenths = MINIMUM_BILLABLE_TENTHS;
    }

    let tier = rates.pair_tier(&terms.source_language, &terms.target_language);
    let per_page_rate = rates.base_rate * f64::from(tier.multiplier_percent()) / 100.0;
    let (cert_type, cert_price) = rates.certification_for(&terms.intended_use);
    let quote_total = total_tenths as f64 * per_page_rate / 10.0 + cert_price;

    Ok(QuoteTotals {
        tier,
        per_page_rate,
        total_billable_pages: total_tenths as f64 / 10.0,
        cert_type,
        cert_price,
        quote_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(source: &str, target: &str, intended_use: &str) -> QuoteTerms {
        QuoteTerms {
            source_language: source.into(),
            target_language: target.into(),
            intended_use: intended_use.into(),
        }
    }

    #[test]
    fn multipliers_are_fixed() {
        assert_eq!(Complexity::Easy.multiplier(), 1.0);
        assert_eq!(Complexity::Medium.multiplier(), 1.1);
        assert_eq!(Complexity::Hard.multiplier(), 1.2);
    }

    #[test]
    fn labels_map_onto_buckets() {
        assert_eq!(Complexity::from_label("Low"), Some(Complexity::Easy));
        assert_eq!(Complexity::from_label("simple"), Some(Complexity::Easy));
        assert_eq!(Complexity::from_label("Standard"), Some(Complexity::Medium));
        assert_eq!(Complexity::from_label("HIGH"), Some(Complexity::Hard));
        assert_eq!(Complexity::from_label("very complex"), Some(Complexity::Hard));
        assert_eq!(Complexity::from_label("very_complex"), Some(Complexity::Hard));
        assert_eq!(Complexity::from_label("unknown"), None);
    }

    #[test]
    fn medium_page_of_200_words() {
        let page = price_page(1, 200, Complexity::Medium, 240);
        assert_eq!(page.complexity_multiplier, 1.1);
        assert_eq!(page.ppwc, 220.0);
        assert_eq!(page.billable_pages, 1.0);
    }

    #[test]
    fn exact_multiple_does_not_round_up_an_extra_tenth() {
        // 240 × 1.1 = 264 words = exactly 1.1 pages.
        let page = price_page(1, 240, Complexity::Medium, 240);
        assert_eq!(page.billable_pages, 1.1);
        // 200 × 1.2 = 240 = exactly one page.
        let page = price_page(1, 200, Complexity::Hard, 240);
        assert_eq!(page.billable_pages, 1.0);
    }

    #[test]
    fn zero_words_bill_nothing() {
        let page = price_page(1, 0, Complexity::Hard, 240);
        assert_eq!(page.billable_pages, 0.0);
        assert_eq!(page.ppwc, 0.0);
    }

    #[test]
    fn billable_pages_never_round_down_and_stay_on_tenths() {
        let wpp = 240u32;
        for complexity in Complexity::ALL {
            for words in 0..=5000u32 {
                let page = price_page(1, words, complexity, wpp);
                let tenths = page.billable_tenths();

                // Multiple of 0.1.
                assert!(
                    (page.billable_pages * 10.0 - tenths as f64).abs() < 1e-9,
                    "{words} words {complexity}: {} is not on a tenth",
                    page.billable_pages
                );

                // Ceiling: covers the weighted words…
                let weighted = u64::from(words) * u64::from(complexity.multiplier_percent());
                let capacity = tenths * u64::from(wpp) * 10;
                assert!(capacity >= weighted, "{words} words {complexity} underbilled");

                // …and is the smallest tenth that does.
                if tenths > 0 {
                    let below = (tenths - 1) * u64::from(wpp) * 10;
                    assert!(below < weighted, "{words} words {complexity} overbilled");
                }
            }
        }
    }

    #[test]
    fn english_to_japanese_uscis_scenario() {
        let mut files = vec![FileAnalysis::from_pages(
            "f1",
            "birth-certificate.pdf",
            &[(200, Complexity::Medium)],
            240,
        )];
        let totals = calculate_quote(
            &mut files,
            &terms("English", "Japanese", "USCIS"),
            &RateTable::default(),
        )
        .unwrap();

        assert_eq!(totals.tier, Tier::C);
        assert_eq!(totals.per_page_rate, 91.0);
        assert_eq!(totals.total_billable_pages, 1.0);
        assert_eq!(totals.cert_type, "standard");
        assert_eq!(totals.cert_price, 20.0);
        assert_eq!(totals.quote_total, 111.0);
    }

    #[test]
    fn rate_uses_max_tier_not_average() {
        let mut files = vec![FileAnalysis::from_pages(
            "f1",
            "a.pdf",
            &[(240, Complexity::Easy)],
            240,
        )];
        let rates = RateTable::default();
        let totals =
            calculate_quote(&mut files, &terms("English", "Japanese", "USCIS"), &rates).unwrap();
        assert_eq!(totals.per_page_rate, rates.base_rate * Tier::C.multiplier());

        let totals =
            calculate_quote(&mut files, &terms("German", "Spanish", "USCIS"), &rates).unwrap();
        assert_eq!(totals.tier, Tier::B);
        assert_eq!(totals.per_page_rate, 78.0);
    }

    #[test]
    fn minimum_charge_moves_deficit_onto_first_page_of_first_file() {
        // 72 Easy words = 0.3 pages, 96 Easy words = 0.4 pages.
        let mut files = vec![
            FileAnalysis::from_pages("f1", "one.pdf", &[(72, Complexity::Easy)], 240),
            FileAnalysis::from_pages("f2", "two.pdf", &[(96, Complexity::Easy)], 240),
        ];
        assert_eq!(files[0].pages[0].billable_pages, 0.3);
        assert_eq!(files[1].pages[0].billable_pages, 0.4);

        let totals = calculate_quote(
            &mut files,
            &terms("English", "Spanish", "USCIS"),
            &RateTable::default(),
        )
        .unwrap();

        assert_eq!(totals.total_billable_pages, 1.0);
        assert_eq!(files[0].pages[0].billable_pages, 0.6);
        assert_eq!(files[1].pages[0].billable_pages, 0.4);
        assert_eq!(totals.quote_total, 65.0 + 20.0);
    }

    #[test]
    fn minimum_charge_skips_files_without_pages() {
        let mut files = vec![
            FileAnalysis::from_pages("f1", "blank.png", &[], 240),
            FileAnalysis::from_pages("f2", "short.pdf", &[(24, Complexity::Easy)], 240),
        ];
        let totals = calculate_quote(
            &mut files,
            &terms("English", "French", "Court"),
            &RateTable::default(),
        )
        .unwrap();
        assert_eq!(totals.total_billable_pages, 1.0);
        assert_eq!(files[1].pages[0].billable_pages, 1.0);
        assert_eq!(totals.cert_type, "notarized");
        assert_eq!(totals.quote_total, 78.0 + 40.0);
    }

    #[test]
    fn total_is_at_least_one_page_for_any_small_quote() {
        let rates = RateTable::default();
        for words in [0u32, 1, 23, 24, 100, 239] {
            for complexity in Complexity::ALL {
                let mut files = vec![FileAnalysis::from_pages(
                    "f1",
                    "a.pdf",
                    &[(words, complexity), (words, complexity)],
                    240,
                )];
                let totals =
                    calculate_quote(&mut files, &terms("English", "English", "USCIS"), &rates)
                        .unwrap();
                assert!(totals.total_billable_pages >= 1.0);
                let table_sum: u64 = files.iter().map(FileAnalysis::billable_tenths).sum();
                assert_eq!(table_sum as f64 / 10.0, totals.total_billable_pages);
            }
        }
    }

    #[test]
    fn quotes_above_the_minimum_are_untouched() {
        let mut files = vec![FileAnalysis::from_pages(
            "f1",
            "a.pdf",
            &[(300, Complexity::Hard), (10, Complexity::Easy)],
            240,
        )];
        let before = files.clone();
        let totals = calculate_quote(
            &mut files,
            &terms("English", "English", "USCIS"),
            &RateTable::default(),
        )
        .unwrap();
        assert_eq!(files, before);
        // 360/240 → 1.5, 10/240 → 0.1
        assert_eq!(totals.total_billable_pages, 1.6);
        assert!((totals.quote_total - (1.6 * 65.0 + 20.0)).abs() < 1e-9);
    }

    #[test]
    fn certification_added_once_per_quote() {
        let mut files = vec![
            FileAnalysis::from_pages("f1", "a.pdf", &[(240, Complexity::Easy)], 240),
            FileAnalysis::from_pages("f2", "b.pdf", &[(240, Complexity::Easy)], 240),
        ];
        let totals = calculate_quote(
            &mut files,
            &terms("English", "Spanish", "Court"),
            &RateTable::default(),
        )
        .unwrap();
        assert_eq!(totals.quote_total, 2.0 * 65.0 + 40.0);
    }

    #[test]
    fn no_pages_is_an_error() {
        let mut files = vec![FileAnalysis::from_pages("f1", "a.pdf", &[], 240)];
        let err = calculate_quote(
            &mut files,
            &terms("English", "Spanish", "USCIS"),
            &RateTable::default(),
        )
        .unwrap_err();
        assert!(matches!(err, QuoteError::NoBillablePages));

        let mut none: Vec<FileAnalysis> = Vec::new();
        let err = calculate_quote(
            &mut none,
            &terms("English", "Spanish", "USCIS"),
            &RateTable::default(),
        )
        .unwrap_err();
        assert!(matches!(err, QuoteError::NoBillablePages));
    }
}
