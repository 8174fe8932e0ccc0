//! Plain-text rendering of a finished quote.
//!
//! Money is rounded to cents here and nowhere else; the pricing types keep
//! full precision so that totals computed from them never drift.

use crate::output::{FileStatus, QuoteOutput};
use crate::pricing::{FileAnalysis, QuoteTotals};
use std::fmt::Write;

/// Format an amount as dollars and cents.
pub fn money(amount: f64) -> String {
    format!("${:.2}", (amount * 100.0).round() / 100.0)
}

/// Column-aligned text table. The first row is the header.
struct Table {
    rows: Vec<Vec<String>>,
    right_aligned: Vec<bool>,
}

impl Table {
    fn new(header: &[&str], right_aligned: &[bool]) -> Self {
        Self {
            rows: vec![header.iter().map(|h| h.to_string()).collect()],
            right_aligned: right_aligned.to_vec(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn render(&self) -> String {
        let columns = self.rows[0].len();
        let widths: Vec<usize> = (0..columns)
            .map(|c| {
                self.rows
                    .iter()
                    .map(|r| r.get(c).map(|s| s.chars().count()).unwrap_or(0))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        for (i, row) in self.rows.iter().enumerate() {
            let cells: Vec<String> = (0..columns)
                .map(|c| {
                    let cell = row.get(c).map(String::as_str).unwrap_or("");
                    let pad = widths[c].saturating_sub(cell.chars().count());
                    if self.right_aligned.get(c).copied().unwrap_or(false) {
                        format!("{}{}", " ".repeat(pad), cell)
                    } else {
                        format!("{}{}", cell, " ".repeat(pad))
                    }
                })
                .collect();
            let _ = writeln!(out, "{}", cells.join("  ").trim_end());
            if i == 0 {
                let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
                let _ = writeln!(out, "{}", rule.join("  "));
            }
        }
        out
    }
}

/// Per-page pricing table for the billed files.
pub fn render_pricing_table<'a>(files: impl IntoIterator<Item = &'a FileAnalysis>) -> String {
    let mut table = Table::new(
        &["File", "Page", "Words", "Complexity", "Multiplier", "PPWC", "Billable pages"],
        &[false, true, true, false, true, true, true],
    );
    for file in files {
        for (i, page) in file.pages.iter().enumerate() {
            table.push(vec![
                if i == 0 { file.filename.clone() } else { String::new() },
                page.page_number.to_string(),
                page.word_count.to_string(),
                page.complexity.to_string(),
                format!("{:.2}", page.complexity_multiplier),
                format!("{:.2}", page.ppwc),
                format!("{:.1}", page.billable_pages),
            ]);
        }
    }
    table.render()
}

/// Totals block shown under the pricing table.
pub fn render_totals(totals: &QuoteTotals) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Per-page rate:         {} (tier {})",
        money(totals.per_page_rate),
        totals.tier
    );
    let _ = writeln!(out, "Total billable pages:  {:.1}", totals.total_billable_pages);
    let _ = writeln!(
        out,
        "Certification:         {} ({})",
        totals.cert_type,
        money(totals.cert_price)
    );
    let _ = writeln!(out, "Final total:           {}", money(totals.quote_total));
    out.push_str("Billable pages are calculated from word count and complexity. Minimum charge of one page per quote.\n");
    out
}

/// Per-page analysis table: document type, languages, names, confidence.
pub fn render_analysis_table(output: &QuoteOutput) -> String {
    let mut table = Table::new(
        &["File", "Page", "Document type", "Languages", "Complexity", "Names", "Confidence"],
        &[false, true, false, false, false, false, true],
    );
    for file in &output.files {
        let Some(ref analysis) = file.analysis else {
            continue;
        };
        for (i, (page, insight)) in analysis.pages.iter().enumerate() {
            table.push(vec![
                if i == 0 { file.filename.clone() } else { String::new() },
                page.to_string(),
                insight.document_type.clone(),
                insight.languages.join(", "),
                insight.complexity.to_string(),
                insight.names.join(", "),
                format!("{:.0}%", insight.confidence * 100.0),
            ]);
        }
    }
    table.render()
}

/// The full quote: header, pricing table, totals and any file problems.
pub fn render_quote(output: &QuoteOutput) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Quote ID: {}", output.quote_id);
    let _ = writeln!(
        out,
        "{} → {}  ·  {}",
        output.terms.source_language, output.terms.target_language, output.terms.intended_use
    );
    out.push('\n');
    out.push_str(&render_pricing_table(output.priced_files()));
    out.push('\n');
    out.push_str(&render_totals(&output.totals));

    let problems: Vec<_> = output.problems().collect();
    if !problems.is_empty() {
        out.push('\n');
        out.push_str("Not included:\n");
        for file in problems {
            let label = match file.status {
                FileStatus::Skipped => "skipped",
                _ => "failed",
            };
            let _ = writeln!(
                out,
                "  {} ({}): {}",
                file.filename,
                label,
                file.message.as_deref().unwrap_or("unknown error")
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::Complexity;
    use crate::rates::Tier;

    fn totals() -> QuoteTotals {
        QuoteTotals {
            tier: Tier::C,
            per_page_rate: 91.0,
            total_billable_pages: 1.0,
            cert_type: "standard".into(),
            cert_price: 20.0,
            quote_total: 111.0,
        }
    }

    #[test]
    fn money_rounds_to_cents() {
        assert_eq!(money(111.0), "$111.00");
        assert_eq!(money(78.0 * 1.3), "$101.40");
        assert_eq!(money(0.125), "$0.13");
    }

    #[test]
    fn pricing_table_lists_every_page() {
        let file = FileAnalysis::from_pages(
            "CS1/a.pdf",
            "a.pdf",
            &[(200, Complexity::Medium), (480, Complexity::Hard)],
            240,
        );
        let text = render_pricing_table([&file]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4, "{text}");
        assert!(lines[0].starts_with("File"));
        assert!(lines[1].starts_with('─'));
        assert!(lines[2].starts_with("a.pdf"));
        assert!(lines[2].ends_with("1.0"));
        assert!(lines[3].ends_with("2.4"));
        assert!(lines[3].contains("Hard"));
    }

    #[test]
    fn totals_block() {
        let text = render_totals(&totals());
        assert!(text.contains("$91.00 (tier C)"));
        assert!(text.contains("standard ($20.00)"));
        assert!(text.contains("Final total:           $111.00"));
    }

    #[test]
    fn columns_align() {
        let mut t = Table::new(&["A", "Num"], &[false, true]);
        t.push(vec!["long name".into(), "7".into()]);
        let text = t.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A          Num");
        assert_eq!(lines[2], "long name    7");
    }
}
