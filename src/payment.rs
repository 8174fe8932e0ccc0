//! Payment hand-off: a Checkout redirect URL carrying the quote id.
//!
//! The checkout page looks the quote up by id, so the redirect never carries
//! an amount. [`amount_cents`] is for callers that create the payment
//! session themselves.

use crate::error::QuoteError;
use reqwest::Url;

/// Query parameter the checkout page reads.
pub const QUOTE_ID_PARAM: &str = "quoteId";

/// Append `quoteId=<id>` to a Checkout base URL.
///
/// Existing query parameters are kept; an existing `quoteId` is replaced.
pub fn checkout_url(base: &str, quote_id: &str) -> Result<String, QuoteError> {
    if quote_id.trim().is_empty() {
        return Err(QuoteError::InvalidConfig("checkout needs a quote id".into()));
    }
    let mut url = Url::parse(base)
        .map_err(|e| QuoteError::InvalidConfig(format!("checkout url '{base}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(QuoteError::InvalidConfig(format!(
            "checkout url '{base}' must be http or https"
        )));
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != QUOTE_ID_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(QUOTE_ID_PARAM, quote_id.trim());
    Ok(url.into())
}

/// Quote total in integer cents, rounded half away from zero.
pub fn amount_cents(total: f64) -> i64 {
    (total * 100.0).round() as i64
}
