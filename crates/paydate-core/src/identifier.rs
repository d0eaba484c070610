//! Identifier extraction from free-text cells

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Canonical join key between statements and tabular sources
pub type Identifier = i64;

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("valid digit regex"));

/// An invoice reference inside a payment purpose: "счету № 1187", "сч 1588"
static INVOICE_MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"сч([её]ту)?\s*(№\s*)?[0-9]+").expect("valid invoice regex"));

/// Extract the last maximal run of decimal digits in `text` as an identifier.
///
/// "счету №1588" -> 1588, "order 12 / invoice 34" -> 34
pub fn extract_identifier(text: &str) -> Result<Identifier> {
    let lowered = text.to_lowercase();
    let run = DIGIT_RUN
        .find_iter(&lowered)
        .last()
        .ok_or_else(|| Error::NoIdentifierFound(text.to_string()))?;

    run.as_str()
        .parse()
        .map_err(|_| Error::InvalidIdentifier(run.as_str().to_string()))
}

/// Identifiers of every invoice mentioned in a payment purpose, in order.
///
/// Only references introduced by "сч"/"счету"/"счёту" count, so amounts and
/// contract numbers elsewhere in the text are ignored.
pub fn invoice_mentions(purpose: &str) -> Result<Vec<Identifier>> {
    let lowered = purpose.to_lowercase();
    INVOICE_MENTION
        .find_iter(&lowered)
        .map(|m| extract_identifier(m.as_str()))
        .collect()
}
