//! Header-driven column resolution and working-range computation
//!
//! Sources are not addressed by fixed column positions. The header row of a
//! wide discovery range is scanned for the two headers of a [`HeaderSpec`],
//! and the narrow working range between them is derived from the result:
//!
//! ```text
//! | A     | B           | C    | D        |
//! | Name  | Дата оплаты | Sum  | № счета  |   -> Orders!B2:D, span 2
//! ```

use crate::error::{Error, Result};
use crate::table::{CellValue, HeaderSpec};
use serde::{Deserialize, Serialize};

/// 1-based positions of the two bounding columns; 0 means "not found"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedColumns {
    pub first: usize,
    pub last: usize,
}

impl ResolvedColumns {
    /// Fail with the first missing header, if any
    pub fn require(&self, headers: &HeaderSpec, sheet: &str) -> Result<()> {
        let missing = if self.first == 0 {
            Some(&headers.first)
        } else if self.last == 0 {
            Some(&headers.last)
        } else {
            None
        };

        match missing {
            Some(header) => Err(Error::ColumnNotFound {
                header: header.clone(),
                sheet: sheet.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Locate both headers in a header row.
///
/// Matching is exact and case-sensitive. When a header repeats, the last
/// occurrence wins.
pub fn resolve_columns(header_row: &[CellValue], headers: &HeaderSpec) -> ResolvedColumns {
    let mut resolved = ResolvedColumns { first: 0, last: 0 };

    for (position, cell) in header_row.iter().enumerate() {
        let text = cell.as_str();
        if text == headers.first {
            resolved.first = position + 1;
        } else if text == headers.last {
            resolved.last = position + 1;
        }
    }

    resolved
}

/// The A1 range a source is read from and written to, plus the distance
/// between its bounding columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingRange {
    /// e.g. "Orders!B2:D"
    pub range: String,
    /// `last - first`; negative when the headers are in the wrong order
    pub span: i64,
}

impl WorkingRange {
    /// Reject ranges whose last column precedes the first
    pub fn validate(self) -> Result<Self> {
        if self.span < 0 {
            return Err(Error::RangeInvalid {
                range: self.range,
                message: format!("last column precedes first column (span {})", self.span),
            });
        }
        Ok(self)
    }

    /// Span as a cell count threshold; only meaningful after `validate`
    pub fn width(&self) -> usize {
        usize::try_from(self.span).unwrap_or(0)
    }
}

/// Build the working range for resolved columns.
///
/// `sheet_prefix` is the sheet name including its trailing '!'. Row 1 holds
/// headers, so the range always starts at row 2 and is open-ended downwards.
pub fn compute_range(sheet_prefix: &str, first: usize, last: usize) -> WorkingRange {
    WorkingRange {
        range: format!(
            "{}{}2:{}",
            sheet_prefix,
            column_letters(first),
            column_letters(last)
        ),
        span: last as i64 - first as i64,
    }
}

/// Convert a 1-based column index to spreadsheet letters (1 -> A, 27 -> AA)
pub fn column_letters(index: usize) -> String {
    let mut n = index;
    let mut letters = Vec::new();

    while n > 0 {
        n -= 1;
        letters.push(b'A' + (n % 26) as u8);
        n /= 26;
    }

    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Convert spreadsheet letters back to a 1-based column index
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }

    letters.chars().try_fold(0usize, |acc, c| {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() {
            return None;
        }
        acc.checked_mul(26)?
            .checked_add((c as u8 - b'A') as usize + 1)
    })
}
