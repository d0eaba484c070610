//! Core table types shared by the reconciliation and access-list code

use serde::{Deserialize, Serialize};

/// Rows fetched from or written to a tabular store, in sheet order
pub type Grid = Vec<Row>;

/// A row of cells, ordered as the columns of the range it was read from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub cells: Vec<CellValue>,
}

impl Row {
    /// Create a new row
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self { cells }
    }

    /// Build a row from raw cell text
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            cells: texts.into_iter().map(|t| CellValue::parse(t.as_ref())).collect(),
        }
    }

    /// Number of cells present in the row
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }

    pub fn first(&self) -> Option<&CellValue> {
        self.cells.first()
    }

    pub fn last(&self) -> Option<&CellValue> {
        self.cells.last()
    }

    /// Text of every cell, empty cells as ""
    pub fn texts(&self) -> Vec<String> {
        self.cells.iter().map(|c| c.as_str().to_string()).collect()
    }
}

/// A cell value. All comparisons are defined on the text representation,
/// so numbers read from the store are kept as their text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellValue {
    /// Empty/null cell
    #[default]
    Empty,
    /// Any non-empty value
    Text(String),
}

impl CellValue {
    /// Wrap cell text; only the empty string is treated as an empty cell
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Text representation, "" for an empty cell
    pub fn as_str(&self) -> &str {
        match self {
            CellValue::Text(s) => s,
            CellValue::Empty => "",
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::parse(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pair of headers bounding the working range of a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSpec {
    /// Header of the leftmost column (the value being filled)
    pub first: String,
    /// Header of the rightmost column (the identifier)
    pub last: String,
}

impl HeaderSpec {
    pub fn new(first: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            last: last.into(),
        }
    }
}

/// A remote grid: which store, which sheet, and how to find its columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularSource {
    /// Opaque identifier of the store (e.g. a spreadsheet id)
    pub store_id: String,
    /// Sheet (tab) name, without the trailing '!'
    pub sheet: String,
    /// Wide range read only to locate the header row
    pub discovery_range: String,
    /// Headers bounding the working range
    pub headers: HeaderSpec,
}

impl TabularSource {
    /// Create a source whose discovery range covers columns A..FG of the sheet
    pub fn new(store_id: impl Into<String>, sheet: impl Into<String>, headers: HeaderSpec) -> Self {
        let sheet = sheet.into();
        Self {
            store_id: store_id.into(),
            discovery_range: default_discovery_range(&sheet),
            sheet,
            headers,
        }
    }

    /// Override the discovery range
    pub fn with_discovery_range(mut self, range: impl Into<String>) -> Self {
        self.discovery_range = range.into();
        self
    }

    /// Sheet name as it prefixes an A1 range ("Orders!")
    pub fn sheet_prefix(&self) -> String {
        format!("{}!", self.sheet)
    }
}

/// Discovery range used when none is configured
pub fn default_discovery_range(sheet: &str) -> String {
    format!("{}!A1:FG", sheet)
}
