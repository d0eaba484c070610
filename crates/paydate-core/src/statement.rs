//! Bank statement decoding
//!
//! A statement is a spreadsheet export with (at least) a posting-date column
//! and a payment-purpose column. Both are found by header text anywhere in
//! the sheet, since banks put a variable-height preamble above the table.

use crate::error::{Error, Result};
use crate::identifier::invoice_mentions;
use crate::reconcile::IdentifierMap;
use calamine::{open_workbook_auto, Data, Reader};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Rendering of spreadsheet date cells, e.g. "18-Nov-2024"
const DATE_FORMAT: &str = "%d-%b-%Y";

/// Where to find the data in a statement file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementLayout {
    /// 0-based index of the worksheet to read
    pub sheet_index: usize,
    /// Header of the posting-date column (case-insensitive)
    pub date_header: String,
    /// Header of the payment-purpose column (case-insensitive)
    pub purpose_header: String,
}

impl Default for StatementLayout {
    fn default() -> Self {
        Self {
            sheet_index: 0,
            date_header: "Дата проводки".to_string(),
            purpose_header: "Назначение платежа".to_string(),
        }
    }
}

/// Decode a statement file into invoice -> payment date
pub fn decode_statement<P: AsRef<Path>>(path: P, layout: &StatementLayout) -> Result<IdentifierMap> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let rows = match extension.as_str() {
        "csv" => read_csv_rows(path)?,
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook_rows(path, layout.sheet_index)?,
        _ => {
            return Err(Error::UnreadableFile {
                path: path.to_path_buf(),
                message: format!("unsupported file type '{}'", extension),
            })
        }
    };

    let map = decode_rows(&rows, layout)?;
    tracing::info!(path = %path.display(), invoices = map.len(), "decoded statement");
    Ok(map)
}

/// Decode already-read statement rows
pub fn decode_rows(rows: &[Vec<String>], layout: &StatementLayout) -> Result<IdentifierMap> {
    let (date_col, purpose_col) = locate_columns(rows, layout)?;
    let mut map = IdentifierMap::new();

    for (row_idx, row) in rows.iter().enumerate() {
        let Some(purpose) = row.get(purpose_col).filter(|p| !p.is_empty()) else {
            continue;
        };
        let ids = invoice_mentions(purpose)?;
        if ids.is_empty() {
            continue;
        }

        let Some(date) = row.get(date_col).filter(|d| !d.is_empty()) else {
            tracing::debug!(row = row_idx + 1, "invoice mention without a posting date");
            continue;
        };
        for id in ids {
            map.insert(id, date.clone());
        }
    }

    Ok(map)
}

/// Positions of the date and purpose columns; the last matching cell wins
fn locate_columns(rows: &[Vec<String>], layout: &StatementLayout) -> Result<(usize, usize)> {
    let date_header = layout.date_header.to_lowercase();
    let purpose_header = layout.purpose_header.to_lowercase();
    let mut date_col = None;
    let mut purpose_col = None;

    for row in rows {
        for (col, text) in row.iter().enumerate() {
            let text = text.to_lowercase();
            if text == date_header {
                date_col = Some(col);
            } else if text == purpose_header {
                purpose_col = Some(col);
            }
        }
    }

    let date_col = date_col.ok_or_else(|| Error::MissingExpectedColumn(layout.date_header.clone()))?;
    let purpose_col =
        purpose_col.ok_or_else(|| Error::MissingExpectedColumn(layout.purpose_header.clone()))?;
    Ok((date_col, purpose_col))
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn read_workbook_rows(path: &Path, sheet_index: usize) -> Result<Vec<Vec<String>>> {
    let unreadable = |message: String| Error::UnreadableFile {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(sheet_index)
        .ok_or_else(|| unreadable(format!("no worksheet at index {}", sheet_index)))?
        .map_err(|e| unreadable(e.to_string()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

/// Text of a workbook cell as a spreadsheet would display it
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn sample_statement() -> Vec<Vec<String>> {
        rows(&[
            &["Выписка по счету 40702810000000001234", "", ""],
            &["", "Дата проводки", "Назначение платежа"],
            &["", "18-Nov-2024", "Оплата по счету № 1095 от 01.11.2024"],
            &["", "19-Nov-2024", "Оплата по счёту №1504, НДС не облагается"],
            &["", "18-Nov-2024", "ОПЛАТА ПО СЧ 1519 И СЧЕТУ 1520"],
            &["", "19-Nov-2024", "Возврат займа по договору 77"],
            &["", "", "Оплата по счету 999"],
            &["", "19-Nov-2024", ""],
        ])
    }

    #[test]
    fn test_decode_rows() {
        let map = decode_rows(&sample_statement(), &StatementLayout::default()).unwrap();

        let expected = IdentifierMap::from([
            (1095, "18-Nov-2024".to_string()),
            (1504, "19-Nov-2024".to_string()),
            (1519, "18-Nov-2024".to_string()),
            (1520, "18-Nov-2024".to_string()),
        ]);
        assert_eq!(map, expected);
    }

    #[test]
    fn test_headers_case_insensitive() {
        let data = rows(&[
            &["ДАТА ПРОВОДКИ", "назначение платежа"],
            &["20-Nov-2024", "по счету 5"],
        ]);

        let map = decode_rows(&data, &StatementLayout::default()).unwrap();
        assert_eq!(map.get(&5).map(String::as_str), Some("20-Nov-2024"));
    }

    #[test]
    fn test_later_mention_overwrites() {
        let data = rows(&[
            &["Дата проводки", "Назначение платежа"],
            &["18-Nov-2024", "по счету 5"],
            &["19-Nov-2024", "доплата по счету 5"],
        ]);

        let map = decode_rows(&data, &StatementLayout::default()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&5).map(String::as_str), Some("19-Nov-2024"));
    }

    #[test]
    fn test_missing_column() {
        let data = rows(&[&["Дата", "Назначение платежа"], &["1", "по счету 5"]]);

        let err = decode_rows(&data, &StatementLayout::default()).unwrap_err();
        assert!(matches!(err, Error::MissingExpectedColumn(ref c) if c == "Дата проводки"));

        let data = rows(&[&["Дата проводки", "Назначение"]]);
        let err = decode_rows(&data, &StatementLayout::default()).unwrap_err();
        assert!(matches!(err, Error::MissingExpectedColumn(ref c) if c == "Назначение платежа"));
    }

    #[test]
    fn test_decode_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statement.csv");
        fs::write(
            &path,
            "Дата проводки,Назначение платежа\n18-Nov-2024,\"Оплата по счету № 1095, без НДС\"\n",
        )
        .unwrap();

        let map = decode_statement(&path, &StatementLayout::default()).unwrap();
        assert_eq!(map.get(&1095).map(String::as_str), Some("18-Nov-2024"));
    }

    #[test]
    fn test_unsupported_file_type() {
        let err = decode_statement("statement.pdf", &StatementLayout::default()).unwrap_err();
        assert!(matches!(err, Error::UnreadableFile { .. }));
    }

    #[test]
    fn test_corrupt_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statement.xlsx");
        fs::write(&path, "not a workbook").unwrap();

        let err = decode_statement(&path, &StatementLayout::default()).unwrap_err();
        assert!(matches!(err, Error::UnreadableFile { .. }));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("abc".to_string())), "abc");
        assert_eq!(cell_text(&Data::Float(1504.0)), "1504");
        assert_eq!(cell_text(&Data::Int(7)), "7");
    }
}
