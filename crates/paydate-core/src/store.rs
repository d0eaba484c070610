//! Tabular store abstraction and local implementations
//!
//! A store holds named sheets addressed with A1 ranges ("Orders!B2:D").
//! Reads behave like a spreadsheet values API: trailing empty cells of each
//! row and trailing empty rows are dropped, so an incomplete row comes back
//! shorter than the range is wide.

use crate::columns::{column_index, column_letters};
use crate::error::{Error, Result};
use crate::table::{Grid, Row};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Read/write access to a remote grid
pub trait TabularStore: Send + Sync {
    /// Read the cells of `range` from store `store_id`
    fn fetch(&self, store_id: &str, range: &str) -> Result<Grid>;

    /// Write `grid` starting at the top-left cell of `range`
    fn write(&self, store_id: &str, range: &str, grid: &Grid) -> Result<()>;
}

/// A parsed A1 range; all positions are 1-based
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A1Range {
    pub sheet: String,
    pub first_col: usize,
    pub first_row: usize,
    pub last_col: usize,
    /// None when the range is open-ended downwards ("B2:D")
    pub last_row: Option<usize>,
}

impl A1Range {
    /// Parse "Sheet!B2:D10", "Sheet!B2:D" or "Sheet!A:C"
    pub fn parse(range: &str) -> Result<Self> {
        let invalid = |message: &str| Error::RangeInvalid {
            range: range.to_string(),
            message: message.to_string(),
        };

        let (sheet, cells) = range
            .rsplit_once('!')
            .ok_or_else(|| invalid("missing sheet name"))?;
        if sheet.is_empty() {
            return Err(invalid("missing sheet name"));
        }

        let (start, end) = cells
            .split_once(':')
            .ok_or_else(|| invalid("expected a START:END range"))?;

        let (first_col, first_row) =
            split_cell(start).ok_or_else(|| invalid("malformed start cell"))?;
        let (last_col, last_row) = split_cell(end).ok_or_else(|| invalid("malformed end cell"))?;

        let first_row = first_row.unwrap_or(1);
        if last_col < first_col || last_row.is_some_and(|row| row < first_row) {
            return Err(invalid("end precedes start"));
        }

        Ok(Self {
            sheet: sheet.to_string(),
            first_col,
            first_row,
            last_col,
            last_row,
        })
    }

    /// Number of columns covered
    pub fn width(&self) -> usize {
        self.last_col - self.first_col + 1
    }

    /// Extract the range from a whole sheet
    pub fn clip(&self, sheet: &[Vec<String>]) -> Grid {
        let start = self.first_row - 1;
        let end = self.last_row.map_or(sheet.len(), |row| row.min(sheet.len()));

        let mut grid: Grid = sheet
            .get(start..end.max(start))
            .unwrap_or_default()
            .iter()
            .map(|cells| {
                let mut texts: Vec<&str> = cells
                    .iter()
                    .skip(self.first_col - 1)
                    .take(self.width())
                    .map(String::as_str)
                    .collect();
                while texts.last().is_some_and(|t| t.is_empty()) {
                    texts.pop();
                }
                Row::from_texts(texts)
            })
            .collect();

        while grid.last().is_some_and(Row::is_empty) {
            grid.pop();
        }
        grid
    }

    /// Place `grid` into a whole sheet, growing it as needed
    pub fn apply(&self, sheet: &mut Vec<Vec<String>>, grid: &Grid) -> Result<()> {
        let rejected = |message: String| Error::WriteRejected {
            range: self.to_string(),
            message,
        };

        if let Some(last_row) = self.last_row {
            let capacity = last_row - self.first_row + 1;
            if grid.len() > capacity {
                return Err(rejected(format!(
                    "{} rows do not fit in {} rows",
                    grid.len(),
                    capacity
                )));
            }
        }
        if let Some(row) = grid.iter().find(|row| row.len() > self.width()) {
            return Err(rejected(format!(
                "row of {} cells does not fit in {} columns",
                row.len(),
                self.width()
            )));
        }

        for (offset, row) in grid.iter().enumerate() {
            let row_idx = self.first_row - 1 + offset;
            if sheet.len() <= row_idx {
                sheet.resize_with(row_idx + 1, Vec::new);
            }
            let target = &mut sheet[row_idx];
            for (col_offset, cell) in row.cells.iter().enumerate() {
                let col_idx = self.first_col - 1 + col_offset;
                if target.len() <= col_idx {
                    target.resize(col_idx + 1, String::new());
                }
                target[col_idx] = cell.as_str().to_string();
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for A1Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}!{}{}:{}",
            self.sheet,
            column_letters(self.first_col),
            self.first_row,
            column_letters(self.last_col)
        )?;
        if let Some(row) = self.last_row {
            write!(f, "{}", row)?;
        }
        Ok(())
    }
}

/// Split "B12" into (2, Some(12)) and "FG" into (163, None)
fn split_cell(cell: &str) -> Option<(usize, Option<usize>)> {
    let digits_at = cell.find(|c: char| c.is_ascii_digit()).unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(digits_at);
    let col = column_index(letters)?;
    let row = if digits.is_empty() {
        None
    } else {
        Some(digits.parse::<usize>().ok().filter(|row| *row > 0)?)
    };
    Some((col, row))
}

/// In-process store, mainly for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    stores: Mutex<HashMap<String, HashMap<String, Vec<Vec<String>>>>>,
    read_only: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a whole sheet; row 1 is the header row
    pub fn insert_sheet<R, S>(&self, store_id: &str, sheet: &str, rows: R)
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        if let Ok(mut stores) = self.stores.lock() {
            stores
                .entry(store_id.to_string())
                .or_default()
                .insert(sheet.to_string(), rows);
        }
    }

    /// Current content of a sheet
    pub fn sheet(&self, store_id: &str, sheet: &str) -> Option<Vec<Vec<String>>> {
        let stores = self.stores.lock().ok()?;
        stores.get(store_id)?.get(sheet).cloned()
    }

    /// Make every subsequent write fail with `WriteRejected`
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn with_sheet<T>(
        &self,
        store_id: &str,
        range: &A1Range,
        f: impl FnOnce(&mut Vec<Vec<String>>) -> Result<T>,
    ) -> Result<T> {
        let mut stores = self.stores.lock().map_err(|_| Error::SourceUnavailable {
            source_id: store_id.to_string(),
            message: "store lock poisoned".to_string(),
        })?;
        let sheets = stores
            .get_mut(store_id)
            .ok_or_else(|| Error::SourceUnavailable {
                source_id: store_id.to_string(),
                message: "no such store".to_string(),
            })?;
        let sheet = sheets
            .get_mut(&range.sheet)
            .ok_or_else(|| Error::RangeInvalid {
                range: range.sheet.clone(),
                message: "no such sheet".to_string(),
            })?;
        f(sheet)
    }
}

impl TabularStore for MemoryStore {
    fn fetch(&self, store_id: &str, range: &str) -> Result<Grid> {
        let range = A1Range::parse(range)?;
        self.with_sheet(store_id, &range, |sheet| Ok(range.clip(sheet)))
    }

    fn write(&self, store_id: &str, range: &str, grid: &Grid) -> Result<()> {
        let parsed = A1Range::parse(range)?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(Error::WriteRejected {
                range: range.to_string(),
                message: "store is read-only".to_string(),
            });
        }
        self.with_sheet(store_id, &parsed, |sheet| parsed.apply(sheet, grid))
    }
}

/// File-backed store: `<root>/<store_id>/<sheet>.csv`, row 1 is the header row
#[derive(Debug, Clone)]
pub struct CsvStore {
    root: PathBuf,
}

impl CsvStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sheet_path(&self, store_id: &str, sheet: &str) -> Result<PathBuf> {
        let store_dir = self.root.join(store_id);
        if !store_dir.is_dir() {
            return Err(Error::SourceUnavailable {
                source_id: store_id.to_string(),
                message: format!("directory '{}' does not exist", store_dir.display()),
            });
        }
        let path = store_dir.join(format!("{}.csv", sheet));
        if !path.is_file() {
            return Err(Error::RangeInvalid {
                range: sheet.to_string(),
                message: format!("sheet file '{}' does not exist", path.display()),
            });
        }
        Ok(path)
    }

    fn read_sheet(path: &Path) -> Result<Vec<Vec<String>>> {
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

    fn write_sheet(path: &Path, rows: &[Vec<String>]) -> Result<()> {
        let tmp = path.with_extension("csv.tmp");
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&tmp)
            .map_err(|e| Error::Csv {
                path: tmp.clone(),
                source: e,
            })?;
        for row in rows {
            writer.write_record(row).map_err(|e| Error::Csv {
                path: tmp.clone(),
                source: e,
            })?;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl TabularStore for CsvStore {
    fn fetch(&self, store_id: &str, range: &str) -> Result<Grid> {
        let range = A1Range::parse(range)?;
        let path = self.sheet_path(store_id, &range.sheet)?;
        let sheet = Self::read_sheet(&path)?;
        Ok(range.clip(&sheet))
    }

    fn write(&self, store_id: &str, range: &str, grid: &Grid) -> Result<()> {
        let parsed = A1Range::parse(range)?;
        let path = self.sheet_path(store_id, &parsed.sheet)?;
        let mut sheet = Self::read_sheet(&path)?;
        parsed.apply(&mut sheet, grid)?;
        Self::write_sheet(&path, &sheet)?;
        tracing::debug!(path = %path.display(), range, rows = grid.len(), "wrote sheet");
        Ok(())
    }
}
