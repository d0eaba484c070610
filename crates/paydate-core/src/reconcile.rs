//! Merge engine filling blank payment dates from a statement

use crate::error::Result;
use crate::identifier::{extract_identifier, Identifier};
use crate::table::{CellValue, Grid, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Invoice identifier -> payment date, as decoded from a statement
pub type IdentifierMap = BTreeMap<Identifier, String>;

/// Insertion-ordered identifier -> date entries with unique identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedEntries {
    entries: Vec<(Identifier, String)>,
}

impl ClassifiedEntries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced entry keeps its original position
    pub fn insert(&mut self, id: Identifier, date: impl Into<String>) {
        let date = date.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = date,
            None => self.entries.push((id, date)),
        }
    }

    pub fn remove(&mut self, id: Identifier) -> Option<String> {
        let position = self.entries.iter().position(|(existing, _)| *existing == id)?;
        Some(self.entries.remove(position).1)
    }

    pub fn get(&self, id: Identifier) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, date)| date.as_str())
    }

    pub fn contains(&self, id: Identifier) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Identifier, &str)> {
        self.entries.iter().map(|(id, date)| (*id, date.as_str()))
    }
}

/// Outcome of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Identifiers whose date was written by this run
    pub filled: ClassifiedEntries,
    /// Identifiers whose row already held a date, with that existing date
    pub conflicting: ClassifiedEntries,
}

impl Classification {
    /// Statement identifiers that matched no usable row
    pub fn unresolved<'a>(&'a self, map: &'a IdentifierMap) -> impl Iterator<Item = Identifier> + 'a {
        map.keys()
            .copied()
            .filter(move |id| !self.filled.contains(*id) && !self.conflicting.contains(*id))
    }
}

/// Whether a row carries a usable identifier cell
pub(crate) fn is_complete(row: &Row, span: usize) -> bool {
    row.len() > span && row.last().is_some_and(|cell| !cell.is_empty())
}

/// Identifier of every row, None for rows that are skipped
fn row_identifiers(grid: &Grid, span: usize) -> Result<Vec<Option<Identifier>>> {
    grid.iter()
        .enumerate()
        .map(|(row_idx, row)| {
            if row.is_empty() {
                tracing::debug!(row = row_idx + 2, "skipping row without data");
                return Ok(None);
            }
            if !is_complete(row, span) {
                tracing::debug!(row = row_idx + 2, "skipping row with insufficient data");
                return Ok(None);
            }
            match row.last() {
                Some(cell) => extract_identifier(cell.as_str()).map(Some),
                None => Ok(None),
            }
        })
        .collect()
}

/// Fill blank first cells of `grid` from `map`, in place.
///
/// Each row's identifier is extracted from its last cell. A row whose first
/// cell is empty receives the statement date; a row that already holds a date
/// keeps it and is reported as conflicting. Rows with no cells, with no more
/// than `span` cells, or with an empty last cell are left untouched.
///
/// Identifiers of all rows are extracted before any cell is written, so an
/// error leaves `grid` unchanged.
pub fn reconcile(map: &IdentifierMap, grid: &mut Grid, span: usize) -> Result<Classification> {
    let row_ids = row_identifiers(grid, span)?;
    let mut classification = Classification::default();

    for (row, id) in grid.iter_mut().zip(row_ids) {
        let Some(id) = id else {
            continue;
        };
        let Some(date) = map.get(&id) else {
            continue;
        };

        match row.cells.first() {
            Some(CellValue::Empty) => {
                row.cells[0] = CellValue::from(date.as_str());
                classification.conflicting.remove(id);
                classification.filled.insert(id, date.as_str());
            }
            Some(CellValue::Text(existing)) => {
                if !classification.filled.contains(id) {
                    classification.conflicting.insert(id, existing.as_str());
                }
            }
            None => {}
        }
    }

    Ok(classification)
}
