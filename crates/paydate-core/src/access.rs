//! Allow-list of chat users, read from a second tabular source
//!
//! The access table has the same shape as the orders table: a header row,
//! then rows bounded by two header-resolved columns (chat id, user name).
//! [`AccessListCache`] keeps the current list as an immutable snapshot that
//! a background task swaps out on every refresh.

use crate::error::{Error, Result};
use crate::identifier::Identifier;
use crate::reconcile::is_complete;
use crate::service::establish_working_range;
use crate::store::TabularStore;
use crate::table::{CellValue, Grid, Row, TabularSource};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Chat id -> user name
pub type AccessList = BTreeMap<Identifier, String>;

/// Read the allow-list from the working range of the access table.
///
/// Rows are skipped under the same rules as reconciliation; the first cell
/// must hold the chat id as a plain integer.
pub fn load_access_list(grid: &Grid, span: usize) -> Result<AccessList> {
    let mut list = AccessList::new();

    for row in grid.iter().filter(|row| is_complete(row, span)) {
        let (Some(id_cell), Some(label)) = (row.first(), row.last()) else {
            continue;
        };
        let id = id_cell
            .as_str()
            .parse::<Identifier>()
            .map_err(|_| Error::InvalidIdentifier(id_cell.as_str().to_string()))?;
        list.insert(id, label.as_str().to_string());
    }

    Ok(list)
}

/// Append `(id, label)` unless a row's id cell already reads `id`.
///
/// The new row is `span + 1` cells wide: the id in the first cell, the label
/// in the last, empty cells between. Returns the grid and whether a row was
/// added.
pub fn add_if_absent(id: Identifier, label: &str, mut grid: Grid, span: usize) -> (Grid, bool) {
    let id_text = id.to_string();
    let present = grid
        .iter()
        .any(|row| row.first().is_some_and(|cell| cell.as_str() == id_text));

    if present {
        return (grid, false);
    }

    let mut cells = vec![CellValue::Empty; span + 1];
    cells[span] = CellValue::from(label);
    // with a zero span the single cell holds the id
    cells[0] = CellValue::from(id_text);
    grid.push(Row { cells });
    (grid, true)
}

/// The access table on a concrete store
pub struct AccessTable {
    store: Arc<dyn TabularStore>,
    source: TabularSource,
}

impl AccessTable {
    pub fn new(store: Arc<dyn TabularStore>, source: TabularSource) -> Self {
        Self { store, source }
    }

    pub fn source(&self) -> &TabularSource {
        &self.source
    }

    /// Fetch and parse the current allow-list
    pub fn load(&self) -> Result<AccessList> {
        let range = establish_working_range(self.store.as_ref(), &self.source)?;
        let grid = self.store.fetch(&self.source.store_id, &range.range)?;
        load_access_list(&grid, range.width())
    }

    /// Add a user to the table if their chat id is not there yet.
    ///
    /// Callers reload the list afterwards to see the new entry.
    pub fn add_user(&self, id: Identifier, label: &str) -> Result<bool> {
        let range = establish_working_range(self.store.as_ref(), &self.source)?;
        let grid = self.store.fetch(&self.source.store_id, &range.range)?;

        let (grid, added) = add_if_absent(id, label, grid, range.width());
        if added {
            self.store.write(&self.source.store_id, &range.range, &grid)?;
            tracing::info!(chat_id = id, user = label, "added user to access table");
        } else {
            tracing::debug!(chat_id = id, "user already in access table");
        }
        Ok(added)
    }
}

/// One complete, immutable version of the allow-list
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccessSnapshot {
    pub entries: AccessList,
    /// None until the first successful load
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl AccessSnapshot {
    pub fn is_allowed(&self, id: Identifier) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn label(&self, id: Identifier) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }
}

/// Shared allow-list; readers always see a whole snapshot
#[derive(Debug, Default)]
pub struct AccessListCache {
    current: ArcSwap<AccessSnapshot>,
}

impl AccessListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot in effect right now
    pub fn snapshot(&self) -> Arc<AccessSnapshot> {
        self.current.load_full()
    }

    pub fn is_allowed(&self, id: Identifier) -> bool {
        self.current.load().is_allowed(id)
    }

    /// Swap in a freshly loaded list
    pub fn replace(&self, entries: AccessList) {
        let count = entries.len();
        self.current.store(Arc::new(AccessSnapshot {
            entries,
            refreshed_at: Some(Utc::now()),
        }));
        tracing::info!(entries = count, "access list updated");
    }

    /// Reload from the table; on failure the previous snapshot stays
    pub fn refresh(&self, table: &AccessTable) -> Result<()> {
        let entries = table.load()?;
        self.replace(entries);
        Ok(())
    }

    /// Refresh every `period`, starting immediately
    pub fn spawn_refresh(
        self: &Arc<Self>,
        table: Arc<AccessTable>,
        period: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let table = Arc::clone(&table);
                match tokio::task::spawn_blocking(move || table.load()).await {
                    Ok(Ok(entries)) => cache.replace(entries),
                    Ok(Err(e)) => tracing::warn!(error = %e, "access list refresh failed"),
                    Err(e) => tracing::warn!(error = %e, "access list refresh task panicked"),
                }
            }
        })
    }
}
