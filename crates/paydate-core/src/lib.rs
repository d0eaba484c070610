//! paydate-core: Core library for reconciling payment dates
//!
//! This library provides functionality to:
//! - Locate data columns in a tabular source by header text
//! - Extract invoice identifiers from free-text cells
//! - Fill blank payment dates from a bank statement and report conflicts
//! - Load and extend the chat allow-list kept in a second tabular source
//! - Decode bank statements (xlsx/xls/ods/csv)

pub mod access;
pub mod columns;
pub mod config;
pub mod error;
pub mod identifier;
pub mod reconcile;
pub mod report;
pub mod service;
pub mod statement;
pub mod store;
pub mod table;

pub use access::{add_if_absent, load_access_list, AccessList, AccessListCache, AccessSnapshot, AccessTable};
pub use columns::{column_letters, compute_range, resolve_columns, ResolvedColumns, WorkingRange};
pub use config::{AppConfig, SourceConfig};
pub use error::{Error, Result};
pub use identifier::{extract_identifier, Identifier};
pub use reconcile::{reconcile, Classification, ClassifiedEntries, IdentifierMap};
pub use report::build_report;
pub use service::{establish_working_range, PaymentDates, ReconcileOutcome};
pub use statement::{decode_statement, StatementLayout};
pub use store::{CsvStore, MemoryStore, TabularStore};
pub use table::{CellValue, Grid, HeaderSpec, Row, TabularSource};
