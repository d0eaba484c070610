//! Store-backed operations: fetch, merge, write back

use crate::columns::{compute_range, resolve_columns, WorkingRange};
use crate::error::Result;
use crate::reconcile::{reconcile, Classification, IdentifierMap};
use crate::report::build_report;
use crate::store::TabularStore;
use crate::table::TabularSource;
use serde::Serialize;
use std::sync::Arc;

/// Resolve the working range of `source` from its current header row.
///
/// Fails before anything else is read when a header is missing or the
/// columns are out of order.
pub fn establish_working_range(store: &dyn TabularStore, source: &TabularSource) -> Result<WorkingRange> {
    let discovery = store.fetch(&source.store_id, &source.discovery_range)?;
    let header_row = discovery.first().map(|row| row.cells.as_slice()).unwrap_or_default();

    let columns = resolve_columns(header_row, &source.headers);
    columns.require(&source.headers, &source.sheet)?;

    let range = compute_range(&source.sheet_prefix(), columns.first, columns.last).validate()?;
    tracing::debug!(
        store = %source.store_id,
        range = %range.range,
        span = range.span,
        "resolved working range"
    );
    Ok(range)
}

/// Result of reconciling one statement
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    /// Range that was read and written
    pub range: String,
    pub classification: Classification,
    /// Statement identifiers that matched no row
    pub unresolved: Vec<i64>,
    pub report: String,
}

/// The orders table whose payment dates are kept up to date
pub struct PaymentDates {
    store: Arc<dyn TabularStore>,
    source: TabularSource,
}

impl PaymentDates {
    pub fn new(store: Arc<dyn TabularStore>, source: TabularSource) -> Self {
        Self { store, source }
    }

    pub fn source(&self) -> &TabularSource {
        &self.source
    }

    pub fn working_range(&self) -> Result<WorkingRange> {
        establish_working_range(self.store.as_ref(), &self.source)
    }

    /// Fill blank payment dates from a decoded statement and write them back.
    ///
    /// Nothing is written if any step before the write fails.
    pub fn reconcile_statement(&self, statement: &IdentifierMap) -> Result<ReconcileOutcome> {
        let range = self.working_range()?;
        let mut grid = self.store.fetch(&self.source.store_id, &range.range)?;

        let classification = reconcile(statement, &mut grid, range.width())?;

        if grid.is_empty() {
            tracing::info!(range = %range.range, "no rows in orders table");
        } else {
            self.store.write(&self.source.store_id, &range.range, &grid)?;
        }

        tracing::info!(
            range = %range.range,
            filled = classification.filled.len(),
            conflicting = classification.conflicting.len(),
            "reconciled statement"
        );

        let unresolved = classification.unresolved(statement).collect();
        let report = build_report(&classification);
        Ok(ReconcileOutcome {
            range: range.range,
            classification,
            unresolved,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::MemoryStore;
    use crate::table::HeaderSpec;

    fn orders_source() -> TabularSource {
        TabularSource::new("orders", "Заказы", HeaderSpec::new("Дата оплаты", "№ счета"))
    }

    fn orders_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert_sheet(
            "orders",
            "Заказы",
            vec![
                vec!["Клиент", "Дата оплаты", "Сумма", "№ счета", "Комментарий"],
                vec!["ООО Ромашка", "", "1000", "1504", ""],
                vec!["ИП Иванов", "18-Nov-2024", "2500", "1095", "срочно"],
                vec!["", "", "", "", ""],
                vec!["АО Вектор", "", "700", "Счет №1519", ""],
                vec!["Без счета", "", "100", "", ""],
            ],
        );
        store
    }

    fn statement() -> IdentifierMap {
        IdentifierMap::from([
            (1504, "19-Nov-2024".to_string()),
            (1095, "18-Nov-2024".to_string()),
            (1519, "18-Nov-2024".to_string()),
            (2000, "20-Nov-2024".to_string()),
        ])
    }

    #[test]
    fn test_working_range() {
        let payments = PaymentDates::new(orders_store(), orders_source());

        let range = payments.working_range().unwrap();
        assert_eq!(range.range, "Заказы!B2:D");
        assert_eq!(range.span, 2);
    }

    #[test]
    fn test_reconcile_statement_writes_back() {
        let store = orders_store();
        let payments = PaymentDates::new(Arc::clone(&store) as Arc<dyn TabularStore>, orders_source());

        let outcome = payments.reconcile_statement(&statement()).unwrap();

        assert_eq!(outcome.range, "Заказы!B2:D");
        assert_eq!(outcome.classification.filled.len(), 2);
        assert_eq!(outcome.classification.conflicting.get(1095), Some("18-Nov-2024"));
        assert_eq!(outcome.unresolved, vec![2000]);
        assert!(outcome.report.contains("Invoice: 1504 Date: 19-Nov-2024\n"));

        let sheet = store.sheet("orders", "Заказы").unwrap();
        assert_eq!(sheet[1][1], "19-Nov-2024");
        assert_eq!(sheet[4][1], "18-Nov-2024");
        assert_eq!(sheet[4][3], "Счет №1519");
        assert_eq!(sheet[2][4], "срочно");
        assert_eq!(sheet[5][1], "");
    }

    #[test]
    fn test_second_run_reports_conflicts() {
        let payments = PaymentDates::new(orders_store(), orders_source());

        payments.reconcile_statement(&statement()).unwrap();
        let outcome = payments.reconcile_statement(&statement()).unwrap();

        assert!(outcome.classification.filled.is_empty());
        assert_eq!(outcome.classification.conflicting.len(), 3);
        assert!(outcome.report.starts_with(crate::report::NOTHING_FILLED));
    }

    #[test]
    fn test_missing_header_aborts_before_write() {
        let store = Arc::new(MemoryStore::new());
        let rows = vec![vec!["Дата", "№ счета"], vec!["", "1504"]];
        store.insert_sheet("orders", "Заказы", rows.clone());
        let payments = PaymentDates::new(Arc::clone(&store) as Arc<dyn TabularStore>, orders_source());

        let err = payments.reconcile_statement(&statement()).unwrap_err();

        assert!(matches!(err, Error::ColumnNotFound { ref header, .. } if header == "Дата оплаты"));
        assert_eq!(store.sheet("orders", "Заказы").unwrap()[1], vec!["", "1504"]);
    }

    #[test]
    fn test_reversed_headers_rejected() {
        let store = Arc::new(MemoryStore::new());
        store.insert_sheet("orders", "Заказы", vec![vec!["№ счета", "Дата оплаты"], vec!["1504", ""]]);
        let payments = PaymentDates::new(store, orders_source());

        assert!(matches!(
            payments.reconcile_statement(&statement()),
            Err(Error::RangeInvalid { .. })
        ));
    }

    #[test]
    fn test_bad_identifier_leaves_store_unmodified() {
        let store = Arc::new(MemoryStore::new());
        store.insert_sheet(
            "orders",
            "Заказы",
            vec![vec!["Дата оплаты", "№ счета"], vec!["", "1504"], vec!["", "нет номера"]],
        );
        let payments = PaymentDates::new(Arc::clone(&store) as Arc<dyn TabularStore>, orders_source());

        assert!(matches!(
            payments.reconcile_statement(&statement()),
            Err(Error::NoIdentifierFound(_))
        ));
        assert_eq!(store.sheet("orders", "Заказы").unwrap()[1][0], "");
    }

    #[test]
    fn test_write_rejection_propagates() {
        let store = orders_store();
        store.set_read_only(true);
        let payments = PaymentDates::new(store, orders_source());

        assert!(matches!(
            payments.reconcile_statement(&statement()),
            Err(Error::WriteRejected { .. })
        ));
    }

    #[test]
    fn test_unavailable_source() {
        let payments = PaymentDates::new(Arc::new(MemoryStore::new()), orders_source());

        assert!(matches!(
            payments.working_range(),
            Err(Error::SourceUnavailable { .. })
        ));
    }
}
