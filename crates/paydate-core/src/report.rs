//! Human-readable summary of a reconciliation run

use crate::reconcile::{Classification, ClassifiedEntries};

pub const FILLED_HEADER: &str = "The following dates were entered into the table:";
pub const NOTHING_FILLED: &str = "No unfilled dates were found for this statement.";
pub const CONFLICTING_HEADER: &str = "Dates for these invoices were already filled:";

/// Render the classification as two sections, entries in the order the
/// reconciler produced them.
pub fn build_report(classification: &Classification) -> String {
    let mut report = String::new();

    if classification.filled.is_empty() {
        report.push_str(NOTHING_FILLED);
        report.push('\n');
    } else {
        push_section(&mut report, FILLED_HEADER, &classification.filled);
    }

    if !classification.conflicting.is_empty() {
        push_section(&mut report, CONFLICTING_HEADER, &classification.conflicting);
    }

    report
}

fn push_section(report: &mut String, header: &str, entries: &ClassifiedEntries) {
    report.push_str(header);
    report.push('\n');
    for (id, date) in entries.iter() {
        report.push_str(&format!("Invoice: {} Date: {}\n", id, date));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification(filled: &[(i64, &str)], conflicting: &[(i64, &str)]) -> Classification {
        let mut result = Classification::default();
        for (id, date) in filled {
            result.filled.insert(*id, *date);
        }
        for (id, date) in conflicting {
            result.conflicting.insert(*id, *date);
        }
        result
    }

    #[test]
    fn test_report_both_sections() {
        let result = classification(
            &[(1504, "19-Nov-2024"), (1519, "18-Nov-2024")],
            &[(1095, "18-Nov-2024")],
        );

        let expected = "The following dates were entered into the table:\n\
                        Invoice: 1504 Date: 19-Nov-2024\n\
                        Invoice: 1519 Date: 18-Nov-2024\n\
                        Dates for these invoices were already filled:\n\
                        Invoice: 1095 Date: 18-Nov-2024\n";
        assert_eq!(build_report(&result), expected);
    }

    #[test]
    fn test_report_nothing_filled() {
        let result = classification(&[], &[(1095, "18-Nov-2024")]);

        let report = build_report(&result);
        assert!(report.starts_with(NOTHING_FILLED));
        assert!(report.contains("Invoice: 1095 Date: 18-Nov-2024\n"));
    }

    #[test]
    fn test_report_empty_classification() {
        let report = build_report(&Classification::default());
        assert_eq!(report, format!("{}\n", NOTHING_FILLED));
    }

    #[test]
    fn test_report_keeps_row_order() {
        let result = classification(&[(9000, "a"), (12, "b")], &[]);

        let report = build_report(&result);
        let first = report.find("Invoice: 9000").unwrap();
        let second = report.find("Invoice: 12 ").unwrap();
        assert!(first < second);
        assert!(!report.contains(CONFLICTING_HEADER));
    }
}
