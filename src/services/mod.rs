pub mod backfill;
pub mod dispute;
pub mod matcher;
pub mod notify;
pub mod reconcile;
pub mod release;
pub mod settlement;
pub mod wallet;
pub mod withdrawal;

use serde::Serialize;

/// Aggregate result of one batch run (release sweep, reconciliation sweep,
/// backfill). One item's failure never aborts the run; it lands in `errors`
/// with a detail line and the job moves on.
#[derive(Debug, Default, Clone, Serialize)]
pub struct JobReport {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub details: Vec<String>,
}

impl JobReport {
    pub fn record_processed(&mut self, detail: String) {
        self.total += 1;
        self.processed += 1;
        self.details.push(detail);
    }

    pub fn record_skipped(&mut self, detail: String) {
        self.total += 1;
        self.skipped += 1;
        self.details.push(detail);
    }

    pub fn record_error(&mut self, detail: String) {
        self.total += 1;
        self.errors += 1;
        self.details.push(detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_add_up() {
        let mut report = JobReport::default();
        report.record_processed("released entry a".to_string());
        report.record_skipped("entry b already released".to_string());
        report.record_error("entry c: wallet missing".to_string());

        assert_eq!(report.total, 3);
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(report.details.len(), 3);
    }
}
