// 💾 Batch Loader
// Writes transactions in fixed-size batches, strictly one after another.
// The first failing batch stops the load; earlier batches stay committed.

use crate::config::DEFAULT_BATCH_SIZE;
use crate::db::{RecordStore, Transaction};
use crate::error::MigrateError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub inserted: usize,
    pub batches: usize,
}

#[derive(Debug, Clone)]
pub struct BatchLoader {
    batch_size: usize,
}

impl BatchLoader {
    /// A zero batch size is treated as 1
    pub fn new(batch_size: usize) -> Self {
        BatchLoader {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn load<S: RecordStore + ?Sized>(
        &self,
        store: &mut S,
        transactions: &[Transaction],
    ) -> Result<LoadReport, MigrateError> {
        let mut report = LoadReport::default();
        let total = transactions.len();

        for (index, batch) in transactions.chunks(self.batch_size).enumerate() {
            let batch_number = index + 1;

            if let Err(e) = store.insert_transactions(batch) {
                log::error!(
                    "batch {} failed ({} of {} inserted): {:#}",
                    batch_number,
                    report.inserted,
                    total,
                    e
                );
                return Err(MigrateError::BatchWrite {
                    batch: batch_number,
                    inserted: report.inserted,
                    reason: format!("{:#}", e),
                });
            }

            report.inserted += batch.len();
            report.batches = batch_number;
            log::info!("inserted {}/{}", report.inserted, total);
        }

        Ok(report)
    }
}

impl Default for BatchLoader {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Category, CategoryType, Identity};
    use anyhow::{bail, Result};
    use chrono::NaiveDate;

    /// Records batch sizes; fails the batch with the given 1-based number
    struct CountingStore {
        calls: Vec<usize>,
        fail_on: Option<usize>,
    }

    impl CountingStore {
        fn new(fail_on: Option<usize>) -> Self {
            CountingStore {
                calls: Vec::new(),
                fail_on,
            }
        }
    }

    impl RecordStore for CountingStore {
        fn list_identities(&self) -> Result<Vec<Identity>> {
            Ok(Vec::new())
        }

        fn load_categories(&self) -> Result<Vec<Category>> {
            Ok(Vec::new())
        }

        fn insert_transactions(&mut self, batch: &[Transaction]) -> Result<()> {
            self.calls.push(batch.len());
            if self.fail_on == Some(self.calls.len()) {
                bail!("constraint violation");
            }
            Ok(())
        }
    }

    fn transactions(n: usize) -> Vec<Transaction> {
        (0..n)
            .map(|i| Transaction {
                id: format!("t{}", i),
                user_id: "u1".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                transaction_type: CategoryType::Expense,
                category_id: "c1".to_string(),
                currency: "TRY".to_string(),
                original_amount: 1.0,
                exchange_rate: 40.0,
                converted_amount: 40,
                content: "row".to_string(),
                memo: None,
            })
            .collect()
    }

    #[test]
    fn test_splits_into_batches_in_order() {
        let mut store = CountingStore::new(None);
        let report = BatchLoader::new(100).load(&mut store, &transactions(250)).unwrap();

        assert_eq!(store.calls, vec![100, 100, 50]);
        assert_eq!(report, LoadReport { inserted: 250, batches: 3 });
    }

    #[test]
    fn test_failure_stops_and_reports_progress() {
        let mut store = CountingStore::new(Some(2));
        let err = BatchLoader::new(100)
            .load(&mut store, &transactions(250))
            .unwrap_err();

        // Third batch never attempted
        assert_eq!(store.calls, vec![100, 100]);
        assert_eq!(err.inserted(), 100);
        match err {
            MigrateError::BatchWrite { batch, reason, .. } => {
                assert_eq!(batch, 2);
                assert!(reason.contains("constraint violation"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_input_makes_no_calls() {
        let mut store = CountingStore::new(Some(1));
        let report = BatchLoader::default().load(&mut store, &[]).unwrap();

        assert!(store.calls.is_empty());
        assert_eq!(report.inserted, 0);
    }

    #[test]
    fn test_exact_multiple_and_zero_size() {
        let mut store = CountingStore::new(None);
        BatchLoader::new(100).load(&mut store, &transactions(200)).unwrap();
        assert_eq!(store.calls, vec![100, 100]);

        assert_eq!(BatchLoader::new(0).batch_size(), 1);
    }
}
