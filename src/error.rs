// ❌ Fatal error tiers
// Setup failures abort before any row is processed, write failures abort the load.
// Per-row and per-fetch failures are NOT errors here: they are values
// (SkipRecord, Fetched) handled by the caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrateError {
    /// Store location not configured or not found
    #[error("record store not available: {0}")]
    MissingStore(String),

    #[error("no identities registered in the record store")]
    NoIdentities,

    #[error("identity '{0}' not found")]
    IdentityNotFound(String),

    /// Batch `batch` (1-based) failed; `inserted` rows were written before it
    #[error("batch {batch} failed after {inserted} rows inserted: {reason}")]
    BatchWrite {
        batch: usize,
        inserted: usize,
        reason: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MigrateError {
    /// Rows persisted before the run stopped (only non-zero for write failures)
    pub fn inserted(&self) -> usize {
        match self {
            MigrateError::BatchWrite { inserted, .. } => *inserted,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_write_message_reports_progress() {
        let err = MigrateError::BatchWrite {
            batch: 2,
            inserted: 100,
            reason: "disk full".to_string(),
        };

        assert_eq!(err.inserted(), 100);
        assert_eq!(
            err.to_string(),
            "batch 2 failed after 100 rows inserted: disk full"
        );
    }

    #[test]
    fn test_setup_errors_report_zero_inserted() {
        assert_eq!(MigrateError::NoIdentities.inserted(), 0);
        assert_eq!(
            MigrateError::IdentityNotFound("a@b.c".to_string()).to_string(),
            "identity 'a@b.c' not found"
        );
    }
}
