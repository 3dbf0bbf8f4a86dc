// 🚚 Migration Run
// identity → categories → rate collection → transform → (insert mode) batch load
//
// Everything up to the load is shared by both modes; preview stops there
// and never touches the store's write path.

use crate::config::MigrationConfig;
use crate::db::{RecordStore, Transaction};
use crate::entities::{select_identity, CategoryTable, Identity};
use crate::error::MigrateError;
use crate::fetcher::{Pacer, RateFetcher, RateSource};
use crate::loader::BatchLoader;
use crate::parser::RawRecord;
use crate::resolver::{collect_rates, RatePlan};
use crate::transformer::{parse_date, RecordTransformer, SkipRecord};
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Full pipeline, zero writes
    Preview,
    Insert,
}

impl RunMode {
    pub fn from_flag(insert: bool) -> Self {
        if insert {
            RunMode::Insert
        } else {
            RunMode::Preview
        }
    }
}

/// Everything a run computed, plus what it wrote
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: RunMode,
    pub identity: Identity,
    pub rows_read: usize,
    pub transactions: Vec<Transaction>,
    pub skipped: Vec<SkipRecord>,
    pub fallback_categories: usize,
    pub zero_rate_rows: usize,
    pub rate_calls: usize,
    pub fetch_warnings: Vec<String>,
    pub rate_dates: usize,
    /// First and last date with a quoted rate
    pub rate_coverage: Option<(NaiveDate, NaiveDate)>,
    /// Rows written (always 0 in preview)
    pub inserted: usize,
}

impl RunSummary {
    pub fn transformed(&self) -> usize {
        self.transactions.len()
    }

    pub fn failed_fetches(&self) -> usize {
        self.fetch_warnings.len()
    }

    /// Rows an insert run would write
    pub fn would_insert(&self) -> usize {
        self.transactions.len()
    }
}

pub struct Migrator<'c> {
    config: &'c MigrationConfig,
    mode: RunMode,
}

impl<'c> Migrator<'c> {
    pub fn new(config: &'c MigrationConfig, mode: RunMode) -> Self {
        Migrator { config, mode }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Setup, rate collection and transformation. Reads from the store only.
    pub fn prepare<S, R, P>(
        &self,
        store: &S,
        fetcher: &RateFetcher<R, P>,
        records: Vec<RawRecord>,
        requested_identity: Option<&str>,
    ) -> Result<RunSummary, MigrateError>
    where
        S: RecordStore + ?Sized,
        R: RateSource,
        P: Pacer,
    {
        let identities = store.list_identities()?;
        let identity = select_identity(&identities, requested_identity)?.clone();
        log::info!("migrating for {} ({})", identity.email, identity.id);

        let categories = CategoryTable::new(store.load_categories()?);
        if categories.is_empty() {
            log::warn!("no categories in the store, every row will be skipped");
        } else {
            log::debug!("{} categories: {}", categories.len(), categories.names().join(", "));
        }
        let defaults = self
            .config
            .default_categories
            .known_in(&categories)
            .or_first_of_type(&categories);

        let rows_read = records.len();
        let dates: Vec<_> = records
            .iter()
            .filter_map(|r| parse_date(r.date.trim()))
            .collect();
        let plan = RatePlan::build(&dates, self.config.range_start, self.config.daily_from);
        log::info!(
            "fetching {} rates: {} months, {} single dates",
            fetcher.pair(),
            plan.months.len(),
            plan.single_dates.len()
        );
        let (rates, stats) = collect_rates(fetcher, &plan);

        let transformer =
            RecordTransformer::from_config(self.config, &rates, &categories, defaults, &identity.id);
        let report = transformer.transform_all(records);
        log::info!(
            "transformed {} of {} rows ({} skipped)",
            report.transactions.len(),
            rows_read,
            report.skipped.len()
        );

        Ok(RunSummary {
            mode: self.mode,
            identity,
            rows_read,
            transactions: report.transactions,
            skipped: report.skipped,
            fallback_categories: report.fallback_categories,
            zero_rate_rows: report.zero_rate_rows,
            rate_calls: stats.range_calls + stats.single_calls,
            fetch_warnings: stats.warnings,
            rate_dates: rates.len(),
            rate_coverage: rates.first_date().zip(rates.last_date()),
            inserted: 0,
        })
    }

    /// Write a prepared run. No-op in preview mode.
    pub fn load<S: RecordStore + ?Sized>(
        &self,
        store: &mut S,
        summary: &mut RunSummary,
    ) -> Result<(), MigrateError> {
        if self.mode == RunMode::Preview {
            log::info!("preview mode, {} rows not inserted", summary.would_insert());
            return Ok(());
        }

        let loader = BatchLoader::new(self.config.batch_size);
        let report = loader.load(store, &summary.transactions)?;
        summary.inserted = report.inserted;
        Ok(())
    }

    /// prepare + load in one call
    pub fn run<S, R, P>(
        &self,
        store: &mut S,
        fetcher: &RateFetcher<R, P>,
        records: Vec<RawRecord>,
        requested_identity: Option<&str>,
    ) -> Result<RunSummary, MigrateError>
    where
        S: RecordStore + ?Sized,
        R: RateSource,
        P: Pacer,
    {
        let mut summary = self.prepare(&*store, fetcher, records, requested_identity)?;
        self.load(store, &mut summary)?;
        Ok(summary)
    }
}
