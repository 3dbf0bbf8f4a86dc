// Ledger Migration - Core Library
// Exposes all modules for use in the CLI and tests

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod fetcher;
pub mod loader;
pub mod migration;
pub mod parser;
pub mod report;
pub mod resolver;
pub mod transformer;

// Re-export commonly used types
pub use config::{AliasTable, CurrencyPair, DefaultCategories, MigrationConfig};
pub use db::{
    get_events_for_run, get_transactions_for_user, setup_database, verify_count, Event,
    RecordStore, SqliteStore, Transaction,
};
pub use entities::{select_identity, Category, CategoryTable, CategoryType, Identity};
pub use error::MigrateError;
pub use fetcher::{
    FixedDelay, Fetched, FixtureRateSource, HttpRateSource, NoPacing, Pacer, RateFetcher,
    RateObservation, RateSource,
};
pub use loader::{BatchLoader, LoadReport};
pub use migration::{Migrator, RunMode, RunSummary};
pub use parser::{load_records, parse_records, write_skipped, RawRecord};
pub use resolver::{collect_rates, RatePlan, RateTable};
pub use transformer::{
    CategoryRules, RecordTransformer, RowOutcome, SkipReason, SkipRecord, TransformReport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
