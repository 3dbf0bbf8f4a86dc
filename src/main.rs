use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ledger_migrate::{
    load_records, report, write_skipped, FixedDelay, FixtureRateSource, HttpRateSource,
    MigrateError, MigrationConfig, Migrator, NoPacing, Pacer, RateFetcher, RateSource, RunMode,
    RunSummary, SqliteStore,
};

/// Migrate a TRY ledger export into the record store, converted to KRW
#[derive(Parser, Debug)]
#[command(name = "ledger-migrate", version, about)]
struct Cli {
    /// Write to the store (default is a preview with no writes)
    #[arg(long)]
    insert: bool,

    /// Identity email or id to attach rows to
    #[arg(long)]
    user: Option<String>,

    /// Ledger export to migrate
    #[arg(long, default_value = "ledger.csv")]
    csv: PathBuf,

    /// SQLite store (falls back to LEDGER_DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    #[arg(long, default_value = "migration.json")]
    config: PathBuf,

    /// Replay rates from a local JSON file instead of the rate service
    #[arg(long)]
    rates_fixture: Option<PathBuf>,

    /// Skip the pauses between rate requests
    #[arg(long)]
    no_delay: bool,

    /// Write every skipped row with its reason to this CSV
    #[arg(long)]
    skipped_csv: Option<PathBuf>,

    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    // .env.local wins over .env (dotenvy never overrides a set variable)
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report::print_failure(&err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli) -> Result<(), MigrateError> {
    println!("🚚 Ledger migration v{}", ledger_migrate::VERSION);

    let config = MigrationConfig::load_or_default(&cli.config)?;
    config.validate()?;

    let db_path = cli
        .db
        .clone()
        .or_else(|| env::var_os("LEDGER_DB_PATH").map(PathBuf::from))
        .ok_or_else(|| MigrateError::MissingStore("set LEDGER_DB_PATH or pass --db".to_string()))?;
    if !db_path.exists() {
        return Err(MigrateError::MissingStore(format!("{:?} does not exist", db_path)));
    }

    println!("\n📂 Loading {:?}...", cli.csv);
    let records = load_records(&cli.csv)?;
    println!("✓ Loaded {} rows", records.len());

    let pacer: Box<dyn Pacer> = if cli.no_delay {
        Box::new(NoPacing)
    } else {
        Box::new(FixedDelay::new(config.range_delay(), config.daily_delay()))
    };
    let source: Box<dyn RateSource> = match &cli.rates_fixture {
        Some(path) => Box::new(FixtureRateSource::from_file(path)?),
        None => Box::new(HttpRateSource::new(&config.rate_source_url)?),
    };
    let fetcher = RateFetcher::new(source, pacer, config.currency.clone());

    let migrator = Migrator::new(&config, RunMode::from_flag(cli.insert));
    // Preview opens the store untouched; insert bootstraps the schema first
    let mut store = match migrator.mode() {
        RunMode::Preview => SqliteStore::open_existing(&db_path)?,
        RunMode::Insert => SqliteStore::open(&db_path)?,
    };
    let mut summary = migrator.prepare(&store, &fetcher, records, cli.user.as_deref())?;
    report::print_summary(&summary);

    if let Some(path) = &cli.skipped_csv {
        export_skipped(&summary, path)?;
    }

    migrator.load(&mut store, &mut summary)?;
    report::print_outcome(&summary);

    Ok(())
}

fn export_skipped(summary: &RunSummary, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    write_skipped(&summary.skipped, file)?;
    println!("\n📝 Wrote {} skipped rows to {:?}", summary.skipped.len(), path);
    Ok(())
}
