// 🗄️ Record Store - SQLite (WAL) backing the migration
//
// Read once per run: users (identities) and categories.
// Written per batch: transactions, plus one audit event per batch.
// A batch is one SQLite transaction: it commits whole or not at all.

use crate::entities::{Category, CategoryType, Identity};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Migrated ledger row, shaped for the transactions table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub transaction_type: CategoryType,
    pub category_id: String,
    /// Currency of `original_amount`
    pub currency: String,
    pub original_amount: f64,
    pub exchange_rate: f64,
    /// original_amount × rate, whole units of the target currency
    pub converted_amount: i64,
    pub content: String,
    pub memo: Option<String>,
}

/// Audit trail entry (one per written batch)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub run_id: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event_type: &str, run_id: &str, data: serde_json::Value) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            run_id: run_id.to_string(),
            data,
        }
    }
}

// ============================================================================
// STORE INTERFACE
// ============================================================================

/// The relational store as seen by a migration run
pub trait RecordStore {
    fn list_identities(&self) -> Result<Vec<Identity>>;

    fn load_categories(&self) -> Result<Vec<Category>>;

    /// Write one batch as a single operation
    fn insert_transactions(&mut self, batch: &[Transaction]) -> Result<()>;
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            date TEXT NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
            category_id TEXT NOT NULL REFERENCES categories(id),
            currency TEXT NOT NULL,
            original_amount REAL NOT NULL CHECK (original_amount > 0),
            exchange_rate REAL NOT NULL,
            converted_amount INTEGER NOT NULL,
            content TEXT NOT NULL,
            memo TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            run_id TEXT NOT NULL,
            data TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_run ON events(run_id)",
        [],
    )?;

    Ok(())
}

pub struct SqliteStore {
    conn: Connection,
    run_id: String,
    batches_written: usize,
}

impl SqliteStore {
    /// Open an existing store file (the schema is created if absent)
    pub fn open(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            bail!("database not found: {:?}", db_path);
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database {:?}", db_path))?;
        Self::from_connection(conn)
    }

    /// Open an existing store as is: no schema bootstrap, no pragmas
    pub fn open_existing(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            bail!("database not found: {:?}", db_path);
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database {:?}", db_path))?;
        Ok(Self::with_run_id(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(Self::with_run_id(conn))
    }

    fn with_run_id(conn: Connection) -> Self {
        SqliteStore {
            conn,
            run_id: uuid::Uuid::new_v4().to_string(),
            batches_written: 0,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Id stamped on every audit event written by this store handle
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn add_identity(&self, identity: &Identity) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, email) VALUES (?1, ?2)",
            params![identity.id, identity.email],
        )?;
        Ok(())
    }

    pub fn add_category(&self, category: &Category) -> Result<()> {
        self.conn.execute(
            "INSERT INTO categories (id, name, type) VALUES (?1, ?2, ?3)",
            params![category.id, category.name, category.category_type.as_str()],
        )?;
        Ok(())
    }
}

impl RecordStore for SqliteStore {
    fn list_identities(&self) -> Result<Vec<Identity>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, email FROM users ORDER BY rowid")?;

        let identities = stmt
            .query_map([], |row| {
                Ok(Identity {
                    id: row.get(0)?,
                    email: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(identities)
    }

    fn load_categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, type FROM categories ORDER BY rowid")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, name, type_str)| {
                let category_type = type_str
                    .parse::<CategoryType>()
                    .with_context(|| format!("category {} has invalid type", id))?;
                Ok(Category {
                    id,
                    name,
                    category_type,
                })
            })
            .collect()
    }

    fn insert_transactions(&mut self, batch: &[Transaction]) -> Result<()> {
        let batch_number = self.batches_written + 1;
        let tx = self.conn.transaction()?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO transactions (
                    id, user_id, date, type, category_id, currency,
                    original_amount, exchange_rate, converted_amount, content, memo
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;

            for row in batch {
                stmt.execute(params![
                    row.id,
                    row.user_id,
                    row.date.format("%Y-%m-%d").to_string(),
                    row.transaction_type.as_str(),
                    row.category_id,
                    row.currency,
                    row.original_amount,
                    row.exchange_rate,
                    row.converted_amount,
                    row.content,
                    row.memo,
                ])
                .with_context(|| format!("Failed to insert transaction {} ({})", row.id, row.date))?;
            }
        }

        let event = Event::new(
            "batch_inserted",
            &self.run_id,
            serde_json::json!({
                "batch": batch_number,
                "rows": batch.len(),
                "first_id": batch.first().map(|t| t.id.clone()),
                "last_id": batch.last().map(|t| t.id.clone()),
            }),
        );
        insert_event(&tx, &event)?;

        tx.commit().context("Failed to commit batch")?;
        self.batches_written = batch_number;
        Ok(())
    }
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (event_id, timestamp, event_type, run_id, data)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.run_id,
            data_json,
        ],
    )?;

    Ok(())
}

/// Audit events written by one run, oldest first
pub fn get_events_for_run(conn: &Connection, run_id: &str) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, run_id, data
         FROM events
         WHERE run_id = ?1
         ORDER BY id",
    )?;

    let rows = stmt
        .query_map(params![run_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(event_id, timestamp, event_type, run_id, data)| {
            Ok(Event {
                event_id,
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .context("Invalid event timestamp")?
                    .with_timezone(&Utc),
                event_type,
                run_id,
                data: serde_json::from_str(&data).context("Invalid event data")?,
            })
        })
        .collect()
}

/// Transactions stored for one user, by date
pub fn get_transactions_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, date, type, category_id, currency,
                original_amount, exchange_rate, converted_amount, content, memo
         FROM transactions
         WHERE user_id = ?1
         ORDER BY date, rowid",
    )?;

    let rows = stmt
        .query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, f64>(7)?,
                row.get::<_, i64>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, Option<String>>(10)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(
            |(
                id,
                user_id,
                date,
                type_str,
                category_id,
                currency,
                original_amount,
                exchange_rate,
                converted_amount,
                content,
                memo,
            )| {
                Ok(Transaction {
                    id,
                    user_id,
                    date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                        .with_context(|| format!("Invalid stored date: {}", date))?,
                    transaction_type: type_str.parse()?,
                    category_id,
                    currency,
                    original_amount,
                    exchange_rate,
                    converted_amount,
                    content,
                    memo,
                })
            },
        )
        .collect()
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;

    Ok(count)
}
