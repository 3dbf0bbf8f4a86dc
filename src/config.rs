// ⚙️ Run Configuration - Rules as Data
// Alias table, default categories, currency pair and pacing are loaded from JSON,
// never hard-coded, so every run (and every test) supplies its own fixture.

use crate::entities::{CategoryTable, CategoryType};
use anyhow::{bail, Context as AnyhowContext, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_RATE_SOURCE_URL: &str = "https://api.frankfurter.app";

// ============================================================================
// ALIAS TABLE
// ============================================================================

/// Raw category label → canonical category name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable(HashMap<String, String>);

impl AliasTable {
    pub fn new() -> Self {
        AliasTable(HashMap::new())
    }

    pub fn with_alias(mut self, raw: &str, canonical: &str) -> Self {
        self.0.insert(raw.to_string(), canonical.to_string());
        self
    }

    /// Canonical label for `raw`, or `raw` itself when no alias exists
    pub fn resolve<'a>(&'a self, raw: &'a str) -> &'a str {
        self.0.get(raw).map(String::as_str).unwrap_or(raw)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// DEFAULT CATEGORIES
// ============================================================================

/// Fallback category id per transaction type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultCategories {
    #[serde(default)]
    pub income: Option<String>,

    #[serde(default)]
    pub expense: Option<String>,
}

impl DefaultCategories {
    pub fn for_type(&self, category_type: CategoryType) -> Option<&str> {
        match category_type {
            CategoryType::Income => self.income.as_deref(),
            CategoryType::Expense => self.expense.as_deref(),
        }
    }

    /// Drop configured ids that `table` does not know (logged as warnings)
    pub fn known_in(&self, table: &CategoryTable) -> DefaultCategories {
        let known = |category_type: CategoryType, id: &Option<String>| {
            id.as_ref()
                .filter(|id| {
                    let found = table.find_by_id(id).is_some();
                    if !found {
                        log::warn!(
                            "default {} category '{}' not found in the store, ignoring it",
                            category_type,
                            id
                        );
                    }
                    found
                })
                .cloned()
        };

        DefaultCategories {
            income: known(CategoryType::Income, &self.income),
            expense: known(CategoryType::Expense, &self.expense),
        }
    }

    /// Fill unset defaults with the first category of each type in `table`
    pub fn or_first_of_type(&self, table: &CategoryTable) -> DefaultCategories {
        DefaultCategories {
            income: self
                .income
                .clone()
                .or_else(|| table.first_of_type(CategoryType::Income).map(|c| c.id.clone())),
            expense: self
                .expense
                .clone()
                .or_else(|| table.first_of_type(CategoryType::Expense).map(|c| c.id.clone())),
        }
    }
}

// ============================================================================
// CURRENCY PAIR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub from: String,
    pub to: String,
}

impl CurrencyPair {
    pub fn new(from: &str, to: &str) -> Self {
        CurrencyPair {
            from: from.to_uppercase(),
            to: to.to_uppercase(),
        }
    }
}

impl Default for CurrencyPair {
    fn default() -> Self {
        CurrencyPair::new("TRY", "KRW")
    }
}

impl std::fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

// ============================================================================
// MIGRATION CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub aliases: AliasTable,
    pub default_categories: DefaultCategories,

    /// Type label that marks an income row; anything else is an expense
    pub income_marker: String,

    pub currency: CurrencyPair,
    pub batch_size: usize,
    pub rate_source_url: String,

    /// Pause after each monthly range fetch
    pub range_delay_ms: u64,

    /// Pause after each single-date fetch
    pub daily_delay_ms: u64,

    /// Rows on or after this date get single-date fetches
    pub daily_from: Option<NaiveDate>,

    /// First month to range-fetch (defaults to the earliest row month)
    pub range_start: Option<NaiveDate>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            aliases: AliasTable::new(),
            default_categories: DefaultCategories::default(),
            income_marker: "수입".to_string(),
            currency: CurrencyPair::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            rate_source_url: DEFAULT_RATE_SOURCE_URL.to_string(),
            range_delay_ms: 250,
            daily_delay_ms: 150,
            daily_from: None,
            range_start: None,
        }
    }
}

impl MigrationConfig {
    /// Load config from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: MigrationConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Load config from `path` if it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "config file {:?} not found, using defaults (no aliases)",
                path.as_ref()
            );
            Ok(MigrationConfig::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be greater than 0");
        }
        if self.currency.from.is_empty() || self.currency.to.is_empty() {
            bail!("currency pair must name both currencies");
        }
        if self.income_marker.trim().is_empty() {
            bail!("income_marker must not be empty");
        }
        Ok(())
    }

    pub fn range_delay(&self) -> Duration {
        Duration::from_millis(self.range_delay_ms)
    }

    pub fn daily_delay(&self) -> Duration {
        Duration::from_millis(self.daily_delay_ms)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Category;
    use std::io::Write;

    #[test]
    fn test_alias_resolution() {
        let aliases = AliasTable::new().with_alias("통신비", "공과금");

        assert_eq!(aliases.resolve("통신비"), "공과금");
        assert_eq!(aliases.resolve("식비"), "식비");
        assert_eq!(aliases.resolve(""), "");
    }

    #[test]
    fn test_config_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "aliases": {{ "통신비": "공과금" }},
                "default_categories": {{ "income": "cat-income" }},
                "batch_size": 50,
                "daily_from": "2026-01-01"
            }}"#
        )
        .unwrap();

        let config = MigrationConfig::from_file(file.path()).unwrap();

        assert_eq!(config.aliases.resolve("통신비"), "공과금");
        assert_eq!(config.default_categories.income.as_deref(), Some("cat-income"));
        assert_eq!(config.default_categories.expense, None);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.daily_from, NaiveDate::from_ymd_opt(2026, 1, 1));
        // Unset keys keep their defaults
        assert_eq!(config.income_marker, "수입");
        assert_eq!(config.currency, CurrencyPair::new("TRY", "KRW"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "batch_size": 0 }}"#).unwrap();

        assert!(MigrationConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MigrationConfig::load_or_default(dir.path().join("absent.json")).unwrap();

        assert!(config.aliases.is_empty());
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_defaults_filled_from_category_table() {
        let table = CategoryTable::new(vec![
            Category::new("e1", "식비", CategoryType::Expense),
            Category::new("i1", "급여", CategoryType::Income),
            Category::new("e2", "공과금", CategoryType::Expense),
        ]);

        let configured = DefaultCategories {
            income: None,
            expense: Some("e2".to_string()),
        };
        let filled = configured.or_first_of_type(&table);

        assert_eq!(filled.income.as_deref(), Some("i1"));
        assert_eq!(filled.expense.as_deref(), Some("e2"));
    }

    #[test]
    fn test_unknown_configured_default_is_dropped() {
        let table = CategoryTable::new(vec![
            Category::new("e1", "식비", CategoryType::Expense),
            Category::new("i1", "급여", CategoryType::Income),
        ]);

        let configured = DefaultCategories {
            income: Some("i1".to_string()),
            expense: Some("c-missing".to_string()),
        };
        let known = configured.known_in(&table);

        assert_eq!(known.income.as_deref(), Some("i1"));
        assert_eq!(known.expense, None);
        // The dropped type falls back to the first category of that type
        assert_eq!(known.or_first_of_type(&table).expense.as_deref(), Some("e1"));
    }
}
