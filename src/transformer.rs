// 🔄 Record Transformer - RawRecord → Transaction | SkipRecord
//
// Per-row pipeline, first failure wins:
//   trim → date/content present → date parses → amount parses and is positive
//   → type → category → rate → rounded amounts
//
// Only the read-only RateTable and CategoryTable are shared between rows.
//
// Rounding is half-away-from-zero (f64::round) everywhere:
//   original_amount  → 2 decimals
//   exchange_rate    → 4 decimals (stored)
//   converted_amount → round(original_amount × resolved rate), resolved rate unrounded

use crate::config::{AliasTable, DefaultCategories, MigrationConfig};
use crate::db::Transaction;
use crate::entities::{CategoryTable, CategoryType};
use crate::parser::RawRecord;
use crate::resolver::{RateTable, NO_RATE};
use chrono::NaiveDate;
use std::fmt;

/// Accepted row date layouts; stored as ISO
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

// ============================================================================
// SKIPS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingDateOrContent,
    InvalidDate,
    NonPositiveAmount,
    AmountParse,
    NoCategory,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::MissingDateOrContent => "missing date or content",
            SkipReason::InvalidDate => "invalid date",
            SkipReason::NonPositiveAmount => "missing or non-positive amount",
            SkipReason::AmountParse => "amount parse error",
            SkipReason::NoCategory => "no category",
        };
        f.write_str(reason)
    }
}

/// A row that failed validation. Never retried.
#[derive(Debug, Clone, PartialEq)]
pub struct SkipRecord {
    pub record: RawRecord,
    pub reason: SkipReason,
}

// ============================================================================
// CATEGORY RESOLUTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryResolution {
    /// `fallback` is true when the type's default category was used
    Resolved { id: String, fallback: bool },
    Skipped(SkipReason),
}

/// Alias table + per-type defaults, supplied at construction
#[derive(Debug, Clone, Default)]
pub struct CategoryRules {
    pub aliases: AliasTable,
    pub defaults: DefaultCategories,
}

impl CategoryRules {
    pub fn new(aliases: AliasTable, defaults: DefaultCategories) -> Self {
        CategoryRules { aliases, defaults }
    }

    pub fn resolve(
        &self,
        label: &str,
        category_type: CategoryType,
        table: &CategoryTable,
    ) -> CategoryResolution {
        let lookup_name = self.aliases.resolve(label);

        if !lookup_name.is_empty() {
            if let Some(category) = table.find(lookup_name, category_type) {
                return CategoryResolution::Resolved {
                    id: category.id.clone(),
                    fallback: false,
                };
            }
        }

        match self.defaults.for_type(category_type) {
            Some(id) => CategoryResolution::Resolved {
                id: id.to_string(),
                fallback: true,
            },
            None => CategoryResolution::Skipped(SkipReason::NoCategory),
        }
    }
}

// ============================================================================
// FIELD PARSING
// ============================================================================

/// Parse a locale-formatted amount ("1,250.50"); must be finite and > 0
pub fn parse_amount(raw: &str) -> Result<f64, SkipReason> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Err(SkipReason::NonPositiveAmount);
    }

    let amount: f64 = cleaned.parse().map_err(|_| SkipReason::AmountParse)?;
    if !amount.is_finite() {
        return Err(SkipReason::AmountParse);
    }
    if amount <= 0.0 {
        return Err(SkipReason::NonPositiveAmount);
    }

    Ok(amount)
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// Round half away from zero to `places` decimals
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Converted amount in whole target-currency units
pub fn convert(original_amount: f64, rate: f64) -> i64 {
    (original_amount * rate).round() as i64
}

// ============================================================================
// TRANSFORMER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Transformed(Transaction),
    Skipped(SkipRecord),
}

#[derive(Debug, Clone, Default)]
pub struct TransformReport {
    pub transactions: Vec<Transaction>,
    pub skipped: Vec<SkipRecord>,
    /// Rows that landed on a type's default category
    pub fallback_categories: usize,
    /// Rows converted with the no-data sentinel rate
    pub zero_rate_rows: usize,
}

impl TransformReport {
    pub fn total(&self) -> usize {
        self.transactions.len() + self.skipped.len()
    }
}

pub struct RecordTransformer<'a> {
    rates: &'a RateTable,
    categories: &'a CategoryTable,
    rules: CategoryRules,
    income_marker: String,
    currency: String,
    user_id: String,
}

impl<'a> RecordTransformer<'a> {
    pub fn new(
        rates: &'a RateTable,
        categories: &'a CategoryTable,
        rules: CategoryRules,
        income_marker: &str,
        currency: &str,
        user_id: &str,
    ) -> Self {
        RecordTransformer {
            rates,
            categories,
            rules,
            income_marker: income_marker.to_string(),
            currency: currency.to_string(),
            user_id: user_id.to_string(),
        }
    }

    /// Build from run config; `defaults` are the final (already filled) defaults
    pub fn from_config(
        config: &MigrationConfig,
        rates: &'a RateTable,
        categories: &'a CategoryTable,
        defaults: DefaultCategories,
        user_id: &str,
    ) -> Self {
        Self::new(
            rates,
            categories,
            CategoryRules::new(config.aliases.clone(), defaults),
            &config.income_marker,
            &config.currency.from,
            user_id,
        )
    }

    pub fn transform(&self, record: RawRecord) -> RowOutcome {
        match self.build(&record) {
            Ok(row) => RowOutcome::Transformed(row.transaction),
            Err(reason) => RowOutcome::Skipped(skip_record(record, reason)),
        }
    }

    fn build(&self, record: &RawRecord) -> Result<BuiltRow, SkipReason> {
        let date = record.date.trim();
        let type_label = record.type_label.trim();
        let category_label = record.category.trim();
        let amount = record.amount.trim();
        let content = record.content.trim();
        let memo = record.memo.trim();

        if date.is_empty() || content.is_empty() {
            return Err(SkipReason::MissingDateOrContent);
        }

        let amount = parse_amount(amount)?;

        let transaction_type = CategoryType::classify(type_label, &self.income_marker);

        let (category_id, fallback) = match self
            .rules
            .resolve(category_label, transaction_type, self.categories)
        {
            CategoryResolution::Resolved { id, fallback } => (id, fallback),
            CategoryResolution::Skipped(reason) => return Err(reason),
        };

        // Last check: every other skip reason takes precedence
        let date = parse_date(date).ok_or(SkipReason::InvalidDate)?;

        let rate = self.rates.resolve(date);
        let original_amount = round_to(amount, 2);

        let transaction = Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: self.user_id.clone(),
            date,
            transaction_type,
            category_id,
            currency: self.currency.clone(),
            original_amount,
            exchange_rate: round_to(rate, 4),
            converted_amount: convert(original_amount, rate),
            content: content.to_string(),
            memo: if memo.is_empty() {
                None
            } else {
                Some(memo.to_string())
            },
        };

        Ok(BuiltRow {
            transaction,
            fallback,
            zero_rate: rate == NO_RATE,
        })
    }

    /// Transform every row in order; each yields exactly one transaction or skip
    pub fn transform_all(&self, records: Vec<RawRecord>) -> TransformReport {
        let mut report = TransformReport::default();

        for record in records {
            match self.build(&record) {
                Ok(row) => {
                    if row.fallback {
                        report.fallback_categories += 1;
                    }
                    if row.zero_rate {
                        log::warn!(
                            "no rate data for {} ({}), converted amount is 0",
                            row.transaction.date,
                            row.transaction.content
                        );
                        report.zero_rate_rows += 1;
                    }
                    report.transactions.push(row.transaction);
                }
                Err(reason) => report.skipped.push(skip_record(record, reason)),
            }
        }

        report
    }
}

fn skip_record(record: RawRecord, reason: SkipReason) -> SkipRecord {
    log::debug!("skip line {}: {} ({:?})", record.line, reason, record);
    SkipRecord { record, reason }
}

struct BuiltRow {
    transaction: Transaction,
    fallback: bool,
    zero_rate: bool,
}

// ============================================================================
// TESTS
// ============================================================================
