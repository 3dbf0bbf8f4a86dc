// 📋 Console report for a migration run

use crate::db::Transaction;
use crate::error::MigrateError;
use crate::migration::{RunMode, RunSummary};
use crate::transformer::SkipRecord;

/// Rows listed individually before collapsing into "... and N more"
pub const LIST_LIMIT: usize = 10;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// One line per skipped row (first `limit`), then a remainder line
pub fn skipped_lines(skipped: &[SkipRecord], limit: usize) -> Vec<String> {
    let mut lines: Vec<String> = skipped
        .iter()
        .take(limit)
        .map(|skip| {
            let raw = &skip.record;
            format!(
                "line {}: {} | {} | {} | {} → {}",
                raw.line, raw.date, raw.category, raw.amount, raw.content, skip.reason
            )
        })
        .collect();

    if skipped.len() > limit {
        lines.push(format!("... and {} more", skipped.len() - limit));
    }

    lines
}

pub fn transaction_line(tx: &Transaction) -> String {
    format!(
        "{} | {:<7} | {:>10.2} {} × {:<8.4} = {:>10} | {}",
        tx.date,
        tx.transaction_type.as_str(),
        tx.original_amount,
        tx.currency,
        tx.exchange_rate,
        tx.converted_amount,
        tx.content
    )
}

pub fn print_summary(summary: &RunSummary) {
    println!("\n{}", RULE);
    println!("📊 Migration summary ({})", summary.identity.email);
    println!("{}", RULE);
    println!("  Rows read:            {}", summary.rows_read);
    println!("  Transformed:          {}", summary.transformed());
    println!("  Skipped:              {}", summary.skipped.len());
    println!("  On default category:  {}", summary.fallback_categories);
    println!("  Without rate (0):     {}", summary.zero_rate_rows);
    println!(
        "  Rate dates:           {} ({} calls, {} failed)",
        summary.rate_dates,
        summary.rate_calls,
        summary.failed_fetches()
    );
    if let Some((first, last)) = summary.rate_coverage {
        println!("  Rate coverage:        {} .. {}", first, last);
    }

    if !summary.skipped.is_empty() {
        println!("\n⚠️  Skipped rows:");
        for line in skipped_lines(&summary.skipped, LIST_LIMIT) {
            println!("  {}", line);
        }
    }

    if !summary.fetch_warnings.is_empty() {
        println!("\n⚠️  Failed rate fetches:");
        for warning in &summary.fetch_warnings {
            println!("  {}", warning);
        }
    }

    if !summary.transactions.is_empty() {
        println!("\n🔍 Sample (first {}):", LIST_LIMIT.min(summary.transactions.len()));
        for tx in summary.transactions.iter().take(LIST_LIMIT) {
            println!("  {}", transaction_line(tx));
        }
    }
}

/// Closing line: inserted count, or what insert mode would write
pub fn print_outcome(summary: &RunSummary) {
    println!("\n{}", RULE);
    match summary.mode {
        RunMode::Preview => {
            println!("👀 Preview only: {} rows would be inserted", summary.would_insert());
            println!("   Re-run with --insert to write them.");
        }
        RunMode::Insert => {
            println!("✅ Inserted {} rows", summary.inserted);
        }
    }
}

pub fn print_failure(err: &MigrateError) {
    eprintln!("\n{}", RULE);
    eprintln!("❌ {}", err);
    if let MigrateError::BatchWrite { inserted, .. } = err {
        eprintln!("   {} rows were inserted before the failure.", inserted);
        eprintln!("   Re-running will insert those rows again.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::CategoryType;
    use crate::parser::RawRecord;
    use crate::transformer::SkipReason;
    use chrono::NaiveDate;

    fn skips(n: usize) -> Vec<SkipRecord> {
        (0..n)
            .map(|i| SkipRecord {
                record: RawRecord::new("2024-01-01", "지출", "식비", "", "커피").at_line(i + 2),
                reason: SkipReason::NonPositiveAmount,
            })
            .collect()
    }

    #[test]
    fn test_skipped_lines_collapse_after_limit() {
        let lines = skipped_lines(&skips(13), LIST_LIMIT);

        assert_eq!(lines.len(), 11);
        assert!(lines[0].starts_with("line 2:"));
        assert!(lines[0].ends_with("missing or non-positive amount"));
        assert_eq!(lines[10], "... and 3 more");
    }

    #[test]
    fn test_skipped_lines_without_remainder() {
        assert_eq!(skipped_lines(&skips(10), LIST_LIMIT).len(), 10);
        assert!(skipped_lines(&[], LIST_LIMIT).is_empty());
    }

    #[test]
    fn test_transaction_line_shows_conversion() {
        let tx = Transaction {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            transaction_type: CategoryType::Income,
            category_id: "c1".to_string(),
            currency: "TRY".to_string(),
            original_amount: 100.0,
            exchange_rate: 41.2346,
            converted_amount: 4123,
            content: "월급".to_string(),
            memo: None,
        };

        let line = transaction_line(&tx);
        assert!(line.starts_with("2024-03-01 | income"));
        assert!(line.contains("100.00 TRY × 41.2346"));
        assert!(line.contains("4123"));
    }
}
