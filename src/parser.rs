// 📄 Ledger Export Parser
// Reads the tabular ledger export into RawRecords (one per row, untouched).
// Validation and normalization belong to the transformer, not here.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::transformer::SkipRecord;

const UTF8_BOM: char = '\u{feff}';

// ============================================================================
// CORE TYPES
// ============================================================================

/// RawRecord - one row of the export, exactly as read
///
/// Column names follow the export (Korean headers); English headers are accepted too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "날짜", alias = "date", default)]
    pub date: String,

    /// Type label ("수입" marks income)
    #[serde(rename = "항목", alias = "type", default)]
    pub type_label: String,

    #[serde(rename = "구분", alias = "category", default)]
    pub category: String,

    /// Locale-formatted amount, e.g. "1,250.50"
    #[serde(rename = "금액", alias = "amount", default)]
    pub amount: String,

    #[serde(rename = "내용", alias = "content", default)]
    pub content: String,

    #[serde(rename = "설명", alias = "memo", default)]
    pub memo: String,

    /// Line in the source file (provenance for skip reports)
    #[serde(skip)]
    pub line: usize,
}

impl RawRecord {
    pub fn new(date: &str, type_label: &str, category: &str, amount: &str, content: &str) -> Self {
        RawRecord {
            date: date.to_string(),
            type_label: type_label.to_string(),
            category: category.to_string(),
            amount: amount.to_string(),
            content: content.to_string(),
            memo: String::new(),
            line: 0,
        }
    }

    /// Builder pattern: add memo
    pub fn with_memo(mut self, memo: &str) -> Self {
        self.memo = memo.to_string();
        self
    }

    /// Builder pattern: add source line
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

// ============================================================================
// READING
// ============================================================================

/// Header names that must be present (Korean or English spelling)
const REQUIRED_COLUMNS: [(&str, &str); 3] = [("날짜", "date"), ("금액", "amount"), ("내용", "content")];

/// Load all rows from a CSV export on disk
pub fn load_records(csv_path: &Path) -> Result<Vec<RawRecord>> {
    let content = fs::read_to_string(csv_path)
        .with_context(|| format!("Failed to read CSV file: {:?}", csv_path))?;

    parse_records(&content)
}

/// Parse CSV text, tolerating a leading byte-order mark
pub fn parse_records(content: &str) -> Result<Vec<RawRecord>> {
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(content.as_bytes());

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();
    for (korean, english) in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h.trim() == korean || h.trim() == english) {
            bail!("CSV is missing required column '{}' ({})", korean, english);
        }
    }

    let mut records = Vec::new();
    let mut row = csv::StringRecord::new();

    while rdr.read_record(&mut row).context("Failed to read CSV row")? {
        let line = row.position().map(|p| p.line() as usize).unwrap_or(0);
        let mut record: RawRecord = row
            .deserialize(Some(&headers))
            .with_context(|| format!("Failed to deserialize CSV row at line {}", line))?;
        record.line = line;
        records.push(record);
    }

    Ok(records)
}

/// Write skipped rows (original columns + reason) for manual follow-up
pub fn write_skipped<W: Write>(skipped: &[SkipRecord], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["line", "날짜", "항목", "구분", "금액", "내용", "설명", "reason"])?;

    for skip in skipped {
        let raw = &skip.record;
        let line = raw.line.to_string();
        let reason = skip.reason.to_string();
        wtr.write_record([
            line.as_str(),
            raw.date.as_str(),
            raw.type_label.as_str(),
            raw.category.as_str(),
            raw.amount.as_str(),
            raw.content.as_str(),
            raw.memo.as_str(),
            reason.as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformer::SkipReason;

    const EXPORT: &str = "날짜,항목,구분,금액,내용,설명\n\
        2024-03-01,지출,식비,\"1,250.50\",장보기,마트\n\
        2024-03-02,수입,,3000,월급,\n";

    #[test]
    fn test_parse_korean_headers() {
        let records = parse_records(EXPORT).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, "2024-03-01");
        assert_eq!(records[0].amount, "1,250.50");
        assert_eq!(records[0].memo, "마트");
        assert_eq!(records[0].line, 2);
        assert_eq!(records[1].type_label, "수입");
        assert_eq!(records[1].category, "");
    }

    #[test]
    fn test_parse_tolerates_bom() {
        let with_bom = format!("{}{}", UTF8_BOM, EXPORT);
        let records = parse_records(&with_bom).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, "2024-03-01");
    }

    #[test]
    fn test_parse_english_headers_and_missing_memo_column() {
        let csv = "date,type,category,amount,content\n2024-01-05,expense,Food,12,Lunch\n";
        let records = parse_records(csv).unwrap();

        assert_eq!(records[0].content, "Lunch");
        assert_eq!(records[0].memo, "");
    }

    #[test]
    fn test_missing_required_column_is_an_error() {
        let csv = "날짜,항목,구분,내용\n2024-01-05,지출,식비,점심\n";
        let err = parse_records(csv).unwrap_err();

        assert!(err.to_string().contains("금액"));
    }

    #[test]
    fn test_load_records_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        fs::write(&path, EXPORT).unwrap();

        assert_eq!(load_records(&path).unwrap().len(), 2);
        assert!(load_records(&dir.path().join("missing.csv")).is_err());
    }

    #[test]
    fn test_write_skipped_includes_reason() {
        let skipped = vec![SkipRecord {
            record: RawRecord::new("2024-01-01", "지출", "식비", "0", "커피").at_line(7),
            reason: SkipReason::NonPositiveAmount,
        }];

        let mut out = Vec::new();
        write_skipped(&skipped, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("line,날짜"));
        assert!(text.contains("7,2024-01-01,지출,식비,0,커피,,missing or non-positive amount"));
    }
}
