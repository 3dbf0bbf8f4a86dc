// 📈 Rate Resolver - date → rate table with business-day fallback
//
// Built once from every fetch before transformation starts, then read-only.
//
// Lookup policy for date D:
// 1. D quoted            → its rate
// 2. earlier date quoted → rate of the latest date before D (weekend/holiday)
// 3. only later dates    → rate of the earliest known date
// 4. empty table         → 0.0 (sentinel: no conversion data)

use crate::fetcher::{Fetched, Pacer, RateFetcher, RateObservation, RateSource};
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

/// Rate returned when the table has no data at all
pub const NO_RATE: f64 = 0.0;

// ============================================================================
// RATE TABLE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    rates: BTreeMap<NaiveDate, f64>,
}

impl RateTable {
    pub fn new() -> Self {
        RateTable {
            rates: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, date: NaiveDate, rate: f64) {
        self.rates.insert(date, rate);
    }

    /// Merge a batch of fetched rates (later fetches win on the same date)
    pub fn extend(&mut self, rates: BTreeMap<NaiveDate, f64>) {
        self.rates.extend(rates);
    }

    /// Record a single-date quote under the requested AND the effective date,
    /// so the requested date hits directly from now on.
    pub fn record_observation(&mut self, requested: NaiveDate, observation: RateObservation) {
        self.rates.insert(requested, observation.rate);
        if observation.date != requested {
            self.rates.insert(observation.date, observation.rate);
        }
    }

    /// Quoted date and rate applying on `date`, `None` for an empty table
    pub fn lookup(&self, date: NaiveDate) -> Option<(NaiveDate, f64)> {
        if let Some(rate) = self.rates.get(&date) {
            return Some((date, *rate));
        }

        self.rates
            .range(..date)
            .next_back()
            .or_else(|| self.rates.iter().next())
            .map(|(quoted, rate)| (*quoted, *rate))
    }

    /// Rate in effect on `date`; `NO_RATE` when nothing is known
    pub fn resolve(&self, date: NaiveDate) -> f64 {
        self.lookup(date).map(|(_, rate)| rate).unwrap_or(NO_RATE)
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.rates.get(&date).copied()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rates.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rates.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

// ============================================================================
// COLLECTION PLAN
// ============================================================================

/// Which fetch calls fill the table for a set of row dates.
///
/// Dates before `daily_from` are covered month by month (one range call per
/// calendar month); dates on or after it get one single-date call each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatePlan {
    pub months: Vec<(i32, u32)>,
    pub single_dates: Vec<NaiveDate>,
}

impl RatePlan {
    pub fn build(
        dates: &[NaiveDate],
        range_start: Option<NaiveDate>,
        daily_from: Option<NaiveDate>,
    ) -> RatePlan {
        let distinct: BTreeSet<NaiveDate> = dates.iter().copied().collect();

        let (ranged, single): (Vec<NaiveDate>, Vec<NaiveDate>) = match daily_from {
            Some(cutoff) => distinct.iter().copied().partition(|date| *date < cutoff),
            None => (distinct.iter().copied().collect(), Vec::new()),
        };

        let start = range_start.or_else(|| ranged.first().copied());
        let end = match daily_from {
            Some(cutoff) if start.is_some() => Some(cutoff - ChronoDuration::days(1)),
            _ => ranged.last().copied(),
        };

        let months = match (start, end) {
            (Some(start), Some(end)) if start <= end => months_between(start, end),
            _ => Vec::new(),
        };

        RatePlan {
            months,
            single_dates: single,
        }
    }

    pub fn call_count(&self) -> usize {
        self.months.len() + self.single_dates.len()
    }
}

fn months_between(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    let (mut year, mut month) = (start.year(), start.month());

    while (year, month) <= (end.year(), end.month()) {
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }

    months
}

// ============================================================================
// COLLECTION
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectStats {
    pub range_calls: usize,
    pub single_calls: usize,
    pub warnings: Vec<String>,
}

impl CollectStats {
    pub fn failed_calls(&self) -> usize {
        self.warnings.len()
    }
}

/// Run every call in `plan` (sequentially, paced by the fetcher) into one table
pub fn collect_rates<S: RateSource, P: Pacer>(
    fetcher: &RateFetcher<S, P>,
    plan: &RatePlan,
) -> (RateTable, CollectStats) {
    let mut table = RateTable::new();
    let mut stats = CollectStats::default();

    for &(year, month) in &plan.months {
        stats.range_calls += 1;
        match fetcher.fetch_month(year, month) {
            Fetched::Fresh(rates) => {
                log::info!("{}-{:02}: {} business days", year, month, rates.len());
                table.extend(rates);
            }
            Fetched::Degraded { warning, .. } => stats.warnings.push(warning),
        }
    }

    for &date in &plan.single_dates {
        stats.single_calls += 1;
        match fetcher.fetch_single(date) {
            Fetched::Fresh(observation) => {
                if observation.date != date {
                    log::info!("{}: {:.4} (quoted {})", date, observation.rate, observation.date);
                } else {
                    log::info!("{}: {:.4}", date, observation.rate);
                }
                table.record_observation(date, observation);
            }
            // A failed call adds no coverage; the date falls back like any unquoted day
            Fetched::Degraded { warning, .. } => stats.warnings.push(warning),
        }
    }

    log::info!(
        "collected {} rate dates from {} calls ({} failed)",
        table.len(),
        stats.range_calls + stats.single_calls,
        stats.failed_calls()
    );

    (table, stats)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CurrencyPair;
    use crate::fetcher::{FixtureRateSource, NoPacing};
    use anyhow::{bail, Result};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn table() -> RateTable {
        let mut table = RateTable::new();
        table.insert(d("2024-01-03"), 40.0);
        table.insert(d("2024-01-04"), 40.2);
        table.insert(d("2024-01-05"), 40.5);
        table.insert(d("2024-01-08"), 41.0);
        table
    }

    #[test]
    fn test_exact_date_returns_its_rate() {
        assert_eq!(table().resolve(d("2024-01-04")), 40.2);
        assert_eq!(table().resolve(d("2024-01-08")), 41.0);
    }

    #[test]
    fn test_missing_date_uses_latest_prior_date() {
        // Weekend → Friday
        assert_eq!(table().resolve(d("2024-01-06")), 40.5);
        assert_eq!(table().resolve(d("2024-01-07")), 40.5);
        // After the last known date
        assert_eq!(table().resolve(d("2024-02-01")), 41.0);
        assert_eq!(table().lookup(d("2024-01-07")), Some((d("2024-01-05"), 40.5)));
    }

    #[test]
    fn test_date_before_all_known_uses_earliest() {
        assert_eq!(table().resolve(d("2023-12-31")), 40.0);
        assert_eq!(table().lookup(d("2023-06-01")), Some((d("2024-01-03"), 40.0)));
    }

    #[test]
    fn test_empty_table_returns_sentinel() {
        let empty = RateTable::new();

        assert_eq!(empty.resolve(d("2024-01-04")), NO_RATE);
        assert_eq!(empty.lookup(d("2024-01-04")), None);
    }

    #[test]
    fn test_observation_recorded_under_both_dates() {
        let mut table = RateTable::new();
        table.record_observation(
            d("2024-01-06"),
            RateObservation {
                date: d("2024-01-05"),
                rate: 40.5,
            },
        );

        assert_eq!(table.get(d("2024-01-06")), Some(40.5));
        assert_eq!(table.get(d("2024-01-05")), Some(40.5));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_plan_splits_monthly_and_daily() {
        let dates = vec![
            d("2022-05-14"),
            d("2022-07-02"),
            d("2022-07-02"),
            d("2026-01-03"),
            d("2026-01-02"),
        ];
        let plan = RatePlan::build(&dates, None, Some(d("2026-01-01")));

        assert_eq!(plan.months.first(), Some(&(2022, 5)));
        assert_eq!(plan.months.last(), Some(&(2025, 12)));
        assert_eq!(plan.months.len(), 8 + 12 * 3);
        assert_eq!(plan.single_dates, vec![d("2026-01-02"), d("2026-01-03")]);
        assert_eq!(plan.call_count(), 46);
    }

    #[test]
    fn test_plan_without_daily_cutoff_covers_row_months() {
        let dates = vec![d("2024-03-31"), d("2024-01-15")];
        let plan = RatePlan::build(&dates, Some(d("2023-11-01")), None);

        assert_eq!(plan.months, vec![(2023, 11), (2023, 12), (2024, 1), (2024, 2), (2024, 3)]);
        assert!(plan.single_dates.is_empty());
    }

    #[test]
    fn test_plan_with_only_daily_rows_has_no_months() {
        let plan = RatePlan::build(&[d("2026-02-02")], None, Some(d("2026-01-01")));

        assert!(plan.months.is_empty());
        assert_eq!(plan.single_dates, vec![d("2026-02-02")]);
        assert_eq!(RatePlan::build(&[], None, None), RatePlan::default());
    }

    #[test]
    fn test_collect_saturday_single_fetch_records_friday_under_both_keys() {
        let source = FixtureRateSource::new(vec![(d("2026-01-02"), 33.7)]);
        let fetcher = RateFetcher::new(source, NoPacing, CurrencyPair::default());
        let plan = RatePlan {
            months: Vec::new(),
            single_dates: vec![d("2026-01-03")],
        };

        let (table, stats) = collect_rates(&fetcher, &plan);

        assert_eq!(table.get(d("2026-01-03")), Some(33.7));
        assert_eq!(table.get(d("2026-01-02")), Some(33.7));
        assert_eq!(stats.single_calls, 1);
        assert_eq!(stats.failed_calls(), 0);
    }

    struct FlakySource {
        fail_month: u32,
        inner: FixtureRateSource,
    }

    impl RateSource for FlakySource {
        fn fetch_range(
            &self,
            pair: &CurrencyPair,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<BTreeMap<NaiveDate, f64>> {
            if start.month() == self.fail_month {
                bail!("HTTP 429");
            }
            self.inner.fetch_range(pair, start, end)
        }

        fn fetch_single(&self, _: &CurrencyPair, _: NaiveDate) -> Result<RateObservation> {
            bail!("timeout")
        }
    }

    #[test]
    fn test_collect_continues_past_failed_calls() {
        let source = FlakySource {
            fail_month: 2,
            inner: FixtureRateSource::new(vec![
                (d("2024-01-31"), 39.0),
                (d("2024-02-15"), 39.5),
                (d("2024-03-01"), 40.0),
            ]),
        };
        let fetcher = RateFetcher::new(source, NoPacing, CurrencyPair::default());
        let plan = RatePlan {
            months: vec![(2024, 1), (2024, 2), (2024, 3)],
            single_dates: vec![d("2024-04-06")],
        };

        let (table, stats) = collect_rates(&fetcher, &plan);

        assert_eq!(table.len(), 2);
        assert_eq!(stats.range_calls, 3);
        assert_eq!(stats.failed_calls(), 2);
        // February had no coverage: falls back to January's last quote
        assert_eq!(table.resolve(d("2024-02-15")), 39.0);
        // The failed single-date call left no zero behind
        assert_eq!(table.resolve(d("2024-04-06")), 40.0);
    }
}
