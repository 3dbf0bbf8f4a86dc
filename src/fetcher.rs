// 💱 Rate Fetcher - historical FX observations from an external source
//
// Failures here are soft: a failed call yields an empty/zero observation plus a
// warning (`Fetched::Degraded`) and the run continues with reduced coverage.
// Pacing between calls is a pluggable strategy so replays can run without delay.

use crate::config::CurrencyPair;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use serde::Deserialize;
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::Duration;

const DATE_FORMAT: &str = "%Y-%m-%d";
const BROWSER_UA: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 Chrome/120.0.0.0 Safari/537.36";

// ============================================================================
// CORE TYPES
// ============================================================================

/// One quoted rate for the configured currency pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateObservation {
    pub date: NaiveDate,
    pub rate: f64,
}

/// Result of a best-effort fetch: either fresh data or a fallback plus diagnostic
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Fresh(T),
    Degraded { value: T, warning: String },
}

impl<T> Fetched<T> {
    pub fn value(&self) -> &T {
        match self {
            Fetched::Fresh(value) => value,
            Fetched::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Fetched::Fresh(value) => value,
            Fetched::Degraded { value, .. } => value,
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            Fetched::Fresh(_) => None,
            Fetched::Degraded { warning, .. } => Some(warning.as_str()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Fetched::Degraded { .. })
    }
}

// ============================================================================
// RATE SOURCE
// ============================================================================

/// External FX data source (transport + parsing)
pub trait RateSource {
    /// All quoted dates in the inclusive interval
    fn fetch_range(
        &self,
        pair: &CurrencyPair,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, f64>>;

    /// Quote for `date`; the source may report a different effective date
    fn fetch_single(&self, pair: &CurrencyPair, date: NaiveDate) -> Result<RateObservation>;
}

impl<T: RateSource + ?Sized> RateSource for Box<T> {
    fn fetch_range(
        &self,
        pair: &CurrencyPair,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, f64>> {
        (**self).fetch_range(pair, start, end)
    }

    fn fetch_single(&self, pair: &CurrencyPair, date: NaiveDate) -> Result<RateObservation> {
        (**self).fetch_single(pair, date)
    }
}

#[derive(Debug, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    rates: HashMap<String, HashMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
struct SingleResponse {
    date: Option<String>,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// Frankfurter-style HTTP endpoint (`/{start}..{end}` and `/{date}`)
pub struct HttpRateSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpRateSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(BROWSER_UA)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(HttpRateSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("HTTP request failed: {}", url))?;

        if !response.status().is_success() {
            bail!("rate source returned {} for {}", response.status(), url);
        }

        response
            .json::<T>()
            .with_context(|| format!("Failed to parse rate response from {}", url))
    }
}

impl RateSource for HttpRateSource {
    fn fetch_range(
        &self,
        pair: &CurrencyPair,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, f64>> {
        let url = format!(
            "{}/{}..{}?from={}&to={}",
            self.base_url,
            start.format(DATE_FORMAT),
            end.format(DATE_FORMAT),
            pair.from,
            pair.to
        );
        let body: RangeResponse = self.get_json(&url)?;

        let mut rates = BTreeMap::new();
        for (date_str, quotes) in body.rates {
            let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
                .with_context(|| format!("Invalid date in rate response: {}", date_str))?;
            // A date without a quote for the target currency carries no information
            if let Some(rate) = quotes.get(&pair.to) {
                rates.insert(date, *rate);
            }
        }

        Ok(rates)
    }

    fn fetch_single(&self, pair: &CurrencyPair, date: NaiveDate) -> Result<RateObservation> {
        let url = format!(
            "{}/{}?from={}&to={}",
            self.base_url,
            date.format(DATE_FORMAT),
            pair.from,
            pair.to
        );
        let body: SingleResponse = self.get_json(&url)?;

        let effective = match body.date {
            Some(date_str) => NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
                .with_context(|| format!("Invalid date in rate response: {}", date_str))?,
            None => date,
        };
        let rate = body
            .rates
            .get(&pair.to)
            .copied()
            .ok_or_else(|| anyhow!("no {} quote in response for {}", pair.to, date))?;

        Ok(RateObservation {
            date: effective,
            rate,
        })
    }
}

/// Recorded quotes replayed from memory or a local JSON file.
///
/// Single-date queries without a quote are remapped to the nearest earlier
/// quoted date, the way the live source reports weekends and holidays.
#[derive(Debug, Clone, Default)]
pub struct FixtureRateSource {
    rates: BTreeMap<NaiveDate, f64>,
}

#[derive(Debug, Deserialize)]
struct FixtureFile {
    rates: BTreeMap<String, f64>,
}

impl FixtureRateSource {
    pub fn new<I: IntoIterator<Item = (NaiveDate, f64)>>(rates: I) -> Self {
        FixtureRateSource {
            rates: rates.into_iter().collect(),
        }
    }

    /// Load `{ "rates": { "YYYY-MM-DD": rate } }`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rate fixture: {:?}", path.as_ref()))?;
        let file: FixtureFile =
            serde_json::from_str(&content).context("Failed to parse rate fixture JSON")?;

        let mut rates = BTreeMap::new();
        for (date_str, rate) in file.rates {
            let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
                .with_context(|| format!("Invalid date in rate fixture: {}", date_str))?;
            rates.insert(date, rate);
        }

        Ok(FixtureRateSource { rates })
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl RateSource for FixtureRateSource {
    fn fetch_range(
        &self,
        _pair: &CurrencyPair,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, f64>> {
        if start > end {
            bail!("invalid range {}..{}", start, end);
        }
        Ok(self
            .rates
            .range(start..=end)
            .map(|(date, rate)| (*date, *rate))
            .collect())
    }

    fn fetch_single(&self, _pair: &CurrencyPair, date: NaiveDate) -> Result<RateObservation> {
        self.rates
            .range(..=date)
            .next_back()
            .map(|(effective, rate)| RateObservation {
                date: *effective,
                rate: *rate,
            })
            .ok_or_else(|| anyhow!("no quote on or before {}", date))
    }
}

// ============================================================================
// PACING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Range,
    Single,
}

/// Delay strategy applied between successive fetch calls
pub trait Pacer {
    fn pace(&self, kind: FetchKind);
}

impl<T: Pacer + ?Sized> Pacer for Box<T> {
    fn pace(&self, kind: FetchKind) {
        (**self).pace(kind)
    }
}

/// Fixed sleep per kind of call (respects the source's rate limit)
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    pub range: Duration,
    pub single: Duration,
}

impl FixedDelay {
    pub fn new(range: Duration, single: Duration) -> Self {
        FixedDelay { range, single }
    }
}

impl Pacer for FixedDelay {
    fn pace(&self, kind: FetchKind) {
        let delay = match kind {
            FetchKind::Range => self.range,
            FetchKind::Single => self.single,
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

/// No delay (replays against local fixtures)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

impl Pacer for NoPacing {
    fn pace(&self, _kind: FetchKind) {}
}

// ============================================================================
// RATE FETCHER
// ============================================================================

/// Paced, failure-tolerant front for a RateSource
pub struct RateFetcher<S: RateSource, P: Pacer> {
    source: S,
    pacer: P,
    pair: CurrencyPair,
    called: Cell<bool>,
}

impl<S: RateSource, P: Pacer> RateFetcher<S, P> {
    pub fn new(source: S, pacer: P, pair: CurrencyPair) -> Self {
        RateFetcher {
            source,
            pacer,
            pair,
            called: Cell::new(false),
        }
    }

    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    fn before_call(&self, kind: FetchKind) {
        if self.called.replace(true) {
            self.pacer.pace(kind);
        }
    }

    /// Rates for every quoted date in `start..=end`; empty on failure
    pub fn fetch_range(&self, start: NaiveDate, end: NaiveDate) -> Fetched<BTreeMap<NaiveDate, f64>> {
        self.before_call(FetchKind::Range);

        match self.source.fetch_range(&self.pair, start, end) {
            Ok(rates) => {
                log::debug!("{} {}..{}: {} quoted days", self.pair, start, end, rates.len());
                Fetched::Fresh(rates)
            }
            Err(e) => {
                let warning = format!("{} range {}..{} failed: {:#}", self.pair, start, end, e);
                log::warn!("{}", warning);
                Fetched::Degraded {
                    value: BTreeMap::new(),
                    warning,
                }
            }
        }
    }

    /// One calendar month (one call per month bounds call volume)
    pub fn fetch_month(&self, year: i32, month: u32) -> Fetched<BTreeMap<NaiveDate, f64>> {
        match month_bounds(year, month) {
            Some((first, last)) => self.fetch_range(first, last),
            None => Fetched::Degraded {
                value: BTreeMap::new(),
                warning: format!("invalid month {}-{:02}", year, month),
            },
        }
    }

    /// Rate for `date` plus the effective date the source reports; rate 0 on failure
    pub fn fetch_single(&self, date: NaiveDate) -> Fetched<RateObservation> {
        self.before_call(FetchKind::Single);

        match self.source.fetch_single(&self.pair, date) {
            Ok(observation) => Fetched::Fresh(observation),
            Err(e) => {
                let warning = format!("{} {} failed: {:#}", self.pair, date, e);
                log::warn!("{}", warning);
                Fetched::Degraded {
                    value: RateObservation { date, rate: 0.0 },
                    warning,
                }
            }
        }
    }
}

/// First and last day of a calendar month
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = next_first - ChronoDuration::days(1);
    debug_assert_eq!(last.month(), first.month());

    Some((first, last))
}

// ============================================================================
// TESTS
// ============================================================================
