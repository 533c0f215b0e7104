//! End-to-end runs against in-memory sources.

use approx::assert_abs_diff_eq;
use capstan::data::{
    DataError, DateRange, FactorSource, InMemoryPriceSource, PriceSource, TRADING_DAYS_PER_YEAR,
    TimeSeries,
};
use capstan::pipeline::{
    AnalysisConfig, DEFAULT_CONCURRENCY, cluster_stocks, feature_vectors, load_factors,
    load_price_panel, load_price_panel_with, run_capm, run_fama_french,
};
use capstan::{PipelineError, StaticUniverse, Universe};
use chrono::{Duration, NaiveDate};
use std::sync::atomic::{AtomicUsize, Ordering};

const DAYS: usize = 40;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn window() -> DateRange {
    DateRange::new(start(), start() + Duration::days(DAYS as i64 + 5)).unwrap()
}

/// Deterministic, non-repeating market return path.
fn market_returns() -> Vec<f64> {
    (0..DAYS)
        .map(|t| 0.01 * ((t as f64) * 1.7).sin() + 0.002 * ((t as f64) * 0.3).cos())
        .collect()
}

fn prices(returns: &[f64]) -> TimeSeries {
    let mut price = 100.0;
    let mut points = vec![(start(), price)];
    for (i, r) in returns.iter().enumerate() {
        price *= 1.0 + r;
        points.push((start() + Duration::days(i as i64 + 1), price));
    }
    TimeSeries::new(points).unwrap()
}

struct StaticFactorTable(String);

impl FactorSource for StaticFactorTable {
    async fn fetch_factor_table(&self) -> Result<Vec<u8>, DataError> {
        Ok(self.0.clone().into_bytes())
    }
}

fn config() -> AnalysisConfig {
    AnalysisConfig::default().with_window(window())
}

#[tokio::test]
async fn test_capm_from_price_source() {
    let rf = 0.02 / TRADING_DAYS_PER_YEAR;
    let stock: Vec<f64> = market_returns()
        .iter()
        .map(|m| rf + 0.0004 + 1.4 * (m - rf))
        .collect();
    let source = InMemoryPriceSource::new()
        .with_series("SPY", prices(&market_returns()))
        .with_series("NVDA", prices(&stock));

    let config = config();
    let symbols = vec!["NVDA".to_string(), config.market_symbol.clone()];
    let panel = load_price_panel(&source, &symbols, &config.window)
        .await
        .unwrap();

    let result = run_capm(
        panel.require("NVDA").unwrap(),
        panel.require("SPY").unwrap(),
        &config,
    )
    .unwrap();

    assert_abs_diff_eq!(result.beta().unwrap(), 1.4, epsilon = 1e-8);
    assert_abs_diff_eq!(result.intercept, 0.0004, epsilon = 1e-9);
    assert_eq!(result.observations, DAYS);
}

#[tokio::test]
async fn test_fama_french_from_factor_source() {
    let market = market_returns();
    let smb: Vec<f64> = (0..DAYS).map(|t| 0.004 * ((t as f64) * 0.9).cos()).collect();
    let hml: Vec<f64> = (0..DAYS).map(|t| 0.003 * ((t as f64) * 2.3).sin()).collect();
    let rf = 0.0001;

    let mut table = String::from("Daily factors\n\n,Mkt-RF,SMB,HML,RF\n");
    for t in 0..DAYS {
        let date = start() + Duration::days(t as i64 + 1);
        table.push_str(&format!(
            "{},{},{},{},{}\n",
            date.format("%Y%m%d"),
            (market[t] - rf) * 100.0,
            smb[t] * 100.0,
            hml[t] * 100.0,
            rf * 100.0
        ));
    }
    table.push_str("\n Annual Factors: January-December\n,Mkt-RF,SMB,HML,RF\n");
    table.push_str("  2023, 22.00, -3.10, -12.00, 5.00\n");

    let stock: Vec<f64> = (0..DAYS)
        .map(|t| rf + 0.9 * (market[t] - rf) + 0.5 * smb[t] - 0.3 * hml[t])
        .collect();

    let config = config();
    let factors = load_factors(&StaticFactorTable(table), &config.window)
        .await
        .unwrap();
    assert_eq!(factors.len(), DAYS);

    let result = run_fama_french(&prices(&stock), &factors, &config).unwrap();

    assert_eq!(result.factor_names, vec!["Mkt-RF", "SMB", "HML"]);
    assert_abs_diff_eq!(result.slope("Mkt-RF").unwrap(), 0.9, epsilon = 1e-6);
    assert_abs_diff_eq!(result.slope("SMB").unwrap(), 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(result.slope("HML").unwrap(), -0.3, epsilon = 1e-6);
    assert_abs_diff_eq!(result.intercept, 0.0, epsilon = 1e-9);
}

#[tokio::test]
async fn test_cluster_default_universe() {
    let universe = StaticUniverse::large_caps();
    let mut source = InMemoryPriceSource::new();
    for (i, symbol) in universe.symbols().iter().enumerate() {
        let scale = 0.5 + 0.25 * i as f64;
        let returns: Vec<f64> = market_returns()
            .iter()
            .enumerate()
            .map(|(t, m)| scale * m + 0.001 * ((t * (i + 2)) as f64).sin())
            .collect();
        source = source.with_series(symbol.clone(), prices(&returns));
    }

    let config = config();
    let fetched = AtomicUsize::new(0);
    let panel = load_price_panel_with(&source, &universe.symbols(), &config.window, 3, |_| {
        fetched.fetch_add(1, Ordering::SeqCst);
    })
    .await
    .unwrap();
    assert_eq!(fetched.load(Ordering::SeqCst), universe.size());
    assert_eq!(panel.symbols(), universe.symbols());

    let features = feature_vectors(&panel).unwrap();
    assert_eq!(features.len(), 10);

    let first = cluster_stocks(&features, &config.cluster).unwrap();
    let second = cluster_stocks(&features, &config.cluster).unwrap();

    let sizes = first.assignment.cluster_sizes();
    assert_eq!(sizes.len(), 3);
    assert!(sizes.iter().all(|&s| s > 0));
    assert_eq!(first, second);
}

/// Price source that records how many fetches overlap.
#[derive(Default)]
struct CountingSource {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl PriceSource for CountingSource {
    async fn fetch_prices(
        &self,
        _symbol: &str,
        _range: &DateRange,
    ) -> Result<TimeSeries, DataError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(prices(&market_returns()))
    }
}

#[tokio::test]
async fn test_fetch_concurrency_is_bounded() {
    let symbols: Vec<String> = (0..12).map(|i| format!("S{i}")).collect();

    let limited = CountingSource::default();
    let panel = load_price_panel_with(&limited, &symbols, &window(), 2, |_| {})
        .await
        .unwrap();
    assert_eq!(panel.len(), 12);
    assert_eq!(limited.peak.load(Ordering::SeqCst), 2);

    let defaulted = CountingSource::default();
    load_price_panel(&defaulted, &symbols, &window()).await.unwrap();
    assert_eq!(defaulted.peak.load(Ordering::SeqCst), DEFAULT_CONCURRENCY);
}

#[tokio::test]
async fn test_missing_symbol_error_passes_through() {
    let source = InMemoryPriceSource::new().with_series("SPY", prices(&market_returns()));
    let symbols = vec!["SPY".to_string(), "NOPE".to_string()];

    let result = load_price_panel(&source, &symbols, &window()).await;
    assert!(matches!(
        result,
        Err(PipelineError::Data(DataError::MissingData { symbol, .. })) if symbol == "NOPE"
    ));
}

#[test]
fn test_capm_needs_overlap() {
    let config = config();
    let market = prices(&market_returns()[..10]);
    let late = TimeSeries::new(vec![
        (start() + Duration::days(200), 10.0),
        (start() + Duration::days(201), 11.0),
        (start() + Duration::days(202), 12.0),
    ])
    .unwrap();

    let result = run_capm(&late, &market, &config);
    assert!(matches!(result, Err(PipelineError::Model(_))));
}
