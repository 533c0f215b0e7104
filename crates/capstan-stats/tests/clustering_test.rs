//! From return series to cluster assignments for a small universe.

use capstan_data::{ReturnKind, ReturnSeries, TimeSeries};
use capstan_stats::{
    ClusterConfig, Initialization, ReturnStatistics, StatsError, StockClusterer, elbow,
};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TICKERS: [&str; 10] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "META", "NVDA", "JPM", "XOM", "JNJ", "KO",
];

/// Noisy daily returns whose volatility and drift differ by ticker.
fn universe() -> Vec<(String, ReturnSeries)> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    TICKERS
        .iter()
        .enumerate()
        .map(|(i, ticker)| {
            let vol = 0.005 + 0.003 * i as f64;
            let drift = 0.0002 * (i % 3) as f64;
            let points = (0..120)
                .map(|t| {
                    let shock: f64 = rng.gen_range(-1.0..1.0);
                    // Occasional jumps give the higher moments something to see
                    let jump = if t % (7 + i) == 0 { 3.0 * vol } else { 0.0 };
                    (start + Duration::days(t as i64), drift + vol * shock + jump)
                })
                .collect();
            let series = TimeSeries::new(points).unwrap();
            (
                (*ticker).to_string(),
                ReturnSeries::from_series(series, ReturnKind::Simple),
            )
        })
        .collect()
}

#[test]
fn test_ten_tickers_into_three_clusters() {
    let features = ReturnStatistics::new().compute(&universe()).unwrap();
    assert_eq!(features.len(), 10);
    assert!(features.iter().all(|f| f.observations == 120));

    let outcome = StockClusterer::new().fit(&features).unwrap();
    let sizes = outcome.assignment.cluster_sizes();

    assert_eq!(sizes.len(), 3);
    assert!(sizes.iter().all(|&s| s > 0));
    assert_eq!(sizes.iter().sum::<usize>(), 10);

    let tickers: Vec<&str> = outcome
        .assignment
        .labels()
        .iter()
        .map(|(t, _)| t.as_str())
        .collect();
    assert_eq!(tickers, TICKERS);
}

#[test]
fn test_runs_are_reproducible() {
    let features = ReturnStatistics::new().compute(&universe()).unwrap();

    for init in [Initialization::KMeansPlusPlus, Initialization::FarthestPoint] {
        let config = ClusterConfig {
            k: 4,
            init,
            ..ClusterConfig::default()
        };
        let first = StockClusterer::with_config(config.clone())
            .fit(&features)
            .unwrap();
        let second = StockClusterer::with_config(config).fit(&features).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_one_singleton_cluster_per_ticker() {
    let features = ReturnStatistics::new().compute(&universe()).unwrap();
    let config = ClusterConfig {
        k: TICKERS.len(),
        ..ClusterConfig::default()
    };

    let outcome = StockClusterer::with_config(config).fit(&features).unwrap();
    assert_eq!(outcome.assignment.cluster_sizes(), vec![1; TICKERS.len()]);
}

#[test]
fn test_elbow_reaches_zero_at_one_cluster_per_ticker() {
    let features = ReturnStatistics::new().compute(&universe()).unwrap();
    let curve = elbow(&features, &[2, 3, 4, 10], &ClusterConfig::default()).unwrap();

    assert_eq!(curve.len(), 4);
    assert!(curve[0].1 > 0.0);
    assert!(curve[3].1.abs() < 1e-20);
}

#[test]
fn test_constant_series_is_rejected() {
    let mut batch = universe();
    let flat = TimeSeries::from_parts(
        batch[0].1.series().dates().to_vec(),
        vec![0.001; batch[0].1.len()],
    )
    .unwrap();
    batch.push((
        "FLAT".to_string(),
        ReturnSeries::from_series(flat, ReturnKind::Simple),
    ));

    let result = ReturnStatistics::new().compute(&batch);
    assert!(matches!(result, Err(StatsError::ZeroVariance { ticker }) if ticker == "FLAT"));
}
