//! End-to-end analysis steps.
//!
//! Prices flow from a [`PriceSource`] into returns, and from there into either
//! a factor regression or the moment/clustering path:
//!
//! ```text
//! PriceSource -> returns -> { CAPM / Fama-French fit, moments -> k-means }
//! ```
//!
//! Every step takes its window and settings explicitly through
//! [`AnalysisConfig`]; nothing reads the clock except `AnalysisConfig::default`.

use crate::error::{PipelineError, Result};
use capstan_data::{
    CAPM_ANNUAL_RISK_FREE_RATE, DateRange, FactorDataset, FactorSource, PriceSource, ReturnSeries,
    RiskFreeRate, TimeSeries, excess_returns, simple_returns,
};
use capstan_models::{AssetPricingModel, CapmModel, FamaFrenchModel, OlsConfig, RegressionResult};
use capstan_stats::{
    ClusterConfig, ClusteringOutcome, ReturnStatistics, StockClusterer, StockFeatureVector,
};
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Length of the default trailing window, in years.
pub const DEFAULT_WINDOW_YEARS: u32 = 3;

/// Number of symbols [`load_price_panel`] fetches at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Settings for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Inclusive date window (default: the trailing three years)
    pub window: DateRange,
    /// Market proxy for CAPM (default: "SPY")
    pub market_symbol: String,
    /// Annual risk-free rate for CAPM excess returns (default: 0.02)
    pub capm_annual_risk_free: f64,
    /// Regression settings
    pub ols: OlsConfig,
    /// Clustering settings
    pub cluster: ClusterConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let today = Utc::now().date_naive();
        Self {
            window: DateRange::trailing_years(today, DEFAULT_WINDOW_YEARS)
                .unwrap_or_else(|_| DateRange::single_day(today)),
            market_symbol: "SPY".to_string(),
            capm_annual_risk_free: CAPM_ANNUAL_RISK_FREE_RATE,
            ols: OlsConfig::default(),
            cluster: ClusterConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from a JSON file; absent fields take their defaults.
    ///
    /// # Errors
    /// [`PipelineError::Io`] or [`PipelineError::Config`]
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a configuration from JSON text; absent fields take their defaults.
    ///
    /// # Errors
    /// [`PipelineError::Config`] for malformed JSON or an inverted window
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Replace the analysis window.
    pub const fn with_window(mut self, window: DateRange) -> Self {
        self.window = window;
        self
    }

    /// Risk-free rate used for CAPM runs.
    pub const fn capm_risk_free(&self) -> RiskFreeRate {
        RiskFreeRate::AnnualConstant(self.capm_annual_risk_free)
    }
}

/// Price histories keyed by symbol, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricePanel {
    entries: Vec<(String, TimeSeries)>,
}

impl PricePanel {
    /// Build a panel from `(symbol, prices)` pairs.
    pub const fn new(entries: Vec<(String, TimeSeries)>) -> Self {
        Self { entries }
    }

    /// Prices for a symbol.
    pub fn get(&self, symbol: &str) -> Option<&TimeSeries> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, prices)| prices)
    }

    /// Prices for a symbol, or [`PipelineError::MissingSymbol`].
    pub fn require(&self, symbol: &str) -> Result<&TimeSeries> {
        self.get(symbol)
            .ok_or_else(|| PipelineError::MissingSymbol(symbol.to_string()))
    }

    /// Symbols in request order.
    pub fn symbols(&self) -> Vec<&str> {
        self.entries.iter().map(|(s, _)| s.as_str()).collect()
    }

    /// `(symbol, prices)` pairs in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TimeSeries)> + '_ {
        self.entries.iter().map(|(s, p)| (s.as_str(), p))
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the panel holds no symbols.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fetch every symbol's prices for the window, [`DEFAULT_CONCURRENCY`] at a time.
///
/// Repeated symbols are fetched once. The first source error aborts the load
/// and is returned unchanged.
pub async fn load_price_panel<S: PriceSource + Sync>(
    source: &S,
    symbols: &[String],
    window: &DateRange,
) -> Result<PricePanel> {
    load_price_panel_with(source, symbols, window, DEFAULT_CONCURRENCY, |_| {}).await
}

/// [`load_price_panel`] with a concurrency limit and a callback run after each symbol arrives.
///
/// At most `concurrency` fetches are in flight at once; zero is treated as one.
pub async fn load_price_panel_with<S, F>(
    source: &S,
    symbols: &[String],
    window: &DateRange,
    concurrency: usize,
    on_fetched: F,
) -> Result<PricePanel>
where
    S: PriceSource + Sync,
    F: Fn(&str),
{
    let mut unique: Vec<&String> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if !unique.contains(&symbol) {
            unique.push(symbol);
        }
    }
    info!(symbols = unique.len(), start = %window.start(), end = %window.end(), "loading prices");

    // `buffered` keeps request order while fetching concurrently
    let entries: Vec<(String, TimeSeries)> = stream::iter(unique)
        .map(|symbol| async move {
            let prices = source.fetch_prices(symbol, window).await?;
            debug!(symbol = %symbol, points = prices.len(), "fetched prices");
            Ok::<_, PipelineError>((symbol.clone(), prices))
        })
        .buffered(concurrency.max(1))
        .inspect_ok(|(symbol, _)| on_fetched(symbol.as_str()))
        .try_collect()
        .await?;

    Ok(PricePanel::new(entries))
}

/// Fetch and parse a factor table, keeping rows inside the window.
pub async fn load_factors<S: FactorSource>(
    source: &S,
    window: &DateRange,
) -> Result<FactorDataset> {
    let bytes = source.fetch_factor_table().await?;
    let dataset = FactorDataset::parse(&bytes, window)?;
    info!(rows = dataset.len(), "loaded factor table");
    Ok(dataset)
}

/// CAPM regression of a stock on the market, both given as prices.
///
/// Excess returns use the config's constant annual risk-free rate.
pub fn run_capm(
    stock_prices: &TimeSeries,
    market_prices: &TimeSeries,
    config: &AnalysisConfig,
) -> Result<RegressionResult> {
    let rate = config.capm_risk_free();
    let market = excess_returns(&simple_returns(market_prices)?, &rate)?;
    let model = CapmModel::with_config(market, config.ols.clone());
    let stock = excess_returns(&simple_returns(stock_prices)?, &rate)?;

    let result = model.fit(&stock)?;
    info!(
        beta = result.beta().unwrap_or(f64::NAN),
        r_squared = result.r_squared,
        "fitted CAPM"
    );
    Ok(result)
}

/// Fama-French three-factor regression of a stock given as prices.
///
/// Excess returns use the dataset's own daily RF column.
pub fn run_fama_french(
    stock_prices: &TimeSeries,
    factors: &FactorDataset,
    config: &AnalysisConfig,
) -> Result<RegressionResult> {
    let stock = excess_returns(&simple_returns(stock_prices)?, &factors.risk_free_rate())?;
    let model = FamaFrenchModel::with_config(factors, config.ols.clone());

    let result = model.fit(&stock)?;
    info!(r_squared = result.r_squared, "fitted Fama-French");
    Ok(result)
}

/// Return moments of every symbol in the panel over their common dates.
pub fn feature_vectors(panel: &PricePanel) -> Result<Vec<StockFeatureVector>> {
    let returns = panel
        .iter()
        .map(|(symbol, prices)| Ok((symbol.to_string(), simple_returns(prices)?)))
        .collect::<Result<Vec<(String, ReturnSeries)>>>()?;

    Ok(ReturnStatistics::new().compute(&returns)?)
}

/// Cluster feature vectors with the given settings.
pub fn cluster_stocks(
    features: &[StockFeatureVector],
    config: &ClusterConfig,
) -> Result<ClusteringOutcome> {
    let outcome = StockClusterer::with_config(config.clone()).fit(features)?;
    info!(
        k = config.k,
        inertia = outcome.inertia,
        iterations = outcome.iterations,
        "clustered stocks"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();

        assert_eq!(config.market_symbol, "SPY");
        assert_eq!(config.capm_annual_risk_free, 0.02);
        assert_eq!(config.cluster.k, 3);
        assert_eq!(config.cluster.seed, 42);
        assert_eq!(config.window.end(), Utc::now().date_naive());
    }

    #[test]
    fn test_partial_json_config() {
        let config = AnalysisConfig::from_json(
            r#"{
                "window": {"start": "2021-01-04", "end": "2023-12-29"},
                "market_symbol": "IWM",
                "cluster": {"k": 4, "init": "farthest"}
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.window.start(),
            NaiveDate::from_ymd_opt(2021, 1, 4).unwrap()
        );
        assert_eq!(config.market_symbol, "IWM");
        assert_eq!(config.cluster.k, 4);
        assert_eq!(config.cluster.max_iterations, 300);
        assert_eq!(config.capm_annual_risk_free, 0.02);
    }

    #[test]
    fn test_inverted_window_rejected() {
        let result = AnalysisConfig::from_json(
            r#"{"window": {"start": "2024-01-02", "end": "2023-01-02"}}"#,
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_panel_lookup() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let panel = PricePanel::new(vec![
            ("MSFT".to_string(), TimeSeries::new(vec![(d, 1.0)]).unwrap()),
            ("AAPL".to_string(), TimeSeries::new(vec![(d, 2.0)]).unwrap()),
        ]);

        assert_eq!(panel.symbols(), vec!["MSFT", "AAPL"]);
        assert_eq!(panel.get("AAPL").unwrap().values(), &[2.0]);
        assert!(matches!(
            panel.require("SPY"),
            Err(PipelineError::MissingSymbol(s)) if s == "SPY"
        ));
    }
}
