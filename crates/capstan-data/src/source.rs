//! Data source collaborators.
//!
//! The analysis core never talks to the network directly. Prices and factor
//! tables come from implementations of these traits, and their errors are
//! passed through to the caller untouched.

use crate::error::{DataError, Result};
use crate::series::{DateRange, TimeSeries};
use std::collections::BTreeMap;
use std::future::Future;

/// Supplies adjusted-close price histories.
pub trait PriceSource {
    /// Fetch adjusted closes for `symbol` inside `range`, in ascending date order.
    fn fetch_prices(
        &self,
        symbol: &str,
        range: &DateRange,
    ) -> impl Future<Output = Result<TimeSeries>> + Send;
}

/// Supplies the raw bytes of a factor table.
pub trait FactorSource {
    /// Fetch the table; parsing is left to [`crate::factors::FactorDataset`].
    fn fetch_factor_table(&self) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Price source backed by series held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceSource {
    series: BTreeMap<String, TimeSeries>,
}

impl InMemoryPriceSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a price series for a symbol, replacing any previous one.
    pub fn with_series(mut self, symbol: impl Into<String>, prices: TimeSeries) -> Self {
        self.series.insert(symbol.into(), prices);
        self
    }

    /// Symbols this source can serve, in sorted order.
    pub fn symbols(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }
}

impl PriceSource for InMemoryPriceSource {
    async fn fetch_prices(&self, symbol: &str, range: &DateRange) -> Result<TimeSeries> {
        let prices = self
            .series
            .get(symbol)
            .ok_or_else(|| DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "symbol not loaded".to_string(),
            })?;
        Ok(prices.restrict(range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_restricts_to_range() {
        let prices = TimeSeries::new(vec![(date(2), 1.0), (date(3), 2.0), (date(4), 3.0)]).unwrap();
        let source = InMemoryPriceSource::new().with_series("AAPL", prices);
        let range = DateRange::new(date(3), date(4)).unwrap();

        let fetched = source.fetch_prices("AAPL", &range).await.unwrap();
        assert_eq!(fetched.values(), &[2.0, 3.0]);
    }

    #[test]
    fn test_in_memory_symbols_sorted() {
        let prices = TimeSeries::new(vec![(date(2), 1.0)]).unwrap();
        let source = InMemoryPriceSource::new()
            .with_series("MSFT", prices.clone())
            .with_series("AAPL", prices.clone())
            .with_series("MSFT", prices);

        assert_eq!(source.symbols(), vec!["AAPL", "MSFT"]);
    }

    #[tokio::test]
    async fn test_in_memory_unknown_symbol() {
        let source = InMemoryPriceSource::new();
        let range = DateRange::new(date(3), date(4)).unwrap();

        let result = source.fetch_prices("NOPE", &range).await;
        assert!(matches!(result, Err(DataError::MissingData { .. })));
    }
}
