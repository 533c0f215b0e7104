//! Adjusted-close prices from Yahoo Finance.

use crate::error::{DataError, Result};
use crate::series::{DateRange, TimeSeries};
use crate::source::PriceSource;
use chrono::{DateTime, Days, NaiveDate};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use yahoo_finance_api as yahoo;

/// Yahoo Finance quote provider with rate limiting.
pub struct YahooQuoteProvider {
    provider: yahoo::YahooConnector,
    rate_limit_delay: Duration,
}

impl std::fmt::Debug for YahooQuoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooQuoteProvider")
            .field("rate_limit_delay", &self.rate_limit_delay)
            .finish_non_exhaustive()
    }
}

impl YahooQuoteProvider {
    /// Create a new Yahoo Finance quote provider with default rate limiting (1 req/sec).
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(1000))
    }

    /// Create a new Yahoo Finance quote provider with custom rate limiting.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            provider: yahoo::YahooConnector::new()?,
            rate_limit_delay,
        })
    }

    /// Fetch daily adjusted closes for a single symbol.
    ///
    /// # Arguments
    /// * `symbol` - The ticker symbol (e.g., "AAPL")
    /// * `range` - Inclusive calendar window
    ///
    /// # Returns
    /// Adjusted closes keyed by trading date. When Yahoo reports several quotes
    /// for one date, the latest one is kept.
    pub async fn fetch_adjusted_closes(
        &self,
        symbol: &str,
        range: &DateRange,
    ) -> Result<TimeSeries> {
        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        let start_time = to_offset_date_time(range.start())?;
        // Yahoo treats the end bound as exclusive
        let end_time = to_offset_date_time(
            range
                .end()
                .checked_add_days(Days::new(1))
                .unwrap_or(range.end()),
        )?;

        let response = self
            .provider
            .get_quote_history(symbol, start_time, end_time)
            .await?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::YahooApi(e.to_string()))?;

        if quotes.is_empty() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "No data returned from Yahoo Finance".to_string(),
            });
        }

        let mut by_date = BTreeMap::new();
        for quote in &quotes {
            let date = DateTime::from_timestamp(quote.timestamp, 0)
                .ok_or_else(|| {
                    DataError::TimeConversion(format!("invalid timestamp {}", quote.timestamp))
                })?
                .date_naive();
            if range.contains(date) {
                by_date.insert(date, quote.adjclose);
            }
        }
        debug!(symbol, quotes = quotes.len(), days = by_date.len(), "fetched quotes");

        // Apply rate limiting
        sleep(self.rate_limit_delay).await;

        TimeSeries::new(by_date.into_iter().collect())
    }
}

impl PriceSource for YahooQuoteProvider {
    async fn fetch_prices(&self, symbol: &str, range: &DateRange) -> Result<TimeSeries> {
        self.fetch_adjusted_closes(symbol, range).await
    }
}

fn to_offset_date_time(date: NaiveDate) -> Result<time::OffsetDateTime> {
    let timestamp = date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| DataError::TimeConversion(format!("invalid date {date}")))?;
    time::OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| DataError::TimeConversion(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_conversion_is_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let converted = to_offset_date_time(date).unwrap();
        assert_eq!(converted.unix_timestamp(), 1_710_460_800);
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_adjusted_closes() {
        let provider = YahooQuoteProvider::with_rate_limit(Duration::ZERO).unwrap();
        let end = chrono::Utc::now().date_naive();
        let range = DateRange::new(end - Days::new(30), end).unwrap();

        let prices = provider.fetch_adjusted_closes("AAPL", &range).await.unwrap();
        assert!(!prices.is_empty());
        assert!(prices.values().iter().all(|p| *p > 0.0));
    }

    #[tokio::test]
    async fn test_invalid_symbol() {
        let provider = YahooQuoteProvider::with_rate_limit(Duration::ZERO).unwrap();
        let end = chrono::Utc::now().date_naive();
        let range = DateRange::new(end - Days::new(30), end).unwrap();

        let result = provider.fetch_adjusted_closes("", &range).await;
        assert!(matches!(result, Err(DataError::InvalidSymbol(_))));
    }
}
