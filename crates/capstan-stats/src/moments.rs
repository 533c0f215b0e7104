//! Per-ticker return moments over a common window.
//!
//! All series in a batch are inner-joined on their dates first, so every
//! ticker's moments describe exactly the same days.
//!
//! Higher moments use central moments with an `n` denominator:
//! - skewness = m3 / m2^(3/2)
//! - excess kurtosis = m4 / m2² - 3
//!
//! The reported standard deviation is the sample one (`n - 1` denominator).

use crate::error::{Result, StatsError};
use capstan_data::{ReturnSeries, TimeSeries, inner_join};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Fewest aligned observations for which moments are reported.
pub const MIN_OBSERVATIONS: usize = 3;

/// Summary statistics of one ticker's returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockFeatureVector {
    /// Ticker symbol
    pub ticker: String,
    /// Mean daily return
    pub mean: f64,
    /// Sample standard deviation of daily returns
    pub std_dev: f64,
    /// Skewness
    pub skewness: f64,
    /// Excess kurtosis
    pub kurtosis: f64,
    /// Observations the moments were computed from
    pub observations: usize,
}

impl StockFeatureVector {
    /// Column names of [`Self::features`].
    pub const FEATURE_NAMES: [&'static str; 4] = ["mean", "std_dev", "skewness", "kurtosis"];

    /// Compute the moments of a single return sample.
    ///
    /// # Errors
    /// - [`StatsError::InsufficientData`] with fewer than [`MIN_OBSERVATIONS`] values
    /// - [`StatsError::ZeroVariance`] when every value is the same
    pub fn from_values(ticker: impl Into<String>, values: &[f64]) -> Result<Self> {
        let ticker = ticker.into();
        let n = values.len();
        if n < MIN_OBSERVATIONS {
            return Err(StatsError::InsufficientData {
                ticker,
                required: MIN_OBSERVATIONS,
                actual: n,
            });
        }

        let count = n as f64;
        let mean = values.iter().sum::<f64>() / count;

        let (mut s2, mut s3, mut s4) = (0.0, 0.0, 0.0);
        for &v in values {
            let d = v - mean;
            let d2 = d * d;
            s2 += d2;
            s3 += d2 * d;
            s4 += d2 * d2;
        }
        let m2 = s2 / count;
        let m3 = s3 / count;
        let m4 = s4 / count;

        // Rounding in the mean leaves tiny residuals on constant input
        let scale = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if m2.sqrt() <= scale * 1e-12 {
            return Err(StatsError::ZeroVariance { ticker });
        }

        Ok(Self {
            ticker,
            mean,
            std_dev: (s2 / (count - 1.0)).sqrt(),
            skewness: m3 / m2.powf(1.5),
            kurtosis: m4 / (m2 * m2) - 3.0,
            observations: n,
        })
    }

    /// The four clustering features, in [`Self::FEATURE_NAMES`] order.
    pub const fn features(&self) -> [f64; 4] {
        [self.mean, self.std_dev, self.skewness, self.kurtosis]
    }
}

/// Computes [`StockFeatureVector`]s for a batch of tickers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnStatistics;

impl ReturnStatistics {
    /// Create a calculator.
    pub const fn new() -> Self {
        Self
    }

    /// Moments for every ticker, measured on the dates all series share.
    ///
    /// Output follows the input order. An empty batch yields an empty result.
    ///
    /// # Errors
    /// - [`StatsError::DuplicateTicker`] when a ticker appears twice
    /// - [`StatsError::InsufficientData`] when the common window has fewer than
    ///   [`MIN_OBSERVATIONS`] dates
    /// - [`StatsError::ZeroVariance`] for a constant series
    pub fn compute(&self, returns: &[(String, ReturnSeries)]) -> Result<Vec<StockFeatureVector>> {
        let mut seen = HashSet::with_capacity(returns.len());
        for (ticker, _) in returns {
            if !seen.insert(ticker.as_str()) {
                return Err(StatsError::DuplicateTicker(ticker.clone()));
            }
        }

        let series: Vec<&TimeSeries> = returns.iter().map(|(_, r)| r.series()).collect();
        let aligned = inner_join(&series);
        debug!(
            tickers = returns.len(),
            observations = aligned.len(),
            "aligned return series"
        );

        let results: Vec<Result<StockFeatureVector>> = returns
            .par_iter()
            .zip(aligned.columns.par_iter())
            .map(|((ticker, _), column)| StockFeatureVector::from_values(ticker.as_str(), column))
            .collect();

        // Report the first failure in input order, not whichever thread finished first.
        results.into_iter().collect()
    }
}
