//! Daily simple and excess returns.
//!
//! Simple returns are keyed by the later of the two prices they compare, so a
//! price series of length `n` always yields `n - 1` returns. The first price
//! never produces a value; it is dropped rather than imputed as zero.

use crate::error::{DataError, Result};
use crate::series::TimeSeries;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Trading days used to de-annualize a constant rate.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Annualized risk-free rate assumed by the CAPM analysis.
pub const CAPM_ANNUAL_RISK_FREE_RATE: f64 = 0.02;

/// Whether a return series is raw or net of the risk-free rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnKind {
    /// `p[i] / p[i-1] - 1`
    Simple,
    /// Simple return minus the daily risk-free rate
    Excess,
}

/// A series of fractional daily returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnSeries {
    series: TimeSeries,
    kind: ReturnKind,
}

impl ReturnSeries {
    /// Wrap an already computed return series.
    pub const fn from_series(series: TimeSeries, kind: ReturnKind) -> Self {
        Self { series, kind }
    }

    /// Underlying date-keyed values.
    pub const fn series(&self) -> &TimeSeries {
        &self.series
    }

    /// Consume into the underlying series.
    pub fn into_series(self) -> TimeSeries {
        self.series
    }

    /// Raw or excess.
    pub const fn kind(&self) -> ReturnKind {
        self.kind
    }

    /// Number of return observations.
    pub const fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether there are no observations.
    pub const fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl AsRef<TimeSeries> for ReturnSeries {
    fn as_ref(&self) -> &TimeSeries {
        &self.series
    }
}

/// Source of the risk-free rate subtracted from simple returns.
///
/// The two variants are deliberately separate: CAPM runs use a constant annual
/// assumption while Fama-French runs use the published daily RF column.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskFreeRate {
    /// Annualized rate, applied as `rate / 252` on every date.
    AnnualConstant(f64),
    /// Daily rate per date.
    Daily(TimeSeries),
}

impl RiskFreeRate {
    /// The constant 2% annual rate used for CAPM.
    pub const fn capm_default() -> Self {
        Self::AnnualConstant(CAPM_ANNUAL_RISK_FREE_RATE)
    }

    /// Daily rate in effect on a date, if known.
    pub fn daily_rate(&self, date: chrono::NaiveDate) -> Option<f64> {
        match self {
            Self::AnnualConstant(rate) => Some(rate / TRADING_DAYS_PER_YEAR),
            Self::Daily(series) => series.get(date),
        }
    }
}

/// Convert prices into simple daily returns.
///
/// # Errors
/// - [`DataError::InsufficientData`] with fewer than two prices
/// - [`DataError::InvalidPrice`] when a denominator price is not strictly positive
pub fn simple_returns(prices: &TimeSeries) -> Result<ReturnSeries> {
    if prices.len() < 2 {
        return Err(DataError::InsufficientData {
            required: 2,
            actual: prices.len(),
        });
    }

    let dates = prices.dates();
    let values = prices.values();
    let mut points = Vec::with_capacity(prices.len() - 1);

    for i in 1..prices.len() {
        let previous = values[i - 1];
        if !(previous > 0.0 && previous.is_finite()) {
            return Err(DataError::InvalidPrice {
                date: dates[i - 1],
                price: previous,
            });
        }
        points.push((dates[i], values[i] / previous - 1.0));
    }

    Ok(ReturnSeries::from_series(
        TimeSeries::new(points)?,
        ReturnKind::Simple,
    ))
}

/// Subtract the daily risk-free rate from each return.
///
/// With a per-date rate, returns on dates the rate series does not cover are dropped.
///
/// # Errors
/// [`DataError::InsufficientData`] when the input is empty or no date has a matching rate.
pub fn excess_returns(returns: &ReturnSeries, rate: &RiskFreeRate) -> Result<ReturnSeries> {
    if returns.is_empty() {
        return Err(DataError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }

    let points: Vec<_> = returns
        .series()
        .iter()
        .filter_map(|(date, r)| rate.daily_rate(date).map(|rf| (date, r - rf)))
        .collect();

    let dropped = returns.len() - points.len();
    if dropped > 0 {
        debug!(dropped, "returns without a matching risk-free rate were dropped");
    }
    if points.is_empty() {
        return Err(DataError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }

    Ok(ReturnSeries::from_series(
        TimeSeries::new(points)?,
        ReturnKind::Excess,
    ))
}
