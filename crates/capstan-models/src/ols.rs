//! Ordinary least squares on date-aligned series.
//!
//! Fits `y_t = a + b_1 x_1t + ... + b_k x_kt + e_t` on the dates every input
//! shares. The intercept column is added implicitly.
//!
//! Failure modes are checked up front rather than left to the solver:
//! - fewer than `k + 2` joined observations → [`ModelError::InsufficientOverlap`]
//! - rank-deficient design → [`ModelError::SingularDesign`]

use crate::error::{ModelError, Result};
use crate::linalg::{column_rank, invert};
use capstan_data::{TRADING_DAYS_PER_YEAR, TimeSeries, inner_join};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the OLS fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OlsConfig {
    /// Relative pivot tolerance of the rank check (default: 1e-10)
    pub rank_tolerance: f64,
}

impl Default for OlsConfig {
    fn default() -> Self {
        Self {
            rank_tolerance: 1e-10,
        }
    }
}

/// Outcome of a linear factor regression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionResult {
    /// Factor names, in the order supplied to the fit
    pub factor_names: Vec<String>,
    /// Intercept (daily alpha when fitted on daily returns)
    pub intercept: f64,
    /// One slope per factor, same order as `factor_names`
    pub slopes: Vec<f64>,
    /// Standard error of the intercept
    pub intercept_std_error: f64,
    /// Standard error of each slope
    pub slope_std_errors: Vec<f64>,
    /// Coefficient of determination
    pub r_squared: f64,
    /// R² adjusted for the number of regressors
    pub adjusted_r_squared: f64,
    /// Joined observations used in the fit
    pub observations: usize,
    /// Residuals keyed by the joined dates
    pub residuals: TimeSeries,
}

impl RegressionResult {
    /// Slope for a named factor.
    pub fn slope(&self, factor: &str) -> Option<f64> {
        self.factor_names
            .iter()
            .position(|name| name == factor)
            .map(|idx| self.slopes[idx])
    }

    /// Slope on the first factor (market beta for CAPM and Fama-French).
    pub fn beta(&self) -> Option<f64> {
        self.slopes.first().copied()
    }

    /// Intercept scaled to a yearly figure.
    pub fn annualized_alpha(&self) -> f64 {
        self.intercept * TRADING_DAYS_PER_YEAR
    }

    /// t-statistic of the intercept, `None` when its standard error is zero.
    pub fn intercept_t_stat(&self) -> Option<f64> {
        t_stat(self.intercept, self.intercept_std_error)
    }

    /// t-statistics of the slopes.
    pub fn slope_t_stats(&self) -> Vec<Option<f64>> {
        self.slopes
            .iter()
            .zip(&self.slope_std_errors)
            .map(|(&b, &se)| t_stat(b, se))
            .collect()
    }

    /// Residual standard deviation (idiosyncratic volatility per period).
    pub fn residual_std(&self) -> f64 {
        let dof = self.observations.saturating_sub(self.slopes.len() + 1).max(1);
        let ss_res: f64 = self.residuals.values().iter().map(|e| e * e).sum();
        (ss_res / dof as f64).sqrt()
    }
}

fn t_stat(coefficient: f64, std_error: f64) -> Option<f64> {
    (std_error > 0.0).then(|| coefficient / std_error)
}

/// OLS estimator for linear factor models.
#[derive(Debug, Clone, Default)]
pub struct LinearFactorModel {
    config: OlsConfig,
}

impl LinearFactorModel {
    /// Create an estimator with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an estimator with custom settings.
    pub const fn with_config(config: OlsConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub const fn config(&self) -> &OlsConfig {
        &self.config
    }

    /// Regress `dependent` on the named `factors`.
    ///
    /// # Arguments
    /// * `dependent` - Excess returns of the asset
    /// * `factors` - `(name, series)` pairs; slopes come back in this order
    ///
    /// # Errors
    /// [`ModelError::NoFactors`], [`ModelError::InsufficientOverlap`] or
    /// [`ModelError::SingularDesign`]
    pub fn fit(
        &self,
        dependent: &TimeSeries,
        factors: &[(&str, &TimeSeries)],
    ) -> Result<RegressionResult> {
        if factors.is_empty() {
            return Err(ModelError::NoFactors);
        }

        let mut inputs = Vec::with_capacity(factors.len() + 1);
        inputs.push(dependent);
        inputs.extend(factors.iter().map(|(_, series)| *series));
        let joined = inner_join(&inputs);

        let n = joined.len();
        let k = factors.len();
        let required = k + 2;
        if n < required {
            return Err(ModelError::InsufficientOverlap {
                required,
                actual: n,
            });
        }

        let y = Array1::from_vec(joined.columns[0].clone());
        let mut x = Array2::<f64>::ones((n, k + 1));
        for (j, column) in joined.columns[1..].iter().enumerate() {
            for (i, &value) in column.iter().enumerate() {
                x[[i, j + 1]] = value;
            }
        }

        let rank = column_rank(&x, self.config.rank_tolerance);
        if rank < k + 1 {
            return Err(ModelError::SingularDesign {
                rank,
                columns: k + 1,
            });
        }

        let xtx_inv = invert(&x.t().dot(&x))?;
        let coefficients = xtx_inv.dot(&x.t().dot(&y));
        let residuals = &y - &x.dot(&coefficients);

        let y_mean = y.mean().unwrap_or(0.0);
        let ss_tot: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
        let ss_res: f64 = residuals.iter().map(|e| e * e).sum();
        // A constant dependent is fitted exactly by the intercept
        let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

        let p = k + 1;
        let dof = (n - p) as f64;
        let adjusted_r_squared = 1.0 - (1.0 - r_squared) * (n - 1) as f64 / dof;
        let sigma2 = ss_res / dof;
        let std_errors: Vec<f64> = (0..p)
            .map(|j| (sigma2 * xtx_inv[[j, j]]).max(0.0).sqrt())
            .collect();

        debug!(observations = n, factors = k, r_squared, "fitted OLS");

        Ok(RegressionResult {
            factor_names: factors.iter().map(|(name, _)| (*name).to_string()).collect(),
            intercept: coefficients[0],
            slopes: coefficients.iter().skip(1).copied().collect(),
            intercept_std_error: std_errors[0],
            slope_std_errors: std_errors[1..].to_vec(),
            r_squared,
            adjusted_r_squared,
            observations: n,
            residuals: TimeSeries::from_parts(joined.dates, residuals.to_vec())?,
        })
    }
}
