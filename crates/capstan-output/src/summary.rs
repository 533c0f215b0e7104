//! Terminal and Markdown summaries of analysis results.
//!
//! Percentages are shown for return-like quantities (alpha, mean, volatility);
//! loadings and moments are shown as raw numbers.

use capstan_models::RegressionResult;
use capstan_stats::{ClusteringOutcome, StockFeatureVector};
use serde::Serialize;
use std::fmt;

fn format_t(t: Option<f64>) -> String {
    t.map_or_else(|| "n/a".to_string(), |t| format!("{t:.2}"))
}

/// A fitted asset-pricing regression for one security.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionSummary {
    /// Security symbol.
    pub symbol: String,

    /// Model name.
    pub model: String,

    /// The fit itself.
    pub result: RegressionResult,
}

impl RegressionSummary {
    /// Create a new regression summary.
    pub fn new(
        symbol: impl Into<String>,
        model: impl Into<String>,
        result: RegressionResult,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            model: model.into(),
            result,
        }
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let r = &self.result;
        let mut output = String::new();

        output.push_str(&format!("\n{} Regression: {}\n", self.model, self.symbol));
        if let (Some(first), Some(last)) = (r.residuals.first_date(), r.residuals.last_date()) {
            output.push_str(&format!(
                "Sample: {} to {} ({} observations)\n",
                first, last, r.observations
            ));
        }
        output.push_str(&"=".repeat(72));
        output.push('\n');

        output.push_str(&format!(
            "{:<16} {:>14} {:>14} {:>12}\n",
            "Term", "Estimate", "Std. Error", "t-stat"
        ));
        output.push_str(&"-".repeat(72));
        output.push('\n');
        output.push_str(&format!(
            "{:<16} {:>14.6} {:>14.6} {:>12}\n",
            "alpha (daily)",
            r.intercept,
            r.intercept_std_error,
            format_t(r.intercept_t_stat())
        ));
        for (((name, slope), se), t) in r
            .factor_names
            .iter()
            .zip(&r.slopes)
            .zip(&r.slope_std_errors)
            .zip(r.slope_t_stats())
        {
            output.push_str(&format!(
                "{:<16} {:>14.4} {:>14.4} {:>12}\n",
                name,
                slope,
                se,
                format_t(t)
            ));
        }

        output.push_str(&"-".repeat(72));
        output.push('\n');
        output.push_str(&format!(
            "  Annualized Alpha:         {:.2}%\n",
            r.annualized_alpha() * 100.0
        ));
        output.push_str(&format!("  R²:                       {:.4}\n", r.r_squared));
        output.push_str(&format!(
            "  Adjusted R²:              {:.4}\n",
            r.adjusted_r_squared
        ));
        output.push_str(&format!(
            "  Residual Volatility:      {:.2}% daily\n",
            r.residual_std() * 100.0
        ));
        output.push_str(&"=".repeat(72));
        output.push('\n');

        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let r = &self.result;
        let mut output = String::new();

        output.push_str(&format!("# {} Regression: {}\n\n", self.model, self.symbol));
        output.push_str("| Term | Estimate | Std. Error | t-stat |\n");
        output.push_str("|------|----------|------------|--------|\n");
        output.push_str(&format!(
            "| alpha | {:.6} | {:.6} | {} |\n",
            r.intercept,
            r.intercept_std_error,
            format_t(r.intercept_t_stat())
        ));
        for (((name, slope), se), t) in r
            .factor_names
            .iter()
            .zip(&r.slopes)
            .zip(&r.slope_std_errors)
            .zip(r.slope_t_stats())
        {
            output.push_str(&format!(
                "| {} | {:.4} | {:.4} | {} |\n",
                name,
                slope,
                se,
                format_t(t)
            ));
        }
        output.push_str(&format!(
            "\n**R²:** {:.4} (adjusted {:.4}), {} observations\n",
            r.r_squared, r.adjusted_r_squared, r.observations
        ));

        output
    }
}

impl fmt::Display for RegressionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: alpha {:.6}", self.model, self.symbol, self.result.intercept)?;
        for (name, slope) in self.result.factor_names.iter().zip(&self.result.slopes) {
            write!(f, ", {name} {slope:.4}")?;
        }
        write!(f, ", R² {:.4}", self.result.r_squared)
    }
}

/// Return moments of a batch of tickers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureTable {
    /// One row per ticker.
    pub features: Vec<StockFeatureVector>,
}

impl FeatureTable {
    /// Create a new feature table.
    pub const fn new(features: Vec<StockFeatureVector>) -> Self {
        Self { features }
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\nReturn Moments\n");
        if let Some(first) = self.features.first() {
            output.push_str(&format!("{} aligned observations\n", first.observations));
        }
        output.push_str(&"=".repeat(64));
        output.push('\n');
        output.push_str(&format!(
            "{:<10} {:>12} {:>12} {:>12} {:>12}\n",
            "Ticker", "Mean", "Std. Dev.", "Skewness", "Kurtosis"
        ));
        output.push_str(&"-".repeat(64));
        output.push('\n');

        for fv in &self.features {
            output.push_str(&format!(
                "{:<10} {:>11.4}% {:>11.4}% {:>12.4} {:>12.4}\n",
                fv.ticker,
                fv.mean * 100.0,
                fv.std_dev * 100.0,
                fv.skewness,
                fv.kurtosis
            ));
        }

        output.push_str(&"=".repeat(64));
        output.push('\n');

        output
    }
}

impl fmt::Display for FeatureTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ascii_table())
    }
}

/// Cluster memberships of a clustering run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    /// The clustering result.
    pub outcome: ClusteringOutcome,
}

impl ClusterSummary {
    /// Create a new cluster summary.
    pub const fn new(outcome: ClusteringOutcome) -> Self {
        Self { outcome }
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let assignment = &self.outcome.assignment;
        let mut output = String::new();

        output.push_str(&format!(
            "\nK-Means Clustering: {} tickers, k = {}\n",
            assignment.len(),
            assignment.k()
        ));
        output.push_str(&"=".repeat(64));
        output.push('\n');

        for (cluster, size) in assignment.cluster_sizes().into_iter().enumerate() {
            output.push_str(&format!(
                "Cluster {} ({} members): {}\n",
                cluster,
                size,
                assignment.members(cluster).join(", ")
            ));
        }

        output.push_str(&"-".repeat(64));
        output.push('\n');
        output.push_str(&format!("  Inertia:     {:.4}\n", self.outcome.inertia));
        output.push_str(&format!(
            "  Iterations:  {}{}\n",
            self.outcome.iterations,
            if self.outcome.converged {
                ""
            } else {
                " (not converged)"
            }
        ));
        output.push_str(&"=".repeat(64));
        output.push('\n');

        output
    }
}

impl fmt::Display for ClusterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ascii_table())
    }
}
