//! CSV and JSON export of analysis results.
//!
//! Covers return-moment feature vectors, cluster assignments and regression
//! coefficients. CSV output is flat: one record per ticker, or one record per
//! coefficient for regressions.

use capstan_models::RegressionResult;
use capstan_stats::{ClusterAssignment, StockFeatureVector};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer produced invalid UTF-8.
    #[error("Invalid UTF-8 in CSV output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Pick a format from a file extension; `.json` maps to pretty JSON.
    ///
    /// # Errors
    /// [`ExportError::InvalidFormat`] for a missing or unknown extension.
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(Self::Csv),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::PrettyJson),
            _ => Err(ExportError::InvalidFormat(path.display().to_string())),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// One estimated coefficient of a regression.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoefficientExport {
    /// Security symbol.
    pub symbol: String,

    /// Model name (e.g. "CAPM").
    pub model: String,

    /// Coefficient name: `alpha` for the intercept, otherwise the factor.
    pub term: String,

    /// Point estimate.
    pub estimate: f64,

    /// Standard error of the estimate.
    pub std_error: f64,

    /// t-statistic; empty when the standard error is zero.
    pub t_stat: Option<f64>,

    /// R² of the whole regression, repeated on every row.
    pub r_squared: f64,

    /// Observations in the regression.
    pub observations: usize,
}

impl CoefficientExport {
    /// Flatten a regression into one record per coefficient, intercept first.
    pub fn from_result(symbol: &str, model: &str, result: &RegressionResult) -> Vec<Self> {
        let record = |term: &str, estimate: f64, std_error: f64, t_stat: Option<f64>| Self {
            symbol: symbol.to_string(),
            model: model.to_string(),
            term: term.to_string(),
            estimate,
            std_error,
            t_stat,
            r_squared: result.r_squared,
            observations: result.observations,
        };

        let mut records = Vec::with_capacity(result.slopes.len() + 1);
        records.push(record(
            "alpha",
            result.intercept,
            result.intercept_std_error,
            result.intercept_t_stat(),
        ));
        for (((name, &slope), &se), t) in result
            .factor_names
            .iter()
            .zip(&result.slopes)
            .zip(&result.slope_std_errors)
            .zip(result.slope_t_stats())
        {
            records.push(record(name.as_str(), slope, se, t));
        }
        records
    }
}

/// Flattened cluster label for CSV export.
#[derive(Debug, Serialize)]
struct ClusterLabelFlat<'a> {
    ticker: &'a str,
    cluster: usize,
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn csv_records<T: Serialize>(records: impl IntoIterator<Item = T>) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

fn json<T: Serialize + ?Sized>(value: &T, format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(value)?),
        _ => Ok(serde_json::to_string(value)?),
    }
}

impl Exporter for [StockFeatureVector] {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_records(self),
            ExportFormat::Json | ExportFormat::PrettyJson => json(self, format),
        }
    }
}

impl Exporter for ClusterAssignment {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_records(
                self.labels()
                    .iter()
                    .map(|(ticker, cluster)| ClusterLabelFlat {
                        ticker,
                        cluster: *cluster,
                    }),
            ),
            ExportFormat::Json | ExportFormat::PrettyJson => json(self, format),
        }
    }
}

impl Exporter for [CoefficientExport] {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_records(self),
            ExportFormat::Json | ExportFormat::PrettyJson => json(self, format),
        }
    }
}
