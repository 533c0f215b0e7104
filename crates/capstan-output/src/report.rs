//! JSON reports for Capstan analyses.

use capstan_data::DateRange;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required builder field was never set.
    #[error("Missing report field: {0}")]
    MissingField(&'static str),
}

/// A report of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// What was analyzed: a symbol, or a label for a set of symbols.
    pub subject: String,

    /// Analysis kind (e.g. "CAPM", "Fama-French", "clustering").
    pub analysis: String,

    /// Report generation timestamp.
    pub timestamp: DateTime<Utc>,

    /// First day of the requested window.
    pub period_start: NaiveDate,

    /// Last day of the requested window.
    pub period_end: NaiveDate,

    /// Report contents (JSON format).
    pub contents: serde_json::Value,
}

impl Report {
    /// Create a new report stamped with the current time.
    pub fn new(
        subject: String,
        analysis: String,
        window: &DateRange,
        contents: serde_json::Value,
    ) -> Self {
        Self {
            subject,
            analysis,
            timestamp: Utc::now(),
            period_start: window.start(),
            period_end: window.end(),
            contents,
        }
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the pretty JSON form to a file.
    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    subject: Option<String>,
    analysis: Option<String>,
    window: Option<DateRange>,
    contents: Option<serde_json::Value>,
}

impl ReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the analysis kind.
    pub fn analysis(mut self, analysis: impl Into<String>) -> Self {
        self.analysis = Some(analysis.into());
        self
    }

    /// Set the analysis window.
    pub const fn window(mut self, window: DateRange) -> Self {
        self.window = Some(window);
        self
    }

    /// Set the report contents.
    pub fn contents(mut self, contents: serde_json::Value) -> Self {
        self.contents = Some(contents);
        self
    }

    /// Serialize a value into the report contents.
    pub fn contents_from<T: Serialize>(mut self, value: &T) -> Result<Self, ReportError> {
        self.contents = Some(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Build the report.
    ///
    /// # Errors
    /// [`ReportError::MissingField`] when no subject or window was set.
    pub fn build(self) -> Result<Report, ReportError> {
        let subject = self.subject.ok_or(ReportError::MissingField("subject"))?;
        let window = self.window.ok_or(ReportError::MissingField("window"))?;
        Ok(Report::new(
            subject,
            self.analysis.unwrap_or_default(),
            &window,
            self.contents.unwrap_or(serde_json::Value::Null),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_report_creation() {
        let report = Report::new(
            "AAPL".to_string(),
            "CAPM".to_string(),
            &window(),
            serde_json::json!({"beta": 1.2}),
        );

        assert_eq!(report.subject, "AAPL");
        assert_eq!(report.period_start, window().start());
        assert_eq!(report.contents["beta"], 1.2);
    }

    #[test]
    fn test_report_builder() {
        let report = ReportBuilder::new()
            .subject("MSFT")
            .analysis("Fama-French")
            .window(window())
            .contents(serde_json::json!({"key": "value"}))
            .build()
            .unwrap();

        assert_eq!(report.subject, "MSFT");
        assert_eq!(report.analysis, "Fama-French");
        assert_eq!(report.period_end, window().end());
    }

    #[test]
    fn test_report_builder_requires_window() {
        let result = ReportBuilder::new().subject("MSFT").build();
        assert!(matches!(result, Err(ReportError::MissingField("window"))));
    }

    #[test]
    fn test_report_json_has_dates() {
        let report = ReportBuilder::new()
            .subject("universe")
            .window(window())
            .contents_from(&vec![1, 2, 3])
            .unwrap()
            .build()
            .unwrap();

        let json = report.to_json().unwrap();
        assert!(json.contains("\"period_start\": \"2021-01-01\""));
        assert!(json.contains("\"timestamp\""));
    }

    #[test]
    fn test_report_write_to_file() {
        let report = ReportBuilder::new()
            .subject("KO")
            .analysis("CAPM")
            .window(window())
            .contents(serde_json::json!({"beta": 0.6}))
            .build()
            .unwrap();
        let path = std::env::temp_dir().join(format!("capstan-report-{}.json", std::process::id()));

        report.write_to(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(written, report.to_json().unwrap());
        assert!(written.contains("\"subject\": \"KO\""));
    }
}
