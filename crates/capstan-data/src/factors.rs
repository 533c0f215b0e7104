//! Fama-French factor tables.
//!
//! The published files are CSV with a free-text preamble, a header row
//! (`,Mkt-RF,SMB,HML,RF`), data rows keyed by a compact `YYYYMMDD` date and
//! values in percent, and a copyright footer. Monthly files also carry an
//! annual section keyed by bare years.
//!
//! Parsing never fails on content: any row whose first cell is not an
//! eight-digit calendar date is skipped, and unreadable cells become missing
//! values. Records are read as raw bytes with quoting off, so stray quotes
//! or non-UTF-8 text in the preamble or footer only affect their own row.
//! Only I/O errors are reported.

use crate::error::Result;
use crate::returns::RiskFreeRate;
use crate::series::{DateRange, TimeSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::{debug, trace, warn};

/// Sentinels the factor library uses for missing observations.
const MISSING_SENTINELS: [f64; 2] = [-99.99, -999.0];

/// One dated row of factor returns, as decimal fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorRow {
    /// Observation date
    pub date: NaiveDate,
    /// Market return minus the risk-free rate
    pub mkt_rf: Option<f64>,
    /// Small minus big
    pub smb: Option<f64>,
    /// High minus low (book-to-market)
    pub hml: Option<f64>,
    /// Risk-free rate
    pub rf: Option<f64>,
}

/// Factor columns present in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactorColumn {
    /// `Mkt-RF`
    MarketExcess,
    /// `SMB`
    Smb,
    /// `HML`
    Hml,
    /// `RF`
    RiskFree,
}

impl FactorColumn {
    /// Header label used by the factor library.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::MarketExcess => "Mkt-RF",
            Self::Smb => "SMB",
            Self::Hml => "HML",
            Self::RiskFree => "RF",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "MKT-RF" | "MKT_RF" => Some(Self::MarketExcess),
            "SMB" => Some(Self::Smb),
            "HML" => Some(Self::Hml),
            "RF" => Some(Self::RiskFree),
            _ => None,
        }
    }

    const fn value(&self, row: &FactorRow) -> Option<f64> {
        match self {
            Self::MarketExcess => row.mkt_rf,
            Self::Smb => row.smb,
            Self::Hml => row.hml,
            Self::RiskFree => row.rf,
        }
    }
}

/// Cell positions of each factor.
#[derive(Debug, Clone, Copy)]
struct ColumnLayout {
    mkt_rf: Option<usize>,
    smb: Option<usize>,
    hml: Option<usize>,
    rf: Option<usize>,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            mkt_rf: Some(1),
            smb: Some(2),
            hml: Some(3),
            rf: Some(4),
        }
    }
}

impl ColumnLayout {
    /// Layout described by a header record, if the record is one.
    fn from_header(record: &csv::ByteRecord) -> Option<Self> {
        let mut layout = Self {
            mkt_rf: None,
            smb: None,
            hml: None,
            rf: None,
        };
        let mut found = false;
        for (idx, cell) in record.iter().enumerate().skip(1) {
            let slot = match text(cell).and_then(FactorColumn::from_label) {
                Some(FactorColumn::MarketExcess) => &mut layout.mkt_rf,
                Some(FactorColumn::Smb) => &mut layout.smb,
                Some(FactorColumn::Hml) => &mut layout.hml,
                Some(FactorColumn::RiskFree) => &mut layout.rf,
                None => continue,
            };
            *slot = Some(idx);
            found = true;
        }
        found.then_some(layout)
    }
}

/// Date-ordered factor rows restricted to an analysis window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FactorDataset {
    rows: Vec<FactorRow>,
}

impl FactorDataset {
    /// Parse a raw factor table and keep rows inside `range`.
    pub fn parse(bytes: &[u8], range: &DateRange) -> Result<Self> {
        Self::parse_reader(bytes, range)
    }

    /// Parse a factor table from any reader.
    pub fn parse_reader<R: Read>(reader: R, range: &DateRange) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut layout = ColumnLayout::default();
        let mut rows = Vec::new();
        let mut skipped = 0usize;

        for record in csv_reader.byte_records() {
            let record = record?;
            let first = record.get(0).and_then(text).unwrap_or_default();

            let Some(date) = parse_compact_date(first) else {
                if let Some(header) = ColumnLayout::from_header(&record) {
                    layout = header;
                } else {
                    let row = String::from_utf8_lossy(record.as_slice());
                    trace!(row = %row, "skipping non-data row");
                    skipped += 1;
                }
                continue;
            };

            if !range.contains(date) {
                continue;
            }

            let cell = |idx: Option<usize>| {
                idx.and_then(|i| record.get(i))
                    .and_then(text)
                    .and_then(parse_percent)
            };
            rows.push(FactorRow {
                date,
                mkt_rf: cell(layout.mkt_rf),
                smb: cell(layout.smb),
                hml: cell(layout.hml),
                rf: cell(layout.rf),
            });
        }

        debug!(rows = rows.len(), skipped, "parsed factor table");
        Ok(Self::from_rows(rows))
    }

    /// Build a dataset from rows in any order.
    ///
    /// Rows are sorted by date; for repeated dates the first row wins.
    pub fn from_rows(mut rows: Vec<FactorRow>) -> Self {
        rows.sort_by_key(|row| row.date);
        let before = rows.len();
        rows.dedup_by_key(|row| row.date);
        if rows.len() < before {
            warn!(
                duplicates = before - rows.len(),
                "dropped factor rows with repeated dates"
            );
        }
        Self { rows }
    }

    /// Rows in ascending date order.
    pub fn rows(&self) -> &[FactorRow] {
        &self.rows
    }

    /// Number of rows.
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset has no rows.
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Series for one factor, skipping rows where it is missing.
    pub fn column(&self, column: FactorColumn) -> TimeSeries {
        let (dates, values) = self
            .rows
            .iter()
            .filter_map(|row| column.value(row).map(|v| (row.date, v)))
            .unzip();
        // Rows are strictly date-ordered, so any subset is too.
        TimeSeries::from_parts(dates, values).unwrap_or_default()
    }

    /// Market excess return series (`Mkt-RF`).
    pub fn market_excess(&self) -> TimeSeries {
        self.column(FactorColumn::MarketExcess)
    }

    /// Size factor series (`SMB`).
    pub fn smb(&self) -> TimeSeries {
        self.column(FactorColumn::Smb)
    }

    /// Value factor series (`HML`).
    pub fn hml(&self) -> TimeSeries {
        self.column(FactorColumn::Hml)
    }

    /// Daily risk-free series (`RF`).
    pub fn risk_free(&self) -> TimeSeries {
        self.column(FactorColumn::RiskFree)
    }

    /// The published daily risk-free rate as a rate source.
    pub fn risk_free_rate(&self) -> RiskFreeRate {
        RiskFreeRate::Daily(self.risk_free())
    }
}

/// A cell as text; cells that are not UTF-8 are treated as unreadable.
fn text(cell: &[u8]) -> Option<&str> {
    std::str::from_utf8(cell).ok()
}

/// Parse an eight-digit `YYYYMMDD` cell into a calendar date.
fn parse_compact_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    if cell.len() != 8 || !cell.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = cell[0..4].parse().ok()?;
    let month = cell[4..6].parse().ok()?;
    let day = cell[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a percentage cell into a decimal fraction.
fn parse_percent(cell: &str) -> Option<f64> {
    let value: f64 = cell.trim().parse().ok()?;
    if !value.is_finite() || MISSING_SENTINELS.contains(&value) {
        return None;
    }
    Some(value / 100.0)
}
