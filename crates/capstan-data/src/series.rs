//! Date-keyed series and analysis windows.

use crate::error::{DataError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Inclusive calendar window `[start, end]` for an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = DataError;

    fn try_from(raw: RawDateRange) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl DateRange {
    /// Create a new range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(DataError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A window covering a single day.
    pub const fn single_day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// The window of `years` calendar years ending on `end`.
    ///
    /// February 29th falls back to February 28th when the start year is not a leap year.
    pub fn trailing_years(end: NaiveDate, years: u32) -> Result<Self> {
        let year = end.year() - years as i32;
        let start = end
            .with_year(year)
            .or_else(|| NaiveDate::from_ymd_opt(year, end.month(), 28))
            .ok_or_else(|| {
                DataError::TimeConversion(format!("no date {years} years before {end}"))
            })?;
        Self::new(start, end)
    }

    /// First day of the window.
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the window.
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Check whether `date` falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Ordered `(date, value)` observations with strictly increasing dates.
///
/// Built once and never mutated; every transform returns a new series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series from `(date, value)` pairs.
    ///
    /// # Errors
    /// Returns [`DataError::UnorderedDates`] if any date does not strictly follow its predecessor.
    pub fn new(points: Vec<(NaiveDate, f64)>) -> Result<Self> {
        let (dates, values): (Vec<_>, Vec<_>) = points.into_iter().unzip();
        Self::from_parts(dates, values)
    }

    /// Build a series from parallel date and value vectors.
    pub fn from_parts(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(DataError::LengthMismatch {
                dates: dates.len(),
                values: values.len(),
            });
        }
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(DataError::UnorderedDates {
                previous: pair[0],
                next: pair[1],
            });
        }
        Ok(Self { dates, values })
    }

    /// Number of observations.
    pub const fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the series has no observations.
    pub const fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Observation dates, ascending.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Observation values, in date order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterate over `(date, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Value observed on `date`, if any.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.values[idx])
    }

    /// First observation date.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    /// Last observation date.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Restrict the series to an inclusive window.
    pub fn restrict(&self, range: &DateRange) -> Self {
        let (dates, values) = self.iter().filter(|(d, _)| range.contains(*d)).unzip();
        Self { dates, values }
    }

    /// Apply `f` to every value, keeping the dates.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            dates: self.dates.clone(),
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }
}

/// Series reduced to the dates they all share.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedColumns {
    /// Common dates, ascending.
    pub dates: Vec<NaiveDate>,
    /// One column per input series, in input order.
    pub columns: Vec<Vec<f64>>,
}

impl AlignedColumns {
    /// Number of common observations.
    pub const fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether no date is shared by every input.
    pub const fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Inner join of several series on their dates.
///
/// Only dates present in every input survive; an empty input list yields an empty result.
pub fn inner_join(series: &[&TimeSeries]) -> AlignedColumns {
    let Some((first, rest)) = series.split_first() else {
        return AlignedColumns {
            dates: Vec::new(),
            columns: Vec::new(),
        };
    };

    let dates: Vec<NaiveDate> = first
        .dates()
        .iter()
        .copied()
        .filter(|d| rest.iter().all(|s| s.dates.binary_search(d).is_ok()))
        .collect();

    let columns = series
        .iter()
        .map(|s| {
            dates
                .iter()
                .filter_map(|d| s.get(*d))
                .collect::<Vec<f64>>()
        })
        .collect();

    AlignedColumns { dates, columns }
}
