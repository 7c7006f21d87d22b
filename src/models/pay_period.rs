//! Pay period model.
//!
//! A pay period is one calendar month, identified by its closing date. Its
//! textual form is `YYYY-MM`; a full closing date (`YYYY-MM-DD`) is also accepted
//! when parsing.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a pay period string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid pay period '{0}', expected YYYY-MM or YYYY-MM-DD")]
pub struct InvalidPayPeriod(pub String);

/// A monthly pay period.
///
/// # Example
///
/// ```
/// use payroll_engine::models::PayPeriod;
/// use chrono::NaiveDate;
///
/// let period: PayPeriod = "2024-02".parse().unwrap();
/// assert_eq!(period.days_in_month(), 29);
/// assert_eq!(period.closing_date(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
/// assert_eq!(period.to_string(), "2024-02");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PayPeriod {
    start: NaiveDate,
    closing: NaiveDate,
}

impl PayPeriod {
    /// Creates the pay period for a calendar month.
    ///
    /// Returns `None` if the month is not 1-12 or the year is outside the
    /// supported calendar range.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let closing = start.checked_add_months(Months::new(1))?.pred_opt()?;
        Some(Self { start, closing })
    }

    /// Returns the pay period whose month contains `date`.
    pub fn containing(date: NaiveDate) -> Option<Self> {
        Self::new(date.year(), date.month())
    }

    /// The first calendar day of the period.
    pub fn start_date(&self) -> NaiveDate {
        self.start
    }

    /// The last calendar day of the period, which identifies it.
    pub fn closing_date(&self) -> NaiveDate {
        self.closing
    }

    /// Number of calendar days in the period (28-31).
    pub fn days_in_month(&self) -> u32 {
        self.closing.day()
    }

    /// The tax year the period is taxed in.
    pub fn tax_year(&self) -> i32 {
        self.closing.year()
    }

    /// Checks if a given date falls within this pay period (inclusive).
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.closing
    }
}

impl fmt::Display for PayPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.start.year(), self.start.month())
    }
}

impl FromStr for PayPeriod {
    type Err = InvalidPayPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPayPeriod(s.to_string());

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Self::containing(date).ok_or_else(invalid);
        }

        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for PayPeriod {
    type Error = InvalidPayPeriod;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PayPeriod> for String {
    fn from(period: PayPeriod) -> Self {
        period.to_string()
    }
}
