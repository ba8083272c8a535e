use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum YearMonthError {
    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),

    #[error("year {0} is out of range")]
    InvalidYear(i32),

    #[error("expected YYYY-MM, got '{0}'")]
    Malformed(String),

    #[error("{start} plus {months} months is out of range")]
    OffsetOutOfRange { start: YearMonth, months: u64 },
}

/// A calendar month, ordered chronologically.
///
/// Serializes as `"YYYY-MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(
        year: i32,
        month: u32,
    ) -> Result<Self, YearMonthError> {
        if !(1..=12).contains(&month) {
            return Err(YearMonthError::InvalidMonth(month));
        }
        // Reject years chrono cannot represent so `last_day` stays total.
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(YearMonthError::InvalidYear(year));
        }
        Ok(Self { year, month })
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last calendar day of the month; configuration is resolved as of this date.
    pub fn last_day(&self) -> NaiveDate {
        self.succ()
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Adds `months` calendar months. The result goes through [`YearMonth::new`],
    /// so it fails for years chrono cannot represent.
    pub fn plus_months(
        &self,
        months: u64,
    ) -> Result<Self, YearMonthError> {
        let out_of_range = || YearMonthError::OffsetOutOfRange {
            start: *self,
            months,
        };
        let zero_based = i64::try_from(months)
            .ok()
            .and_then(|m| (i64::from(self.year) * 12 + i64::from(self.month) - 1).checked_add(m))
            .ok_or_else(out_of_range)?;
        let year = i32::try_from(zero_based.div_euclid(12)).map_err(|_| out_of_range())?;
        // rem_euclid(12) is in 0..12
        Self::new(year, zero_based.rem_euclid(12) as u32 + 1)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = YearMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| YearMonthError::Malformed(s.to_string()))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| YearMonthError::Malformed(s.to_string()))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| YearMonthError::Malformed(s.to_string()))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = YearMonthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}
