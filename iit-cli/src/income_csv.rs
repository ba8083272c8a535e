//! CSV reader for month-by-month income.
//!
//! | Column  | Required | Type    | Notes                           |
//! |---------|----------|---------|---------------------------------|
//! | `year`  | yes      | integer | e.g. `2024`                     |
//! | `month` | yes      | integer | `1` to `12`                     |
//! | `gross` | yes      | decimal | regular monthly salary          |
//! | `bonus` | no       | decimal | empty cell or no column means 0 |
//!
//! ```csv
//! year,month,gross,bonus
//! 2024,1,30000,
//! 2024,12,30000,20000
//! ```

use std::path::Path;

use iit_core::{MonthlyIncomeInput, YearMonth, YearMonthError};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Deserialize)]
struct CsvRow {
    year: i32,
    month: u32,
    gross: Decimal,
    bonus: Option<Decimal>,
}

#[derive(Debug, Error)]
pub enum IncomeCsvError {
    #[error("CSV parse error: {0}")]
    Parse(#[from] csv::Error),

    /// `row` is 1-based, header excluded.
    #[error("invalid period on row {row}: {source}")]
    InvalidPeriod { row: usize, source: YearMonthError },

    #[error("negative {what} on row {row}: {amount}")]
    NegativeAmount {
        row: usize,
        what: &'static str,
        amount: Decimal,
    },

    #[error("failed to read '{path}': {message}")]
    Io { path: String, message: String },
}

fn convert_row(
    row: CsvRow,
    row_number: usize,
) -> Result<MonthlyIncomeInput, IncomeCsvError> {
    let period = YearMonth::new(row.year, row.month).map_err(|source| {
        IncomeCsvError::InvalidPeriod {
            row: row_number,
            source,
        }
    })?;
    let bonus = row.bonus.unwrap_or(Decimal::ZERO);
    for (what, amount) in [("gross", row.gross), ("bonus", bonus)] {
        if amount < Decimal::ZERO {
            return Err(IncomeCsvError::NegativeAmount {
                row: row_number,
                what,
                amount,
            });
        }
    }
    Ok(MonthlyIncomeInput::new(period, row.gross, bonus))
}

/// Parses CSV text into monthly inputs, in file order.
pub fn load_from_str(input: &str) -> Result<Vec<MonthlyIncomeInput>, IncomeCsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(input.as_bytes());

    reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(idx, result)| convert_row(result?, idx + 1))
        .collect()
}

pub fn load_from_file(path: &Path) -> Result<Vec<MonthlyIncomeInput>, IncomeCsvError> {
    let contents = std::fs::read_to_string(path).map_err(|e| IncomeCsvError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    load_from_str(&contents)
}
