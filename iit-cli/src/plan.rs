//! TOML income plans for `iit forecast --plan`.
//!
//! ```toml
//! reporting_currency = "CNY"
//!
//! [[salary_changes]]
//! effective = "2024-01"
//! monthly_gross = 30000
//!
//! [[bonuses]]
//! paid = "2024-12"
//! amount = 2000
//! currency = "USD"
//!
//! [[cash_awards]]
//! total = 90000
//! payouts = 4
//! first_payout = "2024-03"
//!
//! [[rates]]
//! from = "USD"
//! to = "CNY"
//! rate = 7.1
//! ```

use std::path::Path;

use iit_core::{FixedRateConverter, IncomePlan};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::config::ConfigError;

/// Fixed exchange rate: `1 from = rate to`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExchangeRate {
    pub from: String,
    pub to: String,
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanFile {
    #[serde(flatten)]
    pub plan: IncomePlan,
    #[serde(default)]
    pub rates: Vec<ExchangeRate>,
}

impl PlanFile {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn converter(&self) -> FixedRateConverter {
        self.rates
            .iter()
            .fold(FixedRateConverter::new(), |converter, rate| {
                converter.with_rate(&rate.from, &rate.to, rate.rate)
            })
    }
}
