//! Assembling the engine's flat monthly income sequence from a plan of
//! salary changes, one-off bonuses and long-term cash awards.
//!
//! Plan amounts may be denominated in any currency; they are normalised to
//! the reporting currency through a [`CurrencyConverter`] before they reach
//! the engine.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::calculations::common::round_half_up;
use crate::{MonthlyIncomeInput, YearMonth};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("no exchange rate from {from} to {to}")]
    MissingRate { from: String, to: String },
}

/// Black-box currency conversion.
pub trait CurrencyConverter {
    /// Converts `amount` from `from` into `to` at the rate valid on `on`.
    fn convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        on: NaiveDate,
    ) -> Result<Decimal, ConversionError>;
}

/// Converter with one fixed rate per currency pair, regardless of date.
#[derive(Debug, Clone, Default)]
pub struct FixedRateConverter {
    rates: HashMap<(String, String), Decimal>,
}

impl FixedRateConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `1 from = rate to`; the inverse pair is derived.
    pub fn with_rate(
        mut self,
        from: &str,
        to: &str,
        rate: Decimal,
    ) -> Self {
        let from = from.to_uppercase();
        let to = to.to_uppercase();
        if !rate.is_zero() {
            self.rates
                .insert((to.clone(), from.clone()), Decimal::ONE / rate);
        }
        self.rates.insert((from, to), rate);
        self
    }
}

impl CurrencyConverter for FixedRateConverter {
    fn convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        _on: NaiveDate,
    ) -> Result<Decimal, ConversionError> {
        let from = from.to_uppercase();
        let to = to.to_uppercase();
        if from == to {
            return Ok(amount);
        }
        self.rates
            .get(&(from.clone(), to.clone()))
            .map(|rate| amount * rate)
            .ok_or(ConversionError::MissingRate { from, to })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IncomePlanError {
    #[error("range start {from} is after range end {to}")]
    InvalidRange { from: YearMonth, to: YearMonth },

    #[error("{what} must be non-negative, got {amount}")]
    NegativeAmount { what: &'static str, amount: Decimal },

    #[error("cash award starting {0} has no payouts")]
    NoPayouts(YearMonth),

    #[error("cash award starting {0} has a zero payout interval")]
    ZeroInterval(YearMonth),

    #[error("payout {payout} of cash award starting {first_payout} falls outside the calendar")]
    ScheduleOutOfRange { first_payout: YearMonth, payout: u32 },

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

fn default_currency() -> String {
    "CNY".to_string()
}

fn default_interval() -> u32 {
    3
}

/// New monthly salary from `effective` onwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryChange {
    pub effective: YearMonth,
    pub monthly_gross: Decimal,
    /// Defaults to the plan's reporting currency.
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bonus {
    pub paid: YearMonth,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Cash award paid out in equal instalments every `interval_months`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongTermCashAward {
    pub total: Decimal,
    pub payouts: u32,
    pub first_payout: YearMonth,
    #[serde(default = "default_interval")]
    pub interval_months: u32,
    #[serde(default)]
    pub currency: Option<String>,
}

impl LongTermCashAward {
    /// Payout months and amounts. Instalments are truncated to cents and
    /// the last one absorbs the remainder, so they always sum to `total`.
    pub fn schedule(&self) -> Result<Vec<(YearMonth, Decimal)>, IncomePlanError> {
        if self.payouts == 0 {
            return Err(IncomePlanError::NoPayouts(self.first_payout));
        }
        if self.interval_months == 0 {
            return Err(IncomePlanError::ZeroInterval(self.first_payout));
        }
        if self.total < Decimal::ZERO {
            return Err(IncomePlanError::NegativeAmount {
                what: "cash award total",
                amount: self.total,
            });
        }

        let instalment = (self.total / Decimal::from(self.payouts))
            .round_dp_with_strategy(2, RoundingStrategy::ToZero);
        let last = self.total - instalment * Decimal::from(self.payouts - 1);

        (0..self.payouts)
            .map(|n| {
                let out_of_range = || IncomePlanError::ScheduleOutOfRange {
                    first_payout: self.first_payout,
                    payout: n + 1,
                };
                let offset = u64::from(n)
                    .checked_mul(u64::from(self.interval_months))
                    .ok_or_else(out_of_range)?;
                let month = self
                    .first_payout
                    .plus_months(offset)
                    .map_err(|_| out_of_range())?;
                let amount = if n + 1 == self.payouts { last } else { instalment };
                Ok((month, amount))
            })
            .collect()
    }
}

/// Everything needed to project monthly gross income.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomePlan {
    #[serde(default = "default_currency")]
    pub reporting_currency: String,
    #[serde(default)]
    pub salary_changes: Vec<SalaryChange>,
    #[serde(default)]
    pub bonuses: Vec<Bonus>,
    #[serde(default)]
    pub cash_awards: Vec<LongTermCashAward>,
}

impl Default for IncomePlan {
    fn default() -> Self {
        Self {
            reporting_currency: default_currency(),
            salary_changes: Vec::new(),
            bonuses: Vec::new(),
            cash_awards: Vec::new(),
        }
    }
}

impl IncomePlan {
    fn to_reporting(
        &self,
        amount: Decimal,
        currency: Option<&str>,
        month: YearMonth,
        converter: &dyn CurrencyConverter,
    ) -> Result<Decimal, IncomePlanError> {
        let from = currency.unwrap_or(&self.reporting_currency);
        let converted = converter.convert(amount, from, &self.reporting_currency, month.last_day())?;
        Ok(round_half_up(converted))
    }

    /// One input per month in `from..=to`, amounts in the reporting currency.
    ///
    /// Salary is the latest change effective on or before the month (zero
    /// before the first change). Bonuses and award payouts land in the
    /// month they are paid; those outside the range are ignored.
    pub fn monthly_inputs(
        &self,
        from: YearMonth,
        to: YearMonth,
        converter: &dyn CurrencyConverter,
    ) -> Result<Vec<MonthlyIncomeInput>, IncomePlanError> {
        if from > to {
            return Err(IncomePlanError::InvalidRange { from, to });
        }
        for change in &self.salary_changes {
            if change.monthly_gross < Decimal::ZERO {
                return Err(IncomePlanError::NegativeAmount {
                    what: "salary",
                    amount: change.monthly_gross,
                });
            }
        }
        for bonus in &self.bonuses {
            if bonus.amount < Decimal::ZERO {
                return Err(IncomePlanError::NegativeAmount {
                    what: "bonus",
                    amount: bonus.amount,
                });
            }
        }

        let mut salary_changes: Vec<&SalaryChange> = self.salary_changes.iter().collect();
        salary_changes.sort_by_key(|change| change.effective);

        let mut one_off: Vec<(YearMonth, Decimal, Option<&str>)> = self
            .bonuses
            .iter()
            .map(|b| (b.paid, b.amount, b.currency.as_deref()))
            .collect();
        for award in &self.cash_awards {
            for (month, amount) in award.schedule()? {
                one_off.push((month, amount, award.currency.as_deref()));
            }
        }

        let mut inputs = Vec::new();
        let mut month = from;
        while month <= to {
            let gross = match salary_changes.iter().rev().find(|c| c.effective <= month) {
                Some(change) => {
                    self.to_reporting(change.monthly_gross, change.currency.as_deref(), month, converter)?
                }
                None => Decimal::ZERO,
            };

            let mut bonus = Decimal::ZERO;
            for (_, amount, currency) in one_off.iter().filter(|(paid, _, _)| *paid == month) {
                bonus += self.to_reporting(*amount, *currency, month, converter)?;
            }

            inputs.push(MonthlyIncomeInput::new(month, gross, bonus));
            month = month.succ();
        }

        debug!(%from, %to, months = inputs.len(), "income plan expanded");
        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    fn plan() -> IncomePlan {
        IncomePlan {
            salary_changes: vec![
                SalaryChange {
                    effective: ym("2024-01"),
                    monthly_gross: dec!(20000),
                    currency: None,
                },
                SalaryChange {
                    effective: ym("2024-07"),
                    monthly_gross: dec!(25000),
                    currency: None,
                },
            ],
            bonuses: vec![Bonus {
                paid: ym("2024-02"),
                amount: dec!(30000),
                currency: None,
            }],
            ..IncomePlan::default()
        }
    }

    // =========================================================================
    // cash award schedule
    // =========================================================================

    #[test]
    fn award_is_split_quarterly_with_remainder_on_last_payout() {
        let award = LongTermCashAward {
            total: dec!(100000),
            payouts: 3,
            first_payout: ym("2024-03"),
            interval_months: 3,
            currency: None,
        };

        let schedule = award.schedule().unwrap();

        assert_eq!(
            schedule,
            vec![
                (ym("2024-03"), dec!(33333.33)),
                (ym("2024-06"), dec!(33333.33)),
                (ym("2024-09"), dec!(33333.34)),
            ]
        );
        let total: Decimal = schedule.iter().map(|(_, amount)| *amount).sum();
        assert_eq!(total, dec!(100000));
    }

    #[test]
    fn award_schedule_crosses_year_boundary() {
        let award = LongTermCashAward {
            total: dec!(8000),
            payouts: 4,
            first_payout: ym("2024-09"),
            interval_months: 3,
            currency: None,
        };

        let months: Vec<YearMonth> = award.schedule().unwrap().into_iter().map(|(m, _)| m).collect();

        assert_eq!(
            months,
            vec![ym("2024-09"), ym("2024-12"), ym("2025-03"), ym("2025-06")]
        );
    }

    #[test]
    fn award_without_payouts_is_rejected() {
        let award = LongTermCashAward {
            total: dec!(8000),
            payouts: 0,
            first_payout: ym("2024-09"),
            interval_months: 3,
            currency: None,
        };

        assert_eq!(award.schedule(), Err(IncomePlanError::NoPayouts(ym("2024-09"))));
    }

    #[test]
    fn award_with_huge_interval_is_rejected() {
        let award = LongTermCashAward {
            total: dec!(9000),
            payouts: 3,
            first_payout: ym("2024-03"),
            interval_months: 3_000_000_000,
            currency: None,
        };

        assert_eq!(
            award.schedule(),
            Err(IncomePlanError::ScheduleOutOfRange {
                first_payout: ym("2024-03"),
                payout: 2,
            })
        );

        let mut plan = plan();
        plan.cash_awards.push(award);
        let result = plan.monthly_inputs(ym("2024-01"), ym("2024-12"), &FixedRateConverter::new());

        assert!(matches!(result, Err(IncomePlanError::ScheduleOutOfRange { payout: 2, .. })));
    }

    // =========================================================================
    // monthly inputs
    // =========================================================================

    #[test]
    fn salary_follows_latest_change_and_bonus_lands_in_its_month() {
        let inputs = plan()
            .monthly_inputs(ym("2024-01"), ym("2024-12"), &FixedRateConverter::new())
            .unwrap();

        assert_eq!(inputs.len(), 12);
        assert_eq!(inputs[0].gross, dec!(20000));
        assert_eq!(inputs[1].bonus, dec!(30000));
        assert_eq!(inputs[2].bonus, Decimal::ZERO);
        assert_eq!(inputs[5].gross, dec!(20000));
        assert_eq!(inputs[6].gross, dec!(25000));
        assert_eq!((inputs[11].year, inputs[11].month), (2024, 12));
    }

    #[test]
    fn months_before_first_salary_change_have_no_salary() {
        let inputs = plan()
            .monthly_inputs(ym("2023-11"), ym("2024-01"), &FixedRateConverter::new())
            .unwrap();

        assert_eq!(inputs[0].gross, Decimal::ZERO);
        assert_eq!(inputs[1].gross, Decimal::ZERO);
        assert_eq!(inputs[2].gross, dec!(20000));
    }

    #[test]
    fn award_payouts_and_bonuses_in_same_month_are_summed() {
        let mut plan = plan();
        plan.cash_awards.push(LongTermCashAward {
            total: dec!(40000),
            payouts: 2,
            first_payout: ym("2024-02"),
            interval_months: 6,
            currency: None,
        });

        let inputs = plan
            .monthly_inputs(ym("2024-01"), ym("2024-12"), &FixedRateConverter::new())
            .unwrap();

        assert_eq!(inputs[1].bonus, dec!(50000));
        assert_eq!(inputs[7].bonus, dec!(20000));
    }

    #[test]
    fn foreign_amounts_are_converted_to_reporting_currency() {
        let plan = IncomePlan {
            salary_changes: vec![SalaryChange {
                effective: ym("2024-01"),
                monthly_gross: dec!(3000),
                currency: Some("usd".to_string()),
            }],
            ..IncomePlan::default()
        };
        let converter = FixedRateConverter::new().with_rate("USD", "CNY", dec!(7.1234));

        let inputs = plan
            .monthly_inputs(ym("2024-01"), ym("2024-01"), &converter)
            .unwrap();

        assert_eq!(inputs[0].gross, dec!(21370.20));
    }

    #[test]
    fn missing_rate_is_an_error() {
        let plan = IncomePlan {
            bonuses: vec![Bonus {
                paid: ym("2024-01"),
                amount: dec!(1000),
                currency: Some("HKD".to_string()),
            }],
            ..IncomePlan::default()
        };

        let result = plan.monthly_inputs(ym("2024-01"), ym("2024-01"), &FixedRateConverter::new());

        assert_eq!(
            result,
            Err(IncomePlanError::Conversion(ConversionError::MissingRate {
                from: "HKD".to_string(),
                to: "CNY".to_string(),
            }))
        );
    }

    #[test]
    fn inverted_range_is_rejected() {
        let result = plan().monthly_inputs(ym("2024-12"), ym("2024-01"), &FixedRateConverter::new());

        assert!(matches!(result, Err(IncomePlanError::InvalidRange { .. })));
    }

    #[test]
    fn fixed_rate_converter_derives_inverse() {
        let converter = FixedRateConverter::new().with_rate("USD", "CNY", dec!(8));
        let on = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        assert_eq!(converter.convert(dec!(80), "CNY", "USD", on), Ok(dec!(10)));
        assert_eq!(converter.convert(dec!(5), "cny", "CNY", on), Ok(dec!(5)));
    }
}
