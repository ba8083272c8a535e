//! Cumulative withholding (累计预扣法).
//!
//! Each month the employer recomputes the tax due on everything earned so far
//! this sequence and withholds the difference from what was already charged.
//! Configuration is resolved per month as of that month's last day, so a
//! bracket table or contribution change mid-sequence takes effect exactly in
//! the month it covers.
//!
//! When a configuration change lowers the cumulative tax due below what was
//! already charged, the month is charged zero (no mid-year refund) and the
//! baseline is resynchronised down to the new due figure. See
//! [`CumulativeTaxState::charge`].

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calculations::common::{max, min};
use crate::calculations::monthly::{
    IncomeCalculationInput, IncomeCalculationResult, compute_monthly_income,
};
use crate::calculations::social_insurance::SocialInsuranceCalculator;
use crate::calculations::tax_calculator::{TaxCalculator, TaxCalculatorError};
use crate::db::{ConfigRepository, RepositoryError};
use crate::{
    Forecast, Jurisdiction, MonthlyIncomeInput, MonthlyResult, SocialInsuranceConfig,
    TaxBracketVersion, YearMonth,
};

/// Which piece of configuration a lookup was after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    TaxBrackets,
    SocialInsurance,
}

impl fmt::Display for ConfigKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ConfigKind::TaxBrackets => f.write_str("tax brackets"),
            ConfigKind::SocialInsurance => f.write_str("social insurance config"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalculationError {
    #[error("no {kind} for '{jurisdiction}' effective on {as_of}")]
    ConfigurationMissing {
        kind: ConfigKind,
        jurisdiction: Jurisdiction,
        as_of: NaiveDate,
    },

    #[error("{matches} {kind} versions for '{jurisdiction}' cover {as_of}")]
    ConfigurationAmbiguous {
        kind: ConfigKind,
        jurisdiction: Jurisdiction,
        as_of: NaiveDate,
        matches: usize,
    },

    #[error("invalid month {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },

    #[error("bonus for {period} is negative: {bonus}")]
    NegativeBonus { period: YearMonth, bonus: Decimal },

    #[error("{0} appears more than once in the income sequence")]
    DuplicateMonth(YearMonth),

    #[error("tax calculation failed: {0}")]
    Tax(#[from] TaxCalculatorError),

    #[error("repository error: {0}")]
    Repository(RepositoryError),
}

impl CalculationError {
    fn from_lookup(
        kind: ConfigKind,
        err: RepositoryError,
    ) -> Self {
        match err {
            RepositoryError::Ambiguous {
                jurisdiction,
                as_of,
                matches,
            } => CalculationError::ConfigurationAmbiguous {
                kind,
                jurisdiction,
                as_of,
                matches,
            },
            other => CalculationError::Repository(other),
        }
    }
}

/// Statutory constants that are not stored per jurisdiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithholdingSettings {
    /// Basic deduction granted per month elapsed (5 000 since 2018-10).
    pub monthly_basic_deduction: Decimal,
}

impl Default for WithholdingSettings {
    fn default() -> Self {
        Self {
            monthly_basic_deduction: Decimal::from(5000),
        }
    }
}

/// Tax already charged against the cumulative tax due.
///
/// The only transition is [`charge`](Self::charge); after it the charged
/// baseline never exceeds the due figure it was charged against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CumulativeTaxState {
    charged: Decimal,
}

impl CumulativeTaxState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn charged(&self) -> Decimal {
        self.charged
    }

    /// Charges this month against `due` and returns the amount withheld.
    ///
    /// `tax = max(0, due − charged)`, then
    /// `charged = min(due, charged + tax)`. A drop in `due` yields a zero
    /// month and pulls the baseline down to `due`; nothing is refunded and
    /// no negative balance is carried.
    pub fn charge(
        &mut self,
        due: Decimal,
    ) -> Decimal {
        let tax = max(due - self.charged, Decimal::ZERO);
        self.charged = min(due, self.charged + tax);
        tax
    }
}

/// Running sums of one withholding sequence. Configuration is passed in per
/// month so the arithmetic stays independent of the repository.
#[derive(Debug)]
struct CumulativeRun {
    settings: WithholdingSettings,
    months_elapsed: u32,
    cumulative_gross: Decimal,
    cumulative_contributions: Decimal,
    state: CumulativeTaxState,
    previous_signature: Option<String>,
}

impl CumulativeRun {
    fn new(settings: WithholdingSettings) -> Self {
        Self {
            settings,
            months_elapsed: 0,
            cumulative_gross: Decimal::ZERO,
            cumulative_contributions: Decimal::ZERO,
            state: CumulativeTaxState::new(),
            previous_signature: None,
        }
    }

    fn apply(
        &mut self,
        period: YearMonth,
        input: &MonthlyIncomeInput,
        brackets: &TaxBracketVersion,
        config: &SocialInsuranceConfig,
    ) -> Result<MonthlyResult, TaxCalculatorError> {
        self.months_elapsed += 1;

        // Contribution base is regular salary only.
        let contributions = SocialInsuranceCalculator::new(config);
        let social_insurance = contributions.calculate_social_insurance(input.gross, None);
        let housing_fund = contributions.calculate_housing_fund(input.gross, None);
        let deductions_this_month = social_insurance.total + housing_fund.amount;

        let gross_this_month = input.gross + input.bonus;
        self.cumulative_gross += gross_this_month;
        self.cumulative_contributions += deductions_this_month;

        let basic_deduction =
            self.settings.monthly_basic_deduction * Decimal::from(self.months_elapsed);
        let cumulative_taxable = max(
            self.cumulative_gross - self.cumulative_contributions - basic_deduction,
            Decimal::ZERO,
        );

        let calculation = TaxCalculator::new(&brackets.brackets).calculate_tax(cumulative_taxable)?;
        let cumulative_tax_due = calculation.tax;
        let previously_charged = self.state.charged();
        let tax_this_month = self.state.charge(cumulative_tax_due);

        if cumulative_tax_due < previously_charged {
            warn!(
                %period,
                due = %cumulative_tax_due,
                charged = %previously_charged,
                "cumulative tax due dropped below amount charged; withholding nothing this month"
            );
        }

        let signature = brackets.signature();
        let tax_rule_changed = self
            .previous_signature
            .as_ref()
            .is_some_and(|previous| previous != &signature);
        if tax_rule_changed {
            warn!(%period, effective = %brackets.period, "tax bracket table changed");
        }
        self.previous_signature = Some(signature.clone());

        debug!(
            %period,
            cumulative_taxable = %cumulative_taxable,
            cumulative_tax_due = %cumulative_tax_due,
            tax_this_month = %tax_this_month,
            "month withheld"
        );

        Ok(MonthlyResult {
            year: period.year,
            month: period.month,
            salary: input.gross,
            bonus: input.bonus,
            gross_this_month,
            cumulative_income: self.cumulative_gross,
            social_insurance_this_month: social_insurance.total,
            housing_fund_this_month: housing_fund.amount,
            total_deductions_this_month: deductions_this_month,
            tax_this_month,
            net: gross_this_month - deductions_this_month - tax_this_month,
            applied_tax_rate: calculation.bracket.tax_rate,
            cumulative_taxable,
            cumulative_tax_due,
            cumulative_tax_charged: self.state.charged(),
            params_signature: signature,
            tax_rule_changed,
        })
    }
}

/// Validates, sorts and de-duplicates the income sequence.
fn ordered_months(
    months: &[MonthlyIncomeInput]
) -> Result<Vec<(YearMonth, &MonthlyIncomeInput)>, CalculationError> {
    let mut ordered = months
        .iter()
        .map(|input| {
            let period = input.period().map_err(|_| CalculationError::InvalidMonth {
                year: input.year,
                month: input.month,
            })?;
            if input.bonus < Decimal::ZERO {
                return Err(CalculationError::NegativeBonus {
                    period,
                    bonus: input.bonus,
                });
            }
            Ok((period, input))
        })
        .collect::<Result<Vec<_>, _>>()?;

    ordered.sort_by_key(|(period, _)| *period);

    if let Some(pair) = ordered.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(CalculationError::DuplicateMonth(pair[0].0));
    }

    Ok(ordered)
}

/// Entry point for withholding calculations against a [`ConfigRepository`].
pub struct WithholdingEngine<'a, R: ConfigRepository + ?Sized> {
    repository: &'a R,
    settings: WithholdingSettings,
}

impl<'a, R: ConfigRepository + ?Sized> WithholdingEngine<'a, R> {
    pub fn new(repository: &'a R) -> Self {
        Self::with_settings(repository, WithholdingSettings::default())
    }

    pub fn with_settings(
        repository: &'a R,
        settings: WithholdingSettings,
    ) -> Self {
        Self {
            repository,
            settings,
        }
    }

    pub fn settings(&self) -> &WithholdingSettings {
        &self.settings
    }

    /// Bracket table and contribution config in force on `as_of`.
    async fn resolve(
        &self,
        jurisdiction: &Jurisdiction,
        as_of: NaiveDate,
    ) -> Result<(TaxBracketVersion, SocialInsuranceConfig), CalculationError> {
        let brackets = self
            .repository
            .tax_bracket_version(jurisdiction, as_of)
            .await
            .map_err(|e| CalculationError::from_lookup(ConfigKind::TaxBrackets, e))?
            .filter(|version| !version.brackets.is_empty())
            .ok_or_else(|| CalculationError::ConfigurationMissing {
                kind: ConfigKind::TaxBrackets,
                jurisdiction: jurisdiction.clone(),
                as_of,
            })?;

        let config = self
            .repository
            .get_social_insurance_config(jurisdiction, as_of)
            .await
            .map_err(|e| CalculationError::from_lookup(ConfigKind::SocialInsurance, e))?
            .ok_or_else(|| CalculationError::ConfigurationMissing {
                kind: ConfigKind::SocialInsurance,
                jurisdiction: jurisdiction.clone(),
                as_of,
            })?;

        Ok((brackets, config))
    }

    /// One result per month in chronological order, with running
    /// cumulative sums.
    ///
    /// The whole sequence is one cumulative period; callers forecasting
    /// across tax years run it once per year. Any configuration error
    /// aborts the request without partial results.
    ///
    /// # Errors
    ///
    /// * [`CalculationError::InvalidMonth`], [`CalculationError::NegativeBonus`]
    ///   and [`CalculationError::DuplicateMonth`] before any lookup.
    /// * [`CalculationError::ConfigurationMissing`] /
    ///   [`CalculationError::ConfigurationAmbiguous`] for the first month
    ///   whose configuration cannot be resolved.
    pub async fn calculate_forecast_withholding_cumulative(
        &self,
        jurisdiction: &Jurisdiction,
        months: &[MonthlyIncomeInput],
    ) -> Result<Vec<MonthlyResult>, CalculationError> {
        let ordered = ordered_months(months)?;
        if ordered.is_empty() {
            return Ok(Vec::new());
        }

        info!(%jurisdiction, months = ordered.len(), "running cumulative withholding");

        let mut run = CumulativeRun::new(self.settings);
        let mut results = Vec::with_capacity(ordered.len());
        for (period, input) in ordered {
            let (brackets, config) = self.resolve(jurisdiction, period.last_day()).await?;
            results.push(run.apply(period, input, &brackets, &config)?);
        }

        Ok(results)
    }

    /// [`calculate_forecast_withholding_cumulative`](Self::calculate_forecast_withholding_cumulative)
    /// plus totals.
    pub async fn forecast(
        &self,
        jurisdiction: &Jurisdiction,
        months: &[MonthlyIncomeInput],
    ) -> Result<Forecast, CalculationError> {
        let forecast = Forecast::new(
            self.calculate_forecast_withholding_cumulative(jurisdiction, months)
                .await?,
        );
        info!(
            %jurisdiction,
            total_gross = %forecast.totals.total_gross,
            total_tax = %forecast.totals.total_tax,
            total_net = %forecast.totals.total_net,
            "forecast complete"
        );
        Ok(forecast)
    }

    /// Stateless single-month calculation; the bonus is taxed in the same
    /// month's base.
    pub async fn calculate_monthly_income(
        &self,
        input: &IncomeCalculationInput,
    ) -> Result<IncomeCalculationResult, CalculationError> {
        let period = input.period().map_err(|_| CalculationError::InvalidMonth {
            year: input.year,
            month: input.month,
        })?;
        if input.bonus < Decimal::ZERO {
            return Err(CalculationError::NegativeBonus {
                period,
                bonus: input.bonus,
            });
        }

        let (brackets, config) = self.resolve(&input.jurisdiction, period.last_day()).await?;
        let result = compute_monthly_income(
            input,
            &brackets.brackets,
            &config,
            self.settings.monthly_basic_deduction,
        )?;

        debug!(
            jurisdiction = %input.jurisdiction,
            %period,
            taxable = %result.taxable_income,
            tax = %result.tax,
            "single month calculated"
        );
        Ok(result)
    }
}
