use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{YearMonth, YearMonthError};

/// One month of income handed to the withholding engine, already converted
/// into the reporting currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyIncomeInput {
    pub year: i32,
    pub month: u32,
    /// Regular salary; the contribution base is derived from this alone.
    pub gross: Decimal,
    /// One-off income (bonuses, award payouts). Must be non-negative.
    pub bonus: Decimal,
}

impl MonthlyIncomeInput {
    pub fn new(
        period: YearMonth,
        gross: Decimal,
        bonus: Decimal,
    ) -> Self {
        Self {
            year: period.year,
            month: period.month,
            gross,
            bonus,
        }
    }

    pub fn period(&self) -> Result<YearMonth, YearMonthError> {
        YearMonth::new(self.year, self.month)
    }
}

/// Per-month output of the cumulative withholding engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyResult {
    pub year: i32,
    pub month: u32,
    pub salary: Decimal,
    pub bonus: Decimal,
    /// `salary + bonus`.
    pub gross_this_month: Decimal,
    pub cumulative_income: Decimal,
    pub social_insurance_this_month: Decimal,
    pub housing_fund_this_month: Decimal,
    pub total_deductions_this_month: Decimal,
    pub tax_this_month: Decimal,
    pub net: Decimal,
    pub applied_tax_rate: Decimal,
    pub cumulative_taxable: Decimal,
    /// `cumulative_taxable * rate - quick_deduction`, floored at zero and
    /// rounded half-up to cents.
    pub cumulative_tax_due: Decimal,
    /// Withholding baseline after this month; never exceeds `cumulative_tax_due`.
    pub cumulative_tax_charged: Decimal,
    pub params_signature: String,
    /// True when this month's bracket table differs from the previous month's.
    pub tax_rule_changed: bool,
}

/// Sums over a forecast, one field per reported column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastTotals {
    pub total_salary: Decimal,
    pub total_bonus: Decimal,
    pub total_gross: Decimal,
    pub total_net: Decimal,
    pub total_tax: Decimal,
}

impl ForecastTotals {
    pub fn from_results(results: &[MonthlyResult]) -> Self {
        results.iter().fold(Self::default(), |mut totals, r| {
            totals.total_salary += r.salary;
            totals.total_bonus += r.bonus;
            totals.total_gross += r.gross_this_month;
            totals.total_net += r.net;
            totals.total_tax += r.tax_this_month;
            totals
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forecast {
    pub months: Vec<MonthlyResult>,
    pub totals: ForecastTotals,
}

impl Forecast {
    pub fn new(months: Vec<MonthlyResult>) -> Self {
        let totals = ForecastTotals::from_results(&months);
        Self { months, totals }
    }
}
