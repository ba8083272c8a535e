//! Single-month "what-if" income calculation.
//!
//! Unlike the cumulative engine this mode has no running state, and the
//! bonus enters the same month's taxable base. It is meant for answering
//! "what would I take home this month" questions.

use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};

use crate::calculations::common::max;
use crate::calculations::social_insurance::{
    HousingFundContribution, SocialInsuranceCalculator, SocialInsuranceContribution,
};
use crate::calculations::tax_calculator::{TaxCalculator, TaxCalculatorError};
use crate::{Jurisdiction, SocialInsuranceConfig, TaxBracket, YearMonth, YearMonthError, params_signature};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeCalculationInput {
    pub jurisdiction: Jurisdiction,
    pub year: i32,
    pub month: u32,
    pub gross: Decimal,
    #[serde(default)]
    pub bonus: Decimal,
    /// Itemised special additional deductions (children, housing, elderly care, ...).
    #[serde(default)]
    pub special_deductions: Decimal,
    #[serde(default)]
    pub other_deductions: Decimal,
    #[serde(default)]
    pub charity_donations: Decimal,
    /// Declared social-insurance base overriding the clamped salary.
    #[serde(default)]
    pub social_insurance_base: Option<Decimal>,
    #[serde(default)]
    pub housing_fund_base: Option<Decimal>,
}

impl IncomeCalculationInput {
    /// Input with no bonus, no extra deductions and default bases.
    pub fn new(
        jurisdiction: Jurisdiction,
        period: YearMonth,
        gross: Decimal,
    ) -> Self {
        Self {
            jurisdiction,
            year: period.year,
            month: period.month,
            gross,
            bonus: Decimal::ZERO,
            special_deductions: Decimal::ZERO,
            other_deductions: Decimal::ZERO,
            charity_donations: Decimal::ZERO,
            social_insurance_base: None,
            housing_fund_base: None,
        }
    }

    pub fn period(&self) -> Result<YearMonth, YearMonthError> {
        YearMonth::new(self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeCalculationResult {
    pub year: i32,
    pub month: u32,
    pub gross: Decimal,
    pub bonus: Decimal,
    pub social_insurance: SocialInsuranceContribution,
    pub housing_fund: HousingFundContribution,
    /// Everything subtracted before tax, basic deduction included.
    pub total_deductions: Decimal,
    pub taxable_income: Decimal,
    pub tax: Decimal,
    /// `gross + bonus − social insurance − housing fund − tax`.
    pub net: Decimal,
    /// `tax / (gross + bonus)` to four places; zero without income.
    pub effective_tax_rate: Decimal,
    pub bracket: TaxBracket,
    pub params_signature: String,
}

/// Runs the single-month calculation against already-resolved configuration.
pub fn compute_monthly_income(
    input: &IncomeCalculationInput,
    brackets: &[TaxBracket],
    config: &SocialInsuranceConfig,
    monthly_basic_deduction: Decimal,
) -> Result<IncomeCalculationResult, TaxCalculatorError> {
    let contributions = SocialInsuranceCalculator::new(config);
    let social_insurance =
        contributions.calculate_social_insurance(input.gross, input.social_insurance_base);
    let housing_fund = contributions.calculate_housing_fund(input.gross, input.housing_fund_base);

    let income = input.gross + input.bonus;
    let total_deductions = monthly_basic_deduction
        + social_insurance.total
        + housing_fund.amount
        + input.special_deductions
        + input.other_deductions
        + input.charity_donations;
    let taxable_income = max(income - total_deductions, Decimal::ZERO);

    let calculation = TaxCalculator::new(brackets).calculate_tax(taxable_income)?;
    let net = income - social_insurance.total - housing_fund.amount - calculation.tax;
    let effective_tax_rate = if income > Decimal::ZERO {
        (calculation.tax / income).round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
    } else {
        Decimal::ZERO
    };

    Ok(IncomeCalculationResult {
        year: input.year,
        month: input.month,
        gross: input.gross,
        bonus: input.bonus,
        social_insurance,
        housing_fund,
        total_deductions,
        taxable_income,
        tax: calculation.tax,
        net,
        effective_tax_rate,
        bracket: calculation.bracket,
        params_signature: params_signature(brackets),
    })
}
