//! Tax and contribution arithmetic.
//!
//! The calculators in this module are pure: they take already-resolved
//! configuration. [`WithholdingEngine`] resolves configuration through a
//! [`ConfigRepository`](crate::db::ConfigRepository) month by month and
//! drives them.

pub mod common;
pub mod monthly;
pub mod social_insurance;
pub mod tax_calculator;
pub mod withholding;

pub use monthly::{IncomeCalculationInput, IncomeCalculationResult, compute_monthly_income};
pub use social_insurance::{
    HousingFundContribution, SocialInsuranceCalculator, SocialInsuranceContribution,
};
pub use tax_calculator::{TaxCalculation, TaxCalculator, TaxCalculatorError};
pub use withholding::{
    CalculationError, ConfigKind, CumulativeTaxState, WithholdingEngine, WithholdingSettings,
};
