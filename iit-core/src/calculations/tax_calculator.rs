//! Progressive tax with quick deductions.
//!
//! Chinese comprehensive-income tables publish, per bracket, a rate and a
//! quick deduction chosen so that `taxable × rate − quick_deduction` equals
//! the marginal computation. The calculator therefore only needs to find the
//! bracket holding the taxable amount.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use iit_core::TaxBracket;
//! use iit_core::calculations::TaxCalculator;
//!
//! let brackets = vec![
//!     TaxBracket {
//!         min_income: dec!(0),
//!         max_income: Some(dec!(36000)),
//!         tax_rate: dec!(0.03),
//!         quick_deduction: dec!(0),
//!     },
//!     TaxBracket {
//!         min_income: dec!(36000),
//!         max_income: None,
//!         tax_rate: dec!(0.10),
//!         quick_deduction: dec!(2520),
//!     },
//! ];
//!
//! let calculation = TaxCalculator::new(&brackets).calculate_tax(dec!(40000)).unwrap();
//!
//! assert_eq!(calculation.tax, dec!(1480.00));
//! assert_eq!(calculation.bracket.tax_rate, dec!(0.10));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::TaxBracket;
use crate::calculations::common::{max, round_half_up};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaxCalculatorError {
    /// No tax brackets were provided for the calculation.
    #[error("no tax brackets provided")]
    NoTaxBrackets,

    /// The table has a gap that contains the taxable amount.
    #[error("no tax bracket found for taxable income {0}")]
    NoMatchingBracket(Decimal),
}

/// Tax owed on one taxable amount and the bracket that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxCalculation {
    pub tax: Decimal,
    pub bracket: TaxBracket,
}

/// Applies one bracket table.
///
/// Brackets must be sorted by `min_income` ascending, which is how every
/// repository hands them out.
#[derive(Debug, Clone)]
pub struct TaxCalculator<'a> {
    tax_brackets: &'a [TaxBracket],
}

impl<'a> TaxCalculator<'a> {
    pub fn new(tax_brackets: &'a [TaxBracket]) -> Self {
        Self { tax_brackets }
    }

    /// Computes `max(0, taxable × rate − quick_deduction)` rounded to cents.
    ///
    /// Non-positive taxable income owes nothing and reports the lowest
    /// bracket. Otherwise brackets are scanned from the top and the first
    /// one whose half-open range holds `taxable_income` is applied.
    ///
    /// # Errors
    ///
    /// * [`TaxCalculatorError::NoTaxBrackets`] for an empty table.
    /// * [`TaxCalculatorError::NoMatchingBracket`] when the amount falls in
    ///   a gap, which a validated table never has.
    pub fn calculate_tax(
        &self,
        taxable_income: Decimal,
    ) -> Result<TaxCalculation, TaxCalculatorError> {
        let lowest = self
            .tax_brackets
            .first()
            .ok_or(TaxCalculatorError::NoTaxBrackets)?;

        if taxable_income <= Decimal::ZERO {
            return Ok(TaxCalculation {
                tax: Decimal::ZERO,
                bracket: lowest.clone(),
            });
        }

        let bracket = self
            .tax_brackets
            .iter()
            .rev()
            .find(|b| b.contains(taxable_income))
            .ok_or(TaxCalculatorError::NoMatchingBracket(taxable_income))?;

        let tax = max(
            taxable_income * bracket.tax_rate - bracket.quick_deduction,
            Decimal::ZERO,
        );

        Ok(TaxCalculation {
            tax: round_half_up(tax),
            bracket: bracket.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::calculations::test_support::national_brackets;

    fn tax_on(taxable: Decimal) -> TaxCalculation {
        let brackets = national_brackets();
        TaxCalculator::new(&brackets).calculate_tax(taxable).unwrap()
    }

    // =========================================================================
    // bracket selection
    // =========================================================================

    #[test]
    fn lowest_bracket_applies_rate_without_deduction() {
        let result = tax_on(dec!(15000));

        assert_eq!(result.tax, dec!(450.00));
        assert_eq!(result.bracket.tax_rate, dec!(0.03));
    }

    #[test]
    fn annual_income_regression_fixture() {
        // 100 000 gross less the 60 000 annual standard deduction
        let result = tax_on(dec!(40000));

        assert_eq!(result.tax, dec!(1480.00));
        assert_eq!(result.bracket.min_income, dec!(36000));
        assert_eq!(result.bracket.quick_deduction, dec!(2520));
    }

    #[test]
    fn lower_bound_belongs_to_upper_bracket() {
        let result = tax_on(dec!(36000));

        assert_eq!(result.bracket.tax_rate, dec!(0.10));
        // 36000 × 10% − 2520 matches 36000 × 3%
        assert_eq!(result.tax, dec!(1080.00));
    }

    #[test]
    fn just_below_boundary_stays_in_lower_bracket() {
        let result = tax_on(dec!(35999.99));

        assert_eq!(result.bracket.tax_rate, dec!(0.03));
        assert_eq!(result.tax, dec!(1080.00));
    }

    #[test]
    fn top_bracket_is_unbounded() {
        let result = tax_on(dec!(2000000));

        assert_eq!(result.bracket.tax_rate, dec!(0.45));
        assert_eq!(result.tax, dec!(718080.00));
    }

    #[test]
    fn tax_is_rounded_half_up_to_cents() {
        // 0.15 × 3% = 0.0045
        assert_eq!(tax_on(dec!(0.15)).tax, dec!(0.00));
        // 0.50 × 3% = 0.015
        assert_eq!(tax_on(dec!(0.50)).tax, dec!(0.02));
    }

    // =========================================================================
    // non-positive income and guards
    // =========================================================================

    #[test]
    fn zero_income_owes_nothing_in_lowest_bracket() {
        let result = tax_on(Decimal::ZERO);

        assert_eq!(result.tax, Decimal::ZERO);
        assert_eq!(result.bracket.min_income, dec!(0));
    }

    #[test]
    fn negative_income_owes_nothing() {
        let result = tax_on(dec!(-1234.56));

        assert_eq!(result.tax, Decimal::ZERO);
        assert_eq!(result.bracket.tax_rate, dec!(0.03));
    }

    #[test]
    fn oversized_quick_deduction_is_clamped_to_zero() {
        let brackets = vec![TaxBracket {
            min_income: dec!(0),
            max_income: None,
            tax_rate: dec!(0.10),
            quick_deduction: dec!(5000),
        }];

        let result = TaxCalculator::new(&brackets).calculate_tax(dec!(1000)).unwrap();

        assert_eq!(result.tax, Decimal::ZERO);
    }

    #[test]
    fn empty_table_is_an_error() {
        let result = TaxCalculator::new(&[]).calculate_tax(dec!(1000));

        assert_eq!(result, Err(TaxCalculatorError::NoTaxBrackets));
    }

    #[test]
    fn gap_in_table_is_an_error() {
        let brackets = vec![
            TaxBracket {
                min_income: dec!(0),
                max_income: Some(dec!(1000)),
                tax_rate: dec!(0.03),
                quick_deduction: dec!(0),
            },
            TaxBracket {
                min_income: dec!(2000),
                max_income: None,
                tax_rate: dec!(0.10),
                quick_deduction: dec!(0),
            },
        ];

        let result = TaxCalculator::new(&brackets).calculate_tax(dec!(1500));

        assert_eq!(result, Err(TaxCalculatorError::NoMatchingBracket(dec!(1500))));
    }

    // =========================================================================
    // properties
    // =========================================================================

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(256))]

        #[test]
        fn prop_selected_bracket_holds_income_and_tax_is_non_negative(cents in 0i64..500_000_000) {
            let taxable = Decimal::new(cents, 2);
            let result = tax_on(taxable);

            prop_assert!(result.bracket.min_income <= taxable);
            prop_assert!(result.bracket.max_income.is_none_or(|max| taxable < max));
            prop_assert!(result.tax >= Decimal::ZERO);
        }

        #[test]
        fn prop_non_positive_income_owes_nothing(cents in -500_000_000i64..=0) {
            let result = tax_on(Decimal::new(cents, 2));

            prop_assert_eq!(result.tax, Decimal::ZERO);
        }

        #[test]
        fn prop_tax_is_non_decreasing_in_income(cents in 0i64..200_000_000, step in 0i64..10_000_000) {
            let lower = tax_on(Decimal::new(cents, 2)).tax;
            let higher = tax_on(Decimal::new(cents + step, 2)).tax;

            prop_assert!(lower <= higher);
        }
    }
}
