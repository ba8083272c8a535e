//! Employee social-insurance and housing-fund contributions.
//!
//! Both contributions are a rate applied to a base. The base is the monthly
//! salary clamped to the jurisdiction's `[min, max]` range unless the caller
//! supplies an explicit base (some employers declare a fixed base).
//! Bases are kept exact; contribution amounts are rounded to cents.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::SocialInsuranceConfig;
use crate::calculations::common::{clamp, round_half_up};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialInsuranceContribution {
    pub base: Decimal,
    pub pension: Decimal,
    pub medical: Decimal,
    pub unemployment: Decimal,
    /// `pension + medical + unemployment`.
    pub total: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HousingFundContribution {
    pub base: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct SocialInsuranceCalculator<'a> {
    config: &'a SocialInsuranceConfig,
}

impl<'a> SocialInsuranceCalculator<'a> {
    pub fn new(config: &'a SocialInsuranceConfig) -> Self {
        Self { config }
    }

    pub fn calculate_social_insurance_base(
        &self,
        gross_income: Decimal,
    ) -> Decimal {
        clamp(
            gross_income,
            self.config.social_min_base,
            self.config.social_max_base,
        )
    }

    pub fn calculate_housing_fund_base(
        &self,
        gross_income: Decimal,
    ) -> Decimal {
        clamp(
            gross_income,
            self.config.housing_fund_min_base,
            self.config.housing_fund_max_base,
        )
    }

    /// Contributions on `gross_income`, or on `custom_base` verbatim when
    /// one is given.
    pub fn calculate_social_insurance(
        &self,
        gross_income: Decimal,
        custom_base: Option<Decimal>,
    ) -> SocialInsuranceContribution {
        let base = custom_base.unwrap_or_else(|| self.calculate_social_insurance_base(gross_income));

        let pension = round_half_up(base * self.config.pension_rate);
        let medical = round_half_up(base * self.config.medical_rate);
        let unemployment = round_half_up(base * self.config.unemployment_rate);

        SocialInsuranceContribution {
            base,
            pension,
            medical,
            unemployment,
            total: pension + medical + unemployment,
        }
    }

    pub fn calculate_housing_fund(
        &self,
        gross_income: Decimal,
        custom_base: Option<Decimal>,
    ) -> HousingFundContribution {
        let base = custom_base.unwrap_or_else(|| self.calculate_housing_fund_base(gross_income));

        HousingFundContribution {
            base,
            amount: round_half_up(base * self.config.housing_fund_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::calculations::test_support::beijing_social_insurance;

    // =========================================================================
    // bases
    // =========================================================================

    #[test]
    fn social_insurance_base_raises_low_salary_to_floor() {
        let config = beijing_social_insurance();
        let calculator = SocialInsuranceCalculator::new(&config);

        assert_eq!(calculator.calculate_social_insurance_base(dec!(3000)), dec!(6821));
    }

    #[test]
    fn social_insurance_base_caps_high_salary() {
        let config = beijing_social_insurance();
        let calculator = SocialInsuranceCalculator::new(&config);

        assert_eq!(calculator.calculate_social_insurance_base(dec!(60000)), dec!(35283));
    }

    #[test]
    fn housing_fund_base_uses_its_own_range() {
        let config = beijing_social_insurance();
        let calculator = SocialInsuranceCalculator::new(&config);

        assert_eq!(calculator.calculate_housing_fund_base(dec!(2000)), dec!(2420));
        assert_eq!(calculator.calculate_housing_fund_base(dec!(20000)), dec!(20000));
    }

    // =========================================================================
    // contributions
    // =========================================================================

    #[test]
    fn social_insurance_splits_by_category() {
        let config = beijing_social_insurance();
        let calculator = SocialInsuranceCalculator::new(&config);

        let result = calculator.calculate_social_insurance(dec!(20000), None);

        assert_eq!(
            result,
            SocialInsuranceContribution {
                base: dec!(20000),
                pension: dec!(1600.00),
                medical: dec!(400.00),
                unemployment: dec!(100.00),
                total: dec!(2100.00),
            }
        );
    }

    #[test]
    fn custom_base_bypasses_clamp() {
        let config = beijing_social_insurance();
        let calculator = SocialInsuranceCalculator::new(&config);

        let result = calculator.calculate_social_insurance(dec!(50000), Some(dec!(5000)));

        assert_eq!(result.base, dec!(5000));
        assert_eq!(result.pension, dec!(400.00));
        assert_eq!(result.total, dec!(525.00));
    }

    #[test]
    fn contributions_are_rounded_to_cents() {
        let config = beijing_social_insurance();
        let calculator = SocialInsuranceCalculator::new(&config);

        // 6821 × 0.5% = 34.105
        let result = calculator.calculate_social_insurance(dec!(100), None);

        assert_eq!(result.unemployment, dec!(34.11));
        assert_eq!(result.total, dec!(545.68) + dec!(136.42) + dec!(34.11));
    }

    #[test]
    fn housing_fund_applies_rate_to_clamped_base() {
        let config = beijing_social_insurance();
        let calculator = SocialInsuranceCalculator::new(&config);

        let result = calculator.calculate_housing_fund(dec!(40000), None);

        assert_eq!(
            result,
            HousingFundContribution {
                base: dec!(35283),
                amount: dec!(4233.96),
            }
        );
    }

    #[test]
    fn housing_fund_honours_custom_base() {
        let config = beijing_social_insurance();
        let calculator = SocialInsuranceCalculator::new(&config);

        let result = calculator.calculate_housing_fund(dec!(40000), Some(dec!(10000)));

        assert_eq!(result.amount, dec!(1200.00));
    }

    // =========================================================================
    // clamp properties
    // =========================================================================

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(256))]

        #[test]
        fn prop_bases_stay_within_configured_range(cents in -1_000_000i64..10_000_000) {
            let config = beijing_social_insurance();
            let calculator = SocialInsuranceCalculator::new(&config);
            let gross = Decimal::new(cents, 2);

            let si = calculator.calculate_social_insurance_base(gross);
            let hf = calculator.calculate_housing_fund_base(gross);

            prop_assert!(config.social_min_base <= si && si <= config.social_max_base);
            prop_assert!(config.housing_fund_min_base <= hf && hf <= config.housing_fund_max_base);
        }

        #[test]
        fn prop_clamp_is_idempotent(cents in -1_000_000i64..10_000_000) {
            let config = beijing_social_insurance();
            let calculator = SocialInsuranceCalculator::new(&config);

            let once = calculator.calculate_social_insurance_base(Decimal::new(cents, 2));
            let twice = calculator.calculate_social_insurance_base(once);

            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_gross_inside_range_is_kept_exactly(cents in 682_100i64..=3_528_300) {
            let config = beijing_social_insurance();
            let calculator = SocialInsuranceCalculator::new(&config);
            let gross = Decimal::new(cents, 2);

            prop_assert_eq!(calculator.calculate_social_insurance_base(gross), gross);
        }

        #[test]
        fn prop_gross_inside_housing_fund_range_is_kept_exactly(cents in 242_000i64..=3_528_300) {
            let config = beijing_social_insurance();
            let calculator = SocialInsuranceCalculator::new(&config);
            let gross = Decimal::new(cents, 2);

            prop_assert_eq!(calculator.calculate_housing_fund_base(gross), gross);
        }
    }
}
