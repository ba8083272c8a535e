use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{EffectivePeriod, Jurisdiction};

/// Employee-side contribution parameters for one jurisdiction and period.
///
/// Bases are monthly amounts; rates are fractions in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialInsuranceConfig {
    pub social_min_base: Decimal,
    pub social_max_base: Decimal,
    pub pension_rate: Decimal,
    pub medical_rate: Decimal,
    pub unemployment_rate: Decimal,
    pub housing_fund_min_base: Decimal,
    pub housing_fund_max_base: Decimal,
    pub housing_fund_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocialInsuranceConfigError {
    #[error("{field} must be non-negative, got {value}")]
    NegativeBase { field: &'static str, value: Decimal },

    #[error("{field} min base {min} exceeds max base {max}")]
    InvertedBases {
        field: &'static str,
        min: Decimal,
        max: Decimal,
    },

    #[error("{field} must be between 0 and 1, got {value}")]
    RateOutOfRange { field: &'static str, value: Decimal },
}

impl SocialInsuranceConfig {
    pub fn validate(&self) -> Result<(), SocialInsuranceConfigError> {
        for (field, value) in [
            ("social_min_base", self.social_min_base),
            ("housing_fund_min_base", self.housing_fund_min_base),
        ] {
            if value < Decimal::ZERO {
                return Err(SocialInsuranceConfigError::NegativeBase { field, value });
            }
        }

        if self.social_min_base > self.social_max_base {
            return Err(SocialInsuranceConfigError::InvertedBases {
                field: "social insurance",
                min: self.social_min_base,
                max: self.social_max_base,
            });
        }
        if self.housing_fund_min_base > self.housing_fund_max_base {
            return Err(SocialInsuranceConfigError::InvertedBases {
                field: "housing fund",
                min: self.housing_fund_min_base,
                max: self.housing_fund_max_base,
            });
        }

        for (field, value) in [
            ("pension_rate", self.pension_rate),
            ("medical_rate", self.medical_rate),
            ("unemployment_rate", self.unemployment_rate),
            ("housing_fund_rate", self.housing_fund_rate),
        ] {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(SocialInsuranceConfigError::RateOutOfRange { field, value });
            }
        }

        Ok(())
    }

    /// Combined employee social-insurance rate (pension + medical + unemployment).
    pub fn social_rate(&self) -> Decimal {
        self.pension_rate + self.medical_rate + self.unemployment_rate
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialInsuranceVersion {
    pub jurisdiction: Jurisdiction,
    pub period: EffectivePeriod,
    pub config: SocialInsuranceConfig,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn beijing_2024() -> SocialInsuranceConfig {
        SocialInsuranceConfig {
            social_min_base: dec!(6821),
            social_max_base: dec!(35283),
            pension_rate: dec!(0.08),
            medical_rate: dec!(0.02),
            unemployment_rate: dec!(0.005),
            housing_fund_min_base: dec!(2420),
            housing_fund_max_base: dec!(35283),
            housing_fund_rate: dec!(0.12),
        }
    }

    #[test]
    fn validate_accepts_realistic_config() {
        assert_eq!(beijing_2024().validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_inverted_social_bases() {
        let mut config = beijing_2024();
        config.social_min_base = dec!(40000);

        assert_eq!(
            config.validate(),
            Err(SocialInsuranceConfigError::InvertedBases {
                field: "social insurance",
                min: dec!(40000),
                max: dec!(35283),
            })
        );
    }

    #[test]
    fn validate_rejects_inverted_housing_fund_bases() {
        let mut config = beijing_2024();
        config.housing_fund_max_base = dec!(1000);

        assert!(matches!(
            config.validate(),
            Err(SocialInsuranceConfigError::InvertedBases {
                field: "housing fund",
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_rate_outside_unit_interval() {
        let mut config = beijing_2024();
        config.housing_fund_rate = dec!(12);

        assert_eq!(
            config.validate(),
            Err(SocialInsuranceConfigError::RateOutOfRange {
                field: "housing_fund_rate",
                value: dec!(12),
            })
        );
    }

    #[test]
    fn validate_rejects_negative_floor() {
        let mut config = beijing_2024();
        config.social_min_base = dec!(-1);

        assert_eq!(
            config.validate(),
            Err(SocialInsuranceConfigError::NegativeBase {
                field: "social_min_base",
                value: dec!(-1),
            })
        );
    }

    #[test]
    fn social_rate_sums_categories() {
        assert_eq!(beijing_2024().social_rate(), dec!(0.105));
    }
}
