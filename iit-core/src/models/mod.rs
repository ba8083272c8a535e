mod effective_period;
mod forecast;
mod jurisdiction;
mod social_insurance_config;
mod tax_bracket;
mod year_month;

pub use effective_period::{EffectivePeriod, VersionConflict, plan_insert};
pub use forecast::{Forecast, ForecastTotals, MonthlyIncomeInput, MonthlyResult};
pub use jurisdiction::Jurisdiction;
pub use social_insurance_config::{
    SocialInsuranceConfig, SocialInsuranceConfigError, SocialInsuranceVersion,
};
pub use tax_bracket::{
    BracketTableError, TaxBracket, TaxBracketVersion, params_signature, validate_bracket_table,
};
pub use year_month::{YearMonth, YearMonthError};
