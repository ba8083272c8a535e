use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{EffectivePeriod, Jurisdiction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub min_income: Decimal,
    pub max_income: Option<Decimal>,
    pub tax_rate: Decimal,
    pub quick_deduction: Decimal,
}

impl TaxBracket {
    /// Half-open membership test: `[min_income, max_income)`, unbounded when
    /// `max_income` is `None`.
    pub fn contains(
        &self,
        income: Decimal,
    ) -> bool {
        self.min_income <= income && self.max_income.is_none_or(|max| income < max)
    }
}

/// Reasons a bracket table is rejected by the administrative write path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BracketTableError {
    #[error("bracket table is empty")]
    Empty,

    #[error("lowest bracket must start at 0, starts at {0}")]
    DoesNotStartAtZero(Decimal),

    #[error("bracket {index} is not contiguous with the previous bracket")]
    NotContiguous { index: usize },

    #[error("bracket {index} has max_income not above min_income")]
    EmptyBracket { index: usize },

    #[error("expected exactly one unbounded top bracket, found {0}")]
    UnboundedBrackets(usize),

    #[error("unbounded bracket must be the last one")]
    UnboundedNotLast,

    #[error("bracket {index} has tax rate {rate} outside [0, 1]")]
    RateOutOfRange { index: usize, rate: Decimal },

    #[error("bracket {index} has negative quick deduction {amount}")]
    NegativeQuickDeduction { index: usize, amount: Decimal },
}

/// Checks that `brackets` form a usable progressive table: ascending,
/// contiguous, starting at zero, with exactly one unbounded top bracket.
pub fn validate_bracket_table(brackets: &[TaxBracket]) -> Result<(), BracketTableError> {
    let first = brackets.first().ok_or(BracketTableError::Empty)?;
    if first.min_income != Decimal::ZERO {
        return Err(BracketTableError::DoesNotStartAtZero(first.min_income));
    }

    let unbounded = brackets.iter().filter(|b| b.max_income.is_none()).count();
    if unbounded != 1 {
        return Err(BracketTableError::UnboundedBrackets(unbounded));
    }
    if brackets.last().is_some_and(|b| b.max_income.is_some()) {
        return Err(BracketTableError::UnboundedNotLast);
    }

    for (index, bracket) in brackets.iter().enumerate() {
        if bracket.tax_rate < Decimal::ZERO || bracket.tax_rate > Decimal::ONE {
            return Err(BracketTableError::RateOutOfRange {
                index,
                rate: bracket.tax_rate,
            });
        }
        if bracket.quick_deduction < Decimal::ZERO {
            return Err(BracketTableError::NegativeQuickDeduction {
                index,
                amount: bracket.quick_deduction,
            });
        }
        if bracket.max_income.is_some_and(|max| max <= bracket.min_income) {
            return Err(BracketTableError::EmptyBracket { index });
        }
        if index > 0 && brackets[index - 1].max_income != Some(bracket.min_income) {
            return Err(BracketTableError::NotContiguous { index });
        }
    }

    Ok(())
}

/// Deterministic fingerprint of a bracket table.
///
/// Each bracket contributes `min_income-tax_rate-quick_deduction` with
/// normalized decimals, joined by `|`, so equal tables always produce equal
/// signatures regardless of decimal scale.
pub fn params_signature(brackets: &[TaxBracket]) -> String {
    brackets
        .iter()
        .map(|b| {
            format!(
                "{}-{}-{}",
                b.min_income.normalize(),
                b.tax_rate.normalize(),
                b.quick_deduction.normalize()
            )
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// One effective-dated bracket table for a jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracketVersion {
    pub jurisdiction: Jurisdiction,
    pub period: EffectivePeriod,
    pub brackets: Vec<TaxBracket>,
}

impl TaxBracketVersion {
    pub fn signature(&self) -> String {
        params_signature(&self.brackets)
    }
}
