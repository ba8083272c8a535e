//! Money helpers shared by the calculators: cent rounding and the clamps
//! used for contribution bases and non-negative tax.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a money amount to cents, with midpoints going away from zero.
///
/// Applied to contribution amounts and tax. Contribution bases are never
/// rounded.
///
/// ```
/// use rust_decimal_macros::dec;
/// use iit_core::calculations::common::round_half_up;
///
/// // 6821 * 0.005 unemployment contribution
/// assert_eq!(round_half_up(dec!(34.105)), dec!(34.11));
/// assert_eq!(round_half_up(dec!(-0.125)), dec!(-0.13));
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn max(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a > b { a } else { b }
}

pub fn min(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a < b { a } else { b }
}

/// Raises `value` to `floor`, then caps it at `ceiling`.
///
/// When `floor > ceiling` the ceiling wins; validated configurations never
/// hit that case.
///
/// ```
/// use rust_decimal_macros::dec;
/// use iit_core::calculations::common::clamp;
///
/// assert_eq!(clamp(dec!(3000), dec!(6821), dec!(35283)), dec!(6821));
/// assert_eq!(clamp(dec!(50000), dec!(6821), dec!(35283)), dec!(35283));
/// ```
pub fn clamp(
    value: Decimal,
    floor: Decimal,
    ceiling: Decimal,
) -> Decimal {
    min(max(value, floor), ceiling)
}
