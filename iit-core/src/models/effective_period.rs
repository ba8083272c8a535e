//! Effective-dated versioning shared by every configuration store.
//!
//! A version is valid over the half-open range `[effective_from,
//! effective_to)`; `effective_to = None` marks the open (current) version.
//! Per jurisdiction at most one version is open and no two versions
//! overlap. [`plan_insert`] decides how a new version fits into the existing
//! set so that every backend enforces the same rules.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionConflict {
    #[error("effective_to {to} must be after effective_from {from}")]
    EmptyPeriod { from: NaiveDate, to: NaiveDate },

    #[error("new version {new} overlaps existing version {existing}")]
    Overlap {
        new: EffectivePeriod,
        existing: EffectivePeriod,
    },

    #[error("{0} open versions exist; expected at most one")]
    MultipleOpen(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectivePeriod {
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

impl EffectivePeriod {
    pub fn new(
        effective_from: NaiveDate,
        effective_to: Option<NaiveDate>,
    ) -> Result<Self, VersionConflict> {
        if let Some(to) = effective_to {
            if to <= effective_from {
                return Err(VersionConflict::EmptyPeriod {
                    from: effective_from,
                    to,
                });
            }
        }
        Ok(Self {
            effective_from,
            effective_to,
        })
    }

    pub fn open(effective_from: NaiveDate) -> Self {
        Self {
            effective_from,
            effective_to: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.effective_to.is_none()
    }

    pub fn contains(
        &self,
        date: NaiveDate,
    ) -> bool {
        self.effective_from <= date && self.effective_to.is_none_or(|to| date < to)
    }

    pub fn overlaps(
        &self,
        other: &EffectivePeriod,
    ) -> bool {
        let starts_before_other_ends = other.effective_to.is_none_or(|to| self.effective_from < to);
        let other_starts_before_end = self.effective_to.is_none_or(|to| other.effective_from < to);
        starts_before_other_ends && other_starts_before_end
    }

    /// Returns this period ended at `date`.
    pub fn closed_at(
        &self,
        date: NaiveDate,
    ) -> Self {
        Self {
            effective_from: self.effective_from,
            effective_to: Some(date),
        }
    }
}

impl fmt::Display for EffectivePeriod {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.effective_to {
            Some(to) => write!(f, "[{}, {})", self.effective_from, to),
            None => write!(f, "[{}, open)", self.effective_from),
        }
    }
}

/// Validates inserting `new` next to `existing` and returns the index of the
/// open version that must be closed at `new.effective_from`, if any.
///
/// The open version is only closed when it starts strictly before the new
/// version. A back-dated version that ends before the open one starts is
/// inserted without touching it. Any remaining overlap is a conflict.
pub fn plan_insert(
    existing: &[EffectivePeriod],
    new: &EffectivePeriod,
) -> Result<Option<usize>, VersionConflict> {
    EffectivePeriod::new(new.effective_from, new.effective_to)?;

    let open: Vec<usize> = existing
        .iter()
        .enumerate()
        .filter(|(_, period)| period.is_open())
        .map(|(idx, _)| idx)
        .collect();
    if open.len() > 1 {
        return Err(VersionConflict::MultipleOpen(open.len()));
    }

    let close = open
        .first()
        .copied()
        .filter(|&idx| existing[idx].effective_from < new.effective_from);

    for (idx, period) in existing.iter().enumerate() {
        let after = if Some(idx) == close {
            period.closed_at(new.effective_from)
        } else {
            *period
        };
        if after.overlaps(new) {
            return Err(VersionConflict::Overlap {
                new: *new,
                existing: *period,
            });
        }
    }

    Ok(close)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn date(
        y: i32,
        m: u32,
        d: u32,
    ) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn closed(
        from: NaiveDate,
        to: NaiveDate,
    ) -> EffectivePeriod {
        EffectivePeriod::new(from, Some(to)).unwrap()
    }

    #[test]
    fn contains_is_half_open() {
        let period = closed(date(2024, 1, 1), date(2024, 7, 1));

        assert!(period.contains(date(2024, 1, 1)));
        assert!(period.contains(date(2024, 6, 30)));
        assert!(!period.contains(date(2024, 7, 1)));
        assert!(!period.contains(date(2023, 12, 31)));
    }

    #[test]
    fn open_period_contains_all_later_dates() {
        let period = EffectivePeriod::open(date(2019, 1, 1));

        assert!(period.contains(date(2099, 12, 31)));
        assert!(!period.contains(date(2018, 12, 31)));
    }

    #[test]
    fn new_rejects_inverted_or_empty_period() {
        assert_eq!(
            EffectivePeriod::new(date(2024, 7, 1), Some(date(2024, 7, 1))),
            Err(VersionConflict::EmptyPeriod {
                from: date(2024, 7, 1),
                to: date(2024, 7, 1),
            })
        );
    }

    #[test]
    fn adjacent_periods_do_not_overlap() {
        let first = closed(date(2024, 1, 1), date(2024, 7, 1));
        let second = EffectivePeriod::open(date(2024, 7, 1));

        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
    }

    #[test]
    fn display_marks_open_versions() {
        assert_eq!(EffectivePeriod::open(date(2024, 1, 1)).to_string(), "[2024-01-01, open)");
        assert_eq!(
            closed(date(2024, 1, 1), date(2024, 7, 1)).to_string(),
            "[2024-01-01, 2024-07-01)"
        );
    }

    #[test]
    fn plan_insert_into_empty_set_closes_nothing() {
        assert_eq!(plan_insert(&[], &EffectivePeriod::open(date(2024, 1, 1))), Ok(None));
    }

    #[test]
    fn plan_insert_closes_previous_open_version() {
        let existing = vec![
            closed(date(2019, 1, 1), date(2024, 1, 1)),
            EffectivePeriod::open(date(2024, 1, 1)),
        ];

        let plan = plan_insert(&existing, &EffectivePeriod::open(date(2024, 7, 1)));

        assert_eq!(plan, Ok(Some(1)));
    }

    #[test]
    fn plan_insert_allows_backdated_version_before_open_one() {
        let existing = vec![EffectivePeriod::open(date(2024, 1, 1))];

        let plan = plan_insert(&existing, &closed(date(2023, 1, 1), date(2024, 1, 1)));

        assert_eq!(plan, Ok(None));
    }

    #[test]
    fn plan_insert_rejects_version_starting_with_open_one() {
        let existing = vec![EffectivePeriod::open(date(2024, 1, 1))];
        let new = EffectivePeriod::open(date(2024, 1, 1));

        assert_eq!(
            plan_insert(&existing, &new),
            Err(VersionConflict::Overlap {
                new,
                existing: existing[0],
            })
        );
    }

    #[test]
    fn plan_insert_rejects_overlap_with_closed_version() {
        let existing = vec![
            closed(date(2023, 1, 1), date(2024, 1, 1)),
            EffectivePeriod::open(date(2024, 1, 1)),
        ];
        let new = closed(date(2023, 6, 1), date(2023, 9, 1));

        assert!(matches!(
            plan_insert(&existing, &new),
            Err(VersionConflict::Overlap { .. })
        ));
    }

    #[test]
    fn plan_insert_refuses_store_with_two_open_versions() {
        let existing = vec![
            EffectivePeriod::open(date(2023, 1, 1)),
            EffectivePeriod::open(date(2024, 1, 1)),
        ];

        assert_eq!(
            plan_insert(&existing, &EffectivePeriod::open(date(2025, 1, 1))),
            Err(VersionConflict::MultipleOpen(2))
        );
    }
}
