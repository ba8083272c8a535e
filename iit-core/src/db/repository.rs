use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{
    BracketTableError, EffectivePeriod, Jurisdiction, SocialInsuranceConfig,
    SocialInsuranceConfigError, SocialInsuranceVersion, TaxBracket, TaxBracketVersion,
    VersionConflict,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// More than one version covers the lookup date: the store violates
    /// the single-version invariant.
    #[error("{matches} versions for '{jurisdiction}' cover {as_of}")]
    Ambiguous {
        jurisdiction: Jurisdiction,
        as_of: NaiveDate,
        matches: usize,
    },

    #[error("Invalid bracket table: {0}")]
    InvalidBracketTable(#[from] BracketTableError),

    #[error("Invalid social insurance config: {0}")]
    InvalidSocialInsuranceConfig(#[from] SocialInsuranceConfigError),

    #[error("Version conflict: {0}")]
    VersionConflict(#[from] VersionConflict),
}

/// Time-versioned source of tax and contribution configuration.
///
/// Lookups return the single version whose `[effective_from, effective_to)`
/// covers `as_of`, `None` when nothing does, and
/// [`RepositoryError::Ambiguous`] when several do. Saves validate their
/// payload, close the previous open version and insert the new one
/// atomically.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    // Tax brackets
    async fn tax_bracket_version(
        &self,
        jurisdiction: &Jurisdiction,
        as_of: NaiveDate,
    ) -> Result<Option<TaxBracketVersion>, RepositoryError>;

    async fn list_tax_bracket_versions(
        &self,
        jurisdiction: &Jurisdiction,
    ) -> Result<Vec<TaxBracketVersion>, RepositoryError>;

    async fn save_tax_brackets(
        &self,
        jurisdiction: &Jurisdiction,
        brackets: &[TaxBracket],
        effective_from: NaiveDate,
        effective_to: Option<NaiveDate>,
    ) -> Result<TaxBracketVersion, RepositoryError>;

    // Social insurance
    async fn social_insurance_version(
        &self,
        jurisdiction: &Jurisdiction,
        as_of: NaiveDate,
    ) -> Result<Option<SocialInsuranceVersion>, RepositoryError>;

    async fn list_social_insurance_versions(
        &self,
        jurisdiction: &Jurisdiction,
    ) -> Result<Vec<SocialInsuranceVersion>, RepositoryError>;

    async fn save_social_insurance_config(
        &self,
        jurisdiction: &Jurisdiction,
        config: &SocialInsuranceConfig,
        effective_from: NaiveDate,
        effective_to: Option<NaiveDate>,
    ) -> Result<SocialInsuranceVersion, RepositoryError>;

    /// Every jurisdiction with at least one stored version, sorted.
    async fn list_jurisdictions(&self) -> Result<Vec<Jurisdiction>, RepositoryError>;

    /// Brackets in force on `as_of`, ascending by `min_income`; empty when
    /// no version covers the date.
    async fn get_tax_brackets(
        &self,
        jurisdiction: &Jurisdiction,
        as_of: NaiveDate,
    ) -> Result<Vec<TaxBracket>, RepositoryError> {
        Ok(self
            .tax_bracket_version(jurisdiction, as_of)
            .await?
            .map(|version| version.brackets)
            .unwrap_or_default())
    }

    async fn get_social_insurance_config(
        &self,
        jurisdiction: &Jurisdiction,
        as_of: NaiveDate,
    ) -> Result<Option<SocialInsuranceConfig>, RepositoryError> {
        Ok(self
            .social_insurance_version(jurisdiction, as_of)
            .await?
            .map(|version| version.config))
    }
}

/// Picks the single period covering `as_of` out of `candidates`.
///
/// Shared by backends that filter in memory; returns
/// [`RepositoryError::Ambiguous`] instead of choosing between overlapping
/// versions.
pub fn select_effective<T>(
    jurisdiction: &Jurisdiction,
    as_of: NaiveDate,
    candidates: impl IntoIterator<Item = T>,
    period: impl Fn(&T) -> EffectivePeriod,
) -> Result<Option<T>, RepositoryError> {
    let mut matching: Vec<T> = candidates
        .into_iter()
        .filter(|candidate| period(candidate).contains(as_of))
        .collect();

    match matching.len() {
        0 => Ok(None),
        1 => Ok(matching.pop()),
        matches => Err(RepositoryError::Ambiguous {
            jurisdiction: jurisdiction.clone(),
            as_of,
            matches,
        }),
    }
}
