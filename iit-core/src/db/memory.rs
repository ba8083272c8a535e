//! In-process [`ConfigRepository`] backed by vectors behind a `RwLock`.
//!
//! Used by the `"memory"` backend, by tests, and by callers that assemble
//! configuration on the fly. The close-previous + insert pair of every save
//! runs under a single write lock.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use super::factory::{DbConfig, RepositoryFactory};
use super::repository::{ConfigRepository, RepositoryError, select_effective};
use crate::models::{
    EffectivePeriod, Jurisdiction, SocialInsuranceConfig, SocialInsuranceVersion, TaxBracket,
    TaxBracketVersion, plan_insert, validate_bracket_table,
};

#[derive(Debug, Default)]
struct Store {
    tax_brackets: Vec<TaxBracketVersion>,
    social_insurance: Vec<SocialInsuranceVersion>,
}

#[derive(Debug, Default)]
pub struct InMemoryConfigRepository {
    store: RwLock<Store>,
}

impl InMemoryConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Store>, RepositoryError> {
        self.store
            .read()
            .map_err(|e| RepositoryError::Database(format!("store lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Store>, RepositoryError> {
        self.store
            .write()
            .map_err(|e| RepositoryError::Database(format!("store lock poisoned: {e}")))
    }
}

#[async_trait]
impl ConfigRepository for InMemoryConfigRepository {
    async fn tax_bracket_version(
        &self,
        jurisdiction: &Jurisdiction,
        as_of: NaiveDate,
    ) -> Result<Option<TaxBracketVersion>, RepositoryError> {
        let store = self.read()?;
        select_effective(
            jurisdiction,
            as_of,
            store
                .tax_brackets
                .iter()
                .filter(|v| &v.jurisdiction == jurisdiction)
                .cloned(),
            |v| v.period,
        )
    }

    async fn list_tax_bracket_versions(
        &self,
        jurisdiction: &Jurisdiction,
    ) -> Result<Vec<TaxBracketVersion>, RepositoryError> {
        let store = self.read()?;
        let mut versions: Vec<_> = store
            .tax_brackets
            .iter()
            .filter(|v| &v.jurisdiction == jurisdiction)
            .cloned()
            .collect();
        versions.sort_by_key(|v| v.period.effective_from);
        Ok(versions)
    }

    async fn save_tax_brackets(
        &self,
        jurisdiction: &Jurisdiction,
        brackets: &[TaxBracket],
        effective_from: NaiveDate,
        effective_to: Option<NaiveDate>,
    ) -> Result<TaxBracketVersion, RepositoryError> {
        validate_bracket_table(brackets)?;
        let period = EffectivePeriod::new(effective_from, effective_to)?;

        let mut store = self.write()?;
        let indices: Vec<usize> = store
            .tax_brackets
            .iter()
            .enumerate()
            .filter(|(_, v)| &v.jurisdiction == jurisdiction)
            .map(|(idx, _)| idx)
            .collect();
        let periods: Vec<EffectivePeriod> = indices
            .iter()
            .map(|&idx| store.tax_brackets[idx].period)
            .collect();

        if let Some(close) = plan_insert(&periods, &period)? {
            let target = &mut store.tax_brackets[indices[close]];
            debug!(%jurisdiction, closed = %target.period, at = %effective_from, "closing tax bracket version");
            target.period = target.period.closed_at(effective_from);
        }

        let version = TaxBracketVersion {
            jurisdiction: jurisdiction.clone(),
            period,
            brackets: brackets.to_vec(),
        };
        store.tax_brackets.push(version.clone());
        Ok(version)
    }

    async fn social_insurance_version(
        &self,
        jurisdiction: &Jurisdiction,
        as_of: NaiveDate,
    ) -> Result<Option<SocialInsuranceVersion>, RepositoryError> {
        let store = self.read()?;
        select_effective(
            jurisdiction,
            as_of,
            store
                .social_insurance
                .iter()
                .filter(|v| &v.jurisdiction == jurisdiction)
                .cloned(),
            |v| v.period,
        )
    }

    async fn list_social_insurance_versions(
        &self,
        jurisdiction: &Jurisdiction,
    ) -> Result<Vec<SocialInsuranceVersion>, RepositoryError> {
        let store = self.read()?;
        let mut versions: Vec<_> = store
            .social_insurance
            .iter()
            .filter(|v| &v.jurisdiction == jurisdiction)
            .cloned()
            .collect();
        versions.sort_by_key(|v| v.period.effective_from);
        Ok(versions)
    }

    async fn save_social_insurance_config(
        &self,
        jurisdiction: &Jurisdiction,
        config: &SocialInsuranceConfig,
        effective_from: NaiveDate,
        effective_to: Option<NaiveDate>,
    ) -> Result<SocialInsuranceVersion, RepositoryError> {
        config.validate()?;
        let period = EffectivePeriod::new(effective_from, effective_to)?;

        let mut store = self.write()?;
        let indices: Vec<usize> = store
            .social_insurance
            .iter()
            .enumerate()
            .filter(|(_, v)| &v.jurisdiction == jurisdiction)
            .map(|(idx, _)| idx)
            .collect();
        let periods: Vec<EffectivePeriod> = indices
            .iter()
            .map(|&idx| store.social_insurance[idx].period)
            .collect();

        if let Some(close) = plan_insert(&periods, &period)? {
            let target = &mut store.social_insurance[indices[close]];
            debug!(%jurisdiction, closed = %target.period, at = %effective_from, "closing social insurance version");
            target.period = target.period.closed_at(effective_from);
        }

        let version = SocialInsuranceVersion {
            jurisdiction: jurisdiction.clone(),
            period,
            config: config.clone(),
        };
        store.social_insurance.push(version.clone());
        Ok(version)
    }

    async fn list_jurisdictions(&self) -> Result<Vec<Jurisdiction>, RepositoryError> {
        let store = self.read()?;
        let mut jurisdictions: Vec<Jurisdiction> = store
            .tax_brackets
            .iter()
            .map(|v| v.jurisdiction.clone())
            .chain(store.social_insurance.iter().map(|v| v.jurisdiction.clone()))
            .collect();
        jurisdictions.sort();
        jurisdictions.dedup();
        Ok(jurisdictions)
    }
}

/// [`RepositoryFactory`] for the `"memory"` backend. The connection string
/// is ignored; every call yields a fresh, empty store.
pub struct InMemoryRepositoryFactory;

#[async_trait]
impl RepositoryFactory for InMemoryRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create(
        &self,
        _config: &DbConfig,
    ) -> Result<Box<dyn ConfigRepository>, RepositoryError> {
        Ok(Box::new(InMemoryConfigRepository::new()))
    }
}
