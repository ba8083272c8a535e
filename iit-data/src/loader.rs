use std::collections::BTreeMap;
use std::io::Read;

use chrono::NaiveDate;
use iit_core::db::{ConfigRepository, RepositoryError};
use iit_core::{EffectivePeriod, Jurisdiction, SocialInsuranceConfig, TaxBracket};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur when loading configuration data.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Invalid record on line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for LoaderError {
    fn from(err: csv::Error) -> Self {
        LoaderError::CsvParse(err.to_string())
    }
}

/// Outcome of a load run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Versions written to the repository.
    pub saved: usize,
    /// Versions already stored with identical content.
    pub unchanged: usize,
}

/// A single bracket row from the tax brackets CSV file.
///
/// Rows sharing `(jurisdiction, effective_from, effective_to)` form one
/// bracket table version:
/// - `jurisdiction`: city or region key (e.g. `beijing`)
/// - `effective_from`: first day the table applies (`YYYY-MM-DD`)
/// - `effective_to`: first day it no longer applies (empty while current)
/// - `min_income` / `max_income`: annual cumulative taxable income range
///   (`max_income` empty for the top bracket)
/// - `tax_rate`: marginal rate as a decimal (e.g. 0.10 for 10%)
/// - `quick_deduction`: amount subtracted from `income * rate`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TaxBracketRecord {
    pub jurisdiction: String,
    pub effective_from: NaiveDate,
    #[serde(deserialize_with = "deserialize_optional_date")]
    pub effective_to: Option<NaiveDate>,
    pub min_income: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub max_income: Option<Decimal>,
    pub tax_rate: Decimal,
    pub quick_deduction: Decimal,
}

/// One social insurance and housing fund configuration version per row.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SocialInsuranceRecord {
    pub jurisdiction: String,
    pub effective_from: NaiveDate,
    #[serde(deserialize_with = "deserialize_optional_date")]
    pub effective_to: Option<NaiveDate>,
    pub social_min_base: Decimal,
    pub social_max_base: Decimal,
    pub pension_rate: Decimal,
    pub medical_rate: Decimal,
    pub unemployment_rate: Decimal,
    pub housing_fund_min_base: Decimal,
    pub housing_fund_max_base: Decimal,
    pub housing_fund_rate: Decimal,
}

impl SocialInsuranceRecord {
    pub fn config(&self) -> SocialInsuranceConfig {
        SocialInsuranceConfig {
            social_min_base: self.social_min_base,
            social_max_base: self.social_max_base,
            pension_rate: self.pension_rate,
            medical_rate: self.medical_rate,
            unemployment_rate: self.unemployment_rate,
            housing_fund_min_base: self.housing_fund_min_base,
            housing_fund_max_base: self.housing_fund_max_base,
            housing_fund_rate: self.housing_fund_rate,
        }
    }
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// A stored version matches a record with the same start. An open record
/// also matches a stored version that a later version has since closed.
fn same_period(
    stored: &EffectivePeriod,
    record: &EffectivePeriod,
) -> bool {
    stored.effective_from == record.effective_from
        && (record.effective_to.is_none() || stored.effective_to == record.effective_to)
}

/// Reads every row of `reader` as `T`, rejecting blank jurisdictions.
fn parse_records<R, T>(
    reader: R,
    jurisdiction_of: impl Fn(&T) -> &str,
) -> Result<Vec<T>, LoaderError>
where
    R: Read,
    T: for<'de> Deserialize<'de>,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, result) in csv_reader.deserialize().enumerate() {
        let record: T = result?;
        if jurisdiction_of(&record).trim().is_empty() {
            return Err(LoaderError::InvalidRecord {
                // Header is line 1.
                line: index + 2,
                reason: "jurisdiction is empty".to_string(),
            });
        }
        records.push(record);
    }

    Ok(records)
}

/// Loader for bracket table versions from CSV files.
///
/// Works against any [`ConfigRepository`], so the same CSV can populate the
/// SQLite store or an in-memory one.
pub struct TaxBracketLoader;

impl TaxBracketLoader {
    /// Parse bracket records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<TaxBracketRecord>, LoaderError> {
        parse_records(reader, |record: &TaxBracketRecord| record.jurisdiction.as_str())
    }

    /// Load bracket records into the repository.
    ///
    /// Records are grouped into one table per `(jurisdiction, effective_from,
    /// effective_to)` and saved in chronological order, so each save closes
    /// the version before it. A version already stored with the same period
    /// and brackets is left alone, which makes repeated loads of the same
    /// file a no-op.
    pub async fn load<R: ConfigRepository + ?Sized>(
        repo: &R,
        records: &[TaxBracketRecord],
    ) -> Result<LoadSummary, LoaderError> {
        let mut groups: BTreeMap<(Jurisdiction, NaiveDate, Option<NaiveDate>), Vec<TaxBracket>> =
            BTreeMap::new();

        for record in records {
            groups
                .entry((
                    Jurisdiction::new(&record.jurisdiction),
                    record.effective_from,
                    record.effective_to,
                ))
                .or_default()
                .push(TaxBracket {
                    min_income: record.min_income,
                    max_income: record.max_income,
                    tax_rate: record.tax_rate,
                    quick_deduction: record.quick_deduction,
                });
        }

        let mut summary = LoadSummary::default();
        for ((jurisdiction, effective_from, effective_to), mut brackets) in groups {
            brackets.sort_by(|a, b| a.min_income.cmp(&b.min_income));
            let period = EffectivePeriod {
                effective_from,
                effective_to,
            };

            let existing = repo.list_tax_bracket_versions(&jurisdiction).await?;
            if existing
                .iter()
                .any(|version| same_period(&version.period, &period) && version.brackets == brackets)
            {
                debug!(%jurisdiction, %period, "bracket table already stored");
                summary.unchanged += 1;
                continue;
            }

            repo.save_tax_brackets(&jurisdiction, &brackets, effective_from, effective_to)
                .await?;
            summary.saved += 1;
        }

        info!(
            saved = summary.saved,
            unchanged = summary.unchanged,
            "bracket tables loaded"
        );
        Ok(summary)
    }
}

/// Loader for social insurance configuration versions from CSV files.
pub struct SocialInsuranceLoader;

impl SocialInsuranceLoader {
    pub fn parse<R: Read>(reader: R) -> Result<Vec<SocialInsuranceRecord>, LoaderError> {
        parse_records(reader, |record: &SocialInsuranceRecord| {
            record.jurisdiction.as_str()
        })
    }

    /// Load configuration records into the repository, oldest first per
    /// jurisdiction. Identical stored versions are skipped.
    pub async fn load<R: ConfigRepository + ?Sized>(
        repo: &R,
        records: &[SocialInsuranceRecord],
    ) -> Result<LoadSummary, LoaderError> {
        let mut ordered: Vec<(Jurisdiction, &SocialInsuranceRecord)> = records
            .iter()
            .map(|record| (Jurisdiction::new(&record.jurisdiction), record))
            .collect();
        ordered.sort_by(|(ja, a), (jb, b)| {
            ja.cmp(jb)
                .then_with(|| a.effective_from.cmp(&b.effective_from))
        });

        let mut summary = LoadSummary::default();
        for (jurisdiction, record) in ordered {
            let config = record.config();
            let period = EffectivePeriod {
                effective_from: record.effective_from,
                effective_to: record.effective_to,
            };

            let existing = repo.list_social_insurance_versions(&jurisdiction).await?;
            if existing
                .iter()
                .any(|version| same_period(&version.period, &period) && version.config == config)
            {
                debug!(%jurisdiction, %period, "social insurance config already stored");
                summary.unchanged += 1;
                continue;
            }

            repo.save_social_insurance_config(
                &jurisdiction,
                &config,
                record.effective_from,
                record.effective_to,
            )
            .await?;
            summary.saved += 1;
        }

        info!(
            saved = summary.saved,
            unchanged = summary.unchanged,
            "social insurance configs loaded"
        );
        Ok(summary)
    }
}
