use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use iit_core::db::select_effective;
use iit_core::{
    ConfigRepository, EffectivePeriod, Jurisdiction, RepositoryError, SocialInsuranceConfig,
    SocialInsuranceVersion, TaxBracket, TaxBracketVersion, plan_insert, validate_bracket_table,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use tracing::{debug, info};

use crate::decimal::{decimal_to_text, get_decimal, get_optional_decimal};

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Opens `database_url`, which may be a bare file path (created if
    /// missing), a `sqlite:` URL, or `:memory:`.
    pub async fn new(database_url: &str) -> Result<Self> {
        let in_memory = matches!(database_url, ":memory:" | "sqlite::memory:");
        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
        } else if database_url.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(database_url)
        } else {
            Ok(SqliteConnectOptions::new().filename(database_url))
        }
        .with_context(|| format!("Invalid database URL: {}", database_url))?
        .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if in_memory {
            // Every connection to :memory: is a separate database; keep exactly one alive.
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Load and execute all SQL seed files from the specified directory.
    /// Files are executed in alphabetical order by filename.
    pub async fn run_seeds(
        &self,
        seeds_dir: &Path,
    ) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;
            debug!(file = %path.display(), "seed file applied");
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn brackets_for(
        &self,
        version_id: i64,
    ) -> Result<Vec<TaxBracket>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT min_income, max_income, tax_rate, quick_deduction
             FROM tax_brackets WHERE version_id = ? ORDER BY position",
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.iter().map(row_to_tax_bracket).collect()
    }

    async fn load_tax_bracket_version(
        &self,
        row: &SqliteRow,
    ) -> Result<TaxBracketVersion, RepositoryError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(TaxBracketVersion {
            jurisdiction: row_to_jurisdiction(row)?,
            period: row_to_period(row)?,
            brackets: self.brackets_for(id).await?,
        })
    }
}

fn db_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn row_to_jurisdiction(row: &SqliteRow) -> Result<Jurisdiction, RepositoryError> {
    let key: String = row.try_get("jurisdiction").map_err(db_error)?;
    Ok(Jurisdiction::new(key))
}

fn row_to_period(row: &SqliteRow) -> Result<EffectivePeriod, RepositoryError> {
    let effective_from: NaiveDate = row
        .try_get("effective_from")
        .map_err(|e| RepositoryError::Database(format!("Failed to get effective_from: {}", e)))?;
    let effective_to: Option<NaiveDate> = row
        .try_get("effective_to")
        .map_err(|e| RepositoryError::Database(format!("Failed to get effective_to: {}", e)))?;
    Ok(EffectivePeriod {
        effective_from,
        effective_to,
    })
}

fn row_to_tax_bracket(row: &SqliteRow) -> Result<TaxBracket, RepositoryError> {
    Ok(TaxBracket {
        min_income: get_decimal(row, "min_income")?,
        max_income: get_optional_decimal(row, "max_income")?,
        tax_rate: get_decimal(row, "tax_rate")?,
        quick_deduction: get_decimal(row, "quick_deduction")?,
    })
}

fn row_to_social_insurance_version(row: &SqliteRow) -> Result<SocialInsuranceVersion, RepositoryError> {
    Ok(SocialInsuranceVersion {
        jurisdiction: row_to_jurisdiction(row)?,
        period: row_to_period(row)?,
        config: SocialInsuranceConfig {
            social_min_base: get_decimal(row, "social_min_base")?,
            social_max_base: get_decimal(row, "social_max_base")?,
            pension_rate: get_decimal(row, "pension_rate")?,
            medical_rate: get_decimal(row, "medical_rate")?,
            unemployment_rate: get_decimal(row, "unemployment_rate")?,
            housing_fund_min_base: get_decimal(row, "housing_fund_min_base")?,
            housing_fund_max_base: get_decimal(row, "housing_fund_max_base")?,
            housing_fund_rate: get_decimal(row, "housing_fund_rate")?,
        },
    })
}

/// Closes the open version of `table` when inserting `period` requires it.
/// Runs inside the caller's transaction.
async fn close_previous_version(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    jurisdiction: &Jurisdiction,
    period: &EffectivePeriod,
) -> Result<(), RepositoryError> {
    let rows = sqlx::query(&format!(
        "SELECT id, jurisdiction, effective_from, effective_to FROM {table} WHERE jurisdiction = ?"
    ))
    .bind(jurisdiction.as_str())
    .fetch_all(&mut **tx)
    .await
    .map_err(db_error)?;

    let mut ids = Vec::with_capacity(rows.len());
    let mut periods = Vec::with_capacity(rows.len());
    for row in &rows {
        ids.push(row.try_get::<i64, _>("id").map_err(db_error)?);
        periods.push(row_to_period(row)?);
    }

    if let Some(index) = plan_insert(&periods, period)? {
        debug!(%jurisdiction, table, closed = %periods[index], at = %period.effective_from, "closing open version");
        sqlx::query(&format!("UPDATE {table} SET effective_to = ? WHERE id = ?"))
            .bind(period.effective_from)
            .bind(ids[index])
            .execute(&mut **tx)
            .await
            .map_err(db_error)?;
    }

    Ok(())
}

const COVERING: &str =
    "jurisdiction = ? AND effective_from <= ? AND (effective_to IS NULL OR effective_to > ?)";

#[async_trait]
impl ConfigRepository for SqliteRepository {
    async fn tax_bracket_version(
        &self,
        jurisdiction: &Jurisdiction,
        as_of: NaiveDate,
    ) -> Result<Option<TaxBracketVersion>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT id, jurisdiction, effective_from, effective_to
             FROM tax_bracket_versions WHERE {COVERING}"
        ))
        .bind(jurisdiction.as_str())
        .bind(as_of)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let candidates = rows
            .iter()
            .map(|row| Ok((row, row_to_period(row)?)))
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        match select_effective(jurisdiction, as_of, candidates, |(_, period)| *period)? {
            Some((row, _)) => Ok(Some(self.load_tax_bracket_version(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_tax_bracket_versions(
        &self,
        jurisdiction: &Jurisdiction,
    ) -> Result<Vec<TaxBracketVersion>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, jurisdiction, effective_from, effective_to
             FROM tax_bracket_versions WHERE jurisdiction = ? ORDER BY effective_from",
        )
        .bind(jurisdiction.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut versions = Vec::with_capacity(rows.len());
        for row in &rows {
            versions.push(self.load_tax_bracket_version(row).await?);
        }
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

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        close_previous_version(&mut tx, "tax_bracket_versions", jurisdiction, &period).await?;

        let result = sqlx::query(
            "INSERT INTO tax_bracket_versions (jurisdiction, effective_from, effective_to)
             VALUES (?, ?, ?)",
        )
        .bind(jurisdiction.as_str())
        .bind(period.effective_from)
        .bind(period.effective_to)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        let version_id = result.last_insert_rowid();

        for (position, bracket) in brackets.iter().enumerate() {
            sqlx::query(
                "INSERT INTO tax_brackets (version_id, position, min_income, max_income, tax_rate, quick_deduction)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(version_id)
            .bind(position as i64)
            .bind(decimal_to_text(bracket.min_income))
            .bind(bracket.max_income.map(decimal_to_text))
            .bind(decimal_to_text(bracket.tax_rate))
            .bind(decimal_to_text(bracket.quick_deduction))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        info!(%jurisdiction, %period, brackets = brackets.len(), "tax bracket version saved");

        Ok(TaxBracketVersion {
            jurisdiction: jurisdiction.clone(),
            period,
            brackets: brackets.to_vec(),
        })
    }

    async fn social_insurance_version(
        &self,
        jurisdiction: &Jurisdiction,
        as_of: NaiveDate,
    ) -> Result<Option<SocialInsuranceVersion>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT * FROM social_insurance_versions WHERE {COVERING}"
        ))
        .bind(jurisdiction.as_str())
        .bind(as_of)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let versions = rows
            .iter()
            .map(row_to_social_insurance_version)
            .collect::<Result<Vec<_>, _>>()?;
        select_effective(jurisdiction, as_of, versions, |v| v.period)
    }

    async fn list_social_insurance_versions(
        &self,
        jurisdiction: &Jurisdiction,
    ) -> Result<Vec<SocialInsuranceVersion>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM social_insurance_versions WHERE jurisdiction = ? ORDER BY effective_from",
        )
        .bind(jurisdiction.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_social_insurance_version).collect()
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

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        close_previous_version(&mut tx, "social_insurance_versions", jurisdiction, &period).await?;

        sqlx::query(
            "INSERT INTO social_insurance_versions (
                jurisdiction, effective_from, effective_to,
                social_min_base, social_max_base, pension_rate, medical_rate, unemployment_rate,
                housing_fund_min_base, housing_fund_max_base, housing_fund_rate
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(jurisdiction.as_str())
        .bind(period.effective_from)
        .bind(period.effective_to)
        .bind(decimal_to_text(config.social_min_base))
        .bind(decimal_to_text(config.social_max_base))
        .bind(decimal_to_text(config.pension_rate))
        .bind(decimal_to_text(config.medical_rate))
        .bind(decimal_to_text(config.unemployment_rate))
        .bind(decimal_to_text(config.housing_fund_min_base))
        .bind(decimal_to_text(config.housing_fund_max_base))
        .bind(decimal_to_text(config.housing_fund_rate))
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        info!(%jurisdiction, %period, "social insurance version saved");

        Ok(SocialInsuranceVersion {
            jurisdiction: jurisdiction.clone(),
            period,
            config: config.clone(),
        })
    }

    async fn list_jurisdictions(&self) -> Result<Vec<Jurisdiction>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT jurisdiction FROM tax_bracket_versions
             UNION
             SELECT jurisdiction FROM social_insurance_versions
             ORDER BY jurisdiction",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_jurisdiction).collect()
    }
}
