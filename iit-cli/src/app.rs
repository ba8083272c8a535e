use std::collections::BTreeMap;

use iit_core::db::{ConfigRepository, InMemoryRepositoryFactory, RepositoryRegistry};
use iit_core::{CalculationError, Forecast, Jurisdiction, MonthlyIncomeInput, WithholdingEngine};
use iit_db_sqlite::SqliteRepositoryFactory;
use serde::Serialize;
use tracing::info;

/// Registry with every backend the CLI ships with.
pub fn build_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));
    registry.register(Box::new(InMemoryRepositoryFactory));
    registry
}

/// Forecast for one tax year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearForecast {
    pub year: i32,
    #[serde(flatten)]
    pub forecast: Forecast,
}

/// Groups inputs by calendar year. The cumulative method restarts every
/// January, so each year is forecast on its own.
pub fn split_by_tax_year(
    inputs: Vec<MonthlyIncomeInput>
) -> BTreeMap<i32, Vec<MonthlyIncomeInput>> {
    let mut years: BTreeMap<i32, Vec<MonthlyIncomeInput>> = BTreeMap::new();
    for input in inputs {
        years.entry(input.year).or_default().push(input);
    }
    years
}

pub async fn forecast_by_tax_year<R: ConfigRepository + ?Sized>(
    engine: &WithholdingEngine<'_, R>,
    jurisdiction: &Jurisdiction,
    inputs: Vec<MonthlyIncomeInput>,
) -> Result<Vec<YearForecast>, CalculationError> {
    let mut forecasts = Vec::new();
    for (year, months) in split_by_tax_year(inputs) {
        info!(%jurisdiction, year, months = months.len(), "forecasting tax year");
        let forecast = engine.forecast(jurisdiction, &months).await?;
        forecasts.push(YearForecast { year, forecast });
    }
    Ok(forecasts)
}
