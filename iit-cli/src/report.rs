//! Plain-text and JSON rendering of engine results.

use std::fmt::Write;

use clap::ValueEnum;
use iit_core::calculations::IncomeCalculationResult;
use iit_core::{MonthlyResult, TaxBracketVersion};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::app::YearForecast;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to format report")]
    Format(#[from] std::fmt::Error),
}

fn money(value: Decimal) -> String {
    format!("{:.2}", value)
}

fn percent(rate: Decimal) -> String {
    format!("{}%", (rate * Decimal::ONE_HUNDRED).normalize())
}

fn bound(value: Option<Decimal>) -> String {
    value.map_or_else(|| "-".to_string(), money)
}

fn month_row(
    out: &mut String,
    month: &MonthlyResult,
) -> Result<(), ReportError> {
    writeln!(
        out,
        "{:04}-{:02} {:>12} {:>12} {:>10} {:>10} {:>11} {:>12} {:>5} {:>13} {:>13}{}",
        month.year,
        month.month,
        money(month.salary),
        money(month.bonus),
        money(month.social_insurance_this_month),
        money(month.housing_fund_this_month),
        money(month.tax_this_month),
        money(month.net),
        percent(month.applied_tax_rate),
        money(month.cumulative_tax_due),
        money(month.cumulative_tax_charged),
        if month.tax_rule_changed { "  *" } else { "" },
    )?;
    Ok(())
}

pub fn render_forecasts(
    forecasts: &[YearForecast],
    format: OutputFormat,
) -> Result<String, ReportError> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(forecasts)?);
    }

    let mut out = String::new();
    for year in forecasts {
        writeln!(out, "Tax year {}", year.year)?;
        writeln!(
            out,
            "{:<7} {:>12} {:>12} {:>10} {:>10} {:>11} {:>12} {:>5} {:>13} {:>13}",
            "month", "salary", "bonus", "social", "housing", "tax", "net", "rate", "cum due",
            "cum charged"
        )?;
        for month in &year.forecast.months {
            month_row(&mut out, month)?;
        }
        let totals = &year.forecast.totals;
        writeln!(
            out,
            "{:<7} {:>12} {:>12} {:>10} {:>10} {:>11} {:>12}",
            "total",
            money(totals.total_salary),
            money(totals.total_bonus),
            "",
            "",
            money(totals.total_tax),
            money(totals.total_net),
        )?;
        if year.forecast.months.iter().any(|m| m.tax_rule_changed) {
            writeln!(out, "* tax rules changed from the previous month")?;
        }
        writeln!(out)?;
    }
    Ok(out)
}

pub fn render_monthly(
    result: &IncomeCalculationResult,
    format: OutputFormat,
) -> Result<String, ReportError> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(result)?);
    }

    let mut out = String::new();
    writeln!(out, "Period            {:04}-{:02}", result.year, result.month)?;
    writeln!(out, "Gross             {}", money(result.gross))?;
    writeln!(out, "Bonus             {}", money(result.bonus))?;
    writeln!(
        out,
        "Social insurance  {} (base {})",
        money(result.social_insurance.total),
        money(result.social_insurance.base)
    )?;
    writeln!(
        out,
        "Housing fund      {} (base {})",
        money(result.housing_fund.amount),
        money(result.housing_fund.base)
    )?;
    writeln!(out, "Total deductions  {}", money(result.total_deductions))?;
    writeln!(out, "Taxable income    {}", money(result.taxable_income))?;
    writeln!(
        out,
        "Tax               {} at {}",
        money(result.tax),
        percent(result.bracket.tax_rate)
    )?;
    writeln!(out, "Net               {}", money(result.net))?;
    writeln!(out, "Effective rate    {}", percent(result.effective_tax_rate))?;
    Ok(out)
}

pub fn render_brackets(
    version: &TaxBracketVersion,
    format: OutputFormat,
) -> Result<String, ReportError> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(version)?);
    }

    let mut out = String::new();
    writeln!(out, "{} {}", version.jurisdiction, version.period)?;
    writeln!(
        out,
        "{:>14} {:>14} {:>6} {:>14}",
        "from", "to", "rate", "quick deduct."
    )?;
    for bracket in &version.brackets {
        writeln!(
            out,
            "{:>14} {:>14} {:>6} {:>14}",
            money(bracket.min_income),
            bound(bracket.max_income),
            percent(bracket.tax_rate),
            money(bracket.quick_deduction),
        )?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use iit_core::{EffectivePeriod, Forecast, Jurisdiction, TaxBracket};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn version() -> TaxBracketVersion {
        TaxBracketVersion {
            jurisdiction: Jurisdiction::new("beijing"),
            period: EffectivePeriod::open(NaiveDate::from_ymd_opt(2019, 1, 1).unwrap()),
            brackets: vec![
                TaxBracket {
                    min_income: dec!(0),
                    max_income: Some(dec!(36000)),
                    tax_rate: dec!(0.03),
                    quick_deduction: dec!(0),
                },
                TaxBracket {
                    min_income: dec!(36000),
                    max_income: None,
                    tax_rate: dec!(0.10),
                    quick_deduction: dec!(2520),
                },
            ],
        }
    }

    #[test]
    fn percent_strips_trailing_zeros() {
        assert_eq!(percent(dec!(0.10)), "10%");
        assert_eq!(percent(dec!(0.005)), "0.5%");
    }

    #[test]
    fn bracket_table_lists_every_bracket() {
        let text = render_brackets(&version(), OutputFormat::Table).unwrap();

        assert!(text.starts_with("beijing [2019-01-01, open)"), "{text}");
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("2520.00"));
    }

    #[test]
    fn bracket_json_round_trips() {
        let json = render_brackets(&version(), OutputFormat::Json).unwrap();

        let parsed: TaxBracketVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, version());
    }

    #[test]
    fn empty_forecast_renders_header_and_totals() {
        let forecasts = vec![YearForecast {
            year: 2024,
            forecast: Forecast::new(Vec::new()),
        }];

        let text = render_forecasts(&forecasts, OutputFormat::Table).unwrap();

        assert!(text.starts_with("Tax year 2024\n"));
        assert!(text.contains("total"));
        assert!(!text.contains('*'));
    }
}
