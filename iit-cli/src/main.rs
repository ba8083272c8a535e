use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use iit_cli::app::{self, forecast_by_tax_year};
use iit_cli::config::IitConfig;
use iit_cli::income_csv;
use iit_cli::plan::PlanFile;
use iit_cli::report::{self, OutputFormat};
use iit_core::calculations::IncomeCalculationInput;
use iit_core::db::ConfigRepository;
use iit_core::{Jurisdiction, MonthlyIncomeInput, WithholdingEngine, YearMonth};

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Chinese individual income tax withholding calculator.
///
/// Forecasts month-by-month withholding under the cumulative method, runs
/// single-month what-if calculations and prints the configuration in force.
#[derive(Debug, Parser)]
#[command(name = "iit", version, about)]
struct Cli {
    /// Configuration file (defaults to ./iit.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database backend to use (overrides the config file).
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Database connection string.
    /// For SQLite this is a file path (e.g. `iit.db`) or `:memory:`.
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Forecast cumulative withholding month by month.
    Forecast(ForecastArgs),
    /// Calculate a single month in isolation.
    Calc(CalcArgs),
    /// Print the bracket table in force on a date.
    Brackets(BracketsArgs),
    /// List jurisdictions with stored configuration.
    Jurisdictions,
}

#[derive(Debug, Args)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["income", "plan"])))]
struct ForecastArgs {
    #[arg(short, long)]
    jurisdiction: Option<String>,

    /// CSV with `year,month,gross[,bonus]` rows.
    #[arg(long)]
    income: Option<PathBuf>,

    /// TOML income plan (salary changes, bonuses, cash awards).
    #[arg(long, requires_all = ["from", "to"])]
    plan: Option<PathBuf>,

    /// First month, `YYYY-MM`.
    #[arg(long)]
    from: Option<YearMonth>,

    /// Last month, `YYYY-MM`.
    #[arg(long)]
    to: Option<YearMonth>,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
}

#[derive(Debug, Args)]
struct CalcArgs {
    #[arg(short, long)]
    jurisdiction: Option<String>,

    #[arg(long)]
    year: i32,

    #[arg(long)]
    month: u32,

    #[arg(long)]
    gross: Decimal,

    #[arg(long, default_value_t = Decimal::ZERO)]
    bonus: Decimal,

    #[arg(long, default_value_t = Decimal::ZERO)]
    special_deductions: Decimal,

    #[arg(long, default_value_t = Decimal::ZERO)]
    other_deductions: Decimal,

    #[arg(long, default_value_t = Decimal::ZERO)]
    charity_donations: Decimal,

    /// Declared social insurance base (defaults to gross).
    #[arg(long)]
    social_insurance_base: Option<Decimal>,

    /// Declared housing fund base (defaults to gross).
    #[arg(long)]
    housing_fund_base: Option<Decimal>,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
}

#[derive(Debug, Args)]
struct BracketsArgs {
    #[arg(short, long)]
    jurisdiction: Option<String>,

    /// Date to look up, `YYYY-MM-DD` (defaults to today).
    #[arg(long)]
    date: Option<NaiveDate>,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
}

// ─── tracing ─────────────────────────────────────────────────────────────────

/// Initialise the tracing subscriber.
///
/// * Honours `RUST_LOG` when set.
/// * Falls back to `info` so normal runs are quiet.
/// * Strips timestamps and target names to keep CLI output clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::from("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();
}

// ─── commands ────────────────────────────────────────────────────────────────

fn require_jurisdiction(
    config: &IitConfig,
    flag: Option<&str>,
) -> Result<Jurisdiction> {
    config.jurisdiction(flag).ok_or_else(|| {
        anyhow!("no jurisdiction given; pass --jurisdiction or set withholding.default_jurisdiction")
    })
}

fn forecast_inputs(args: &ForecastArgs) -> Result<Vec<MonthlyIncomeInput>> {
    if let Some(path) = &args.plan {
        let (Some(from), Some(to)) = (args.from, args.to) else {
            bail!("--plan requires --from and --to");
        };
        let file = PlanFile::load(path)
            .with_context(|| format!("Failed to load plan: {}", path.display()))?;
        return file
            .plan
            .monthly_inputs(from, to, &file.converter())
            .context("Failed to expand income plan");
    }

    let path = args
        .income
        .as_ref()
        .ok_or_else(|| anyhow!("either --income or --plan is required"))?;
    let inputs = income_csv::load_from_file(path)
        .with_context(|| format!("Failed to load income: {}", path.display()))?;
    Ok(inputs
        .into_iter()
        .filter(|input| {
            let period = input.period().ok();
            args.from.is_none_or(|from| period.is_some_and(|p| p >= from))
                && args.to.is_none_or(|to| period.is_some_and(|p| p <= to))
        })
        .collect())
}

async fn run_forecast(
    repo: &dyn ConfigRepository,
    config: &IitConfig,
    args: ForecastArgs,
) -> Result<String> {
    let jurisdiction = require_jurisdiction(config, args.jurisdiction.as_deref())?;
    let inputs = forecast_inputs(&args)?;
    let engine = WithholdingEngine::with_settings(repo, config.settings());

    let forecasts = forecast_by_tax_year(&engine, &jurisdiction, inputs)
        .await
        .with_context(|| format!("Forecast failed for {}", jurisdiction))?;
    Ok(report::render_forecasts(&forecasts, args.format)?)
}

async fn run_calc(
    repo: &dyn ConfigRepository,
    config: &IitConfig,
    args: CalcArgs,
) -> Result<String> {
    let jurisdiction = require_jurisdiction(config, args.jurisdiction.as_deref())?;
    let period = YearMonth::new(args.year, args.month)?;
    let input = IncomeCalculationInput {
        bonus: args.bonus,
        special_deductions: args.special_deductions,
        other_deductions: args.other_deductions,
        charity_donations: args.charity_donations,
        social_insurance_base: args.social_insurance_base,
        housing_fund_base: args.housing_fund_base,
        ..IncomeCalculationInput::new(jurisdiction, period, args.gross)
    };
    let engine = WithholdingEngine::with_settings(repo, config.settings());

    let result = engine
        .calculate_monthly_income(&input)
        .await
        .context("Single-month calculation failed")?;
    Ok(report::render_monthly(&result, args.format)?)
}

async fn run_brackets(
    repo: &dyn ConfigRepository,
    config: &IitConfig,
    args: BracketsArgs,
) -> Result<String> {
    let jurisdiction = require_jurisdiction(config, args.jurisdiction.as_deref())?;
    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let version = repo
        .tax_bracket_version(&jurisdiction, date)
        .await?
        .ok_or_else(|| anyhow!("no bracket table for {} on {}", jurisdiction, date))?;
    Ok(report::render_brackets(&version, args.format)?)
}

async fn run_jurisdictions(repo: &dyn ConfigRepository) -> Result<String> {
    let jurisdictions = repo.list_jurisdictions().await?;
    Ok(jurisdictions
        .iter()
        .map(|j| format!("{j}\n"))
        .collect())
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = IitConfig::discover(cli.config.as_deref())?;
    let db_config = config.db_config(cli.backend.as_deref(), cli.db.as_deref());

    debug!("connecting to {} backend", db_config.backend);
    let registry = app::build_registry();
    let repo = registry
        .create(&db_config)
        .await
        .with_context(|| format!("Failed to open {} database", db_config.backend))?;

    let output = match cli.command {
        Command::Forecast(args) => run_forecast(&*repo, &config, args).await?,
        Command::Calc(args) => run_calc(&*repo, &config, args).await?,
        Command::Brackets(args) => run_brackets(&*repo, &config, args).await?,
        Command::Jurisdictions => run_jurisdictions(&*repo).await?,
    };
    print!("{output}");

    Ok(())
}
