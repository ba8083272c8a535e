use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use iit_data::{SocialInsuranceLoader, TaxBracketLoader};
use iit_db_sqlite::SqliteRepository;
use tracing_subscriber::EnvFilter;

/// Load withholding configuration from CSV files into the database.
///
/// Bracket CSV columns:
/// jurisdiction, effective_from, effective_to, min_income, max_income,
/// tax_rate, quick_deduction (one row per bracket; empty `effective_to`
/// marks the current table, empty `max_income` the top bracket).
///
/// Social insurance CSV columns:
/// jurisdiction, effective_from, effective_to, social_min_base,
/// social_max_base, pension_rate, medical_rate, unemployment_rate,
/// housing_fund_min_base, housing_fund_max_base, housing_fund_rate
/// (one row per version).
#[derive(Parser, Debug)]
#[command(name = "iit-data-loader")]
#[command(version, about, long_about = None)]
struct Args {
    /// CSV file with bracket table rows
    #[arg(short, long)]
    brackets: Option<PathBuf>,

    /// CSV file with social insurance configuration rows
    #[arg(short = 'i', long)]
    social_insurance: Option<PathBuf>,

    /// SQLite database path or URL (created if missing)
    #[arg(short, long, default_value = "iit.db")]
    database: String,

    /// Run database migrations before loading data
    #[arg(short, long, default_value_t = false)]
    migrate: bool,

    /// Run seed files from the specified directory after migrations
    #[arg(short, long)]
    seeds: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::from("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open: {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let repo = SqliteRepository::new(&args.database)
        .await
        .with_context(|| format!("Failed to connect to database: {}", args.database))?;

    if args.migrate {
        println!("Running migrations...");
        repo.run_migrations()
            .await
            .context("Failed to run migrations")?;
        println!("Migrations complete.");
    }

    if let Some(seeds_dir) = &args.seeds {
        println!("Running seeds from: {}", seeds_dir.display());
        repo.run_seeds(seeds_dir)
            .await
            .with_context(|| format!("Failed to run seeds from: {}", seeds_dir.display()))?;
        println!("Seeds complete.");
    }

    if let Some(path) = &args.brackets {
        println!("Loading tax brackets from: {}", path.display());
        let records = TaxBracketLoader::parse(open(path)?)
            .with_context(|| format!("Failed to parse CSV: {}", path.display()))?;
        println!("Parsed {} bracket rows from CSV", records.len());

        let summary = TaxBracketLoader::load(&repo, &records)
            .await
            .context("Failed to load tax brackets into database")?;
        println!(
            "Saved {} bracket tables ({} already present).",
            summary.saved, summary.unchanged
        );
    }

    if let Some(path) = &args.social_insurance {
        println!("Loading social insurance configs from: {}", path.display());
        let records = SocialInsuranceLoader::parse(open(path)?)
            .with_context(|| format!("Failed to parse CSV: {}", path.display()))?;
        println!("Parsed {} configuration rows from CSV", records.len());

        let summary = SocialInsuranceLoader::load(&repo, &records)
            .await
            .context("Failed to load social insurance configs into database")?;
        println!(
            "Saved {} social insurance configs ({} already present).",
            summary.saved, summary.unchanged
        );
    }

    Ok(())
}
