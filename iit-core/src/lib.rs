pub mod calculations;
pub mod db;
pub mod income;
pub mod models;

pub use calculations::{CalculationError, WithholdingEngine, WithholdingSettings};
pub use db::{ConfigRepository, RepositoryError};
pub use income::{CurrencyConverter, FixedRateConverter, IncomePlan};
pub use models::*;
