pub mod app;
pub mod config;
pub mod income_csv;
pub mod plan;
pub mod report;
