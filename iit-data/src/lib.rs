pub mod loader;

pub use loader::{
    LoadSummary, LoaderError, SocialInsuranceLoader, SocialInsuranceRecord, TaxBracketLoader,
    TaxBracketRecord,
};
