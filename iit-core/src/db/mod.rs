pub mod factory;
pub mod memory;
pub mod repository;

pub use factory::{DbConfig, RepositoryFactory, RepositoryRegistry};
pub use memory::{InMemoryConfigRepository, InMemoryRepositoryFactory};
pub use repository::{ConfigRepository, RepositoryError, select_effective};
