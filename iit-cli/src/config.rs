//! `iit.toml` configuration file.
//!
//! ```toml
//! [database]
//! backend = "sqlite"
//! connection_string = "iit.db"
//!
//! [withholding]
//! monthly_basic_deduction = 5000
//! default_jurisdiction = "beijing"
//! ```
//!
//! Every key is optional; command-line flags override the file.

use std::path::{Path, PathBuf};

use iit_core::db::DbConfig;
use iit_core::{Jurisdiction, WithholdingSettings};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "iit.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub backend: String,
    pub connection_string: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            connection_string: "iit.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WithholdingSection {
    pub monthly_basic_deduction: Decimal,
    pub default_jurisdiction: Option<String>,
}

impl Default for WithholdingSection {
    fn default() -> Self {
        Self {
            monthly_basic_deduction: WithholdingSettings::default().monthly_basic_deduction,
            default_jurisdiction: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IitConfig {
    pub database: DatabaseSection,
    pub withholding: WithholdingSection,
}

impl IitConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "config file loaded");
        Self::from_toml_str(&contents)
    }

    /// Loads `path` when given (it must exist), otherwise `iit.toml` in the
    /// working directory if present, otherwise the defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Database settings with optional command-line overrides applied.
    pub fn db_config(
        &self,
        backend: Option<&str>,
        connection_string: Option<&str>,
    ) -> DbConfig {
        DbConfig::new(
            backend.unwrap_or(&self.database.backend),
            connection_string.unwrap_or(&self.database.connection_string),
        )
    }

    pub fn settings(&self) -> WithholdingSettings {
        WithholdingSettings {
            monthly_basic_deduction: self.withholding.monthly_basic_deduction,
        }
    }

    /// The jurisdiction from the command line, falling back to
    /// `default_jurisdiction`.
    pub fn jurisdiction(
        &self,
        flag: Option<&str>,
    ) -> Option<Jurisdiction> {
        flag.or(self.withholding.default_jurisdiction.as_deref())
            .filter(|key| !key.trim().is_empty())
            .map(Jurisdiction::new)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = IitConfig::from_toml_str("").unwrap();

        assert_eq!(config, IitConfig::default());
        assert_eq!(config.settings().monthly_basic_deduction, dec!(5000));
        assert_eq!(config.database.backend, "sqlite");
    }

    #[test]
    fn parses_all_sections() {
        let config = IitConfig::from_toml_str(
            r#"
            [database]
            backend = "memory"
            connection_string = "ignored"

            [withholding]
            monthly_basic_deduction = 6000
            default_jurisdiction = "Shanghai"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.backend, "memory");
        assert_eq!(config.settings().monthly_basic_deduction, dec!(6000));
        assert_eq!(config.jurisdiction(None), Some(Jurisdiction::new("shanghai")));
    }

    #[test]
    fn flags_override_file() {
        let config = IitConfig::from_toml_str("[withholding]\ndefault_jurisdiction = \"beijing\"")
            .unwrap();

        let db = config.db_config(Some("SQLite"), Some(":memory:"));

        assert_eq!(db.backend, "sqlite");
        assert_eq!(db.connection_string, ":memory:");
        assert_eq!(
            config.jurisdiction(Some("shenzhen")),
            Some(Jurisdiction::new("shenzhen"))
        );
    }

    #[test]
    fn missing_jurisdiction_is_none() {
        assert_eq!(IitConfig::default().jurisdiction(None), None);
        assert_eq!(IitConfig::default().jurisdiction(Some("  ")), None);
    }

    #[test]
    fn rejects_unknown_types() {
        let err = IitConfig::from_toml_str("[database]\nbackend = 3").unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)), "got: {:?}", err);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = IitConfig::discover(Some(Path::new("./does-not-exist.toml"))).unwrap_err();

        assert!(matches!(err, ConfigError::Io { .. }), "got: {:?}", err);
    }
}
