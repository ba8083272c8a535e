use std::fmt;

use serde::{Deserialize, Serialize};

/// City or region key selecting which bracket table and contribution rates
/// apply (e.g. `"beijing"`, `"shanghai"`).
///
/// Keys are stored trimmed and lowercase so `"Beijing "` and `"beijing"`
/// resolve to the same configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jurisdiction(String);

impl Jurisdiction {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(key.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Jurisdiction {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Jurisdiction {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}
