use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

const INFORMATION_SCHEMA_PREFIX: &str = "$info_schema@";
const SYSTEM_TABLES_PREFIX: &str = "$system@";

/// Name of a catalog or of one of its sibling views
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogName(String);

impl CatalogName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of this catalog's metadata-introspection sibling
    pub fn information_schema(&self) -> CatalogName {
        CatalogName(format!("{}{}", INFORMATION_SCHEMA_PREFIX, self.0))
    }

    /// Name of this catalog's system-tables sibling
    pub fn system_tables(&self) -> CatalogName {
        CatalogName(format!("{}{}", SYSTEM_TABLES_PREFIX, self.0))
    }

    /// True for the generated sibling names
    pub fn is_internal(&self) -> bool {
        self.0.starts_with(INFORMATION_SCHEMA_PREFIX) || self.0.starts_with(SYSTEM_TABLES_PREFIX)
    }
}

impl Borrow<str> for CatalogName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CatalogName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for CatalogName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for CatalogName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
