//! Catalog Registry Module
//!
//! Maps catalog names to catalog families. A family is a primary connector
//! plus two synthetic siblings (metadata introspection and system tables).

pub mod family;
pub mod name;
pub mod registry;

// Re-export key types
pub use self::family::CatalogFamily;
pub use self::name::CatalogName;
pub use self::registry::{CatalogError, CatalogManager, CatalogRegistry};
