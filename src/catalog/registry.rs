use std::collections::HashMap;
use std::sync::Arc;

use linked_hash_map::LinkedHashMap;
use parking_lot::RwLock;
use thiserror::Error;

use crate::catalog::family::CatalogFamily;
use crate::catalog::name::CatalogName;

/// Errors raised while registering catalogs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Catalog '{0}' is already registered")]
    AlreadyRegistered(CatalogName),
}

/// Resolves catalog names to catalog families
pub trait CatalogRegistry: Send + Sync {
    /// Look up the family owning `catalog_name`. Sibling names resolve to
    /// the family of their primary catalog.
    fn lookup(&self, catalog_name: &str) -> Option<Arc<CatalogFamily>>;
}

#[derive(Default)]
struct Registered {
    /// Primary name -> family, in registration order
    families: LinkedHashMap<CatalogName, Arc<CatalogFamily>>,
    /// Every member name -> primary name
    members: HashMap<CatalogName, CatalogName>,
}

/// In-memory catalog registry
#[derive(Default)]
pub struct CatalogManager {
    registered: RwLock<Registered>,
}

impl CatalogManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a catalog family. Fails if any member name is already taken.
    pub fn register_catalog(&self, family: CatalogFamily) -> Result<(), CatalogError> {
        let mut registered = self.registered.write();
        for (member, _) in family.members() {
            if registered.members.contains_key(member) {
                return Err(CatalogError::AlreadyRegistered(member.clone()));
            }
        }

        let primary = family.name().clone();
        for (member, _) in family.members() {
            registered.members.insert(member.clone(), primary.clone());
        }
        registered.families.insert(primary, Arc::new(family));
        Ok(())
    }

    /// Remove a catalog family by its primary name
    pub fn remove_catalog(&self, catalog_name: &str) -> Option<Arc<CatalogFamily>> {
        let mut registered = self.registered.write();
        let family = registered.families.remove(catalog_name)?;
        for (member, _) in family.members() {
            registered.members.remove(member.as_str());
        }
        Some(family)
    }

    /// Primary names of all registered catalogs, in registration order
    pub fn catalog_names(&self) -> Vec<CatalogName> {
        self.registered.read().families.keys().cloned().collect()
    }
}

impl CatalogRegistry for CatalogManager {
    fn lookup(&self, catalog_name: &str) -> Option<Arc<CatalogFamily>> {
        let registered = self.registered.read();
        let primary = registered.members.get(catalog_name)?;
        registered.families.get(primary).cloned()
    }
}
