// Catalog family: a catalog plus its two sibling views

use std::sync::Arc;

use crate::catalog::name::CatalogName;
use crate::connector::{Connector, SiblingKind, SyntheticConnector};

/// A registered catalog together with its metadata-introspection and
/// system-tables siblings. All three share the enclosing transaction.
pub struct CatalogFamily {
    name: CatalogName,
    connector: Arc<dyn Connector>,
    information_schema_name: CatalogName,
    information_schema: Arc<dyn Connector>,
    system_tables_name: CatalogName,
    system_tables: Arc<dyn Connector>,
}

impl CatalogFamily {
    pub fn new(
        name: CatalogName,
        connector: Arc<dyn Connector>,
        information_schema: Arc<dyn Connector>,
        system_tables: Arc<dyn Connector>,
    ) -> Self {
        Self {
            information_schema_name: name.information_schema(),
            system_tables_name: name.system_tables(),
            name,
            connector,
            information_schema,
            system_tables,
        }
    }

    /// Build a family whose siblings are the built-in synthetic connectors
    pub fn with_synthetic_siblings(name: impl Into<CatalogName>, connector: Arc<dyn Connector>) -> Self {
        let name = name.into();
        let information_schema = Arc::new(SyntheticConnector::new(SiblingKind::InformationSchema, name.clone()));
        let system_tables = Arc::new(SyntheticConnector::new(SiblingKind::SystemTables, name.clone()));
        Self::new(name, connector, information_schema, system_tables)
    }

    /// Name of the primary catalog
    pub fn name(&self) -> &CatalogName {
        &self.name
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    pub fn information_schema_name(&self) -> &CatalogName {
        &self.information_schema_name
    }

    pub fn system_tables_name(&self) -> &CatalogName {
        &self.system_tables_name
    }

    /// All members in binding order: primary, metadata-introspection, system tables
    pub fn members(&self) -> [(&CatalogName, &Arc<dyn Connector>); 3] {
        [
            (&self.name, &self.connector),
            (&self.information_schema_name, &self.information_schema),
            (&self.system_tables_name, &self.system_tables),
        ]
    }

    /// True if `name` names any member of this family
    pub fn contains(&self, name: &str) -> bool {
        self.members().iter().any(|(member, _)| member.as_str() == name)
    }
}
