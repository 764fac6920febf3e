// Catalog binder
// Lazily opens connector transactions for a catalog family the first time a
// transaction references any of its members.

use std::sync::Arc;

use log::{debug, warn};

use crate::catalog::family::CatalogFamily;
use crate::catalog::name::CatalogName;
use crate::catalog::registry::CatalogRegistry;
use crate::connector::{ConnectorMetadata, ConnectorTransactionHandle};
use crate::transaction::error::{Result, TransactionError};
use crate::transaction::record::{Attach, CatalogBinding, TransactionRecord};

/// Metadata of one catalog family as seen from inside a transaction
#[derive(Clone)]
pub struct CatalogMetadata {
    catalog_name: CatalogName,
    members: Vec<(CatalogName, ConnectorTransactionHandle, Arc<dyn ConnectorMetadata>)>,
}

impl CatalogMetadata {
    /// Name of the family's primary catalog
    pub fn catalog_name(&self) -> &CatalogName {
        &self.catalog_name
    }

    /// Metadata view of the primary catalog
    pub fn metadata(&self) -> &Arc<dyn ConnectorMetadata> {
        &self.members[0].2
    }

    /// Metadata view of any family member
    pub fn metadata_for(&self, catalog: &str) -> Option<&Arc<dyn ConnectorMetadata>> {
        self.member(catalog).map(|(_, _, metadata)| metadata)
    }

    /// Connector transaction handle of any family member
    pub fn transaction_handle_for(&self, catalog: &str) -> Option<ConnectorTransactionHandle> {
        self.member(catalog).map(|(_, handle, _)| *handle)
    }

    /// Member names in binding order
    pub fn catalog_names(&self) -> Vec<CatalogName> {
        self.members.iter().map(|(name, _, _)| name.clone()).collect()
    }

    fn member(&self, catalog: &str) -> Option<&(CatalogName, ConnectorTransactionHandle, Arc<dyn ConnectorMetadata>)> {
        self.members.iter().find(|(name, _, _)| name.as_str() == catalog)
    }
}

impl std::fmt::Debug for CatalogMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogMetadata")
            .field("catalog_name", &self.catalog_name)
            .field("catalogs", &self.catalog_names())
            .finish()
    }
}

pub(crate) struct CatalogBinder {
    registry: Arc<dyn CatalogRegistry>,
}

impl CatalogBinder {
    pub(crate) fn new(registry: Arc<dyn CatalogRegistry>) -> Self {
        Self { registry }
    }

    pub(crate) fn lookup(&self, catalog_name: &str) -> Option<Arc<CatalogFamily>> {
        self.registry.lookup(catalog_name)
    }

    /// Bind the family owning `catalog_name` to `record` and return its
    /// metadata. `None` if no such catalog is registered.
    pub(crate) fn bind(&self, record: &TransactionRecord, catalog_name: &str) -> Result<Option<CatalogMetadata>> {
        record.check_open()?;

        let family = match self.registry.lookup(catalog_name) {
            Some(family) => family,
            None => return Ok(None),
        };

        if !record.is_bound(family.name()) {
            let bindings = self.begin_family(record, &family)?;
            match record.attach(bindings) {
                Attach::Attached => {
                    debug!("Transaction {} bound catalog {}", record.id(), family.name());
                }
                Attach::AlreadyBound(unused) => release(record, unused),
                Attach::Closed(unused, state) => {
                    release(record, unused);
                    return Err(record.state_error(state));
                }
            }
        }

        record.set_active()?;
        self.collect(record, &family).map(Some)
    }

    /// Open connector transactions for every family member. Connector calls
    /// happen here, outside the record lock.
    fn begin_family(&self, record: &TransactionRecord, family: &CatalogFamily) -> Result<Vec<(CatalogName, CatalogBinding)>> {
        let mut bindings: Vec<(CatalogName, CatalogBinding)> = Vec::with_capacity(3);

        for (name, connector) in family.members() {
            let opened = connector
                .begin_transaction(record.isolation_level(), record.is_read_only(), record.is_auto_commit())
                .and_then(|handle| match connector.metadata(&handle) {
                    Ok(metadata) => Ok((handle, metadata)),
                    Err(e) => {
                        if let Err(rollback) = connector.rollback(&handle) {
                            warn!(
                                "Failed to roll back connector transaction for catalog {} in transaction {}: {}",
                                name,
                                record.id(),
                                rollback
                            );
                        }
                        Err(e)
                    }
                });

            match opened {
                Ok((handle, metadata)) => bindings.push((
                    name.clone(),
                    CatalogBinding {
                        connector: connector.clone(),
                        handle,
                        metadata,
                    },
                )),
                Err(source) => {
                    release(record, bindings);
                    return Err(TransactionError::ConnectorOperationFailure {
                        catalog: name.clone(),
                        source,
                    });
                }
            }
        }

        Ok(bindings)
    }

    fn collect(&self, record: &TransactionRecord, family: &CatalogFamily) -> Result<CatalogMetadata> {
        let mut members = Vec::with_capacity(3);
        for (name, _) in family.members() {
            let binding = record
                .binding(name.as_str())
                .ok_or_else(|| TransactionError::Internal(format!("catalog {} bound without {}", family.name(), name)))?;
            members.push((name.clone(), binding.handle, binding.metadata));
        }

        Ok(CatalogMetadata {
            catalog_name: family.name().clone(),
            members,
        })
    }
}

/// Roll back connector transactions that never made it into the record
fn release(record: &TransactionRecord, bindings: Vec<(CatalogName, CatalogBinding)>) {
    for (name, binding) in bindings {
        if let Err(e) = binding.connector.rollback(&binding.handle) {
            warn!(
                "Failed to roll back unused connector transaction for catalog {} in transaction {}: {}",
                name,
                record.id(),
                e
            );
        }
    }
}
