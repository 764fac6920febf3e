#[path = "../common/mod.rs"]
mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use bayun_txn::{CatalogName, TransactionError, TransactionManagerConfig, TransactionState};

use common::{CATALOG, create_multi_catalog_manager, create_test_manager};

fn expected_family(name: &str) -> Vec<CatalogName> {
    let name = CatalogName::new(name);
    vec![name.clone(), name.information_schema(), name.system_tables()]
}

#[test]
fn test_transaction_workflow() -> Result<()> {
    let (manager, connector) = create_test_manager(TransactionManagerConfig::default());

    let id = manager.begin(false)?;
    assert_eq!(manager.get_all_transaction_infos().len(), 1);
    let info = manager.get_transaction_info(id)?;
    assert!(!info.auto_commit);
    assert!(info.catalog_names.is_empty());
    assert!(info.written_catalog.is_none());

    let metadata = manager
        .get_optional_catalog_metadata(id, CATALOG)?
        .expect("catalog is registered");
    assert!(metadata.metadata().list_schema_names().contains(&"tiny".to_string()));

    let info = manager.get_transaction_info(id)?;
    assert_eq!(info.catalog_names, expected_family(CATALOG));
    assert!(info.written_catalog.is_none());

    manager.async_commit(id).wait()?;
    assert!(manager.get_all_transaction_infos().is_empty());
    assert_eq!(connector.stats().committed, 1);
    assert_eq!(connector.open_transaction_count(), 0);
    Ok(())
}

#[test]
fn test_aborted_transaction_workflow() -> Result<()> {
    let (manager, connector) = create_test_manager(TransactionManagerConfig::default());

    let id = manager.begin(false)?;
    manager.get_catalog_metadata(id, CATALOG)?;
    assert_eq!(manager.get_transaction_info(id)?.catalog_names, expected_family(CATALOG));

    manager.async_abort(id).wait()?;
    assert!(manager.get_all_transaction_infos().is_empty());
    assert_eq!(connector.stats().rolled_back, 1);
    assert_eq!(connector.stats().committed, 0);
    Ok(())
}

#[test]
fn test_failed_transaction_workflow() -> Result<()> {
    let (manager, connector) = create_test_manager(TransactionManagerConfig::default());

    let id = manager.begin(false)?;
    manager.get_catalog_metadata(id, CATALOG)?;

    manager.fail(id)?;
    assert_eq!(manager.get_all_transaction_infos().len(), 1);

    let err = manager.get_catalog_metadata(id, CATALOG).unwrap_err();
    assert_eq!(err, TransactionError::TransactionAlreadyAborted(id));
    assert_eq!(err.error_code(), "TRANSACTION_ALREADY_ABORTED");
    assert_eq!(manager.get_all_transaction_infos().len(), 1);
    assert_eq!(manager.get_transaction_info(id)?.state, TransactionState::Failed);

    // Nothing was rolled back yet; that happens on the explicit abort
    assert_eq!(connector.stats().rolled_back, 0);

    manager.async_abort(id).wait()?;
    assert!(manager.get_all_transaction_infos().is_empty());
    assert_eq!(connector.stats().rolled_back, 1);
    Ok(())
}

#[test]
fn test_repeated_references_do_not_duplicate() -> Result<()> {
    let (manager, connector) = create_test_manager(TransactionManagerConfig::default());
    let id = manager.begin(true)?;

    for _ in 0..3 {
        manager.get_catalog_metadata(id, CATALOG)?;
    }
    manager.get_catalog_metadata(id, &format!("$info_schema@{}", CATALOG))?;
    manager.get_connector_transaction(id, &format!("$system@{}", CATALOG))?;

    assert_eq!(manager.get_transaction_info(id)?.catalog_names, expected_family(CATALOG));
    assert_eq!(connector.stats().begun, 1);
    manager.async_commit(id).wait()?;
    Ok(())
}

#[test]
fn test_catalog_order_across_families() -> Result<()> {
    let (manager, _) = create_multi_catalog_manager(TransactionManagerConfig::default(), &["a", "b"]);
    let id = manager.begin(false)?;

    manager.get_catalog_metadata(id, "b")?;
    manager.get_catalog_metadata(id, "a")?;
    manager.get_catalog_metadata(id, "b")?;

    let mut expected = expected_family("b");
    expected.extend(expected_family("a"));
    assert_eq!(manager.get_transaction_info(id)?.catalog_names, expected);
    Ok(())
}

#[test]
fn test_multi_catalog_write_conflict_leaves_transaction_usable() -> Result<()> {
    let (manager, connectors) = create_multi_catalog_manager(TransactionManagerConfig::default(), &["a", "b"]);
    let id = manager.begin(false)?;

    manager.get_catalog_metadata_for_write(id, "a")?;
    let err = manager.get_catalog_metadata_for_write(id, "b").unwrap_err();
    assert!(matches!(err, TransactionError::MultiCatalogWriteConflict { .. }));

    let info = manager.get_transaction_info(id)?;
    assert_eq!(info.written_catalog, Some(CatalogName::new("a")));
    assert_eq!(info.state, TransactionState::Active);

    // The conflicting call still bound "b" for reading
    assert_eq!(info.catalog_names.len(), 6);

    manager.async_commit(id).wait()?;
    assert_eq!(connectors[0].stats().committed, 1);
    assert_eq!(connectors[1].stats().committed, 1);
    Ok(())
}

#[test]
fn test_concurrent_begin_yields_unique_ids() {
    let (manager, _) = create_test_manager(TransactionManagerConfig::default());
    let manager = Arc::new(manager);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            thread::spawn(move || (0..100).map(|_| manager.begin(false).unwrap()).collect::<Vec<_>>())
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(ids.insert(id), "duplicate transaction id {}", id);
        }
    }
    assert_eq!(ids.len(), 800);
    assert_eq!(manager.get_all_transaction_infos().len(), 800);
}

#[test]
fn test_concurrent_binding_on_same_transaction() -> Result<()> {
    let (manager, connector) = create_test_manager(TransactionManagerConfig::default());
    let manager = Arc::new(manager);
    let id = manager.begin(false)?;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            thread::spawn(move || manager.get_catalog_metadata(id, CATALOG).map(|_| ()))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap()?;
    }

    assert_eq!(manager.get_transaction_info(id)?.catalog_names, expected_family(CATALOG));

    // Losing binders release their connector transactions
    assert_eq!(connector.open_transaction_count(), 1);
    manager.async_commit(id).wait()?;
    assert_eq!(connector.open_transaction_count(), 0);
    assert_eq!(connector.stats().committed, 1);
    Ok(())
}
