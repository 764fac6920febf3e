#[path = "../common/mod.rs"]
mod common;

use std::thread;
use std::time::Duration;

use anyhow::Result;

use bayun_txn::{TransactionError, TransactionManagerConfig, TransactionState};

use common::{CATALOG, assert_eventually, create_test_manager};

fn fast_expiring(idle_timeout: Duration) -> TransactionManagerConfig {
    TransactionManagerConfig::default()
        .with_idle_timeout(idle_timeout)
        .with_idle_check_interval(Duration::from_millis(5))
}

#[test]
fn test_expiration() -> Result<()> {
    let (manager, connector) = create_test_manager(fast_expiring(Duration::from_millis(1)));

    let id = manager.begin(false)?;
    manager.get_catalog_metadata(id, CATALOG)?;
    assert!(manager.try_set_inactive(id));
    assert_eq!(manager.get_transaction_info(id)?.state, TransactionState::Inactive);

    assert_eventually(Duration::from_secs(10), || manager.get_all_transaction_infos().is_empty());
    assert_eq!(connector.stats().rolled_back, 1);

    let err = manager.get_catalog_metadata(id, CATALOG).unwrap_err();
    assert_eq!(err, TransactionError::TransactionNotFound(id));
    Ok(())
}

#[test]
fn test_zero_timeout_expires_on_next_check() -> Result<()> {
    let (manager, _) = create_test_manager(fast_expiring(Duration::ZERO));

    let id = manager.begin(true)?;
    manager.try_set_inactive(id);
    assert_eventually(Duration::from_secs(10), || !manager.transaction_exists(id));
    Ok(())
}

#[test]
fn test_active_transactions_are_never_reaped() -> Result<()> {
    let (manager, _) = create_test_manager(fast_expiring(Duration::ZERO));

    let id = manager.begin(false)?;
    manager.get_catalog_metadata(id, CATALOG)?;
    thread::sleep(Duration::from_millis(100));
    assert!(manager.transaction_exists(id));

    manager.async_commit(id).wait()?;
    Ok(())
}

#[test]
fn test_failed_transactions_are_never_reaped() -> Result<()> {
    let (manager, _) = create_test_manager(fast_expiring(Duration::ZERO));

    let id = manager.begin(false)?;
    manager.fail(id)?;
    assert!(!manager.try_set_inactive(id));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(manager.get_transaction_info(id)?.state, TransactionState::Failed);

    manager.async_abort(id).wait()?;
    Ok(())
}

#[test]
fn test_reactivation_prevents_reaping() -> Result<()> {
    let (manager, _) = create_test_manager(fast_expiring(Duration::from_secs(60)));

    let id = manager.begin(false)?;
    manager.try_set_inactive(id);
    thread::sleep(Duration::from_millis(30));
    manager.check_and_set_active(id)?;

    let info = manager.get_transaction_info(id)?;
    assert_eq!(info.state, TransactionState::Active);
    assert_eq!(info.idle_time, Duration::ZERO);
    Ok(())
}

#[test]
fn test_shutdown_stops_reaping() -> Result<()> {
    let (manager, _) = create_test_manager(fast_expiring(Duration::ZERO));
    manager.shutdown();
    manager.shutdown();

    let id = manager.begin(false)?;
    manager.try_set_inactive(id);
    thread::sleep(Duration::from_millis(50));
    assert!(manager.transaction_exists(id));

    // Finalization still completes, inline on the caller
    manager.async_abort(id).wait()?;
    assert!(!manager.transaction_exists(id));
    Ok(())
}
