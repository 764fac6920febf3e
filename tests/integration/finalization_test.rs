#[path = "../common/mod.rs"]
mod common;

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;

use bayun_txn::{TransactionError, TransactionManagerConfig};

use common::{CATALOG, create_multi_catalog_manager, create_test_manager};

#[test]
fn test_concurrent_commit_and_abort_finish_once() -> Result<()> {
    for _ in 0..20 {
        let config = TransactionManagerConfig::default().with_max_finishing_concurrency(4);
        let (manager, connector) = create_test_manager(config);
        let manager = Arc::new(manager);
        connector.set_operation_delay(Duration::from_millis(2));

        let id = manager.begin(false)?;
        manager.get_catalog_metadata(id, CATALOG)?;

        let barrier = Arc::new(Barrier::new(2));
        let committer = {
            let (manager, barrier) = (manager.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                manager.async_commit(id).wait()
            })
        };
        let aborter = {
            let (manager, barrier) = (manager.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                manager.async_abort(id).wait()
            })
        };

        let commit_result = committer.join().unwrap();
        let abort_result = aborter.join().unwrap();

        let stats = connector.stats();
        assert_eq!(stats.committed + stats.rolled_back, 1, "stats: {:?}", stats);
        assert_eq!(stats.failed, 0);
        assert!(!manager.transaction_exists(id));

        // An abort always succeeds, unless the commit already removed the transaction
        assert!(
            matches!(abort_result, Ok(()) | Err(TransactionError::TransactionNotFound(_))),
            "abort: {:?}",
            abort_result
        );
        if stats.committed == 1 {
            assert_eq!(commit_result, Ok(()));
        } else {
            assert!(
                matches!(
                    commit_result,
                    Err(TransactionError::TransactionAlreadyAborted(_) | TransactionError::TransactionNotFound(_))
                ),
                "commit of a rolled back transaction: {:?}",
                commit_result
            );
        }
    }
    Ok(())
}

#[test]
fn test_second_request_joins_running_finalization() -> Result<()> {
    let (manager, connector) = create_test_manager(TransactionManagerConfig::default());
    connector.set_operation_delay(Duration::from_millis(50));

    let id = manager.begin(false)?;
    manager.get_catalog_metadata(id, CATALOG)?;

    let first = manager.async_commit(id);
    let second = manager.async_commit(id);
    let third = manager.async_abort(id);

    first.wait()?;
    second.wait()?;
    third.wait()?;
    assert_eq!(connector.stats().committed, 1);
    assert_eq!(connector.stats().rolled_back, 0);

    // Once removed the transaction is unknown
    let err = manager.async_commit(id).wait().unwrap_err();
    assert_eq!(err, TransactionError::TransactionNotFound(id));
    Ok(())
}

#[test]
fn test_commit_during_abort_is_rejected() -> Result<()> {
    let (manager, connector) = create_test_manager(TransactionManagerConfig::default());
    connector.set_operation_delay(Duration::from_millis(50));

    let id = manager.begin(false)?;
    manager.get_catalog_metadata(id, CATALOG)?;

    let abort = manager.async_abort(id);
    let err = manager.async_commit(id).wait().unwrap_err();
    assert_eq!(err, TransactionError::TransactionAlreadyAborted(id));

    abort.wait()?;
    assert_eq!(connector.stats().committed, 0);
    assert_eq!(connector.stats().rolled_back, 1);
    assert!(!manager.transaction_exists(id));
    Ok(())
}

#[test]
fn test_abort_during_failing_commit_succeeds() -> Result<()> {
    let (manager, connector) = create_test_manager(TransactionManagerConfig::default());
    connector.set_operation_delay(Duration::from_millis(50));
    connector.set_fail_commit(true);

    let id = manager.begin(false)?;
    manager.get_catalog_metadata(id, CATALOG)?;

    let commit = manager.async_commit(id);
    manager.async_abort(id).wait()?;

    assert!(matches!(commit.wait(), Err(TransactionError::ConnectorOperationFailure { .. })));
    assert!(!manager.transaction_exists(id));
    Ok(())
}

#[test]
fn test_abort_with_rollback_failures_still_removes() -> Result<()> {
    let (manager, connectors) = create_multi_catalog_manager(TransactionManagerConfig::default(), &["a", "b"]);
    connectors[0].set_fail_rollback(true);

    let id = manager.begin(false)?;
    manager.get_catalog_metadata(id, "a")?;
    manager.get_catalog_metadata(id, "b")?;

    manager.async_abort(id).wait()?;
    assert!(!manager.transaction_exists(id));
    assert_eq!(connectors[0].stats().failed, 1);
    assert_eq!(connectors[1].stats().rolled_back, 1);
    Ok(())
}

#[test]
fn test_commit_failure_is_surfaced_and_removes() -> Result<()> {
    let (manager, connectors) = create_multi_catalog_manager(TransactionManagerConfig::default(), &["a", "b"]);
    connectors[0].set_fail_commit(true);

    let id = manager.begin(false)?;
    manager.get_catalog_metadata_for_write(id, "a")?;
    manager.get_catalog_metadata(id, "b")?;

    let err = manager.async_commit(id).wait().unwrap_err();
    assert!(matches!(err, TransactionError::ConnectorOperationFailure { .. }), "{:?}", err);
    assert!(!manager.transaction_exists(id));

    // The written catalog failed first, so the reader was rolled back
    assert_eq!(connectors[1].stats().committed, 0);
    assert_eq!(connectors[1].stats().rolled_back, 1);
    assert_eq!(connectors[1].open_transaction_count(), 0);
    Ok(())
}

#[test]
fn test_written_catalog_commits_before_others() -> Result<()> {
    let (manager, connectors) = create_multi_catalog_manager(TransactionManagerConfig::default(), &["a", "b"]);
    let id = manager.begin(false)?;
    manager.get_catalog_metadata(id, "a")?;
    manager.get_catalog_metadata_for_write(id, "b")?;

    manager.async_commit(id).wait()?;
    assert_eq!(connectors[0].stats().committed, 1);
    assert_eq!(connectors[1].stats().committed, 1);
    Ok(())
}

#[test]
fn test_finalizing_transaction_rejects_access() -> Result<()> {
    let (manager, connector) = create_test_manager(TransactionManagerConfig::default());
    connector.set_operation_delay(Duration::from_millis(100));

    let id = manager.begin(false)?;
    manager.get_catalog_metadata(id, CATALOG)?;
    let future = manager.async_commit(id);

    let err = manager.get_catalog_metadata(id, CATALOG).unwrap_err();
    assert_eq!(err, TransactionError::TransactionFinishing(id));

    future.wait()?;
    Ok(())
}

#[test]
fn test_random_concurrent_workload() {
    let config = TransactionManagerConfig::default().with_max_finishing_concurrency(4);
    let (manager, connectors) = create_multi_catalog_manager(config, &["a", "b", "c"]);
    let manager = Arc::new(manager);
    let names = ["a", "b", "c"];

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..50 {
                    let id = manager.begin(rng.gen_bool(0.5)).unwrap();
                    for _ in 0..rng.gen_range(0..4) {
                        let name = names[rng.gen_range(0..names.len())];
                        manager.get_catalog_metadata(id, name).unwrap();
                    }
                    match rng.gen_range(0..3) {
                        0 => manager.async_commit(id).wait().unwrap(),
                        1 => manager.async_abort(id).wait().unwrap(),
                        _ => {
                            manager.fail(id).unwrap();
                            manager.async_abort(id).wait().unwrap();
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(manager.get_all_transaction_infos().is_empty());
    for connector in &connectors {
        let stats = connector.stats();
        assert_eq!(stats.begun, stats.committed + stats.rolled_back);
        assert_eq!(connector.open_transaction_count(), 0);
    }
}
