use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use clap::Parser;

use bayun_txn::connector::MemoryConnector;
use bayun_txn::{CatalogFamily, CatalogManager, TransactionInfo, TransactionManager, TransactionManagerConfig};

/// Walk through the transaction lifecycle against in-memory catalogs
#[derive(Parser, Debug)]
#[command(name = "bayun-txn", version, about)]
struct Args {
    /// Catalogs to register
    #[arg(short, long, default_values_t = vec!["tpch".to_string(), "memory".to_string()])]
    catalog: Vec<String>,

    /// Idle timeout in milliseconds
    #[arg(long, default_value_t = 50)]
    idle_timeout_ms: u64,

    /// Idle check interval in milliseconds
    #[arg(long, default_value_t = 10)]
    idle_check_interval_ms: u64,

    /// Number of finishing worker threads
    #[arg(long, default_value_t = 2)]
    max_finishing_concurrency: usize,
}

fn print_info(label: &str, info: &TransactionInfo) {
    let catalogs: Vec<&str> = info.catalog_names.iter().map(|c| c.as_str()).collect();
    println!(
        "{:<10} {} state={:?} auto_commit={} catalogs=[{}] written={}",
        label,
        info.transaction_id,
        info.state,
        info.auto_commit,
        catalogs.join(", "),
        info.written_catalog.as_ref().map_or("-", |c| c.as_str()),
    );
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.catalog.is_empty() {
        bail!("at least one catalog is required");
    }

    let catalogs = CatalogManager::new();
    for name in &args.catalog {
        let connector = MemoryConnector::new().with_schema("sample", &["orders", "lineitem"]);
        catalogs.register_catalog(CatalogFamily::with_synthetic_siblings(name.as_str(), Arc::new(connector)))?;
    }

    let config = TransactionManagerConfig::default()
        .with_idle_timeout(Duration::from_millis(args.idle_timeout_ms))
        .with_idle_check_interval(Duration::from_millis(args.idle_check_interval_ms))
        .with_max_finishing_concurrency(args.max_finishing_concurrency);
    let manager = TransactionManager::new(config, Arc::new(catalogs))?;

    // Commit workflow: read every catalog, write to the first one
    let txn = manager.begin(false)?;
    for name in &args.catalog {
        let metadata = manager.get_catalog_metadata(txn, name)?;
        println!("{} schemas: {:?}", name, metadata.metadata().list_schema_names());
    }
    manager.check_connector_write(txn, &args.catalog[0])?;
    print_info("before", &manager.get_transaction_info(txn)?);
    manager.async_commit(txn).wait()?;
    println!("committed {}; live transactions: {}", txn, manager.get_all_transaction_infos().len());

    // Failed workflow: the transaction stays listed until aborted
    let txn = manager.begin(false)?;
    manager.get_catalog_metadata(txn, &args.catalog[0])?;
    manager.fail(txn)?;
    print_info("failed", &manager.get_transaction_info(txn)?);
    if let Err(e) = manager.get_catalog_metadata(txn, &args.catalog[0]) {
        println!("access after failure rejected: {} ({})", e, e.error_code());
    }
    manager.async_abort(txn).wait()?;
    println!("aborted {}; live transactions: {}", txn, manager.get_all_transaction_infos().len());

    // Idle workflow: let the reaper expire an inactive transaction
    let txn = manager.begin(true)?;
    manager.try_set_inactive(txn);
    print_info("inactive", &manager.get_transaction_info(txn)?);
    let started = Instant::now();
    while manager.transaction_exists(txn) {
        if started.elapsed() > Duration::from_secs(10) {
            bail!("transaction {} was not reaped", txn);
        }
        thread::sleep(Duration::from_millis(5));
    }
    println!("reaped {} after {:?}", txn, started.elapsed());

    manager.shutdown();
    Ok(())
}
