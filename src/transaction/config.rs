use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transaction::error::{Result, TransactionError};

/// Configuration for the transaction manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionManagerConfig {
    /// How long an inactive transaction may stay idle before it is aborted
    pub idle_timeout: Duration,

    /// How often the idle reaper scans for expired transactions
    pub idle_check_interval: Duration,

    /// Number of worker threads committing and rolling back connector transactions
    pub max_finishing_concurrency: usize,
}

impl Default for TransactionManagerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(5 * 60),
            idle_check_interval: Duration::from_secs(60),
            max_finishing_concurrency: 1,
        }
    }
}

impl TransactionManagerConfig {
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_idle_check_interval(mut self, idle_check_interval: Duration) -> Self {
        self.idle_check_interval = idle_check_interval;
        self
    }

    pub fn with_max_finishing_concurrency(mut self, max_finishing_concurrency: usize) -> Self {
        self.max_finishing_concurrency = max_finishing_concurrency;
        self
    }

    /// Reject settings the manager cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_finishing_concurrency == 0 {
            return Err(TransactionError::InvalidConfig(
                "max_finishing_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
