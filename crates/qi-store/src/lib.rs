//! Persistence of scraped aggregates into the relational model, plus the
//! transactional risk recompute.
//!
//! The crate receives a `PgPool`; pool construction and table DDL belong
//! to the deployment, not to this pipeline. `schema.sql` in this crate
//! documents the expected tables and is applied by the ignored Postgres
//! integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub mod loader;
pub mod riskjob;
pub mod stats;

pub use loader::{ensure_cluster, find_cluster, load_batch, BatchLoadSummary, LoadedCluster};
pub use riskjob::recompute_risk;
pub use stats::{cluster_stats, ClusterStats};

pub const CRATE_NAME: &str = "qi-store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Config(#[from] qi_core::ConfigError),
}

/// Per-cluster write serialization. The upsert-then-rank pipeline depends
/// on a consistent snapshot, so only one writer may target a cluster at a
/// time; different clusters proceed in parallel.
#[derive(Debug, Default)]
pub struct ClusterLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ClusterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, cluster: &str, phase: &str) -> OwnedMutexGuard<()> {
        let key = format!("{cluster}/{phase}");
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_cluster_writers_are_serialized() {
        let locks = Arc::new(ClusterLocks::new());

        let first = locks.acquire("TC2", "PHASE_1").await;
        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("TC2", "PHASE_1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("lock released")
            .expect("task");
    }

    #[tokio::test]
    async fn different_clusters_do_not_contend() {
        let locks = ClusterLocks::new();
        let _a = locks.acquire("TC2", "PHASE_1").await;
        // Would deadlock if phases shared one lock.
        let _b = locks.acquire("TC2", "PHASE_2").await;
        let _c = locks.acquire("TC1", "PHASE_1").await;
    }
}
