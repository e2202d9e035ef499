use crate::error::StoreError;
use crate::results::{PersistedResult, TestRun};
use async_trait::async_trait;
use std::collections::BTreeMap;
use uuid::Uuid;

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[cfg(test)]
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence for test runs and the results every region reports into them.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn create_test_run(&self) -> Result<TestRun, StoreError>;
    async fn get_test_run(&self, id: Uuid) -> Result<TestRun, StoreError>;
    /// Most recent test run by timestamp.
    async fn latest_test_run(&self) -> Result<Option<TestRun>, StoreError>;
    async fn list_test_runs(&self) -> Result<Vec<TestRun>, StoreError>;
    /// Write-once: results whose id already exists are left as they are.
    async fn insert_results(
        &self,
        test_run_id: Uuid,
        results: &[PersistedResult],
    ) -> Result<(), StoreError>;
    async fn results_for(&self, test_run_id: Uuid) -> Result<Vec<PersistedResult>, StoreError>;
    async fn count_results_for(&self, test_run_id: Uuid) -> Result<i64, StoreError>;
    async fn delete_test_run(&self, id: Uuid) -> Result<(), StoreError>;
}

/// Delete every test run no worker ever reported into. Returns the deleted ids.
pub async fn cleanup<S: ResultStore + ?Sized>(store: &S) -> Result<Vec<Uuid>, StoreError> {
    let mut deleted = Vec::new();
    for test_run in store.list_test_runs().await? {
        if store.count_results_for(test_run.id).await? == 0 {
            tracing::info!("Deleting test {}", test_run.id);
            store.delete_test_run(test_run.id).await?;
            deleted.push(test_run.id);
        }
    }
    Ok(deleted)
}

/// Results keyed by region, each region ranked fastest average first.
pub fn group_by_region(results: Vec<PersistedResult>) -> BTreeMap<String, Vec<PersistedResult>> {
    let mut grouped: BTreeMap<String, Vec<PersistedResult>> = BTreeMap::new();
    for result in results {
        grouped
            .entry(result.result.region.clone())
            .or_default()
            .push(result);
    }
    for results in grouped.values_mut() {
        results.sort_by_key(|r| r.result.avg_latency_ms);
    }
    grouped
}
