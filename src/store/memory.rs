use crate::error::StoreError;
use crate::results::{PersistedResult, TestRun};
use crate::store::ResultStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use uuid::Uuid;

/// In-process store with the same write-once semantics as the Postgres tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    test_runs: Mutex<Vec<TestRun>>,
    results: Mutex<BTreeMap<String, PersistedResult>>,
}

impl MemoryStore {
    /// Store a test run as given, bypassing `create_test_run`.
    pub fn insert_test_run(&self, test_run: TestRun) {
        self.test_runs.lock().unwrap().push(test_run);
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn create_test_run(&self) -> Result<TestRun, StoreError> {
        let test_run = TestRun::new();
        self.test_runs.lock().unwrap().push(test_run);
        Ok(test_run)
    }

    async fn get_test_run(&self, id: Uuid) -> Result<TestRun, StoreError> {
        self.test_runs
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .copied()
            .ok_or(StoreError::TestRunNotFound(id))
    }

    async fn latest_test_run(&self) -> Result<Option<TestRun>, StoreError> {
        // max_by_key keeps the last of equal keys, so later insertions win ties
        Ok(self
            .test_runs
            .lock()
            .unwrap()
            .iter()
            .max_by_key(|t| t.timestamp)
            .copied())
    }

    async fn list_test_runs(&self) -> Result<Vec<TestRun>, StoreError> {
        Ok(self.test_runs.lock().unwrap().clone())
    }

    async fn insert_results(
        &self,
        test_run_id: Uuid,
        results: &[PersistedResult],
    ) -> Result<(), StoreError> {
        self.get_test_run(test_run_id).await?;
        let mut stored = self.results.lock().unwrap();
        for result in results {
            stored.entry(result.id.clone()).or_insert_with(|| PersistedResult {
                test_run_id,
                ..result.clone()
            });
        }
        Ok(())
    }

    async fn results_for(&self, test_run_id: Uuid) -> Result<Vec<PersistedResult>, StoreError> {
        Ok(self
            .results
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.test_run_id == test_run_id)
            .cloned()
            .collect())
    }

    async fn count_results_for(&self, test_run_id: Uuid) -> Result<i64, StoreError> {
        Ok(self.results_for(test_run_id).await?.len() as i64)
    }

    async fn delete_test_run(&self, id: Uuid) -> Result<(), StoreError> {
        self.results
            .lock()
            .unwrap()
            .retain(|_, r| r.test_run_id != id);
        self.test_runs.lock().unwrap().retain(|t| t.id != id);
        Ok(())
    }
}
