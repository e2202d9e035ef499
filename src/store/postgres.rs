use crate::configuration::DatabaseSettings;
use crate::error::StoreError;
use crate::results::{EndpointLatencyResult, PersistedResult, TestRun};
use crate::store::ResultStore;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    /// Connect and make sure both tables exist.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        let pool = PgPool::connect_with(settings.with_db()?).await?;
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    pub async fn create_tables(&self) -> Result<(), StoreError> {
        let sql = r#"
            CREATE TABLE IF NOT EXISTS rpc_ping_tests (
                id UUID PRIMARY KEY,
                timestamp BIGINT NOT NULL
            )
            "#;
        sqlx::query(sql).execute(&self.pool).await?;
        let sql = r#"
            CREATE TABLE IF NOT EXISTS rpc_ping_results (
                id TEXT PRIMARY KEY,
                rpc_name TEXT NOT NULL,
                rpc_url TEXT NOT NULL,
                avg_latency BIGINT NOT NULL,
                p10_latency BIGINT NOT NULL,
                p50_latency BIGINT NOT NULL,
                p90_latency BIGINT NOT NULL,
                st_dev BIGINT NOT NULL,
                from_region TEXT NOT NULL,
                test_id UUID NOT NULL REFERENCES rpc_ping_tests (id)
            )
            "#;
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }
}

fn test_run_from_row(row: &PgRow) -> Result<TestRun, sqlx::Error> {
    Ok(TestRun {
        id: row.try_get("id")?,
        timestamp: row.try_get("timestamp")?,
    })
}

fn result_from_row(row: &PgRow) -> Result<PersistedResult, sqlx::Error> {
    Ok(PersistedResult {
        id: row.try_get("id")?,
        test_run_id: row.try_get("test_id")?,
        result: EndpointLatencyResult {
            rpc_name: row.try_get("rpc_name")?,
            rpc_url: row.try_get("rpc_url")?,
            avg_latency_ms: row.try_get("avg_latency")?,
            p10_latency_ms: row.try_get("p10_latency")?,
            p50_latency_ms: row.try_get("p50_latency")?,
            p90_latency_ms: row.try_get("p90_latency")?,
            stdev_latency_ms: row.try_get("st_dev")?,
            region: row.try_get("from_region")?,
        },
    })
}

#[async_trait]
impl ResultStore for PgStore {
    async fn create_test_run(&self) -> Result<TestRun, StoreError> {
        let test_run = TestRun::new();
        let sql = r#"
            INSERT INTO rpc_ping_tests (id, timestamp)
            VALUES ($1, $2)
            "#;
        sqlx::query(sql)
            .bind(test_run.id)
            .bind(test_run.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(test_run)
    }

    async fn get_test_run(&self, id: Uuid) -> Result<TestRun, StoreError> {
        let sql = r#"
            SELECT id, timestamp
            FROM rpc_ping_tests
            WHERE id = $1
            "#;
        let row = sqlx::query(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(test_run_from_row(&row)?),
            None => Err(StoreError::TestRunNotFound(id)),
        }
    }

    async fn latest_test_run(&self) -> Result<Option<TestRun>, StoreError> {
        let sql = r#"
            SELECT id, timestamp
            FROM rpc_ping_tests
            ORDER BY timestamp DESC
            LIMIT 1
            "#;
        let row = sqlx::query(sql).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(test_run_from_row).transpose()?)
    }

    async fn list_test_runs(&self) -> Result<Vec<TestRun>, StoreError> {
        let sql = r#"
            SELECT id, timestamp
            FROM rpc_ping_tests
            ORDER BY timestamp
            "#;
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(test_run_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn insert_results(
        &self,
        test_run_id: Uuid,
        results: &[PersistedResult],
    ) -> Result<(), StoreError> {
        let sql = r#"
            INSERT INTO rpc_ping_results (
                id, rpc_name, rpc_url, avg_latency, p10_latency, p50_latency, p90_latency,
                st_dev, from_region, test_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#;
        let mut tx = self.pool.begin().await?;
        for result in results {
            sqlx::query(sql)
                .bind(&result.id)
                .bind(&result.result.rpc_name)
                .bind(&result.result.rpc_url)
                .bind(result.result.avg_latency_ms)
                .bind(result.result.p10_latency_ms)
                .bind(result.result.p50_latency_ms)
                .bind(result.result.p90_latency_ms)
                .bind(result.result.stdev_latency_ms)
                .bind(&result.result.region)
                .bind(test_run_id)
                .execute(&mut tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn results_for(&self, test_run_id: Uuid) -> Result<Vec<PersistedResult>, StoreError> {
        let sql = r#"
            SELECT id, rpc_name, rpc_url, avg_latency, p10_latency, p50_latency, p90_latency,
                st_dev, from_region, test_id
            FROM rpc_ping_results
            WHERE test_id = $1
            "#;
        let rows = sqlx::query(sql)
            .bind(test_run_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(result_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn count_results_for(&self, test_run_id: Uuid) -> Result<i64, StoreError> {
        let sql = r#"
            SELECT COUNT(*) AS count
            FROM rpc_ping_results
            WHERE test_id = $1
            "#;
        let row = sqlx::query(sql)
            .bind(test_run_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }

    async fn delete_test_run(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM rpc_ping_results WHERE test_id = $1")
            .bind(id)
            .execute(&mut tx)
            .await?;
        sqlx::query("DELETE FROM rpc_ping_tests WHERE id = $1")
            .bind(id)
            .execute(&mut tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
