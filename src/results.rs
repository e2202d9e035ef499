use crate::endpoints::RpcEndpoint;
use crate::stats::LatencySummary;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Latency summary of one endpoint from one region, all values in whole milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointLatencyResult {
    pub rpc_name: String,
    pub rpc_url: String,
    pub avg_latency_ms: i64,
    pub p10_latency_ms: i64,
    pub p50_latency_ms: i64,
    pub p90_latency_ms: i64,
    pub stdev_latency_ms: i64,
    pub region: String,
}

impl EndpointLatencyResult {
    pub fn new(endpoint: &RpcEndpoint, summary: LatencySummary, region: &str) -> Self {
        Self {
            rpc_name: endpoint.name.clone(),
            rpc_url: endpoint.rpc_url.clone(),
            avg_latency_ms: summary.avg,
            p10_latency_ms: summary.p10,
            p50_latency_ms: summary.p50,
            p90_latency_ms: summary.p90,
            stdev_latency_ms: summary.stdev,
            region: region.to_string(),
        }
    }
}

/// Shared grouping of every result produced for one test, across all regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRun {
    pub id: Uuid,
    /// Epoch seconds.
    pub timestamp: i64,
}

impl TestRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now().timestamp(),
        }
    }

    /// `None` when the stored timestamp is out of range.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }
}

impl Default for TestRun {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedResult {
    pub id: String,
    pub test_run_id: Uuid,
    pub result: EndpointLatencyResult,
}

impl PersistedResult {
    /// `timestamp` is the epoch second the regional run started. The id is derived from content
    /// so re-inserting the same result is a no-op.
    pub fn new(result: EndpointLatencyResult, test_run_id: Uuid, timestamp: i64) -> Self {
        Self {
            id: Self::result_id(&result.rpc_name, &result.region, timestamp),
            test_run_id,
            result,
        }
    }

    pub fn result_id(rpc_name: &str, region: &str, timestamp: i64) -> String {
        format!("{}::{}::{}", rpc_name, region, timestamp)
    }
}
