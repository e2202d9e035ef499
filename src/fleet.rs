//! Fan-out of ping runs to short-lived workers in every region.

use crate::error::{DispatchError, RestError};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use uuid::Uuid;

pub mod machines;

pub use machines::FlyMachinesClient;

pub const FLY_REGIONS: [&str; 35] = [
    "ams", "arn", "atl", "bog", "bom", "bos", "cdg", "den", "dfw", "eze", "ewr", "fra", "gdl",
    "gig", "gru", "hkg", "iad", "jnb", "lax", "lhr", "mad", "mia", "nrt", "ord", "otp", "phx",
    "qro", "scl", "sea", "sin", "sjc", "syd", "waw", "yul", "yyz",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmSpec {
    pub cpus: u32,
    pub cpu_kind: String,
    pub memory_mb: u32,
}

impl Default for VmSpec {
    fn default() -> Self {
        Self {
            cpus: 2,
            cpu_kind: "shared".to_string(),
            memory_mb: 1024,
        }
    }
}

/// Everything needed to start one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRequest {
    pub region: String,
    pub image: String,
    pub iterations: usize,
    pub test_id: Uuid,
    pub vm: VmSpec,
}

impl WorkerRequest {
    /// Init command of the worker: ping from its region into the shared test run.
    pub fn command(&self) -> Vec<String> {
        vec![
            "run".to_string(),
            "suinfra".to_string(),
            "rpc".to_string(),
            "ping".to_string(),
            "--iterations".to_string(),
            self.iterations.to_string(),
            "--test-id".to_string(),
            self.test_id.to_string(),
            "--write-to-db".to_string(),
        ]
    }
}

#[async_trait]
pub trait MachineLauncher: Send + Sync {
    /// Ask the platform for one auto-destroying, never-restarting worker.
    async fn launch(&self, request: &WorkerRequest) -> Result<Value, RestError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPlan {
    pub test_id: Uuid,
    pub image: String,
    pub iterations: usize,
    pub vm: VmSpec,
    pub regions: Vec<String>,
}

impl DispatchPlan {
    pub fn new(test_id: Uuid, image: &str, iterations: usize, vm: VmSpec) -> Self {
        Self {
            test_id,
            image: image.to_string(),
            iterations,
            vm,
            regions: FLY_REGIONS.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn requests(&self) -> Vec<WorkerRequest> {
        self.regions
            .iter()
            .map(|region| WorkerRequest {
                region: region.clone(),
                image: self.image.clone(),
                iterations: self.iterations,
                test_id: self.test_id,
                vm: self.vm.clone(),
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct LaunchAck {
    pub region: String,
    pub outcome: Result<Value, DispatchError>,
}

/// Launch one worker per region once `confirm` accepts the plan. Launches are independent: a
/// failed region is logged and reported in its ack, the others still go out.
pub async fn dispatch<L, C>(
    launcher: &L,
    plan: &DispatchPlan,
    confirm: C,
) -> Result<Vec<LaunchAck>, DispatchError>
where
    L: MachineLauncher + ?Sized,
    C: FnOnce(&DispatchPlan) -> bool,
{
    if !confirm(plan) {
        return Err(DispatchError::NotConfirmed);
    }

    let launches = plan.requests().into_iter().map(|request| async move {
        tracing::info!("Starting worker in {}...", request.region);
        let outcome = launcher
            .launch(&request)
            .await
            .map_err(|source| DispatchError::Launch {
                region: request.region.clone(),
                source,
            });
        if let Err(e) = &outcome {
            tracing::warn!("{}", e);
        }
        LaunchAck {
            region: request.region,
            outcome,
        }
    });
    Ok(join_all(launches).await)
}
