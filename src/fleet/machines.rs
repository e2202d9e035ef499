use crate::error::RestError;
use crate::fleet::{MachineLauncher, WorkerRequest};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct CreateMachineRequest {
    pub config: MachineConfig,
    pub region: String,
}

#[derive(Debug, Serialize)]
pub struct MachineConfig {
    pub auto_destroy: bool,
    pub guest: GuestConfig,
    pub image: String,
    pub init: InitConfig,
    pub restart: RestartPolicy,
}

#[derive(Debug, Serialize)]
pub struct GuestConfig {
    pub cpu_kind: String,
    pub cpus: u32,
    pub memory_mb: u32,
}

#[derive(Debug, Serialize)]
pub struct InitConfig {
    pub cmd: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RestartPolicy {
    pub policy: String,
}

impl From<&WorkerRequest> for CreateMachineRequest {
    fn from(request: &WorkerRequest) -> Self {
        Self {
            config: MachineConfig {
                auto_destroy: true,
                guest: GuestConfig {
                    cpu_kind: request.vm.cpu_kind.clone(),
                    cpus: request.vm.cpus,
                    memory_mb: request.vm.memory_mb,
                },
                image: request.image.clone(),
                init: InitConfig {
                    cmd: request.command(),
                },
                restart: RestartPolicy {
                    policy: "no".to_string(),
                },
            },
            region: request.region.clone(),
        }
    }
}

/// Client for the Fly Machines REST API.
#[derive(Debug, Clone)]
pub struct FlyMachinesClient {
    pub endpoint: String,
    pub app: &'static str,
    auth_token: String,
    pub client: Client,
}

impl FlyMachinesClient {
    pub const ENDPOINT: &'static str = "https://api.machines.dev/v1";
    pub const APP: &'static str = "suinfra-cli";

    pub fn new(auth_token: &str) -> Result<Self, RestError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            endpoint: Self::ENDPOINT.to_string(),
            app: Self::APP,
            auth_token: auth_token.to_string(),
            client,
        })
    }

    pub fn machines_url(&self) -> String {
        format!("{}/apps/{}/machines", self.endpoint, self.app)
    }
}

#[async_trait]
impl MachineLauncher for FlyMachinesClient {
    async fn launch(&self, request: &WorkerRequest) -> Result<Value, RestError> {
        let response = self
            .client
            .post(self.machines_url())
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(&self.auth_token)
            .json(&CreateMachineRequest::from(request))
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(RestError::Api {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }
}
