use crate::endpoints::RpcEndpoint;
use crate::error::RestError;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// Result of one timed round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub succeeded: bool,
    pub elapsed: Duration,
    pub status_code: Option<u16>,
}

impl ProbeOutcome {
    pub fn success(elapsed: Duration) -> Self {
        Self {
            succeeded: true,
            elapsed,
            status_code: Some(StatusCode::OK.as_u16()),
        }
    }

    pub fn failure(elapsed: Duration, status_code: Option<u16>) -> Self {
        Self {
            succeeded: false,
            elapsed,
            status_code,
        }
    }
}

/// One timed call against an endpoint. Implementations never fail: every error becomes an
/// unsuccessful outcome.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, endpoint: &RpcEndpoint, nonce: u64) -> ProbeOutcome;
}

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Vec<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params: Vec::new(),
        }
    }
}

/// Probes Sui fullnodes with `suix_getReferenceGasPrice`.
#[derive(Debug, Clone)]
pub struct RpcProber {
    pub client: Client,
}

impl RpcProber {
    pub const METHOD: &'static str = "suix_getReferenceGasPrice";
    pub const USER_AGENT: &'static str = "suinfra";
    pub const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Result<Self, RestError> {
        let client = Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for RpcProber {
    async fn probe(&self, endpoint: &RpcEndpoint, nonce: u64) -> ProbeOutcome {
        let mut request = self
            .client
            .post(&endpoint.rpc_url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, Self::USER_AGENT)
            .json(&JsonRpcRequest::new(nonce, Self::METHOD));
        if let Some(auth) = &endpoint.auth_header {
            request = request.header(auth.key.as_str(), auth.value.as_str());
        }

        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Failed to ping {}: {}", endpoint.name, e);
                return ProbeOutcome::failure(start.elapsed(), None);
            }
        };
        let status = response.status();
        let body = response.bytes().await;
        let elapsed = start.elapsed();

        match body {
            Ok(_) if status == StatusCode::OK => ProbeOutcome::success(elapsed),
            Ok(body) => {
                tracing::warn!(
                    "Failed to ping {}: {} {}",
                    endpoint.name,
                    status.as_u16(),
                    String::from_utf8_lossy(&body)
                );
                ProbeOutcome::failure(elapsed, Some(status.as_u16()))
            }
            Err(e) => {
                tracing::warn!("Failed to read response from {}: {}", endpoint.name, e);
                ProbeOutcome::failure(elapsed, Some(status.as_u16()))
            }
        }
    }
}
