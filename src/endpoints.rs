use crate::error::{EndpointError, RestError};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RPCS_JSON_URL: &str = "https://suinfra.io/static/rpcs.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthHeader {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcEndpoint {
    pub name: String,
    #[serde(default)]
    pub provider_url: Option<String>,
    pub rpc_url: String,
    #[serde(default)]
    pub auth_header: Option<AuthHeader>,
}

impl RpcEndpoint {
    pub fn new(name: impl Into<String>, rpc_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_url: None,
            rpc_url: rpc_url.into(),
            auth_header: None,
        }
    }

    pub fn with_auth_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth_header = Some(AuthHeader {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is empty".to_string());
        }
        let url = Url::parse(&self.rpc_url).map_err(|e| format!("rpc_url: {}", e))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(format!("rpc_url scheme {} is not http(s)", other)),
        }
    }
}

/// Client for fetching the endpoint list, separate from the probing client and its timeout.
pub fn list_client() -> Result<Client, RestError> {
    Ok(Client::builder().build()?)
}

/// Fetch the endpoint list published at `url`. Any transport, status or parse problem fails the
/// whole fetch.
pub async fn fetch_rpc_endpoints(
    client: &Client,
    url: &str,
) -> Result<Vec<RpcEndpoint>, EndpointError> {
    tracing::debug!("Fetching rpc list from {}", url);
    let response = client.get(url).send().await.map_err(RestError::from)?;
    let status = response.status();
    let body = response.bytes().await.map_err(RestError::from)?;
    if !status.is_success() {
        return Err(RestError::Api {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        }
        .into());
    }
    parse_rpc_endpoints(&body)
}

/// Parse and validate an rpc list document. Order is preserved and duplicates are kept.
pub fn parse_rpc_endpoints(body: &[u8]) -> Result<Vec<RpcEndpoint>, EndpointError> {
    let endpoints: Vec<RpcEndpoint> = serde_json::from_slice(body)?;
    for (index, endpoint) in endpoints.iter().enumerate() {
        endpoint
            .validate()
            .map_err(|reason| EndpointError::Invalid {
                index,
                name: endpoint.name.clone(),
                reason,
            })?;
    }
    Ok(endpoints)
}
