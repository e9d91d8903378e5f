//! Administrative API client
//!
//! Thin wrapper over the server's `sys/` endpoints, enough to check health,
//! initialize, and unseal a freshly started non-dev node.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{DevbaoError, DevbaoResult};
use crate::node::Node;

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Body of `GET /v1/sys/health`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub initialized: bool,
    pub sealed: bool,
    #[serde(default)]
    pub standby: bool,
    #[serde(default)]
    pub version: String,
}

/// Body of `GET /v1/sys/seal-status` and `PUT /v1/sys/unseal`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SealStatus {
    pub sealed: bool,
    #[serde(default)]
    pub initialized: bool,
    #[serde(rename = "t", default)]
    pub threshold: u32,
    #[serde(rename = "n", default)]
    pub shares: u32,
    #[serde(default)]
    pub progress: u32,
}

#[derive(Debug, Serialize)]
struct InitRequest {
    secret_shares: u32,
    secret_threshold: u32,
}

/// Body of `PUT /v1/sys/init`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InitResponse {
    pub keys: Vec<String>,
    #[serde(default)]
    pub keys_base64: Vec<String>,
    pub root_token: String,
}

#[derive(Debug, Serialize)]
struct UnsealRequest<'a> {
    key: &'a str,
}

pub struct AdminClient {
    http: reqwest::Client,
    address: String,
    token: Option<String>,
}

impl AdminClient {
    pub fn new(address: impl Into<String>, token: Option<String>) -> DevbaoResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            address: address.into().trim_end_matches('/').to_string(),
            token: token.filter(|token| !token.is_empty()),
        })
    }

    /// Client pointed at a node's connect address, carrying its token if known.
    pub fn from_node(node: &Node) -> DevbaoResult<Self> {
        Self::new(node.connect_addr()?, node.token())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.http.request(method, self.url(path));
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }
        request
    }

    /// Health check. Sealed, standby, and uninitialized servers answer with
    /// non-2xx codes but still describe themselves, so those count as success.
    pub async fn health(&self) -> DevbaoResult<HealthStatus> {
        let response = self
            .request(reqwest::Method::GET, "sys/health")
            .send()
            .await?;

        let status = response.status();
        let described = matches!(status.as_u16(), 429 | 472 | 473 | 501 | 503);
        if !(status.is_success() || described) {
            return Err(api_error("sys/health", status, response.text().await?));
        }

        Ok(response.json().await?)
    }

    pub async fn seal_status(&self) -> DevbaoResult<SealStatus> {
        self.send_json(reqwest::Method::GET, "sys/seal-status", None::<&()>)
            .await
    }

    pub async fn init(&self, shares: u32, threshold: u32) -> DevbaoResult<InitResponse> {
        let body = InitRequest {
            secret_shares: shares,
            secret_threshold: threshold,
        };
        self.send_json(reqwest::Method::PUT, "sys/init", Some(&body))
            .await
    }

    pub async fn unseal(&self, key: &str) -> DevbaoResult<SealStatus> {
        self.send_json(reqwest::Method::PUT, "sys/unseal", Some(&UnsealRequest { key }))
            .await
    }

    async fn send_json<B, T>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> DevbaoResult<T>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        debug!("{} {}", method, self.url(path));

        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(api_error(path, status, response.text().await?));
        }

        Ok(response.json().await?)
    }
}

fn api_error(path: &str, status: StatusCode, body: String) -> DevbaoError {
    DevbaoError::Api {
        path: path.to_string(),
        status: status.as_u16(),
        body,
    }
}
