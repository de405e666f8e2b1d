//! HTTP transport for remote store calls

use crate::common::{Error, Result};
use crate::rpc::{Method, RemoteCallChannel, RpcRequest, RpcResponse, RPC_PATH};
use async_trait::async_trait;
use std::time::Duration;

/// Channel bound to one node's RPC endpoint.
#[derive(Debug, Clone)]
pub struct HttpChannel {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChannel {
    /// `addr` is either `host:port` or an `http://` base URL.
    ///
    /// The client is built without TLS, so `https://` is refused here rather
    /// than failing on every call.
    pub fn new(addr: &str, timeout: Duration) -> Result<Self> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(Error::InvalidConfig("empty master address".into()));
        }
        if addr.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "{}: https is not supported, use http://",
                addr
            )));
        }

        let base = if addr.starts_with("http://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        };
        let endpoint = format!("{}{}", base.trim_end_matches('/'), RPC_PATH);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteCallChannel for HttpChannel {
    async fn call(&self, method: Method, arg: &str) -> Result<String> {
        let request = RpcRequest {
            method,
            arg: arg.to_string(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteUnavailable(format!(
                "{} returned {}: {}",
                method, status, body
            )));
        }

        let reply: RpcResponse = response.json().await?;
        reply.into_result(method)
    }
}
