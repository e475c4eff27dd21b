//! RPC client for communicating with the Taskhub daemon.
//!
//! This module provides the helper used by CLI commands to post JSON-RPC
//! calls over HTTP, carrying the caller's namespace and hunter identity in
//! headers.

use anyhow::{anyhow, bail, Result};
use serde_json::{json, Value};

/// HTTP JSON-RPC client bound to one daemon and one identity.
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: String,
    namespace: Option<String>,
    hunter_id: Option<String>,
}

impl RpcClient {
    /// Create a client for `server` (e.g. `http://127.0.0.1:8080`).
    pub fn new(server: &str, namespace: Option<String>, hunter_id: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow!("failed to create HTTP client: {}", e))?;
        Ok(RpcClient {
            http,
            endpoint: format!("{}/rpc", server.trim_end_matches('/')),
            namespace,
            hunter_id,
        })
    }

    /// Make one RPC call and return the JSON result.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let mut builder = self.http.post(&self.endpoint).json(&request);
        if let Some(namespace) = &self.namespace {
            builder = builder.header("x-taskhub-namespace", namespace);
        }
        if let Some(hunter_id) = &self.hunter_id {
            builder = builder.header("x-hunter-id", hunter_id);
        }

        let response = builder.send().await.map_err(|e| {
            anyhow!(
                "failed to reach the daemon at {}: {}\n\
                 Start it with 'taskhub-daemon' first.",
                self.endpoint,
                e
            )
        })?;

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| anyhow!("invalid response from daemon: {}", e))?;

        if let Some(error) = envelope.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            bail!("{} (code {})", message, code);
        }
        Ok(envelope.get("result").cloned().unwrap_or(Value::Null))
    }
}
