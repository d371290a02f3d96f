//! HTTP client for JSON-RPC endpoints
//!
//! Bodies are decoded into a generic `serde_json::Value`, never into fixed
//! result types, so any result shape can be diffed.

use crate::error::{CompareError, CompareResult, TransportError};
use crate::expand::CallDescriptor;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::trace;

/// JSON-RPC protocol version sent in every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// Request id used for single calls; every endpoint sees the same envelope
pub const SINGLE_CALL_ID: u64 = 1;

/// JSON-RPC client shared by all endpoints of a run
#[derive(Clone)]
pub struct RpcClient {
    client: Client,
}

impl RpcClient {
    /// Create a client whose every request carries `timeout`
    pub fn new(timeout: Duration) -> CompareResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompareError::Configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Build a JSON-RPC request envelope
    pub fn envelope(method: &str, params: &[Value], id: u64) -> Value {
        json!({
            "jsonrpc": JSONRPC_VERSION,
            "method": method,
            "params": params,
            "id": id,
        })
    }

    /// POST a single call and return the decoded body
    pub async fn call(&self, url: &str, descriptor: &CallDescriptor) -> Result<Value, TransportError> {
        let request = Self::envelope(&descriptor.method, &descriptor.params, SINGLE_CALL_ID);
        self.post(url, &request).await
    }

    /// POST several calls as one JSON-RPC batch
    ///
    /// The returned bodies line up with `descriptors`. Responses are matched
    /// back by `id` when every entry carries a distinct id in range, and by
    /// array position otherwise.
    pub async fn call_batch(
        &self,
        url: &str,
        descriptors: &[CallDescriptor],
    ) -> Result<Vec<Value>, TransportError> {
        let request = Value::Array(
            descriptors
                .iter()
                .zip(1u64..)
                .map(|(descriptor, id)| Self::envelope(&descriptor.method, &descriptor.params, id))
                .collect(),
        );

        match self.post(url, &request).await? {
            Value::Array(responses) => order_batch(responses, descriptors.len()),
            other => Err(TransportError::Decode(format!(
                "expected a batch array, got {}",
                other
            ))),
        }
    }

    async fn post(&self, url: &str, request: &Value) -> Result<Value, TransportError> {
        trace!(url, request = %request, "Sending JSON-RPC request");

        let response = self.client.post(url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
            });
        }

        let raw_body = response.text().await?;
        trace!(url, response = %raw_body, "Received JSON-RPC response");

        serde_json::from_str(&raw_body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Put batch responses back into submission order
pub(crate) fn order_batch(responses: Vec<Value>, sent: usize) -> Result<Vec<Value>, TransportError> {
    if responses.len() != sent {
        return Err(TransportError::BatchMismatch {
            sent,
            received: responses.len(),
        });
    }

    let ids: Option<Vec<usize>> = responses
        .iter()
        .map(|response| {
            response
                .get("id")
                .and_then(Value::as_u64)
                .map(|id| id as usize)
        })
        .collect();

    match ids {
        Some(ids) if is_permutation(&ids, sent) => {
            let mut slots: Vec<Option<Value>> = vec![None; sent];
            for (id, response) in ids.into_iter().zip(responses) {
                slots[id - 1] = Some(response);
            }
            Ok(slots.into_iter().flatten().collect())
        }
        _ => Ok(responses),
    }
}

/// True when `ids` is exactly `1..=n` in some order
fn is_permutation(ids: &[usize], n: usize) -> bool {
    let mut seen = vec![false; n];
    for &id in ids {
        if id == 0 || id > n || seen[id - 1] {
            return false;
        }
        seen[id - 1] = true;
    }
    true
}
