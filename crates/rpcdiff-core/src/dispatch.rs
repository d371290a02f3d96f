//! Concurrent multi-endpoint dispatch
//!
//! Every endpoint call passes through a shared semaphore, so the number of
//! requests in flight never exceeds the configured concurrency no matter how
//! many descriptors are being compared at once.

use crate::client::RpcClient;
use crate::config::{Endpoint, EndpointRegistry, RunSettings};
use crate::error::{CompareError, CompareResult, TransportError};
use crate::expand::CallDescriptor;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

/// One endpoint's answer to one call descriptor
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    pub endpoint: String,
    /// Decoded body, or why there is none
    pub outcome: Result<Value, TransportError>,
}

impl EndpointResponse {
    pub fn ok(endpoint: impl Into<String>, body: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            outcome: Ok(body),
        }
    }

    pub fn failed(endpoint: impl Into<String>, error: TransportError) -> Self {
        Self {
            endpoint: endpoint.into(),
            outcome: Err(error),
        }
    }

    /// The decoded body, if the call succeeded
    pub fn body(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Issues calls to every endpoint, bounded by a semaphore
pub struct Dispatcher {
    client: RpcClient,
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(settings: &RunSettings) -> CompareResult<Self> {
        if settings.concurrency == 0 {
            return Err(CompareError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if settings.timeout.is_zero() {
            return Err(CompareError::Configuration(
                "timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            client: RpcClient::new(settings.timeout)?,
            permits: Arc::new(Semaphore::new(settings.concurrency)),
            concurrency: settings.concurrency,
        })
    }

    /// Configured concurrency bound
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Send one descriptor to every endpoint
    ///
    /// Responses come back in registry order. A failing endpoint never
    /// prevents the others from being called.
    #[instrument(skip_all, fields(method = %descriptor.method, variant = %descriptor.variant_label))]
    pub async fn dispatch(
        &self,
        descriptor: &CallDescriptor,
        registry: &EndpointRegistry,
    ) -> Vec<EndpointResponse> {
        let calls = registry
            .iter()
            .map(|endpoint| self.call_endpoint(endpoint, descriptor));
        join_all(calls).await
    }

    /// Send several descriptors to one endpoint as a single JSON-RPC batch
    ///
    /// The result has one entry per descriptor, in submission order. A batch
    /// that fails as a whole fails every descriptor in it.
    #[instrument(skip_all, fields(endpoint = %endpoint.name, calls = descriptors.len()))]
    pub async fn dispatch_batch(
        &self,
        endpoint: &Endpoint,
        descriptors: &[CallDescriptor],
    ) -> Vec<EndpointResponse> {
        if descriptors.is_empty() {
            return Vec::new();
        }

        let outcome = match self.permits.acquire().await {
            Ok(_permit) => self.client.call_batch(&endpoint.url, descriptors).await,
            Err(_) => Err(gate_closed()),
        };

        match outcome {
            Ok(bodies) => bodies
                .into_iter()
                .map(|body| EndpointResponse::ok(&endpoint.name, body))
                .collect(),
            Err(error) => {
                warn!(endpoint = %endpoint.name, error = %error, "Batch call failed");
                descriptors
                    .iter()
                    .map(|_| EndpointResponse::failed(&endpoint.name, error.clone()))
                    .collect()
            }
        }
    }

    async fn call_endpoint(&self, endpoint: &Endpoint, descriptor: &CallDescriptor) -> EndpointResponse {
        let outcome = match self.permits.acquire().await {
            Ok(_permit) => self.client.call(&endpoint.url, descriptor).await,
            Err(_) => Err(gate_closed()),
        };

        match &outcome {
            Ok(_) => debug!(endpoint = %endpoint.name, "Call succeeded"),
            Err(error) => warn!(
                endpoint = %endpoint.name,
                method = %descriptor.method,
                error = %error,
                "Call failed"
            ),
        }

        EndpointResponse {
            endpoint: endpoint.name.clone(),
            outcome,
        }
    }
}

fn gate_closed() -> TransportError {
    TransportError::Network("dispatcher admission gate closed".to_string())
}
