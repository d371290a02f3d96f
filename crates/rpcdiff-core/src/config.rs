//! Endpoint registry and run settings

use crate::error::{CompareError, CompareResult};
use indexmap::IndexMap;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of in-flight endpoint calls
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One named JSON-RPC service instance under comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Logical client identifier (e.g. "geth")
    pub name: String,
    /// Reachable HTTP(S) URL
    pub url: String,
}

/// The set of endpoints to compare, in configuration order
///
/// Read-only once built; the first endpoint that answers a call acts as the
/// diff baseline for that call.
#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    endpoints: IndexMap<String, Endpoint>,
}

impl EndpointRegistry {
    /// Build a registry from `(name, url)` pairs
    ///
    /// Fails on an empty registry, a duplicate name, or a URL that is not
    /// http/https.
    pub fn new<I, N, U>(entries: I) -> CompareResult<Self>
    where
        I: IntoIterator<Item = (N, U)>,
        N: Into<String>,
        U: Into<String>,
    {
        let mut endpoints = IndexMap::new();

        for (name, url) in entries {
            let name = name.into();
            let url = url.into();

            if name.trim().is_empty() {
                return Err(CompareError::Configuration(
                    "endpoint name must not be empty".to_string(),
                ));
            }

            let parsed = Url::parse(&url).map_err(|e| {
                CompareError::Configuration(format!("endpoint '{}' has invalid URL '{}': {}", name, url, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(CompareError::Configuration(format!(
                    "endpoint '{}' must use http or https, got '{}'",
                    name,
                    parsed.scheme()
                )));
            }

            if endpoints.contains_key(&name) {
                return Err(CompareError::Configuration(format!(
                    "duplicate endpoint name '{}'",
                    name
                )));
            }
            endpoints.insert(name.clone(), Endpoint { name, url });
        }

        if endpoints.is_empty() {
            return Err(CompareError::Configuration(
                "at least one endpoint is required".to_string(),
            ));
        }

        Ok(Self { endpoints })
    }

    /// Number of configured endpoints
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Look up an endpoint by name
    pub fn get(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(name)
    }

    /// Iterate endpoints in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    /// Endpoint names in configuration order
    pub fn names(&self) -> Vec<String> {
        self.endpoints.keys().cloned().collect()
    }
}

/// Knobs for one comparison run
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Upper bound on concurrent endpoint calls (and in-flight descriptors)
    pub concurrency: usize,
    /// Per-call timeout; a timed-out call counts as a transport error
    pub timeout: Duration,
    /// Whether responses are checked against declared result schemas
    pub validate_schema: bool,
    /// 0 = one request per call, N = JSON-RPC batches of up to N calls
    pub batch_size: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            validate_schema: true,
            batch_size: 0,
        }
    }
}
