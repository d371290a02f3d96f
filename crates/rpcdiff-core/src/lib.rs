//! JSON-RPC Response Comparison Engine
//!
//! Sends the same logical request to several node implementations and
//! decides whether they agree, disagree, or answered outside the published
//! API schema.
//!
//! # Architecture
//!
//! ```text
//!   method + variants ──► expand ──► CallDescriptor*
//!                                         │
//!                              ┌──────────▼──────────┐
//!                              │     Dispatcher      │  semaphore-bounded
//!                              └──┬───────┬───────┬──┘
//!                                 │       │       │
//!                              ┌──▼──┐ ┌──▼──┐ ┌──▼──┐
//!                              │ geth│ │ besu│ │ ... │
//!                              └──┬──┘ └──┬──┘ └──┬──┘
//!                                 └───────┼───────┘
//!                          EndpointResponse* (one per endpoint)
//!                          ┌──────────────┴──────────────┐
//!                    ┌─────▼─────┐                 ┌─────▼─────┐
//!                    │  differ   │                 │ validator │
//!                    └─────┬─────┘                 └─────┬─────┘
//!                          └──────────────┬──────────────┘
//!                                  ┌──────▼──────┐
//!                                  │ Aggregator  │ ──► ComparisonReport
//!                                  └─────────────┘
//! ```

pub mod aggregate;
pub mod client;
pub mod compare;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod expand;
pub mod harness;
pub mod schema;
pub mod spec;

pub use aggregate::{
    namespace_of, Aggregator, Classification, ComparisonRecord, ComparisonReport, ComparisonSummary,
};
pub use client::RpcClient;
pub use compare::{diff_responses, diff_values, DiffEntry, DiffKind};
pub use config::{Endpoint, EndpointRegistry, RunSettings};
pub use dispatch::{Dispatcher, EndpointResponse};
pub use error::{CompareError, CompareResult, TransportError};
pub use expand::{expand, expand_methods, zero_value, CallDescriptor};
pub use harness::ComparisonRunner;
pub use schema::{SchemaValidator, SchemaViolation};
pub use spec::{ApiSpec, MethodSpec, ParamSpec, VariantTable};
