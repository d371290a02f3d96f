//! Runs a full comparison: dispatch, diff, validate, aggregate

use crate::aggregate::{Aggregator, ComparisonRecord, ComparisonReport};
use crate::compare::diff_responses;
use crate::config::{EndpointRegistry, RunSettings};
use crate::dispatch::{Dispatcher, EndpointResponse};
use crate::error::CompareResult;
use crate::expand::CallDescriptor;
use crate::schema::SchemaValidator;
use crate::spec::ApiSpec;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Drives descriptors through every configured endpoint
///
/// The registry and compiled schemas are read-only for the whole run; the
/// only mutable state is the aggregator, fed from a single consumer.
pub struct ComparisonRunner {
    registry: Arc<EndpointRegistry>,
    dispatcher: Dispatcher,
    validator: Option<SchemaValidator>,
    settings: RunSettings,
}

impl ComparisonRunner {
    /// Set up a run; every configuration error surfaces here
    pub fn new(registry: EndpointRegistry, spec: Option<&ApiSpec>, settings: RunSettings) -> CompareResult<Self> {
        let dispatcher = Dispatcher::new(&settings)?;

        let validator = match spec {
            Some(spec) if settings.validate_schema => Some(SchemaValidator::new(spec)?),
            _ => None,
        };
        if settings.validate_schema && validator.is_none() {
            warn!("Schema validation requested but no API specification was supplied");
        }

        if registry.len() < 2 {
            warn!(endpoints = registry.len(), "Fewer than two endpoints, nothing to diff against");
        }

        Ok(Self {
            registry: Arc::new(registry),
            dispatcher,
            validator,
            settings,
        })
    }

    /// Compare every descriptor and return the sorted report
    #[instrument(skip_all, fields(descriptors = descriptors.len(), endpoints = self.registry.len()))]
    pub async fn run(&self, descriptors: Vec<CallDescriptor>) -> ComparisonReport {
        info!(
            batch_size = self.settings.batch_size,
            concurrency = self.dispatcher.concurrency(),
            "Starting comparison run"
        );

        let mut aggregator = Aggregator::new();
        if self.settings.batch_size > 0 {
            self.run_batched(descriptors, &mut aggregator).await;
        } else {
            let mut completed = stream::iter(descriptors)
                .map(|descriptor| self.compare_one(descriptor))
                .buffer_unordered(self.dispatcher.concurrency());

            while let Some(record) = completed.next().await {
                log_record(&record);
                aggregator.push(record);
            }
        }

        let report = aggregator.finish(self.registry.names());
        info!(
            methods = report.summary.total_methods,
            comparisons = report.summary.total_comparisons,
            matches = report.summary.matches,
            differences = report.summary.differences,
            schema_errors = report.summary.schema_errors,
            call_errors = report.summary.call_errors,
            "Comparison run finished"
        );
        report
    }

    async fn compare_one(&self, descriptor: CallDescriptor) -> ComparisonRecord {
        let responses = self.dispatcher.dispatch(&descriptor, &self.registry).await;
        self.assemble(descriptor, responses)
    }

    /// Batch mode: one JSON-RPC batch per (chunk, endpoint)
    async fn run_batched(&self, descriptors: Vec<CallDescriptor>, aggregator: &mut Aggregator) {
        let chunks: Vec<Vec<CallDescriptor>> = descriptors
            .chunks(self.settings.batch_size)
            .map(<[CallDescriptor]>::to_vec)
            .collect();

        let mut completed = stream::iter(chunks)
            .map(|chunk| self.compare_chunk(chunk))
            .buffer_unordered(self.dispatcher.concurrency());

        while let Some(records) = completed.next().await {
            for record in records {
                log_record(&record);
                aggregator.push(record);
            }
        }
    }

    async fn compare_chunk(&self, chunk: Vec<CallDescriptor>) -> Vec<ComparisonRecord> {
        let per_endpoint = join_all(
            self.registry
                .iter()
                .map(|endpoint| self.dispatcher.dispatch_batch(endpoint, &chunk)),
        )
        .await;

        // Transpose endpoint-major batches into descriptor-major response sets
        let mut columns: Vec<std::vec::IntoIter<EndpointResponse>> =
            per_endpoint.into_iter().map(Vec::into_iter).collect();

        chunk
            .into_iter()
            .map(|descriptor| {
                let responses = columns.iter_mut().filter_map(Iterator::next).collect();
                self.assemble(descriptor, responses)
            })
            .collect()
    }

    fn assemble(&self, descriptor: CallDescriptor, responses: Vec<EndpointResponse>) -> ComparisonRecord {
        let diffs = diff_responses(&responses);
        let violations = match &self.validator {
            Some(validator) => responses
                .iter()
                .filter_map(|response| validator.validate(&descriptor.method, response))
                .collect(),
            None => Vec::new(),
        };

        ComparisonRecord::build(descriptor, responses, diffs, violations)
    }
}

fn log_record(record: &ComparisonRecord) {
    debug!(
        method = %record.descriptor.method,
        variant = %record.descriptor.variant_label,
        classification = %record.classification,
        diffs = record.diffs.len(),
        "Classified comparison"
    );
}
