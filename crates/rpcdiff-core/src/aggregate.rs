//! Classification and roll-up of comparison results

use crate::compare::DiffEntry;
use crate::dispatch::EndpointResponse;
use crate::expand::CallDescriptor;
use crate::schema::SchemaViolation;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Namespace used for method names without an underscore
pub const OTHER_NAMESPACE: &str = "other";

/// Final verdict for one call descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Match,
    Differ,
    SchemaError,
    CallError,
}

impl Classification {
    /// Classify in priority order: call error, schema error, differ, match
    pub fn from_flags(call_error: bool, schema_error: bool, differs: bool) -> Self {
        if call_error {
            Classification::CallError
        } else if schema_error {
            Classification::SchemaError
        } else if differs {
            Classification::Differ
        } else {
            Classification::Match
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Match => f.pad("match"),
            Classification::Differ => f.pad("differ"),
            Classification::SchemaError => f.pad("schema_error"),
            Classification::CallError => f.pad("call_error"),
        }
    }
}

/// Everything known about one call descriptor after dispatch, diff and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub descriptor: CallDescriptor,
    /// Decoded body per endpoint that answered
    pub responses: IndexMap<String, Value>,
    /// Transport failure per endpoint that did not
    pub call_errors: IndexMap<String, String>,
    pub diffs: Vec<DiffEntry>,
    pub schema_violations: IndexMap<String, SchemaViolation>,
    pub classification: Classification,
}

impl ComparisonRecord {
    /// Fold dispatcher, differ and validator output into a classified record
    pub fn build(
        descriptor: CallDescriptor,
        responses: Vec<EndpointResponse>,
        diffs: Vec<DiffEntry>,
        violations: Vec<SchemaViolation>,
    ) -> Self {
        let mut bodies = IndexMap::new();
        let mut call_errors = IndexMap::new();
        for response in responses {
            match response.outcome {
                Ok(body) => {
                    bodies.insert(response.endpoint, body);
                }
                Err(error) => {
                    call_errors.insert(response.endpoint, error.to_string());
                }
            }
        }

        let schema_violations: IndexMap<String, SchemaViolation> = violations
            .into_iter()
            .filter(|violation| !violation.messages.is_empty())
            .map(|violation| (violation.endpoint.clone(), violation))
            .collect();

        let classification = Classification::from_flags(
            !call_errors.is_empty(),
            !schema_violations.is_empty(),
            !diffs.is_empty(),
        );

        Self {
            descriptor,
            responses: bodies,
            call_errors,
            diffs,
            schema_violations,
            classification,
        }
    }

    /// Reporting bucket of this record's method
    pub fn namespace(&self) -> &str {
        namespace_of(&self.descriptor.method)
    }
}

/// Text before the first underscore
///
/// Methods without an underscore, and methods whose prefix would be empty
/// (`_hidden`), are reported under [`OTHER_NAMESPACE`] so every bucket has a
/// printable name.
pub fn namespace_of(method: &str) -> &str {
    match method.split_once('_') {
        Some((prefix, _)) if !prefix.is_empty() => prefix,
        _ => OTHER_NAMESPACE,
    }
}

/// Counters folded over a set of records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub total_methods: usize,
    pub total_comparisons: usize,
    pub matches: usize,
    pub differences: usize,
    pub schema_errors: usize,
    pub call_errors: usize,
}

impl ComparisonSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ComparisonRecord>) -> Self {
        let mut summary = Self::default();
        let mut methods = BTreeSet::new();

        for record in records {
            methods.insert(record.descriptor.method.as_str());
            summary.total_comparisons += 1;
            match record.classification {
                Classification::Match => summary.matches += 1,
                Classification::Differ => summary.differences += 1,
                Classification::SchemaError => summary.schema_errors += 1,
                Classification::CallError => summary.call_errors += 1,
            }
        }

        summary.total_methods = methods.len();
        summary
    }

    /// True when every comparison matched
    pub fn all_matched(&self) -> bool {
        self.matches == self.total_comparisons
    }
}

/// Collects records in completion order
#[derive(Debug, Default)]
pub struct Aggregator {
    records: Vec<ComparisonRecord>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ComparisonRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sort records and compute the summaries
    pub fn finish(self, endpoints: Vec<String>) -> ComparisonReport {
        let mut records = self.records;
        // Length before text so that `_variant2` sorts ahead of `_variant10`
        records.sort_by(|a, b| {
            a.descriptor
                .method
                .cmp(&b.descriptor.method)
                .then(a.descriptor.variant_label.len().cmp(&b.descriptor.variant_label.len()))
                .then(a.descriptor.variant_label.cmp(&b.descriptor.variant_label))
        });

        let mut grouped: BTreeMap<String, Vec<&ComparisonRecord>> = BTreeMap::new();
        for record in &records {
            grouped
                .entry(record.namespace().to_string())
                .or_default()
                .push(record);
        }
        let namespaces = grouped
            .into_iter()
            .map(|(namespace, records)| (namespace, ComparisonSummary::from_records(records)))
            .collect();

        ComparisonReport {
            generated_at: Utc::now(),
            endpoints,
            summary: ComparisonSummary::from_records(&records),
            namespaces,
            records,
        }
    }
}

/// The complete, ordered result of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub generated_at: DateTime<Utc>,
    pub endpoints: Vec<String>,
    pub summary: ComparisonSummary,
    /// Per-namespace counters, keyed by method prefix
    pub namespaces: BTreeMap<String, ComparisonSummary>,
    /// Sorted by method name, then variant label
    pub records: Vec<ComparisonRecord>,
}

impl ComparisonReport {
    /// Records of one namespace, in report order
    pub fn records_in<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'a ComparisonRecord> + 'a {
        self.records
            .iter()
            .filter(move |record| record.namespace() == namespace)
    }

    /// Write the report as pretty JSON into `dir`, returning the file path
    ///
    /// Never overwrites an earlier report: a name already taken gets a
    /// `-1`, `-2`, ... suffix.
    pub async fn write_json(&self, dir: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;

        let stem = format!(
            "rpcdiff-report-{}",
            self.generated_at.format("%Y%m%dT%H%M%S%.3fZ")
        );
        let body = serde_json::to_vec_pretty(self).map_err(std::io::Error::from)?;

        let mut attempt = 0u32;
        let path = loop {
            let name = match attempt {
                0 => format!("{}.json", stem),
                n => format!("{}-{}.json", stem, n),
            };
            let path = dir.join(name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&body).await?;
                    file.flush().await?;
                    break path;
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e),
            }
        };

        info!(path = %path.display(), records = self.records.len(), "Wrote comparison report");
        Ok(path)
    }
}
