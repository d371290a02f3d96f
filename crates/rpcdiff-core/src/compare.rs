//! Structural diffing of decoded responses

use crate::dispatch::EndpointResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of a single discrepancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// Same shape, different scalar (or exactly one side null)
    ValueMismatch,
    /// Object vs array vs scalar at the same path
    TypeMismatch,
    /// Key present on side A only
    FieldMissing,
    /// Key present on side B only
    FieldExtra,
    /// Arrays of different length; the shared prefix is still compared
    ArrayLengthMismatch,
}

impl DiffKind {
    /// The kind seen when the two sides are swapped
    pub fn mirrored(self) -> Self {
        match self {
            DiffKind::FieldMissing => DiffKind::FieldExtra,
            DiffKind::FieldExtra => DiffKind::FieldMissing,
            other => other,
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffKind::ValueMismatch => f.pad("VALUE"),
            DiffKind::TypeMismatch => f.pad("TYPE"),
            DiffKind::FieldMissing => f.pad("MISSING"),
            DiffKind::FieldExtra => f.pad("EXTRA"),
            DiffKind::ArrayLengthMismatch => f.pad("LENGTH"),
        }
    }
}

/// One path-addressed discrepancy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Dotted/bracketed path, e.g. `result.transactions[3].hash`; empty for the root
    pub path: String,
    pub kind: DiffKind,
    /// Value on the baseline side (`None` when the field is absent there)
    pub value_a: Option<Value>,
    /// Value on the compared side (`None` when the field is absent there)
    pub value_b: Option<Value>,
    /// Endpoint that provided side A
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,
    /// Endpoint that provided side B
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl DiffEntry {
    fn new(path: &str, kind: DiffKind, value_a: Option<&Value>, value_b: Option<&Value>) -> Self {
        Self {
            path: path.to_string(),
            kind,
            value_a: value_a.cloned(),
            value_b: value_b.cloned(),
            baseline: None,
            endpoint: None,
        }
    }
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |value: &Option<Value>| match value {
            Some(v) => v.to_string(),
            None => "(missing)".to_string(),
        };
        write!(
            f,
            "[{:>7}] {} : {}={} {}={}",
            self.kind,
            if self.path.is_empty() { "(root)" } else { self.path.as_str() },
            self.baseline.as_deref().unwrap_or("a"),
            render(&self.value_a),
            self.endpoint.as_deref().unwrap_or("b"),
            render(&self.value_b),
        )
    }
}

/// Diff every successful response against the first successful one
///
/// Failed responses are skipped. Each entry is tagged with the baseline and
/// compared endpoint names.
pub fn diff_responses(responses: &[EndpointResponse]) -> Vec<DiffEntry> {
    let mut succeeded = responses
        .iter()
        .filter_map(|response| response.body().map(|body| (&response.endpoint, body)));

    let Some((baseline, reference)) = succeeded.next() else {
        return Vec::new();
    };

    let mut diffs = Vec::new();
    for (endpoint, body) in succeeded {
        diffs.extend(diff_values(reference, body).into_iter().map(|mut entry| {
            entry.baseline = Some(baseline.clone());
            entry.endpoint = Some(endpoint.clone());
            entry
        }));
    }
    diffs
}

/// Recursively diff two JSON values
///
/// An empty result means the values are equivalent.
pub fn diff_values(a: &Value, b: &Value) -> Vec<DiffEntry> {
    let mut differences = Vec::new();
    compare_json("", a, b, &mut differences);
    differences
}

fn compare_json(path: &str, a: &Value, b: &Value, differences: &mut Vec<DiffEntry>) {
    match (a, b) {
        (Value::Null, Value::Null) => {}
        (Value::Null, _) | (_, Value::Null) => {
            differences.push(DiffEntry::new(path, DiffKind::ValueMismatch, Some(a), Some(b)));
        }
        (Value::Object(a_obj), Value::Object(b_obj)) => {
            for (key, a_value) in a_obj {
                let key_path = child_path(path, key);
                match b_obj.get(key) {
                    Some(b_value) => compare_json(&key_path, a_value, b_value, differences),
                    None => differences.push(DiffEntry::new(
                        &key_path,
                        DiffKind::FieldMissing,
                        Some(a_value),
                        None,
                    )),
                }
            }

            for (key, b_value) in b_obj {
                if !a_obj.contains_key(key) {
                    differences.push(DiffEntry::new(
                        &child_path(path, key),
                        DiffKind::FieldExtra,
                        None,
                        Some(b_value),
                    ));
                }
            }
        }
        (Value::Array(a_arr), Value::Array(b_arr)) => {
            if a_arr.len() != b_arr.len() {
                differences.push(DiffEntry::new(
                    path,
                    DiffKind::ArrayLengthMismatch,
                    Some(&Value::from(a_arr.len())),
                    Some(&Value::from(b_arr.len())),
                ));
            }

            // Shared prefix still gets compared element by element
            for (index, (a_elem, b_elem)) in a_arr.iter().zip(b_arr.iter()).enumerate() {
                compare_json(&format!("{}[{}]", path, index), a_elem, b_elem, differences);
            }
        }
        _ if shape(a) != shape(b) => {
            differences.push(DiffEntry::new(path, DiffKind::TypeMismatch, Some(a), Some(b)));
        }
        _ => {
            if !scalars_equal(a, b) {
                differences.push(DiffEntry::new(path, DiffKind::ValueMismatch, Some(a), Some(b)));
            }
        }
    }
}

#[derive(PartialEq)]
enum Shape {
    Object,
    Array,
    Scalar,
}

fn shape(value: &Value) -> Shape {
    match value {
        Value::Object(_) => Shape::Object,
        Value::Array(_) => Shape::Array,
        _ => Shape::Scalar,
    }
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn scalars_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::String(a), Value::String(b)) => hex_zero_equivalent(a, b),
        _ => false,
    }
}

/// `"0x"` and `"0x000…0"` are both legal encodings of zero
///
/// Only that pair is normalized; leading zeros of non-zero quantities and
/// checksum casing still count as differences.
fn hex_zero_equivalent(a: &str, b: &str) -> bool {
    (a == "0x" && is_hex_zero(b)) || (b == "0x" && is_hex_zero(a))
}

fn is_hex_zero(s: &str) -> bool {
    s.strip_prefix("0x")
        .is_some_and(|digits| digits.chars().all(|c| c == '0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use serde_json::json;

    fn kinds(diffs: &[DiffEntry]) -> Vec<(String, DiffKind)> {
        diffs.iter().map(|d| (d.path.clone(), d.kind)).collect()
    }

    #[test]
    fn test_identical_values() {
        let block = json!({
            "number": "0x10",
            "transactions": [{"hash": "0xaa"}, {"hash": "0xbb"}],
            "uncles": [],
            "baseFeePerGas": null
        });
        assert!(diff_values(&block, &block).is_empty());
    }

    #[test]
    fn test_hex_zero_equivalence() {
        for zero in ["0x0", "0x0000", "0x0000000000000000000000000000000000000000"] {
            assert!(diff_values(&json!("0x"), &json!(zero)).is_empty());
            assert!(diff_values(&json!(zero), &json!("0x")).is_empty());
        }

        let diffs = diff_values(&json!("0x1"), &json!("0x0000"));
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DiffKind::ValueMismatch);
    }

    #[test]
    fn test_no_other_hex_normalization() {
        // Neither side is the bare "0x", so these are plain string mismatches
        assert_eq!(diff_values(&json!("0x0"), &json!("0x00")).len(), 1);
        assert_eq!(diff_values(&json!("0x01"), &json!("0x1")).len(), 1);
        assert_eq!(diff_values(&json!("0xAbC"), &json!("0xabc")).len(), 1);
        assert_eq!(diff_values(&json!("0x"), &json!("0x0g")).len(), 1);
        assert_eq!(diff_values(&json!("0x"), &json!("00")).len(), 1);
    }

    #[test]
    fn test_null_handling() {
        assert!(diff_values(&Value::Null, &Value::Null).is_empty());

        let diffs = diff_values(&json!({"to": null}), &json!({"to": "0xabc"}));
        assert_eq!(kinds(&diffs), vec![("to".to_string(), DiffKind::ValueMismatch)]);

        let diffs = diff_values(&json!([]), &Value::Null);
        assert_eq!(diffs[0].kind, DiffKind::ValueMismatch);
    }

    #[test]
    fn test_type_mismatch() {
        let diffs = diff_values(&json!({"logs": []}), &json!({"logs": {}}));
        assert_eq!(kinds(&diffs), vec![("logs".to_string(), DiffKind::TypeMismatch)]);

        let diffs = diff_values(&json!({"logs": "0x"}), &json!({"logs": ["0x"]}));
        assert_eq!(diffs[0].kind, DiffKind::TypeMismatch);
    }

    #[test]
    fn test_scalar_kinds_compare_as_values() {
        let diffs = diff_values(&json!("0x5"), &json!(5));
        assert_eq!(kinds(&diffs), vec![(String::new(), DiffKind::ValueMismatch)]);
    }

    #[test]
    fn test_missing_and_extra_fields() {
        let a = json!({"result": {"hash": "0x1", "nonce": "0x0"}});
        let b = json!({"result": {"hash": "0x1", "mixHash": "0x2"}});

        let diffs = diff_values(&a, &b);
        assert_eq!(
            kinds(&diffs),
            vec![
                ("result.nonce".to_string(), DiffKind::FieldMissing),
                ("result.mixHash".to_string(), DiffKind::FieldExtra),
            ]
        );
        assert_eq!(diffs[0].value_a, Some(json!("0x0")));
        assert_eq!(diffs[0].value_b, None);
        assert_eq!(diffs[1].value_a, None);
        assert_eq!(diffs[1].value_b, Some(json!("0x2")));
    }

    #[test]
    fn test_key_order_is_irrelevant() {
        let a: Value = serde_json::from_str(r#"{"a": 1, "b": {"x": 1, "y": 2}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b": {"y": 2, "x": 1}, "a": 1}"#).unwrap();
        assert!(diff_values(&a, &b).is_empty());
    }

    #[test]
    fn test_array_length_with_identical_prefix() {
        let diffs = diff_values(&json!({"logs": [1, 2]}), &json!({"logs": [1, 2, 3]}));
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "logs");
        assert_eq!(diffs[0].kind, DiffKind::ArrayLengthMismatch);
        assert_eq!(diffs[0].value_a, Some(json!(2)));
        assert_eq!(diffs[0].value_b, Some(json!(3)));
    }

    #[test]
    fn test_array_length_still_diffs_prefix() {
        let diffs = diff_values(&json!([{"v": 1}, 2]), &json!([{"v": 9}]));
        assert_eq!(
            kinds(&diffs),
            vec![
                (String::new(), DiffKind::ArrayLengthMismatch),
                ("[0].v".to_string(), DiffKind::ValueMismatch),
            ]
        );
    }

    #[test]
    fn test_nested_paths() {
        let a = json!({"result": {"transactions": [{"hash": "0xaa"}, {"hash": "0xbb"}]}});
        let b = json!({"result": {"transactions": [{"hash": "0xaa"}, {"hash": "0xcc"}]}});
        let diffs = diff_values(&a, &b);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "result.transactions[1].hash");
    }

    #[test]
    fn test_diff_responses_uses_first_success_as_baseline() {
        let responses = vec![
            EndpointResponse::failed("erigon", TransportError::Timeout),
            EndpointResponse::ok("geth", json!({"result": "0x5"})),
            EndpointResponse::ok("nethermind", json!({"result": "0x6"})),
            EndpointResponse::ok("besu", json!({"result": "0x5"})),
        ];

        let diffs = diff_responses(&responses);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "result");
        assert_eq!(diffs[0].baseline.as_deref(), Some("geth"));
        assert_eq!(diffs[0].endpoint.as_deref(), Some("nethermind"));
    }

    #[test]
    fn test_diff_responses_three_way_divergence() {
        let responses = vec![
            EndpointResponse::ok("geth", json!({"result": "0x1"})),
            EndpointResponse::ok("nethermind", json!({"result": "0x2"})),
            EndpointResponse::ok("besu", json!({"result": "0x3"})),
        ];

        let diffs = diff_responses(&responses);
        let pairs: Vec<(&str, &str)> = diffs
            .iter()
            .map(|d| (d.baseline.as_deref().unwrap(), d.endpoint.as_deref().unwrap()))
            .collect();
        assert_eq!(pairs, vec![("geth", "nethermind"), ("geth", "besu")]);
    }

    #[test]
    fn test_diff_responses_without_successes() {
        let responses = vec![EndpointResponse::failed("geth", TransportError::Timeout)];
        assert!(diff_responses(&responses).is_empty());
        assert!(diff_responses(&[]).is_empty());
    }

    #[test]
    fn test_display() {
        let mut entry = diff_values(&json!({"result": "0x5"}), &json!({"result": "0x6"})).remove(0);
        entry.baseline = Some("geth".to_string());
        entry.endpoint = Some("besu".to_string());
        assert_eq!(entry.to_string(), r#"[  VALUE] result : geth="0x5" besu="0x6""#);
    }
}
