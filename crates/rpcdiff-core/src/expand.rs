//! Parameter-variant expansion
//!
//! Turns a method name plus its variant table entry (or its declared
//! parameters) into concrete call descriptors. Expansion is a pure function
//! of its inputs, so repeated runs produce identical descriptors in
//! identical order.

use crate::spec::{ApiSpec, MethodSpec, VariantTable};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One concrete (method, parameter tuple) unit of comparison work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDescriptor {
    pub method: String,
    pub params: Vec<Value>,
    /// Human-readable id, e.g. `eth_getBalance_variant2`
    pub variant_label: String,
}

impl CallDescriptor {
    pub fn new(method: impl Into<String>, params: Vec<Value>, variant_label: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params,
            variant_label: variant_label.into(),
        }
    }
}

/// Expand one method into its call descriptors
///
/// - listed variants win: one descriptor per variant, `{method}_variant{N}`
///   (1-indexed)
/// - otherwise declared parameters yield a single `{method}_default`
///   descriptor filled from schema defaults or zero values
/// - otherwise a single parameterless descriptor labelled `{method}`
pub fn expand(
    method: &str,
    variants: Option<&[Vec<Value>]>,
    spec: Option<&MethodSpec>,
) -> Vec<CallDescriptor> {
    if let Some(variants) = variants.filter(|v| !v.is_empty()) {
        return variants
            .iter()
            .enumerate()
            .map(|(index, params)| {
                CallDescriptor::new(
                    method,
                    params.clone(),
                    format!("{}_variant{}", method, index + 1),
                )
            })
            .collect();
    }

    match spec {
        Some(spec) if !spec.params.is_empty() => {
            let params = spec
                .params
                .iter()
                .map(|param| default_param(&param.schema))
                .collect();
            vec![CallDescriptor::new(method, params, format!("{}_default", method))]
        }
        _ => vec![CallDescriptor::new(method, Vec::new(), method)],
    }
}

/// Expand every method, in the given order
pub fn expand_methods(
    methods: &[String],
    variants: &VariantTable,
    spec: Option<&ApiSpec>,
) -> Vec<CallDescriptor> {
    methods
        .iter()
        .flat_map(|method| {
            expand(
                method,
                variants.get(method).map(Vec::as_slice),
                spec.and_then(|s| s.get(method)),
            )
        })
        .collect()
}

/// The schema's `default`, or the zero value of its type
pub fn default_param(schema: &Value) -> Value {
    schema
        .get("default")
        .cloned()
        .unwrap_or_else(|| zero_value(schema))
}

/// Zero value for a JSON schema type
///
/// For a type list (`["string", "null"]`) the first non-null type is used.
pub fn zero_value(schema: &Value) -> Value {
    let declared = match schema.get("type") {
        Some(Value::String(ty)) => Some(ty.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|ty| *ty != "null"),
        _ => None,
    };

    match declared {
        Some("string") => Value::String(String::new()),
        Some("integer") | Some("number") => Value::from(0),
        Some("boolean") => Value::Bool(false),
        Some("array") => Value::Array(Vec::new()),
        Some("object") => Value::Object(Map::new()),
        _ => Value::Null,
    }
}
