//! Validation of responses against declared result schemas
//!
//! Each endpoint is checked on its own; one endpoint failing validation
//! affects neither the diff nor the validation of the others.

use crate::dispatch::EndpointResponse;
use crate::error::{CompareError, CompareResult};
use crate::spec::ApiSpec;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

/// Validation errors for one endpoint's response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolation {
    pub endpoint: String,
    pub messages: Vec<String>,
}

/// Result schemas compiled once per run, shared read-only across calls
pub struct SchemaValidator {
    results: HashMap<String, JSONSchema>,
    error_object: JSONSchema,
}

impl SchemaValidator {
    /// Compile every declared result schema
    ///
    /// A schema that fails to compile aborts the run before dispatch.
    pub fn new(spec: &ApiSpec) -> CompareResult<Self> {
        let mut results = HashMap::new();

        for method in spec.methods.values() {
            let Some(schema) = &method.result_schema else {
                continue;
            };
            let compiled = JSONSchema::compile(schema).map_err(|e| CompareError::InvalidSchema {
                method: method.name.clone(),
                reason: e.to_string(),
            })?;
            results.insert(method.name.clone(), compiled);
        }
        debug!(schemas = results.len(), "Compiled result schemas");

        let error_schema = json!({
            "type": "object",
            "required": ["code", "message"],
            "properties": {
                "code": {"type": "integer"},
                "message": {"type": "string"}
            }
        });
        let error_object = JSONSchema::compile(&error_schema).map_err(|e| CompareError::InvalidSchema {
            method: "(json-rpc error object)".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            results,
            error_object,
        })
    }

    /// Whether a result schema is known for `method`
    pub fn has_schema(&self, method: &str) -> bool {
        self.results.contains_key(method)
    }

    /// Check one endpoint's response; `None` when it conforms or failed to arrive
    pub fn validate(&self, method: &str, response: &EndpointResponse) -> Option<SchemaViolation> {
        let body = response.body()?;
        let messages = self.check_body(method, body);

        if messages.is_empty() {
            None
        } else {
            Some(SchemaViolation {
                endpoint: response.endpoint.clone(),
                messages,
            })
        }
    }

    /// Validation messages for a decoded JSON-RPC response body
    pub fn check_body(&self, method: &str, body: &Value) -> Vec<String> {
        if let Some(error) = body.get("error") {
            return collect_errors(&self.error_object, error, "error");
        }

        match body.get("result") {
            Some(result) => match self.results.get(method) {
                Some(schema) => collect_errors(schema, result, "result"),
                None => Vec::new(),
            },
            None => vec!["response carries neither `result` nor `error`".to_string()],
        }
    }
}

fn collect_errors(schema: &JSONSchema, instance: &Value, root: &str) -> Vec<String> {
    match schema.validate(instance) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|error| format!("{}{}: {}", root, error.instance_path, error))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::spec::MethodSpec;

    fn spec() -> ApiSpec {
        ApiSpec::new([
            MethodSpec {
                name: "eth_blockNumber".to_string(),
                params: vec![],
                result_schema: Some(json!({"type": "string", "pattern": "^0x[0-9a-f]*$"})),
            },
            MethodSpec {
                name: "eth_syncing".to_string(),
                params: vec![],
                result_schema: Some(json!({
                    "oneOf": [
                        {"type": "boolean"},
                        {
                            "type": "object",
                            "required": ["startingBlock", "currentBlock", "highestBlock"]
                        }
                    ]
                })),
            },
            MethodSpec {
                name: "eth_feeHistory".to_string(),
                params: vec![],
                result_schema: Some(json!({
                    "type": "object",
                    "properties": {
                        "rewardPercentile": {"enum": ["low", "mid", "high"]}
                    }
                })),
            },
            MethodSpec::bare("web3_clientVersion"),
        ])
    }

    #[test]
    fn test_conforming_result() {
        let validator = SchemaValidator::new(&spec()).unwrap();
        let response = EndpointResponse::ok("geth", json!({"jsonrpc": "2.0", "id": 1, "result": "0x5"}));
        assert_eq!(validator.validate("eth_blockNumber", &response), None);
    }

    #[test]
    fn test_type_violation() {
        let validator = SchemaValidator::new(&spec()).unwrap();
        let response = EndpointResponse::ok("besu", json!({"result": 5}));

        let violation = validator.validate("eth_blockNumber", &response).unwrap();
        assert_eq!(violation.endpoint, "besu");
        assert_eq!(violation.messages.len(), 1);
        assert!(violation.messages[0].starts_with("result"));
    }

    #[test]
    fn test_required_field_violation() {
        let validator = SchemaValidator::new(&spec()).unwrap();
        let response = EndpointResponse::ok("besu", json!({"result": {"startingBlock": "0x0"}}));
        assert!(validator.validate("eth_syncing", &response).is_some());

        let response = EndpointResponse::ok("besu", json!({"result": false}));
        assert!(validator.validate("eth_syncing", &response).is_none());
    }

    #[test]
    fn test_enum_violation() {
        let validator = SchemaValidator::new(&spec()).unwrap();
        let response = EndpointResponse::ok("geth", json!({"result": {"rewardPercentile": "max"}}));
        let violation = validator.validate("eth_feeHistory", &response).unwrap();
        assert!(violation.messages[0].contains("rewardPercentile"));
    }

    #[test]
    fn test_method_without_schema_accepts_any_result() {
        let validator = SchemaValidator::new(&spec()).unwrap();
        assert!(!validator.has_schema("web3_clientVersion"));
        let response = EndpointResponse::ok("geth", json!({"result": {"anything": [1, 2]}}));
        assert!(validator.validate("web3_clientVersion", &response).is_none());
    }

    #[test]
    fn test_error_object_shape() {
        let validator = SchemaValidator::new(&spec()).unwrap();

        let well_formed = json!({"error": {"code": -32601, "message": "method not found"}});
        assert!(validator.check_body("eth_blockNumber", &well_formed).is_empty());

        let malformed = json!({"error": {"code": "oops"}});
        assert_eq!(validator.check_body("eth_blockNumber", &malformed).len(), 2);
    }

    #[test]
    fn test_body_without_result_or_error() {
        let validator = SchemaValidator::new(&spec()).unwrap();
        let messages = validator.check_body("eth_blockNumber", &json!({"jsonrpc": "2.0", "id": 1}));
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_failed_call_is_not_validated() {
        let validator = SchemaValidator::new(&spec()).unwrap();
        let response = EndpointResponse::failed("geth", TransportError::Timeout);
        assert!(validator.validate("eth_blockNumber", &response).is_none());
    }

    #[test]
    fn test_invalid_schema_is_fatal() {
        let spec = ApiSpec::new([MethodSpec {
            name: "eth_broken".to_string(),
            params: vec![],
            result_schema: Some(json!({"type": 12})),
        }]);

        let result = SchemaValidator::new(&spec);
        assert!(matches!(result, Err(CompareError::InvalidSchema { method, .. }) if method == "eth_broken"));
    }
}
