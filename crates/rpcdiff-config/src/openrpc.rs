//! OpenRPC API specification loading
//!
//! Reads an OpenRPC document from disk or over HTTP and flattens it into
//! [`ApiSpec`]: every local `$ref` is inlined so downstream consumers see
//! self-contained parameter and result schemas.

use crate::error::{ConfigError, ConfigResult};
use rpcdiff_core::{ApiSpec, MethodSpec, ParamSpec};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Load an OpenRPC document from a file path or an http(s) URL
#[instrument]
pub async fn load_api_spec(source: &str) -> ConfigResult<ApiSpec> {
    let document = if is_url(source) {
        fetch_document(source).await?
    } else {
        read_document(Path::new(source)).await?
    };

    let spec = parse_api_spec(&document)?;
    info!(methods = spec.len(), "Loaded API specification");
    Ok(spec)
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

async fn fetch_document(url: &str) -> ConfigResult<Value> {
    let fetch_error = |source| ConfigError::FetchSpec {
        url: url.to_string(),
        source,
    };

    reqwest::get(url)
        .await
        .and_then(|response| response.error_for_status())
        .map_err(fetch_error)?
        .json::<Value>()
        .await
        .map_err(fetch_error)
}

async fn read_document(path: &Path) -> ConfigResult<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

    serde_json::from_str(&content).map_err(|e| ConfigError::ParseJson {
        source_name: path.display().to_string(),
        source: e,
    })
}

/// Flatten an OpenRPC document into method declarations
pub fn parse_api_spec(document: &Value) -> ConfigResult<ApiSpec> {
    let methods = document
        .get("methods")
        .and_then(Value::as_array)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: "methods".to_string(),
            reason: "OpenRPC document has no methods array".to_string(),
        })?;

    let mut specs = Vec::with_capacity(methods.len());
    for (index, method) in methods.iter().enumerate() {
        let method = resolve_refs(document, method, &mut Vec::new())?;
        let name = method
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: format!("methods[{}]", index),
                reason: "method has no name".to_string(),
            })?
            .to_string();

        let params = match method.get("params") {
            Some(Value::Array(params)) => params
                .iter()
                .map(|param| param_spec(&name, param))
                .collect::<ConfigResult<Vec<_>>>()?,
            _ => Vec::new(),
        };

        let result_schema = method
            .get("result")
            .and_then(|result| result.get("schema"))
            .cloned();

        debug!(method = %name, params = params.len(), "Parsed method");
        specs.push(MethodSpec {
            name,
            params,
            result_schema,
        });
    }

    Ok(ApiSpec::new(specs))
}

fn param_spec(method: &str, param: &Value) -> ConfigResult<ParamSpec> {
    let name = param
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: format!("{}.params", method),
            reason: "parameter has no name".to_string(),
        })?;

    Ok(ParamSpec {
        name: name.to_string(),
        required: param
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        schema: param.get("schema").cloned().unwrap_or(Value::Null),
    })
}

/// Inline local `$ref`s; a reference cycle becomes the permissive schema `{}`
fn resolve_refs(document: &Value, value: &Value, stack: &mut Vec<String>) -> ConfigResult<Value> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                if stack.contains(reference) {
                    return Ok(json!({}));
                }
                let target = lookup(document, reference)?;
                stack.push(reference.clone());
                let resolved = resolve_refs(document, target, stack);
                stack.pop();
                return resolved;
            }

            let mut resolved = Map::with_capacity(map.len());
            for (key, child) in map {
                resolved.insert(key.clone(), resolve_refs(document, child, stack)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_refs(document, item, stack))
            .collect::<ConfigResult<Vec<_>>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn lookup<'a>(document: &'a Value, reference: &str) -> ConfigResult<&'a Value> {
    let pointer = reference
        .strip_prefix('#')
        .ok_or_else(|| ConfigError::InvalidValue {
            key: reference.to_string(),
            reason: "only document-local references are supported".to_string(),
        })?;

    document
        .pointer(pointer)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: reference.to_string(),
            reason: "reference target not found".to_string(),
        })
}
