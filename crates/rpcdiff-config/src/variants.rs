//! Parameter-variant tables
//!
//! ```yaml
//! eth_getBalance:
//!   - ["0x0000000000000000000000000000000000000000", "latest"]
//!   - ["0x0000000000000000000000000000000000000000", "0x0"]
//! eth_getBlockByNumber:
//!   - ["latest", false]
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::loader::YamlLoader;
use rpcdiff_core::VariantTable;
use serde_json::Value as JsonValue;
use serde_yaml::Value;
use std::path::Path;
use tracing::debug;

/// Load a variant table file (tags are resolved like in the main config)
pub fn load_variants(path: &Path) -> ConfigResult<VariantTable> {
    let config_dir = path.parent().unwrap_or(Path::new("."));
    let file = path.file_name().map(Path::new).unwrap_or(path);
    let mut loader = YamlLoader::new(config_dir);
    let value = loader.load_file(file)?;
    variants_from_yaml(value)
}

/// Parse a variant table from YAML text
pub fn parse_variants(content: &str) -> ConfigResult<VariantTable> {
    let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
        path: "<variants>".into(),
        source: e,
    })?;
    variants_from_yaml(value)
}

fn variants_from_yaml(value: Value) -> ConfigResult<VariantTable> {
    let mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(VariantTable::new()),
        _ => {
            return Err(ConfigError::InvalidValue {
                key: "variants".to_string(),
                reason: "variant table must be a mapping of method -> list of parameter arrays"
                    .to_string(),
            })
        }
    };

    let mut table = VariantTable::new();
    for (method, variants) in mapping {
        let method = match method {
            Value::String(method) => method,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: format!("{:?}", other),
                    reason: "method name must be a string".to_string(),
                })
            }
        };

        let variants = match variants {
            Value::Sequence(variants) => variants,
            Value::Null => Vec::new(),
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: method,
                    reason: "variants must be a list of parameter arrays".to_string(),
                })
            }
        };

        let mut parsed = Vec::with_capacity(variants.len());
        for (index, variant) in variants.into_iter().enumerate() {
            if !variant.is_sequence() {
                return Err(ConfigError::InvalidValue {
                    key: format!("{}[{}]", method, index),
                    reason: "each variant must be a parameter array".to_string(),
                });
            }
            let params: Vec<JsonValue> =
                serde_yaml::from_value(variant).map_err(|e| ConfigError::InvalidValue {
                    key: format!("{}[{}]", method, index),
                    reason: e.to_string(),
                })?;
            parsed.push(params);
        }

        debug!(method = %method, variants = parsed.len(), "Loaded parameter variants");
        table.insert(method, parsed);
    }

    Ok(table)
}
