//! YAML loader with custom tag support
//!
//! Supported tags:
//! - `!include path` - Include another YAML file, relative to the including file
//! - `!env_var VAR [default]` - Environment variable substitution

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader that resolves `!include` and `!env_var`
pub struct YamlLoader {
    /// Base directory for resolving relative paths
    config_dir: PathBuf,
    /// Track included files to detect circular includes
    include_stack: HashSet<PathBuf>,
}

impl YamlLoader {
    /// Create a new YAML loader rooted at `config_dir`
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            include_stack: HashSet::new(),
        }
    }

    /// Load and process a YAML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        debug!("Loading YAML file: {:?}", path);

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);

        result
    }

    /// Load and process YAML from a string
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value, source_path)
    }

    /// Process a YAML value, handling custom tags
    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    let processed_key = self.process_value(k, source_path)?;
                    let processed_value = self.process_value(v, source_path)?;
                    result.insert(processed_key, processed_value);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => {
                let result: ConfigResult<Vec<Value>> = seq
                    .into_iter()
                    .map(|v| self.process_value(v, source_path))
                    .collect();
                Ok(Value::Sequence(result?))
            }
            _ => Ok(value),
        }
    }

    /// Process a tagged value
    fn process_tagged(
        &mut self,
        tagged: serde_yaml::value::TaggedValue,
        source_path: &Path,
    ) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        let value = tagged.value;

        trace!("Processing tag '{}' with value {:?}", tag, value);

        match tag.as_str() {
            "!include" => self.process_include(value, source_path),
            "!env_var" => self.process_env_var(value),
            _ => Err(ConfigError::InvalidValue {
                key: tag,
                reason: "unsupported YAML tag".to_string(),
            }),
        }
    }

    /// Process !include tag
    fn process_include(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        let include_path = self.value_to_path(&value, source_path)?;
        if !include_path.exists() {
            return Err(ConfigError::IncludeNotFound { path: include_path });
        }
        debug!("Including file: {:?}", include_path);
        self.load_file(&include_path)
    }

    /// Process !env_var tag, `!env_var NAME` or `!env_var NAME fallback`
    fn process_env_var(&self, value: Value) -> ConfigResult<Value> {
        let spec = match value {
            Value::String(s) => s,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "!env_var".to_string(),
                    reason: "environment variable name must be a string".to_string(),
                })
            }
        };

        let (var_name, fallback) = match spec.trim().split_once(char::is_whitespace) {
            Some((name, fallback)) => (name.to_string(), Some(fallback.trim().to_string())),
            None => (spec.trim().to_string(), None),
        };

        let env_value = match (std::env::var(&var_name), fallback) {
            (Ok(value), _) => value,
            (Err(_), Some(fallback)) => fallback,
            (Err(_), None) => return Err(ConfigError::EnvVarNotFound { var: var_name }),
        };

        debug!("Substituted env var: {}", var_name);
        Ok(Value::String(env_value))
    }

    /// Convert a YAML value to a path, resolving relative to source file
    fn value_to_path(&self, value: &Value, source_path: &Path) -> ConfigResult<PathBuf> {
        let path_str = match value {
            Value::String(s) => s.clone(),
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "!include".to_string(),
                    reason: format!("path must be a string, got {:?}", value),
                })
            }
        };

        let base_dir = source_path.parent().unwrap_or(&self.config_dir);
        let resolved = if Path::new(&path_str).is_absolute() {
            PathBuf::from(&path_str)
        } else {
            base_dir.join(&path_str)
        };

        Ok(resolved)
    }

    /// Resolve a path relative to the config directory
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }
}

/// Load a YAML file with tag processing
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    let mut loader = YamlLoader::new(config_dir);
    loader.load_file(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = fs::File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn get<'a>(value: &'a Value, key: &str) -> &'a Value {
        value
            .as_mapping()
            .unwrap()
            .get(&Value::String(key.to_string()))
            .unwrap()
    }

    #[test]
    fn test_load_simple_yaml() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "rpcdiff.yaml",
            r#"
endpoints:
  geth: http://127.0.0.1:8545
concurrency: 4
"#,
        );

        let value = load_yaml(dir.path(), "rpcdiff.yaml").unwrap();
        assert!(value.is_mapping());
    }

    #[test]
    fn test_include() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "nodes/endpoints.yaml",
            "geth: http://127.0.0.1:8545\nbesu: http://127.0.0.1:8546\n",
        );
        write_file(
            dir.path(),
            "rpcdiff.yaml",
            "endpoints: !include nodes/endpoints.yaml\n",
        );

        let value = load_yaml(dir.path(), "rpcdiff.yaml").unwrap();
        let endpoints = get(&value, "endpoints");
        assert_eq!(
            get(endpoints, "besu"),
            &Value::String("http://127.0.0.1:8546".to_string())
        );
    }

    #[test]
    fn test_missing_include() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "rpcdiff.yaml", "endpoints: !include nope.yaml\n");

        let result = load_yaml(dir.path(), "rpcdiff.yaml");
        assert!(matches!(result, Err(ConfigError::IncludeNotFound { .. })));
    }

    #[test]
    fn test_circular_include() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "b: !include b.yaml\n");
        write_file(dir.path(), "b.yaml", "a: !include a.yaml\n");

        let result = load_yaml(dir.path(), "a.yaml");
        assert!(matches!(result, Err(ConfigError::CircularInclude { .. })));
    }

    #[test]
    fn test_env_var() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("RPCDIFF_TEST_GETH_URL", "http://10.0.0.5:8545");
        write_file(
            dir.path(),
            "rpcdiff.yaml",
            "geth: !env_var RPCDIFF_TEST_GETH_URL\n",
        );

        let value = load_yaml(dir.path(), "rpcdiff.yaml").unwrap();
        assert_eq!(
            get(&value, "geth"),
            &Value::String("http://10.0.0.5:8545".to_string())
        );

        std::env::remove_var("RPCDIFF_TEST_GETH_URL");
    }

    #[test]
    fn test_env_var_fallback_and_missing() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "with_default.yaml",
            "besu: !env_var RPCDIFF_TEST_UNSET_VAR http://127.0.0.1:8546\n",
        );
        write_file(
            dir.path(),
            "without_default.yaml",
            "besu: !env_var RPCDIFF_TEST_UNSET_VAR\n",
        );

        let value = load_yaml(dir.path(), "with_default.yaml").unwrap();
        assert_eq!(
            get(&value, "besu"),
            &Value::String("http://127.0.0.1:8546".to_string())
        );

        let result = load_yaml(dir.path(), "without_default.yaml");
        assert!(matches!(result, Err(ConfigError::EnvVarNotFound { var }) if var == "RPCDIFF_TEST_UNSET_VAR"));
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "rpcdiff.yaml", "token: !secret api_token\n");

        let result = load_yaml(dir.path(), "rpcdiff.yaml");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
