//! Comparison run configuration
//!
//! Parses `rpcdiff.yaml`: the endpoint list, which methods to compare, where
//! variants and the API specification live, and the run knobs.

use indexmap::IndexMap;
use rpcdiff_core::{ApiSpec, EndpointRegistry, RunSettings, VariantTable};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use serde_yaml::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::loader::YamlLoader;
use crate::variants::load_variants;

pub const ENV_CONCURRENCY: &str = "RPCDIFF_CONCURRENCY";
pub const ENV_TIMEOUT_SECS: &str = "RPCDIFF_TIMEOUT_SECS";
pub const ENV_OUTPUT_DIR: &str = "RPCDIFF_OUTPUT_DIR";

/// Top-level configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct CompareConfig {
    /// Endpoint name -> URL, in comparison order
    pub endpoints: IndexMap<String, String>,

    /// Methods to compare; empty means every method the API spec declares
    #[serde(default)]
    pub methods: Vec<String>,

    /// Single parameter array per method, used when no variant is configured
    #[serde(default)]
    pub custom_params: IndexMap<String, Vec<JsonValue>>,

    /// Variant table file
    #[serde(default)]
    pub variants: Option<PathBuf>,

    /// OpenRPC document, path or http(s) URL
    #[serde(default)]
    pub api_spec: Option<String>,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_validate_schema")]
    pub validate_schema: bool,

    /// 0 sends one request per call
    #[serde(default)]
    pub batch_size: usize,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_concurrency() -> usize {
    rpcdiff_core::config::DEFAULT_CONCURRENCY
}

fn default_timeout_secs() -> u64 {
    rpcdiff_core::config::DEFAULT_TIMEOUT.as_secs()
}

fn default_validate_schema() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

/// Load, override from the environment, and validate a configuration file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<CompareConfig> {
    let path = path.as_ref();
    let base_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file = path.file_name().map(Path::new).unwrap_or(path);

    let mut loader = YamlLoader::new(base_dir);
    let yaml = loader.load_file(file)?;

    let mut config = CompareConfig::from_yaml(yaml)?;
    config.base_dir = base_dir.to_path_buf();
    config.apply_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;

    debug!(
        endpoints = config.endpoints.len(),
        methods = config.methods.len(),
        "Loaded comparison configuration"
    );
    Ok(config)
}

/// Parse configuration text; tags resolve against the working directory
pub fn parse_config(content: &str) -> ConfigResult<CompareConfig> {
    let mut loader = YamlLoader::new(".");
    let yaml = loader.load_string(content, Path::new("<config>"))?;
    let mut config = CompareConfig::from_yaml(yaml)?;
    config.base_dir = PathBuf::from(".");
    Ok(config)
}

impl CompareConfig {
    /// Parse from an already tag-processed YAML value
    pub fn from_yaml(yaml: Value) -> ConfigResult<Self> {
        if !yaml.is_mapping() {
            return Err(ConfigError::InvalidValue {
                key: "root".to_string(),
                reason: "configuration must be a mapping".to_string(),
            });
        }

        serde_yaml::from_value(yaml).map_err(|e| ConfigError::InvalidValue {
            key: "root".to_string(),
            reason: e.to_string(),
        })
    }

    /// Apply `RPCDIFF_*` overrides looked up through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_CONCURRENCY) {
            self.concurrency = parse_override(ENV_CONCURRENCY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = parse_override(ENV_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(raw);
        }
        Ok(())
    }

    /// Check the values the engine cannot run without
    pub fn validate(&self) -> ConfigResult<()> {
        self.registry()?;

        if self.concurrency == 0 {
            return Err(ConfigError::ValidationFailed {
                message: "concurrency must be at least 1".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed {
                message: "timeout_secs must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn registry(&self) -> ConfigResult<EndpointRegistry> {
        EndpointRegistry::new(
            self.endpoints
                .iter()
                .map(|(name, url)| (name.clone(), url.clone())),
        )
        .map_err(|e| ConfigError::ValidationFailed {
            message: e.to_string(),
        })
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            concurrency: self.concurrency,
            timeout: Duration::from_secs(self.timeout_secs),
            validate_schema: self.validate_schema,
            batch_size: self.batch_size,
        }
    }

    /// Resolve a configured path against the config file's directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// API spec source with file paths resolved; URLs pass through
    pub fn api_spec_source(&self) -> Option<String> {
        self.api_spec.as_ref().map(|source| {
            if source.starts_with("http://") || source.starts_with("https://") {
                source.clone()
            } else {
                self.resolve(Path::new(source)).display().to_string()
            }
        })
    }

    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    /// The variant file merged with `custom_params`
    ///
    /// A method present in both keeps its variant-file entry.
    pub fn variant_table(&self) -> ConfigResult<VariantTable> {
        let mut table = match &self.variants {
            Some(path) => load_variants(&self.resolve(path))?,
            None => VariantTable::new(),
        };

        for (method, params) in &self.custom_params {
            if table.contains_key(method) {
                debug!(method = %method, "Variant table overrides custom params");
                continue;
            }
            table.insert(method.clone(), vec![params.clone()]);
        }

        Ok(table)
    }

    /// Method names to compare, in order, without repeats
    ///
    /// Configured methods win. Without them every method declared by the API
    /// spec is compared, and without a spec every method in the variant table.
    pub fn methods_to_compare(&self, spec: Option<&ApiSpec>, variants: &VariantTable) -> Vec<String> {
        if !self.methods.is_empty() {
            if let Some(spec) = spec {
                for method in self.methods.iter().filter(|m| spec.get(m).is_none()) {
                    warn!(method = %method, "Method not declared in API spec, comparing without params or schema");
                }
            }
            let mut seen = HashSet::new();
            return self
                .methods
                .iter()
                .filter(|method| seen.insert(method.as_str()))
                .cloned()
                .collect();
        }

        match spec {
            Some(spec) => spec.method_names(),
            None => variants.keys().cloned().collect(),
        }
    }
}

fn parse_override<T: std::str::FromStr>(name: &str, raw: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: name.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcdiff_core::MethodSpec;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn parse(yaml: &str) -> ConfigResult<CompareConfig> {
        parse_config(yaml)
    }

    #[test]
    fn test_defaults() {
        let config = parse("endpoints:\n  geth: http://127.0.0.1:8545\n").unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.validate_schema);
        assert_eq!(config.batch_size, 0);
        assert_eq!(config.output_dir, PathBuf::from("reports"));
        assert!(config.methods.is_empty());

        let settings = config.run_settings();
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.concurrency, 8);
    }

    #[test]
    fn test_missing_endpoints_rejected() {
        assert!(parse("concurrency: 4\n").is_err());
        assert!(parse("- geth\n").is_err());
    }

    #[test]
    fn test_validation() {
        let empty = parse("endpoints: {}\n").unwrap();
        assert!(matches!(empty.validate(), Err(ConfigError::ValidationFailed { .. })));

        let bad_url = parse("endpoints:\n  geth: ws://127.0.0.1:8546\n").unwrap();
        assert!(matches!(bad_url.validate(), Err(ConfigError::ValidationFailed { .. })));

        let zero = parse("endpoints:\n  geth: http://127.0.0.1:8545\nconcurrency: 0\n").unwrap();
        assert!(matches!(zero.validate(), Err(ConfigError::ValidationFailed { .. })));

        let zero = parse("endpoints:\n  geth: http://127.0.0.1:8545\ntimeout_secs: 0\n").unwrap();
        assert!(matches!(zero.validate(), Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn test_overrides() {
        let mut config = parse("endpoints:\n  geth: http://127.0.0.1:8545\n").unwrap();
        config
            .apply_overrides(|name| match name {
                ENV_CONCURRENCY => Some("3".to_string()),
                ENV_OUTPUT_DIR => Some("/tmp/rpcdiff".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/rpcdiff"));

        let result = config.apply_overrides(|name| {
            (name == ENV_TIMEOUT_SECS).then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == ENV_TIMEOUT_SECS));
    }

    #[test]
    fn test_load_config_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("variants.yaml"),
            "eth_getBalance:\n  - [\"0xabc\", \"latest\"]\n  - [\"0xabc\", \"0x0\"]\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("rpcdiff.yaml"),
            r#"
endpoints:
  geth: http://127.0.0.1:8545
  besu: http://127.0.0.1:8546
methods: [eth_getBalance, eth_getCode]
custom_params:
  eth_getBalance: ["0xdef", "latest"]
  eth_getCode: ["0xdef", "latest"]
variants: variants.yaml
api_spec: openrpc.json
"#,
        )
        .unwrap();

        let config = load_config(dir.path().join("rpcdiff.yaml")).unwrap();
        assert_eq!(config.registry().unwrap().names(), vec!["geth", "besu"]);
        assert_eq!(
            config.api_spec_source().unwrap(),
            dir.path().join("openrpc.json").display().to_string()
        );
        assert_eq!(config.output_path(), dir.path().join("reports"));

        let table = config.variant_table().unwrap();
        assert_eq!(table["eth_getBalance"].len(), 2);
        assert_eq!(table["eth_getCode"], vec![vec![json!("0xdef"), json!("latest")]]);
    }

    #[test]
    fn test_remote_api_spec_passes_through() {
        let config = parse(
            "endpoints:\n  geth: http://127.0.0.1:8545\napi_spec: https://example.org/openrpc.json\n",
        )
        .unwrap();
        assert_eq!(
            config.api_spec_source().as_deref(),
            Some("https://example.org/openrpc.json")
        );
    }

    #[test]
    fn test_methods_to_compare() {
        let spec = ApiSpec::new(vec![MethodSpec::bare("eth_chainId"), MethodSpec::bare("net_version")]);
        let mut variants = VariantTable::new();
        variants.insert("eth_getBalance".to_string(), Vec::new());

        let config = parse("endpoints:\n  geth: http://127.0.0.1:8545\n").unwrap();
        assert_eq!(
            config.methods_to_compare(Some(&spec), &variants),
            vec!["eth_chainId", "net_version"]
        );
        assert_eq!(config.methods_to_compare(None, &variants), vec!["eth_getBalance"]);

        let config = parse(
            "endpoints:\n  geth: http://127.0.0.1:8545\nmethods: [debug_traceCall, eth_chainId]\n",
        )
        .unwrap();
        assert_eq!(
            config.methods_to_compare(Some(&spec), &variants),
            vec!["debug_traceCall", "eth_chainId"]
        );
    }

    #[test]
    fn test_repeated_methods_compared_once() {
        let config = parse(
            "endpoints:\n  geth: http://127.0.0.1:8545\nmethods: [eth_chainId, net_version, eth_chainId]\n",
        )
        .unwrap();
        assert_eq!(
            config.methods_to_compare(None, &VariantTable::new()),
            vec!["eth_chainId", "net_version"]
        );
    }
}
