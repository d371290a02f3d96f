//! Configuration loading for rpcdiff
//!
//! Three inputs feed a comparison run:
//!
//! - `rpcdiff.yaml`, the run configuration ([`load_config`])
//! - a variant table of parameter arrays per method ([`load_variants`])
//! - an OpenRPC document describing params and result schemas ([`load_api_spec`])
//!
//! YAML files support two custom tags:
//!
//! - `!include path` - Include another YAML file
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use rpcdiff_config::{load_api_spec, load_config};
//!
//! let config = load_config("rpcdiff.yaml")?;
//! let registry = config.registry()?;
//! let variants = config.variant_table()?;
//! let spec = match config.api_spec_source() {
//!     Some(source) => Some(load_api_spec(&source).await?),
//!     None => None,
//! };
//! ```

mod error;
mod loader;
mod openrpc;
mod settings;
mod variants;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, YamlLoader};
pub use openrpc::{load_api_spec, parse_api_spec};
pub use settings::{load_config, parse_config, CompareConfig, ENV_CONCURRENCY, ENV_OUTPUT_DIR, ENV_TIMEOUT_SECS};
pub use variants::{load_variants, parse_variants};

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
