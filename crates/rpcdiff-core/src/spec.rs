//! Method, parameter and result-schema declarations consumed by the engine
//!
//! These are the already-expanded structures of an API specification
//! document; loading and `$ref` resolution live in `rpcdiff-config`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Method name -> ordered list of parameter-variant arrays
pub type VariantTable = IndexMap<String, Vec<Vec<Value>>>;

/// One declared method parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    /// JSON schema of the parameter; may carry a `default`
    #[serde(default)]
    pub schema: Value,
}

/// One declared method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSpec {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    /// Schema of the `result` member, if the specification declares one
    #[serde(default)]
    pub result_schema: Option<Value>,
}

impl MethodSpec {
    /// A method with no parameters and no result schema
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            result_schema: None,
        }
    }
}

/// All methods of an API specification, in document order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec {
    pub methods: IndexMap<String, MethodSpec>,
}

impl ApiSpec {
    pub fn new(methods: impl IntoIterator<Item = MethodSpec>) -> Self {
        Self {
            methods: methods
                .into_iter()
                .map(|method| (method.name.clone(), method))
                .collect(),
        }
    }

    pub fn get(&self, method: &str) -> Option<&MethodSpec> {
        self.methods.get(method)
    }

    /// Method names in document order
    pub fn method_names(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
