use crate::{AssetCatalog, AssetRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Request parameter naming the asset to serve.
pub const SOURCE_PARAM: &str = "source";

/// A request parameter was missing or unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid parameter \"{param}\": {message}")]
pub struct ParamError {
    pub param: String,
    pub message: String,
}

impl ParamError {
    pub fn new(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            message: message.into(),
        }
    }
}

/// String-keyed request parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters holding only `source = name`.
    pub fn with_source(name: impl Into<String>) -> Self {
        let mut params = Self::new();
        params.set(SOURCE_PARAM, name.into());
        params
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Result<&str, ParamError> {
        match self.0.get(key) {
            None => Err(ParamError::new(key, "not set")),
            Some(Value::String(value)) => Ok(value.as_str()),
            Some(_) => Err(ParamError::new(key, "not a string")),
        }
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Resolves request parameters to an asset.
pub trait AssetServer: Send + Sync {
    fn serve(&self, params: &Params) -> Result<Arc<AssetRecord>, ParamError>;
}

/// [`AssetServer`] that serves the asset named by the `source` parameter.
#[derive(Debug, Clone)]
pub struct CatalogServer {
    catalog: Arc<AssetCatalog>,
}

impl CatalogServer {
    pub fn new(catalog: Arc<AssetCatalog>) -> Self {
        Self { catalog }
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<AssetCatalog> {
        &self.catalog
    }
}

impl AssetServer for CatalogServer {
    fn serve(&self, params: &Params) -> Result<Arc<AssetRecord>, ParamError> {
        let source = params.get_str(SOURCE_PARAM)?;
        self.catalog
            .get(source)
            .map_err(|err| ParamError::new(SOURCE_PARAM, err.to_string()))
    }
}
