// Schema model: parsing, navigation, and the compile/evaluate entry points

mod parser;
mod types;

pub use parser::ParseContext;
pub(crate) use parser::{anonymous_base_uri, json_type_name};
pub use types::{Schema, SchemaBody, SchemaRef};
pub(crate) use types::format_location;

use crate::error::{Error, SchemaError, SchemaResult};
use crate::keywords::{KeywordRegistry, STANDARD_KEYWORDS};
use crate::options::EvaluationOptions;
use crate::results::EvaluationResults;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

impl Schema {
    /// Parse schema text with the standard keyword set
    pub fn parse(text: &str) -> SchemaResult<SchemaRef> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Parse a JSON value with the standard keyword set.
    ///
    /// Without an absolute `$id` the schema gets a unique anonymous base URI.
    pub fn from_value(value: &Value) -> SchemaResult<SchemaRef> {
        Self::from_value_with(value, None, &STANDARD_KEYWORDS)
    }

    /// Parse a JSON value against a custom keyword registry and/or base URI
    pub fn from_value_with(
        value: &Value,
        base_uri: Option<&str>,
        keywords: &KeywordRegistry,
    ) -> SchemaResult<SchemaRef> {
        let base = match base_uri {
            Some(uri) => Url::parse(uri).map_err(|e| SchemaError::InvalidUri {
                uri: uri.to_string(),
                message: e.to_string(),
            })?,
            None => anonymous_base_uri()?,
        };
        ParseContext::new(keywords, base).parse(value)
    }

    /// Compile (through the cache) and evaluate `instance`.
    ///
    /// The result is projected to `options.output_format`.
    pub fn evaluate(
        self: &Arc<Self>,
        instance: &Value,
        options: &EvaluationOptions,
    ) -> Result<EvaluationResults, Error> {
        let compiled = self.compile(options)?;
        Ok(compiled.evaluate(instance, options)?)
    }
}
