//! Schema parser
//!
//! Turns a `serde_json::Value` into a tree of [`Schema`] nodes. Each keyword
//! value is handed to the parse function registered for its name; names with
//! no parser become unrecognized keywords.

use super::types::{Schema, SchemaBody, SchemaRef};
use crate::builder::CompiledCache;
use crate::error::{SchemaError, SchemaResult};
use crate::keywords::{self, KeywordRegistry};
use schema_pointer::{JsonPointer, PathSegment};
use serde_json::{Map, Value};
use std::sync::Arc;
use url::Url;

/// Host used for schemas that do not declare an absolute `$id`
const ANONYMOUS_HOST: &str = "https://json-schema.local/";

/// Parse state for one schema node: where it lives and how keywords are parsed.
pub struct ParseContext<'r> {
    keywords: &'r KeywordRegistry,
    base_uri: Url,
    location: JsonPointer,
}

impl<'r> ParseContext<'r> {
    pub(crate) fn new(keywords: &'r KeywordRegistry, base_uri: Url) -> Self {
        Self {
            keywords,
            base_uri,
            location: JsonPointer::new(),
        }
    }

    /// Base URI in effect for the node being parsed
    pub fn base_uri(&self) -> &Url {
        &self.base_uri
    }

    /// Location of the node being parsed inside its resource
    pub fn location(&self) -> &JsonPointer {
        &self.location
    }

    /// Parse a nested schema found at `segments` below the current node
    pub fn parse_subschema<I, S>(&self, value: &Value, segments: I) -> SchemaResult<SchemaRef>
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        let child = ParseContext {
            keywords: self.keywords,
            base_uri: self.base_uri.clone(),
            location: self.location.join(&JsonPointer::from_segments(segments)),
        };
        child.parse(value)
    }

    /// Error for a malformed keyword value at the current node
    pub fn invalid_value(&self, keyword: &str, message: impl Into<String>) -> SchemaError {
        SchemaError::InvalidKeywordValue {
            keyword: keyword.to_string(),
            location: self.location.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn parse(&self, value: &Value) -> SchemaResult<SchemaRef> {
        match value {
            Value::Bool(b) => Ok(Arc::new(Schema {
                body: SchemaBody::Bool(*b),
                base_uri: self.base_uri.clone(),
                location: self.location.clone(),
                id: None,
                anchors: Vec::new(),
                dynamic_anchor: None,
                recursive_anchor: false,
                dialect: None,
                compiled: CompiledCache::default(),
            })),
            Value::Object(map) => self.parse_object(map),
            other => Err(SchemaError::InvalidSchemaType {
                location: self.location.to_string(),
                got: json_type_name(other).to_string(),
            }),
        }
    }

    fn parse_object(&self, map: &Map<String, Value>) -> SchemaResult<SchemaRef> {
        let mut node = ParseContext {
            keywords: self.keywords,
            base_uri: self.base_uri.clone(),
            location: self.location.clone(),
        };
        let mut id = None;
        let mut anchors = Vec::new();

        if let Some(Value::String(raw)) = map.get("$id") {
            // `"$id": "#name"` is the draft 6/7 spelling of an anchor
            if let Some(name) = raw.strip_prefix('#') {
                if !name.is_empty() {
                    anchors.push(name.to_string());
                }
            } else {
                let mut resolved = self.base_uri.join(raw).map_err(|e| SchemaError::InvalidUri {
                    uri: raw.clone(),
                    message: e.to_string(),
                })?;
                if let Some(fragment) = resolved.fragment()
                    && !fragment.is_empty()
                {
                    anchors.push(fragment.to_string());
                }
                resolved.set_fragment(None);
                node.base_uri = resolved.clone();
                node.location = JsonPointer::new();
                id = Some(resolved);
            }
        }
        for key in ["$anchor", "$dynamicAnchor"] {
            if let Some(Value::String(name)) = map.get(key) {
                anchors.push(name.clone());
            }
        }
        let dynamic_anchor = map.get("$dynamicAnchor").and_then(Value::as_str).map(str::to_string);
        let recursive_anchor = map.get("$recursiveAnchor").and_then(Value::as_bool).unwrap_or(false);

        let mut keywords = Vec::with_capacity(map.len());
        for (name, value) in map {
            let parser = self
                .keywords
                .get(name)
                .unwrap_or(keywords::parse_unrecognized);
            keywords.push(parser(name, value, &node)?);
        }

        Ok(Arc::new(Schema {
            body: SchemaBody::Keywords(keywords),
            base_uri: node.base_uri,
            location: node.location,
            id,
            anchors,
            dynamic_anchor,
            recursive_anchor,
            dialect: map.get("$schema").and_then(Value::as_str).map(str::to_string),
            compiled: CompiledCache::default(),
        }))
    }
}

/// A fresh base URI for a schema without an absolute `$id`
pub(crate) fn anonymous_base_uri() -> SchemaResult<Url> {
    let uri = format!("{}{}", ANONYMOUS_HOST, uuid::Uuid::new_v4());
    Url::parse(&uri).map_err(|e| SchemaError::InvalidUri {
        uri,
        message: e.to_string(),
    })
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::STANDARD_KEYWORDS;
    use serde_json::json;

    fn parse(value: Value) -> SchemaRef {
        let base = Url::parse("https://example.com/root.json").unwrap();
        ParseContext::new(&STANDARD_KEYWORDS, base).parse(&value).unwrap()
    }

    #[test]
    fn test_boolean_schema() {
        let schema = parse(json!(false));
        assert_eq!(schema.as_bool(), Some(false));
        assert!(schema.keywords().is_empty());
    }

    #[test]
    fn test_rejects_non_schema_values() {
        let base = Url::parse("https://example.com/root.json").unwrap();
        let err = ParseContext::new(&STANDARD_KEYWORDS, base)
            .parse(&json!({"properties": {"a": 5}}))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::InvalidSchemaType {
                location: "/properties/a".to_string(),
                got: "integer".to_string()
            }
        );
    }

    #[test]
    fn test_keywords_keep_declaration_order() {
        let schema = parse(json!({"type": "object", "required": ["a"], "title": "T"}));
        let names: Vec<&str> = schema.keywords().iter().map(|k| k.name()).collect();
        assert_eq!(names, vec!["type", "required", "title"]);
    }

    #[test]
    fn test_embedded_id_changes_base() {
        let schema = parse(json!({
            "$defs": {"inner": {"$id": "inner.json", "type": "string"}}
        }));
        let pointer = JsonPointer::parse("/$defs/inner").unwrap();
        let inner = schema.find_subschema(&pointer).unwrap();
        assert_eq!(inner.base_uri().as_str(), "https://example.com/inner.json");
        assert!(inner.location().is_empty());
        assert_eq!(inner.schema_location(), "https://example.com/inner.json#");
    }

    #[test]
    fn test_anchor_forms() {
        let schema = parse(json!({
            "$defs": {
                "a": {"$anchor": "first"},
                "b": {"$id": "#legacy"},
                "c": {"$dynamicAnchor": "dyn"}
            }
        }));
        for name in ["first", "legacy", "dyn"] {
            assert!(schema.find_anchor(name).is_some(), "anchor {name}");
        }
        assert!(schema.find_anchor("missing").is_none());
    }

    #[test]
    fn test_unknown_keyword_is_kept() {
        let schema = parse(json!({"x-custom": {"any": 1}}));
        assert_eq!(schema.keywords()[0].name(), "x-custom");
    }

    #[test]
    fn test_anonymous_base_is_unique() {
        let a = anonymous_base_uri().unwrap();
        let b = anonymous_base_uri().unwrap();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(ANONYMOUS_HOST));
    }
}
