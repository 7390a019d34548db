// Annotation-only keywords: meta-data, content, and unrecognized keywords

use super::{Keyword, KeywordRegistry, single_at};
use crate::builder::BuildContext;
use crate::constraint::KeywordConstraint;
use crate::error::SchemaResult;
use crate::schema::{ParseContext, SchemaRef};
use crate::spec_version::{SpecVersion, SpecVersions};
use crate::vocabulary::vocab;
use serde_json::Value;
use std::any::Any;

pub(super) fn register(registry: &mut KeywordRegistry) {
    for name in [
        "title",
        "description",
        "default",
        "examples",
        "deprecated",
        "readOnly",
        "writeOnly",
        "contentMediaType",
        "contentEncoding",
    ] {
        registry.register(name, parse_annotation);
    }
    registry.register("contentSchema", parse_content_schema);
}

/// Produces its schema value as the annotation, wherever it is evaluated
#[derive(Debug)]
pub struct AnnotationKeyword {
    name: String,
    value: Value,
}

impl AnnotationKeyword {
    pub fn value(&self) -> &Value {
        &self.value
    }
}

fn parse_annotation(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let well_formed = match name {
        "title" | "description" | "contentMediaType" | "contentEncoding" => value.is_string(),
        "deprecated" | "readOnly" | "writeOnly" => value.is_boolean(),
        "examples" => value.is_array(),
        _ => true,
    };
    if !well_formed {
        return Err(ctx.invalid_value(name, "value has the wrong type"));
    }
    Ok(Box::new(AnnotationKeyword {
        name: name.to_string(),
        value: value.clone(),
    }))
}

fn annotate_with(name: &str, value: &Value) -> KeywordConstraint {
    let value = value.clone();
    KeywordConstraint::new(name, move |kc| {
        kc.annotate(value.clone());
        Ok(())
    })
}

impl Keyword for AnnotationKeyword {
    fn name(&self) -> &str {
        &self.name
    }

    fn spec_versions(&self) -> SpecVersions {
        match self.name.as_str() {
            "deprecated" => SpecVersions::since(SpecVersion::Draft201909),
            "readOnly" | "writeOnly" | "contentMediaType" | "contentEncoding" => {
                SpecVersions::since(SpecVersion::Draft7)
            }
            _ => SpecVersions::ALL,
        }
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        match self.name.as_str() {
            "contentMediaType" | "contentEncoding" => vocab::CONTENT,
            _ => vocab::META_DATA,
        }
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        Ok(annotate_with(&self.name, &self.value))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `contentSchema` describes decoded content; it is annotated, never applied
#[derive(Debug)]
pub struct ContentSchemaKeyword {
    schema: SchemaRef,
    raw: Value,
}

fn parse_content_schema(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(ContentSchemaKeyword {
        schema: ctx.parse_subschema(value, [name])?,
        raw: value.clone(),
    }))
}

impl Keyword for ContentSchemaKeyword {
    fn name(&self) -> &str {
        "contentSchema"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::since(SpecVersion::Draft201909)
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::CONTENT
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        Ok(annotate_with("contentSchema", &self.raw))
    }

    fn subschemas(&self) -> Vec<&SchemaRef> {
        vec![&self.schema]
    }

    fn subschema_at(&self, rest: &[String]) -> Option<(&SchemaRef, usize)> {
        single_at(&self.schema, rest)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A keyword no parser is registered for
#[derive(Debug)]
pub struct UnrecognizedKeyword {
    name: String,
    value: Value,
}

impl UnrecognizedKeyword {
    pub fn value(&self) -> &Value {
        &self.value
    }
}

pub(crate) fn parse_unrecognized(
    name: &str,
    value: &Value,
    _ctx: &ParseContext<'_>,
) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(UnrecognizedKeyword {
        name: name.to_string(),
        value: value.clone(),
    }))
}

impl Keyword for UnrecognizedKeyword {
    fn name(&self) -> &str {
        &self.name
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let value = self.value.clone();
        Ok(KeywordConstraint::new(&self.name, move |kc| {
            if kc.options().add_annotation_for_unknown_keywords {
                kc.annotate(value.clone());
            }
            Ok(())
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::options::EvaluationOptions;
    use crate::output::OutputFormat;
    use crate::schema::Schema;
    use crate::spec_version::SpecVersion;
    use serde_json::json;

    fn hierarchical() -> EvaluationOptions {
        EvaluationOptions::default().with_output_format(OutputFormat::Hierarchical)
    }

    #[test]
    fn test_meta_data_annotations() {
        let schema = Schema::from_value(&json!({
            "title": "Person",
            "default": {"name": "anon"},
            "deprecated": true
        }))
        .unwrap();
        let results = schema.evaluate(&json!({}), &hierarchical()).unwrap();
        assert_eq!(results.annotation("title"), Some(&json!("Person")));
        assert_eq!(results.annotation("default"), Some(&json!({"name": "anon"})));
        assert_eq!(results.annotation("deprecated"), Some(&json!(true)));

        let draft7 = schema
            .evaluate(&json!({}), &hierarchical().with_evaluate_as(SpecVersion::Draft7))
            .unwrap();
        assert!(draft7.annotation("deprecated").is_none());
    }

    #[test]
    fn test_content_schema_is_not_applied() {
        let schema = Schema::from_value(&json!({
            "contentMediaType": "application/json",
            "contentSchema": {"type": "object"}
        }))
        .unwrap();
        let results = schema.evaluate(&json!("[1, 2]"), &hierarchical()).unwrap();
        assert!(results.is_valid());
        assert_eq!(results.annotation("contentSchema"), Some(&json!({"type": "object"})));
        assert!(results.details().is_empty());
    }

    #[test]
    fn test_unknown_keywords_annotate_on_request() {
        let schema = Schema::from_value(&json!({"x-unit": "cm"})).unwrap();
        let quiet = schema.evaluate(&json!(1), &hierarchical()).unwrap();
        assert!(quiet.annotations().is_empty());

        let options = hierarchical().with_annotations_for_unknown_keywords(true);
        let loud = schema.evaluate(&json!(1), &options).unwrap();
        assert_eq!(loud.annotation("x-unit"), Some(&json!("cm")));
    }

    #[test]
    fn test_malformed_title() {
        assert!(Schema::from_value(&json!({"title": 5})).is_err());
    }
}
