// Object applicators: properties, patternProperties, additionalProperties, propertyNames

use super::{Keyword, KeywordRegistry, keyed_at, schema_map, single_at};
use crate::builder::{BuildContext, find_sibling};
use crate::constraint::{InstanceTarget, KeywordConstraint, ShortCircuit, SubschemaConstraint};
use crate::error::{SchemaError, SchemaResult};
use crate::evaluator::{KeywordContext, KeywordEvaluation};
use crate::schema::{ParseContext, SchemaRef};
use crate::spec_version::{SpecVersion, SpecVersions};
use crate::vocabulary::vocab;
use indexmap::IndexMap;
use regex::Regex;
use schema_pointer::JsonPointer;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashSet;

pub(super) fn register(registry: &mut KeywordRegistry) {
    registry.register("properties", parse_properties);
    registry.register("patternProperties", parse_pattern_properties);
    registry.register("additionalProperties", parse_additional_properties);
    registry.register("propertyNames", parse_property_names);
}

fn names_annotation<'a>(names: impl IntoIterator<Item = &'a String>) -> Value {
    Value::Array(names.into_iter().cloned().map(Value::String).collect())
}

fn fail_on_invalid_child(kc: &mut KeywordContext<'_>) {
    if !kc.all_subschemas_valid() {
        kc.invalidate();
    }
}

/// Property names annotated by `properties` / `patternProperties`
fn covered_names(dependencies: &[KeywordEvaluation<'_>]) -> HashSet<String> {
    dependencies
        .iter()
        .filter_map(|d| d.annotation()?.as_array())
        .flatten()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn uncovered<'m>(map: &'m Map<String, Value>, covered: &HashSet<String>) -> Vec<&'m String> {
    map.keys().filter(|k| !covered.contains(*k)).collect()
}

#[derive(Debug)]
pub struct PropertiesKeyword {
    properties: IndexMap<String, SchemaRef>,
}

impl PropertiesKeyword {
    pub fn properties(&self) -> &IndexMap<String, SchemaRef> {
        &self.properties
    }
}

fn parse_properties(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(PropertiesKeyword {
        properties: schema_map(name, value, ctx)?,
    }))
}

impl Keyword for PropertiesKeyword {
    fn name(&self) -> &str {
        "properties"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::APPLICATOR
    }

    fn compile(&self, _siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let mut subschemas = Vec::with_capacity(self.properties.len());
        for (property, schema) in &self.properties {
            let id = ctx.build_subschema(schema)?;
            let key = property.clone();
            subschemas.push(
                SubschemaConstraint::new(id, JsonPointer::from_segments(["properties", property.as_str()]))
                    .with_locator(move |lc| match lc.instance() {
                        Value::Object(map) if map.contains_key(&key) => {
                            vec![InstanceTarget::Location(JsonPointer::new().child(key.as_str()))]
                        }
                        _ => Vec::new(),
                    }),
            );
        }

        let names: Vec<String> = self.properties.keys().cloned().collect();
        Ok(KeywordConstraint::new("properties", move |kc| {
            fail_on_invalid_child(kc);
            if let Value::Object(map) = kc.instance() {
                kc.annotate(names_annotation(names.iter().filter(|n| map.contains_key(*n))));
            }
            Ok(())
        })
        .with_subschemas(subschemas)
        .with_short_circuit(ShortCircuit::OnFailure))
    }

    fn subschemas(&self) -> Vec<&SchemaRef> {
        self.properties.values().collect()
    }

    fn subschema_at(&self, rest: &[String]) -> Option<(&SchemaRef, usize)> {
        keyed_at(&self.properties, rest)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct PatternPropertiesKeyword {
    patterns: Vec<(Regex, SchemaRef)>,
}

fn parse_pattern_properties(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let schemas = schema_map(name, value, ctx)?;
    let mut patterns = Vec::with_capacity(schemas.len());
    for (pattern, schema) in schemas {
        let regex = Regex::new(&pattern).map_err(|e| SchemaError::InvalidRegex {
            keyword: name.to_string(),
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        patterns.push((regex, schema));
    }
    Ok(Box::new(PatternPropertiesKeyword { patterns }))
}

impl Keyword for PatternPropertiesKeyword {
    fn name(&self) -> &str {
        "patternProperties"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::APPLICATOR
    }

    fn compile(&self, _siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let mut subschemas = Vec::with_capacity(self.patterns.len());
        for (regex, schema) in &self.patterns {
            let id = ctx.build_subschema(schema)?;
            let matcher = regex.clone();
            subschemas.push(
                SubschemaConstraint::new(id, JsonPointer::from_segments(["patternProperties", regex.as_str()]))
                    .with_locator(move |lc| match lc.instance() {
                        Value::Object(map) => map
                            .keys()
                            .filter(|k| matcher.is_match(k))
                            .map(|k| InstanceTarget::Location(JsonPointer::new().child(k.as_str())))
                            .collect(),
                        _ => Vec::new(),
                    }),
            );
        }

        let regexes: Vec<Regex> = self.patterns.iter().map(|(r, _)| r.clone()).collect();
        Ok(KeywordConstraint::new("patternProperties", move |kc| {
            fail_on_invalid_child(kc);
            if let Value::Object(map) = kc.instance() {
                let matched = map.keys().filter(|k| regexes.iter().any(|r| r.is_match(k)));
                kc.annotate(names_annotation(matched));
            }
            Ok(())
        })
        .with_subschemas(subschemas)
        .with_short_circuit(ShortCircuit::OnFailure))
    }

    fn subschemas(&self) -> Vec<&SchemaRef> {
        self.patterns.iter().map(|(_, s)| s).collect()
    }

    fn subschema_at(&self, rest: &[String]) -> Option<(&SchemaRef, usize)> {
        let pattern = rest.first()?;
        self.patterns
            .iter()
            .find(|(r, _)| r.as_str() == pattern)
            .map(|(_, s)| (s, 1))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct AdditionalPropertiesKeyword {
    schema: SchemaRef,
}

fn parse_additional_properties(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(AdditionalPropertiesKeyword {
        schema: ctx.parse_subschema(value, [name])?,
    }))
}

impl Keyword for AdditionalPropertiesKeyword {
    fn name(&self) -> &str {
        "additionalProperties"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::APPLICATOR
    }

    fn priority(&self) -> i32 {
        10
    }

    fn compile(&self, siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let dependencies: Vec<usize> = ["properties", "patternProperties"]
            .iter()
            .filter_map(|name| find_sibling(siblings, name))
            .collect();
        let id = ctx.build_subschema(&self.schema)?;
        let subschema = SubschemaConstraint::new(id, JsonPointer::from_segments(["additionalProperties"]))
            .with_locator(|lc| match lc.instance() {
                Value::Object(map) => uncovered(map, &covered_names(lc.dependencies()))
                    .into_iter()
                    .map(|k| InstanceTarget::Location(JsonPointer::new().child(k.as_str())))
                    .collect(),
                _ => Vec::new(),
            });

        Ok(KeywordConstraint::new("additionalProperties", |kc| {
            fail_on_invalid_child(kc);
            if let Value::Object(map) = kc.instance() {
                let applied = uncovered(map, &covered_names(kc.dependencies()));
                kc.annotate(names_annotation(applied));
            }
            Ok(())
        })
        .with_keyword_dependencies(dependencies)
        .with_subschemas(vec![subschema])
        .with_short_circuit(ShortCircuit::OnFailure))
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

#[derive(Debug)]
pub struct PropertyNamesKeyword {
    schema: SchemaRef,
}

fn parse_property_names(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(PropertyNamesKeyword {
        schema: ctx.parse_subschema(value, [name])?,
    }))
}

impl Keyword for PropertyNamesKeyword {
    fn name(&self) -> &str {
        "propertyNames"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::since(SpecVersion::Draft6)
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::APPLICATOR
    }

    fn compile(&self, _siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let id = ctx.build_subschema(&self.schema)?;
        // Names are not values in the instance; each is evaluated as a string
        // reported at the property's location
        let subschema = SubschemaConstraint::new(id, JsonPointer::from_segments(["propertyNames"]))
            .with_locator(|lc| match lc.instance() {
                Value::Object(map) => map
                    .keys()
                    .map(|k| InstanceTarget::Synthetic {
                        location: JsonPointer::new().child(k.as_str()),
                        value: Value::String(k.clone()),
                    })
                    .collect(),
                _ => Vec::new(),
            });

        Ok(KeywordConstraint::new("propertyNames", |kc| {
            fail_on_invalid_child(kc);
            Ok(())
        })
        .with_subschemas(vec![subschema])
        .with_short_circuit(ShortCircuit::OnFailure))
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
