//! Conditional keywords
//!
//! `then`/`else` read the verdict of the sibling `if` through a keyword
//! dependency, so they are only applied when the branch is taken.
//! `dependentSchemas` and the draft 6/7 `dependencies` apply a schema when
//! the instance object has a given property.

use super::{Keyword, KeywordRegistry, keyed_at, schema_map, single_at, string_array};
use crate::builder::{BuildContext, find_sibling};
use crate::constraint::{InstanceTarget, KeywordConstraint, ShortCircuit, SubschemaConstraint};
use crate::error::{FailureKind, SchemaResult};
use crate::evaluator::LocatorContext;
use crate::schema::{ParseContext, SchemaRef};
use crate::spec_version::{SpecVersion, SpecVersions};
use crate::vocabulary::vocab;
use indexmap::IndexMap;
use schema_pointer::JsonPointer;
use serde_json::Value;
use std::any::Any;

pub(super) fn register(registry: &mut KeywordRegistry) {
    registry.register("if", parse_if);
    registry.register("then", parse_then_else);
    registry.register("else", parse_then_else);
    registry.register("dependentSchemas", parse_dependent_schemas);
    registry.register("dependencies", parse_dependencies);
}

/// Present the current instance when the object has `property`
fn when_present(property: String) -> impl Fn(&LocatorContext<'_>) -> Vec<InstanceTarget> + Send + Sync + 'static {
    move |lc| match lc.instance() {
        Value::Object(map) if map.contains_key(&property) => {
            vec![InstanceTarget::Location(JsonPointer::new())]
        }
        _ => Vec::new(),
    }
}

#[derive(Debug)]
pub struct IfKeyword {
    schema: SchemaRef,
}

fn parse_if(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(IfKeyword {
        schema: ctx.parse_subschema(value, [name])?,
    }))
}

impl Keyword for IfKeyword {
    fn name(&self) -> &str {
        "if"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::since(SpecVersion::Draft7)
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::APPLICATOR
    }

    fn compile(&self, _siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let id = ctx.build_subschema(&self.schema)?;
        // `if` never fails on its own; its verdict only selects a branch
        Ok(KeywordConstraint::new("if", |kc| {
            let matched = kc.all_subschemas_valid();
            kc.annotate(Value::Bool(matched));
            Ok(())
        })
        .with_subschemas(vec![SubschemaConstraint::new(id, JsonPointer::from_segments(["if"]))]))
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

/// `then` or `else`
#[derive(Debug)]
pub struct ThenElseKeyword {
    name: String,
    schema: SchemaRef,
}

impl ThenElseKeyword {
    fn applies_when(&self) -> bool {
        self.name == "then"
    }
}

fn parse_then_else(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(ThenElseKeyword {
        name: name.to_string(),
        schema: ctx.parse_subschema(value, [name])?,
    }))
}

impl Keyword for ThenElseKeyword {
    fn name(&self) -> &str {
        &self.name
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::since(SpecVersion::Draft7)
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::APPLICATOR
    }

    fn priority(&self) -> i32 {
        1
    }

    fn compile(&self, siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        // Without `if` the branch keywords have no effect
        let Some(if_index) = find_sibling(siblings, "if") else {
            return Ok(KeywordConstraint::skip(&self.name));
        };
        let id = ctx.build_subschema(&self.schema)?;
        let branch = self.applies_when();
        let subschema = SubschemaConstraint::new(id, JsonPointer::from_segments([self.name.as_str()]))
            .with_locator(move |lc| {
                let taken = lc
                    .dependency("if")
                    .and_then(|d| d.subschema_results().first())
                    .is_some_and(|r| r.is_valid() == branch);
                if taken {
                    vec![InstanceTarget::Location(JsonPointer::new())]
                } else {
                    Vec::new()
                }
            });

        Ok(KeywordConstraint::new(&self.name, |kc| {
            if !kc.all_subschemas_valid() {
                kc.invalidate();
            }
            Ok(())
        })
        .with_keyword_dependencies(vec![if_index])
        .with_subschemas(vec![subschema]))
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
pub struct DependentSchemasKeyword {
    schemas: IndexMap<String, SchemaRef>,
}

fn parse_dependent_schemas(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(DependentSchemasKeyword {
        schemas: schema_map(name, value, ctx)?,
    }))
}

impl Keyword for DependentSchemasKeyword {
    fn name(&self) -> &str {
        "dependentSchemas"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::since(SpecVersion::Draft201909)
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::APPLICATOR
    }

    fn compile(&self, _siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let mut subschemas = Vec::with_capacity(self.schemas.len());
        for (property, schema) in &self.schemas {
            let id = ctx.build_subschema(schema)?;
            subschemas.push(
                SubschemaConstraint::new(id, JsonPointer::from_segments(["dependentSchemas", property.as_str()]))
                    .with_locator(when_present(property.clone())),
            );
        }
        Ok(KeywordConstraint::new("dependentSchemas", |kc| {
            if !kc.all_subschemas_valid() {
                kc.invalidate();
            }
            Ok(())
        })
        .with_subschemas(subschemas)
        .with_short_circuit(ShortCircuit::OnFailure))
    }

    fn subschemas(&self) -> Vec<&SchemaRef> {
        self.schemas.values().collect()
    }

    fn subschema_at(&self, rest: &[String]) -> Option<(&SchemaRef, usize)> {
        keyed_at(&self.schemas, rest)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One entry of the draft 6/7 `dependencies` keyword
#[derive(Debug)]
pub enum Dependency {
    Schema(SchemaRef),
    Required(Vec<String>),
}

#[derive(Debug)]
pub struct DependenciesKeyword {
    entries: IndexMap<String, Dependency>,
}

impl DependenciesKeyword {
    pub fn entries(&self) -> &IndexMap<String, Dependency> {
        &self.entries
    }
}

fn parse_dependencies(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let map = value
        .as_object()
        .ok_or_else(|| ctx.invalid_value(name, "expected an object"))?;
    let mut entries = IndexMap::with_capacity(map.len());
    for (property, entry) in map {
        let dependency = match entry {
            Value::Array(_) => Dependency::Required(string_array(name, entry, ctx)?),
            _ => Dependency::Schema(ctx.parse_subschema(entry, [name, property.as_str()])?),
        };
        entries.insert(property.clone(), dependency);
    }
    Ok(Box::new(DependenciesKeyword { entries }))
}

impl Keyword for DependenciesKeyword {
    fn name(&self) -> &str {
        "dependencies"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::of(&[SpecVersion::Draft6, SpecVersion::Draft7])
    }

    fn compile(&self, _siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let mut subschemas = Vec::new();
        let mut required: Vec<(String, Vec<String>)> = Vec::new();
        for (property, dependency) in &self.entries {
            match dependency {
                Dependency::Schema(schema) => {
                    let id = ctx.build_subschema(schema)?;
                    subschemas.push(
                        SubschemaConstraint::new(id, JsonPointer::from_segments(["dependencies", property.as_str()]))
                            .with_locator(when_present(property.clone())),
                    );
                }
                Dependency::Required(names) => required.push((property.clone(), names.clone())),
            }
        }

        Ok(KeywordConstraint::new("dependencies", move |kc| {
            if !kc.all_subschemas_valid() {
                kc.invalidate();
            }
            let Value::Object(map) = kc.instance() else {
                return Ok(());
            };
            for (property, names) in &required {
                if !map.contains_key(property) {
                    continue;
                }
                let missing: Vec<String> = names.iter().filter(|n| !map.contains_key(*n)).cloned().collect();
                if !missing.is_empty() {
                    kc.fail(FailureKind::DependentRequired {
                        property: property.clone(),
                        missing,
                    });
                    break;
                }
            }
            Ok(())
        })
        .with_subschemas(subschemas))
    }

    fn subschemas(&self) -> Vec<&SchemaRef> {
        self.entries
            .values()
            .filter_map(|d| match d {
                Dependency::Schema(schema) => Some(schema),
                Dependency::Required(_) => None,
            })
            .collect()
    }

    fn subschema_at(&self, rest: &[String]) -> Option<(&SchemaRef, usize)> {
        match self.entries.get(rest.first()?.as_str())? {
            Dependency::Schema(schema) => Some((schema, 1)),
            Dependency::Required(_) => None,
        }
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
    fn test_if_then_else() {
        let schema = Schema::from_value(&json!({
            "if": {"type": "integer"},
            "then": {"minimum": 10},
            "else": {"type": "string"}
        }))
        .unwrap();
        let options = hierarchical();
        assert!(schema.evaluate(&json!(12), &options).unwrap().is_valid());
        assert!(!schema.evaluate(&json!(3), &options).unwrap().is_valid());
        assert!(schema.evaluate(&json!("x"), &options).unwrap().is_valid());
        assert!(!schema.evaluate(&json!(null), &options).unwrap().is_valid());
    }

    #[test]
    fn test_then_without_if_is_ignored() {
        let schema = Schema::from_value(&json!({"then": false})).unwrap();
        assert!(schema.evaluate(&json!(1), &hierarchical()).unwrap().is_valid());
    }

    #[test]
    fn test_branch_not_taken_is_not_applied() {
        let schema = Schema::from_value(&json!({"if": true, "else": false})).unwrap();
        let results = schema.evaluate(&json!(1), &hierarchical()).unwrap();
        assert!(results.is_valid());
        assert!(results.find("/else", "").is_none());
        assert!(results.find("/if", "").is_some());
    }

    #[test]
    fn test_dependent_schemas() {
        let schema = Schema::from_value(&json!({
            "dependentSchemas": {"credit": {"required": ["billing"]}}
        }))
        .unwrap();
        let options = hierarchical();
        assert!(schema.evaluate(&json!({"name": 1}), &options).unwrap().is_valid());
        assert!(!schema.evaluate(&json!({"credit": 1}), &options).unwrap().is_valid());
        assert!(
            schema
                .evaluate(&json!({"credit": 1, "billing": 2}), &options)
                .unwrap()
                .is_valid()
        );
    }

    #[test]
    fn test_draft7_dependencies() {
        let schema = Schema::from_value(&json!({
            "dependencies": {
                "credit": ["billing"],
                "name": {"required": ["age"]}
            }
        }))
        .unwrap();
        let options = hierarchical().with_evaluate_as(SpecVersion::Draft7);
        let results = schema.evaluate(&json!({"credit": 1}), &options).unwrap();
        assert!(!results.is_valid());
        assert_eq!(
            results.error("dependencies"),
            Some("Property 'credit' requires properties: billing")
        );
        assert!(!schema.evaluate(&json!({"name": "x"}), &options).unwrap().is_valid());
        assert!(schema.evaluate(&json!({"name": "x", "age": 3}), &options).unwrap().is_valid());

        // Not a keyword in 2020-12
        assert!(schema.evaluate(&json!({"credit": 1}), &hierarchical()).unwrap().is_valid());
    }
}
