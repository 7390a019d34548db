//! `unevaluatedProperties` and `unevaluatedItems`
//!
//! Both depend on every sibling compiled before them and read annotations
//! from those siblings and from every valid nested frame that evaluated the
//! same instance location (through `allOf`, `$ref`, `if`/`then`, ...).

use super::{Keyword, KeywordRegistry, single_at};
use crate::builder::BuildContext;
use crate::constraint::{InstanceTarget, KeywordConstraint, ShortCircuit, SubschemaConstraint};
use crate::error::SchemaResult;
use crate::evaluator::{KeywordContext, KeywordEvaluation};
use crate::results::EvaluationResults;
use crate::schema::{ParseContext, SchemaRef};
use crate::spec_version::{SpecVersion, SpecVersions};
use crate::vocabulary::vocab;
use schema_pointer::JsonPointer;
use serde_json::Value;
use std::any::Any;
use std::collections::HashSet;

const PROPERTY_KEYWORDS: &[&str] = &[
    "properties",
    "patternProperties",
    "additionalProperties",
    "unevaluatedProperties",
];

const ITEM_KEYWORDS: &[&str] = &[
    "prefixItems",
    "items",
    "additionalItems",
    "contains",
    "unevaluatedItems",
];

pub(super) fn register(registry: &mut KeywordRegistry) {
    registry.register("unevaluatedProperties", parse_unevaluated);
    registry.register("unevaluatedItems", parse_unevaluated);
}

/// Annotations relevant to the current instance location: those of the
/// sibling dependencies plus those of valid nested frames at the same location
fn gather<'f>(
    dependencies: &[KeywordEvaluation<'f>],
    instance_location: &JsonPointer,
    keywords: &[&str],
) -> Vec<&'f Value> {
    let mut found = Vec::new();
    for dependency in dependencies {
        if keywords.contains(&dependency.keyword())
            && let Some(annotation) = dependency.annotation()
        {
            found.push(annotation);
        }
        for frame in dependency.subschema_results() {
            gather_nested(frame, instance_location, keywords, &mut found);
        }
    }
    found
}

fn gather_nested<'f>(
    frame: &'f EvaluationResults,
    instance_location: &JsonPointer,
    keywords: &[&str],
    found: &mut Vec<&'f Value>,
) {
    if !frame.is_valid() || frame.instance_location() != instance_location {
        return;
    }
    for keyword in keywords {
        if let Some(annotation) = frame.annotation(keyword) {
            found.push(annotation);
        }
    }
    for child in frame.details() {
        gather_nested(child, instance_location, keywords, found);
    }
}

fn evaluated_properties(
    dependencies: &[KeywordEvaluation<'_>],
    instance_location: &JsonPointer,
) -> HashSet<String> {
    gather(dependencies, instance_location, PROPERTY_KEYWORDS)
        .into_iter()
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Which array indices earlier keywords evaluated
#[derive(Debug, Default)]
struct ItemCoverage {
    all: bool,
    /// Every index up to and including this one
    through: Option<usize>,
    indices: HashSet<usize>,
}

impl ItemCoverage {
    fn from_annotations<'f>(annotations: impl IntoIterator<Item = &'f Value>) -> Self {
        let mut coverage = Self::default();
        for annotation in annotations {
            match annotation {
                Value::Bool(true) => coverage.all = true,
                Value::Number(n) => {
                    if let Some(n) = n.as_u64() {
                        let n = n as usize;
                        coverage.through = Some(coverage.through.map_or(n, |t| t.max(n)));
                    }
                }
                Value::Array(indices) => {
                    coverage
                        .indices
                        .extend(indices.iter().filter_map(Value::as_u64).map(|i| i as usize));
                }
                _ => {}
            }
        }
        coverage
    }

    fn covers(&self, index: usize) -> bool {
        self.all || self.through.is_some_and(|t| index <= t) || self.indices.contains(&index)
    }
}

fn unevaluated_targets(
    instance: &Value,
    dependencies: &[KeywordEvaluation<'_>],
    instance_location: &JsonPointer,
    properties: bool,
) -> Vec<InstanceTarget> {
    match instance {
        Value::Object(map) if properties => {
            let evaluated = evaluated_properties(dependencies, instance_location);
            map.keys()
                .filter(|k| !evaluated.contains(*k))
                .map(|k| InstanceTarget::Location(JsonPointer::new().child(k.as_str())))
                .collect()
        }
        Value::Array(items) if !properties => {
            let coverage =
                ItemCoverage::from_annotations(gather(dependencies, instance_location, ITEM_KEYWORDS));
            (0..items.len())
                .filter(|i| !coverage.covers(*i))
                .map(|i| InstanceTarget::Location(JsonPointer::new().child(i)))
                .collect()
        }
        _ => Vec::new(),
    }
}

fn record_result(kc: &mut KeywordContext<'_>, properties: bool) {
    if !kc.all_subschemas_valid() {
        kc.invalidate();
    }
    let applied: Vec<Value> = kc
        .subschema_results()
        .iter()
        .filter_map(|r| r.instance_location().last())
        .map(|segment| Value::String(segment.to_string()))
        .collect();
    if properties {
        if kc.instance().is_object() {
            kc.annotate(Value::Array(applied));
        }
    } else if !applied.is_empty() {
        kc.annotate(Value::Bool(true));
    }
}

#[derive(Debug)]
pub struct UnevaluatedPropertiesKeyword {
    schema: SchemaRef,
}

#[derive(Debug)]
pub struct UnevaluatedItemsKeyword {
    schema: SchemaRef,
}

fn parse_unevaluated(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let schema = ctx.parse_subschema(value, [name])?;
    let keyword: Box<dyn Keyword> = if name == "unevaluatedItems" {
        Box::new(UnevaluatedItemsKeyword { schema })
    } else {
        Box::new(UnevaluatedPropertiesKeyword { schema })
    };
    Ok(keyword)
}

fn compile_unevaluated(
    name: &'static str,
    schema: &SchemaRef,
    siblings: &[KeywordConstraint],
    ctx: &mut BuildContext<'_>,
) -> SchemaResult<KeywordConstraint> {
    let properties = name == "unevaluatedProperties";
    let id = ctx.build_subschema(schema)?;
    let subschema = SubschemaConstraint::new(id, JsonPointer::from_segments([name])).with_locator(move |lc| {
        unevaluated_targets(lc.instance(), lc.dependencies(), lc.instance_location(), properties)
    });

    Ok(KeywordConstraint::new(name, move |kc| {
        record_result(kc, properties);
        Ok(())
    })
    .with_keyword_dependencies((0..siblings.len()).collect())
    .with_subschemas(vec![subschema])
    .with_short_circuit(ShortCircuit::OnFailure)
    .collecting_annotations())
}

impl Keyword for UnevaluatedPropertiesKeyword {
    fn name(&self) -> &str {
        "unevaluatedProperties"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::since(SpecVersion::Draft201909)
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::UNEVALUATED
    }

    fn priority(&self) -> i32 {
        30
    }

    fn compile(&self, siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        compile_unevaluated("unevaluatedProperties", &self.schema, siblings, ctx)
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

impl Keyword for UnevaluatedItemsKeyword {
    fn name(&self) -> &str {
        "unevaluatedItems"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::since(SpecVersion::Draft201909)
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::UNEVALUATED
    }

    fn priority(&self) -> i32 {
        30
    }

    fn compile(&self, siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        compile_unevaluated("unevaluatedItems", &self.schema, siblings, ctx)
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
