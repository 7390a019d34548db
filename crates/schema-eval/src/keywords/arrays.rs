// Array applicators: items, prefixItems, additionalItems, contains

use super::{CountKeyword, Keyword, KeywordRegistry, indexed_at, schema_array, single_at};
use crate::builder::BuildContext;
use crate::constraint::{InstanceTarget, KeywordConstraint, ShortCircuit, SubschemaConstraint};
use crate::error::{FailureKind, SchemaError, SchemaResult};
use crate::evaluator::{KeywordContext, LocatorContext};
use crate::schema::{ParseContext, SchemaRef};
use crate::spec_version::{SpecVersion, SpecVersions};
use crate::vocabulary::vocab;
use schema_pointer::JsonPointer;
use serde_json::Value;
use std::any::Any;

pub(super) fn register(registry: &mut KeywordRegistry) {
    registry.register("items", parse_items);
    registry.register("prefixItems", parse_prefix_items);
    registry.register("additionalItems", parse_additional_items);
    registry.register("contains", parse_contains);
}

/// Indices `start..end` of an array instance, clipped to its length
fn index_range(lc: &LocatorContext<'_>, start: usize, end: Option<usize>) -> Vec<InstanceTarget> {
    let Value::Array(items) = lc.instance() else {
        return Vec::new();
    };
    let end = end.map_or(items.len(), |e| e.min(items.len()));
    (start..end)
        .map(|i| InstanceTarget::Location(JsonPointer::new().child(i)))
        .collect()
}

/// Annotation of a positional applicator covering `count` leading items:
/// `true` when it reached every item, otherwise the largest index applied
fn positional_annotation(kc: &mut KeywordContext<'_>, count: usize) {
    if let Value::Array(items) = kc.instance() {
        let annotation = if items.len() <= count {
            Value::Bool(true)
        } else {
            Value::from(count - 1)
        };
        kc.annotate(annotation);
    }
}

/// `true` when a trailing applicator starting at `start` reached any item
fn trailing_annotation(kc: &mut KeywordContext<'_>, start: usize) {
    if let Value::Array(items) = kc.instance()
        && items.len() > start
    {
        kc.annotate(Value::Bool(true));
    }
}

fn fail_on_invalid_child(kc: &mut KeywordContext<'_>) {
    if !kc.all_subschemas_valid() {
        kc.invalidate();
    }
}

#[derive(Debug)]
pub enum ItemsValue {
    /// Applies to every item (or every item after `prefixItems`)
    Single(SchemaRef),
    /// Positional form, drafts up to 2019-09
    Tuple(Vec<SchemaRef>),
}

#[derive(Debug)]
pub struct ItemsKeyword {
    value: ItemsValue,
}

impl ItemsKeyword {
    pub fn value(&self) -> &ItemsValue {
        &self.value
    }

    /// Number of positional schemas, when in tuple form
    pub fn tuple_len(&self) -> Option<usize> {
        match &self.value {
            ItemsValue::Tuple(schemas) => Some(schemas.len()),
            ItemsValue::Single(_) => None,
        }
    }
}

fn parse_items(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let value = match value {
        Value::Array(_) => ItemsValue::Tuple(schema_array(name, value, ctx)?),
        _ => ItemsValue::Single(ctx.parse_subschema(value, [name])?),
    };
    Ok(Box::new(ItemsKeyword { value }))
}

impl Keyword for ItemsKeyword {
    fn name(&self) -> &str {
        "items"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::APPLICATOR
    }

    fn priority(&self) -> i32 {
        5
    }

    fn compile(&self, _siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        match &self.value {
            ItemsValue::Tuple(schemas) => {
                let version = ctx.spec_version();
                if version >= SpecVersion::Draft202012 {
                    return Err(SchemaError::UnsupportedForm {
                        keyword: "items".to_string(),
                        form: "array".to_string(),
                        version,
                    });
                }
                let mut subschemas = Vec::with_capacity(schemas.len());
                for (i, schema) in schemas.iter().enumerate() {
                    let id = ctx.build_subschema(schema)?;
                    subschemas.push(
                        SubschemaConstraint::new(id, JsonPointer::from_segments(["items".to_string(), i.to_string()]))
                            .with_locator(move |lc| index_range(lc, i, Some(i + 1))),
                    );
                }
                let count = schemas.len();
                Ok(KeywordConstraint::new("items", move |kc| {
                    fail_on_invalid_child(kc);
                    positional_annotation(kc, count);
                    Ok(())
                })
                .with_subschemas(subschemas)
                .with_short_circuit(ShortCircuit::OnFailure))
            }
            ItemsValue::Single(schema) => {
                let start = ctx
                    .sibling_keyword::<PrefixItemsKeyword>("prefixItems")
                    .map_or(0, |p| p.schemas.len());
                let id = ctx.build_subschema(schema)?;
                let subschema = SubschemaConstraint::new(id, JsonPointer::from_segments(["items"]))
                    .with_locator(move |lc| index_range(lc, start, None));
                Ok(KeywordConstraint::new("items", move |kc| {
                    fail_on_invalid_child(kc);
                    trailing_annotation(kc, start);
                    Ok(())
                })
                .with_subschemas(vec![subschema])
                .with_short_circuit(ShortCircuit::OnFailure))
            }
        }
    }

    fn subschemas(&self) -> Vec<&SchemaRef> {
        match &self.value {
            ItemsValue::Single(schema) => vec![schema],
            ItemsValue::Tuple(schemas) => schemas.iter().collect(),
        }
    }

    fn subschema_at(&self, rest: &[String]) -> Option<(&SchemaRef, usize)> {
        match &self.value {
            ItemsValue::Single(schema) => single_at(schema, rest),
            ItemsValue::Tuple(schemas) => indexed_at(schemas, rest),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct PrefixItemsKeyword {
    schemas: Vec<SchemaRef>,
}

fn parse_prefix_items(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(PrefixItemsKeyword {
        schemas: schema_array(name, value, ctx)?,
    }))
}

impl Keyword for PrefixItemsKeyword {
    fn name(&self) -> &str {
        "prefixItems"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::since(SpecVersion::Draft202012)
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::APPLICATOR
    }

    fn compile(&self, _siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let mut subschemas = Vec::with_capacity(self.schemas.len());
        for (i, schema) in self.schemas.iter().enumerate() {
            let id = ctx.build_subschema(schema)?;
            subschemas.push(
                SubschemaConstraint::new(id, JsonPointer::from_segments(["prefixItems".to_string(), i.to_string()]))
                    .with_locator(move |lc| index_range(lc, i, Some(i + 1))),
            );
        }
        let count = self.schemas.len();
        Ok(KeywordConstraint::new("prefixItems", move |kc| {
            fail_on_invalid_child(kc);
            positional_annotation(kc, count);
            Ok(())
        })
        .with_subschemas(subschemas)
        .with_short_circuit(ShortCircuit::OnFailure))
    }

    fn subschemas(&self) -> Vec<&SchemaRef> {
        self.schemas.iter().collect()
    }

    fn subschema_at(&self, rest: &[String]) -> Option<(&SchemaRef, usize)> {
        indexed_at(&self.schemas, rest)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct AdditionalItemsKeyword {
    schema: SchemaRef,
}

fn parse_additional_items(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(AdditionalItemsKeyword {
        schema: ctx.parse_subschema(value, [name])?,
    }))
}

impl Keyword for AdditionalItemsKeyword {
    fn name(&self) -> &str {
        "additionalItems"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::until(SpecVersion::Draft201909)
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::APPLICATOR
    }

    fn priority(&self) -> i32 {
        10
    }

    fn compile(&self, _siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        // Only meaningful after a positional `items`
        let Some(start) = ctx
            .sibling_keyword::<ItemsKeyword>("items")
            .and_then(ItemsKeyword::tuple_len)
        else {
            return Ok(KeywordConstraint::skip("additionalItems"));
        };
        let id = ctx.build_subschema(&self.schema)?;
        let subschema = SubschemaConstraint::new(id, JsonPointer::from_segments(["additionalItems"]))
            .with_locator(move |lc| index_range(lc, start, None));
        Ok(KeywordConstraint::new("additionalItems", move |kc| {
            fail_on_invalid_child(kc);
            trailing_annotation(kc, start);
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

#[derive(Debug)]
pub struct ContainsKeyword {
    schema: SchemaRef,
}

fn parse_contains(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(ContainsKeyword {
        schema: ctx.parse_subschema(value, [name])?,
    }))
}

impl Keyword for ContainsKeyword {
    fn name(&self) -> &str {
        "contains"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::since(SpecVersion::Draft6)
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::APPLICATOR
    }

    fn compile(&self, _siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let min = ctx
            .sibling_keyword::<CountKeyword>("minContains")
            .map_or(1, CountKeyword::limit);
        let max = ctx
            .sibling_keyword::<CountKeyword>("maxContains")
            .map(CountKeyword::limit);
        let annotates = ctx.spec_version() >= SpecVersion::Draft202012;

        let id = ctx.build_subschema(&self.schema)?;
        let subschema = SubschemaConstraint::new(id, JsonPointer::from_segments(["contains"]))
            .with_locator(|lc| index_range(lc, 0, None));

        // Counting needs every item, so no short-circuit
        Ok(KeywordConstraint::new("contains", move |kc| {
            let Value::Array(items) = kc.instance() else {
                return Ok(());
            };
            let matched: Vec<usize> = kc
                .subschema_results()
                .iter()
                .enumerate()
                .filter(|(_, r)| r.is_valid())
                .map(|(i, _)| i)
                .collect();
            let count = matched.len();
            if (count as u64) < min || max.is_some_and(|m| count as u64 > m) {
                kc.fail(FailureKind::ContainsCount { count, min, max });
            } else if annotates {
                let annotation = if count == items.len() {
                    Value::Bool(true)
                } else {
                    Value::Array(matched.into_iter().map(Value::from).collect())
                };
                kc.annotate(annotation);
            }
            Ok(())
        })
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
