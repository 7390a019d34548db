//! Core vocabulary keywords
//!
//! Identifiers (`$schema`, `$id`, anchors, `$comment`) are consumed by the
//! parser and compile to no-op constraints. `$defs`/`definitions` only hold
//! schemas for references. `$ref`, `$dynamicRef` and `$recursiveRef` apply the
//! referenced schema in place. The dynamic forms start from the static target
//! and, when it carries the matching dynamic anchor, switch to the outermost
//! resource in the dynamic scope that declares the same anchor.

use super::{Keyword, KeywordRegistry, keyed_at, schema_map};
use crate::builder::{BuildContext, DynamicAnchor};
use crate::constraint::{KeywordConstraint, SubschemaConstraint};
use crate::error::SchemaResult;
use crate::schema::{ParseContext, SchemaRef};
use crate::spec_version::{SpecVersion, SpecVersions};
use crate::vocabulary::vocab;
use indexmap::IndexMap;
use schema_pointer::JsonPointer;
use serde_json::Value;
use std::any::Any;

pub(super) fn register(registry: &mut KeywordRegistry) {
    for name in [
        "$schema",
        "$id",
        "$anchor",
        "$dynamicAnchor",
        "$recursiveAnchor",
        "$comment",
    ] {
        registry.register(name, parse_identifier);
    }
    registry.register("$vocabulary", parse_vocabulary);
    registry.register("$defs", parse_definitions);
    registry.register("definitions", parse_definitions);
    for name in ["$ref", "$dynamicRef", "$recursiveRef"] {
        registry.register(name, parse_ref);
    }
}

/// Keywords that identify or describe a schema without constraining instances
#[derive(Debug)]
pub struct IdentifierKeyword {
    name: String,
    value: Value,
}

impl IdentifierKeyword {
    pub fn value(&self) -> &Value {
        &self.value
    }
}

fn parse_identifier(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let well_formed = match name {
        "$recursiveAnchor" => value.is_boolean(),
        _ => value.is_string(),
    };
    if !well_formed {
        let expected = if name == "$recursiveAnchor" { "a boolean" } else { "a string" };
        return Err(ctx.invalid_value(name, format!("expected {}", expected)));
    }
    Ok(Box::new(IdentifierKeyword {
        name: name.to_string(),
        value: value.clone(),
    }))
}

impl Keyword for IdentifierKeyword {
    fn name(&self) -> &str {
        &self.name
    }

    fn spec_versions(&self) -> SpecVersions {
        match self.name.as_str() {
            "$anchor" => SpecVersions::since(SpecVersion::Draft201909),
            "$dynamicAnchor" => SpecVersions::since(SpecVersion::Draft202012),
            "$recursiveAnchor" => SpecVersions::of(&[SpecVersion::Draft201909]),
            "$comment" => SpecVersions::since(SpecVersion::Draft7),
            _ => SpecVersions::ALL,
        }
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::CORE
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        Ok(KeywordConstraint::skip(&self.name))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `$vocabulary`: vocabulary URI to "required" flag, read from meta-schemas
#[derive(Debug)]
pub struct VocabularyKeyword {
    entries: IndexMap<String, bool>,
}

impl VocabularyKeyword {
    pub fn entries(&self) -> &IndexMap<String, bool> {
        &self.entries
    }
}

fn parse_vocabulary(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let map = value
        .as_object()
        .ok_or_else(|| ctx.invalid_value(name, "expected an object of vocabulary URIs"))?;
    let mut entries = IndexMap::with_capacity(map.len());
    for (uri, required) in map {
        let required = required
            .as_bool()
            .ok_or_else(|| ctx.invalid_value(name, format!("'{}' must map to a boolean", uri)))?;
        entries.insert(uri.clone(), required);
    }
    Ok(Box::new(VocabularyKeyword { entries }))
}

impl Keyword for VocabularyKeyword {
    fn name(&self) -> &str {
        "$vocabulary"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::since(SpecVersion::Draft201909)
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::CORE
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        Ok(KeywordConstraint::skip("$vocabulary"))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `$defs` (2019-09+) and `definitions` (all drafts)
#[derive(Debug)]
pub struct DefinitionsKeyword {
    name: String,
    definitions: IndexMap<String, SchemaRef>,
}

impl DefinitionsKeyword {
    pub fn definitions(&self) -> &IndexMap<String, SchemaRef> {
        &self.definitions
    }
}

fn parse_definitions(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(DefinitionsKeyword {
        name: name.to_string(),
        definitions: schema_map(name, value, ctx)?,
    }))
}

impl Keyword for DefinitionsKeyword {
    fn name(&self) -> &str {
        &self.name
    }

    fn spec_versions(&self) -> SpecVersions {
        if self.name == "$defs" {
            SpecVersions::since(SpecVersion::Draft201909)
        } else {
            SpecVersions::ALL
        }
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        if self.name == "$defs" { vocab::CORE } else { &[] }
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        Ok(KeywordConstraint::skip(&self.name))
    }

    fn subschemas(&self) -> Vec<&SchemaRef> {
        self.definitions.values().collect()
    }

    fn subschema_at(&self, rest: &[String]) -> Option<(&SchemaRef, usize)> {
        keyed_at(&self.definitions, rest)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `$ref`, `$dynamicRef` and `$recursiveRef`
#[derive(Debug)]
pub struct RefKeyword {
    name: String,
    reference: String,
}

impl RefKeyword {
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// The anchor to look up in the dynamic scope, if the static target is bookended by one
    fn dynamic_anchor(&self, target: &SchemaRef) -> Option<DynamicAnchor> {
        match self.name.as_str() {
            "$dynamicRef" => {
                let (_, fragment) = self.reference.split_once('#')?;
                (target.dynamic_anchor() == Some(fragment))
                    .then(|| DynamicAnchor::Named(fragment.to_string()))
            }
            "$recursiveRef" => target.has_recursive_anchor().then_some(DynamicAnchor::Recursive),
            _ => None,
        }
    }
}

fn parse_ref(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let reference = value
        .as_str()
        .ok_or_else(|| ctx.invalid_value(name, "expected a URI reference string"))?;
    if name == "$recursiveRef" && reference != "#" {
        return Err(ctx.invalid_value(name, "only \"#\" is allowed"));
    }
    Ok(Box::new(RefKeyword {
        name: name.to_string(),
        reference: reference.to_string(),
    }))
}

impl Keyword for RefKeyword {
    fn name(&self) -> &str {
        &self.name
    }

    fn spec_versions(&self) -> SpecVersions {
        match self.name.as_str() {
            "$dynamicRef" => SpecVersions::since(SpecVersion::Draft202012),
            "$recursiveRef" => SpecVersions::of(&[SpecVersion::Draft201909]),
            _ => SpecVersions::ALL,
        }
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::CORE
    }

    fn compile(&self, _siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let target = ctx.resolve_reference(&self.reference)?;
        let id = ctx.build_subschema(&target)?;
        let mut subschema = SubschemaConstraint::new(id, JsonPointer::from_segments([self.name.as_str()]));
        if let Some(anchor) = self.dynamic_anchor(&target) {
            subschema = subschema.with_dynamic_targets(ctx.dynamic_targets(anchor));
        }

        Ok(KeywordConstraint::new(&self.name, |kc| {
            if !kc.all_subschemas_valid() {
                kc.invalidate();
            }
            Ok(())
        })
        .with_subschemas(vec![subschema]))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
