//! Keyword capability and the standard keyword set
//!
//! Every validation rule implements [`Keyword`]. A [`KeywordRegistry`] maps
//! keyword names to parse functions; the parser consults it for every key of
//! a schema object. Keyword bodies are organized by category:
//! - core_vocab: identifiers, `$defs`, references
//! - combinators: allOf, anyOf, oneOf, not
//! - conditionals: if/then/else, dependentSchemas, dependencies
//! - objects: properties, patternProperties, additionalProperties, propertyNames
//! - arrays: items, prefixItems, additionalItems, contains
//! - unevaluated: unevaluatedProperties, unevaluatedItems
//! - assertions: type, enum, const, numeric/length/count bounds, pattern, required
//! - format: the `format` keyword and its checkers
//! - annotations: metadata and content keywords, unrecognized keywords

mod annotations;
mod arrays;
mod assertions;
mod combinators;
mod conditionals;
mod core_vocab;
pub(crate) mod format;
mod objects;
mod unevaluated;

pub use annotations::{AnnotationKeyword, ContentSchemaKeyword, UnrecognizedKeyword};
pub use arrays::{AdditionalItemsKeyword, ContainsKeyword, ItemsKeyword, ItemsValue, PrefixItemsKeyword};
pub use assertions::{
    BoundKind, ConstKeyword, CountKeyword, CountKind, DependentRequiredKeyword, EnumKeyword,
    JsonType, NumberBoundKeyword, PatternKeyword, RequiredKeyword, TypeKeyword, UniqueItemsKeyword,
};
pub use combinators::{Combinator, CombinatorKeyword, NotKeyword};
pub use conditionals::{
    Dependency, DependenciesKeyword, DependentSchemasKeyword, IfKeyword, ThenElseKeyword,
};
pub use core_vocab::{DefinitionsKeyword, IdentifierKeyword, RefKeyword, VocabularyKeyword};
pub use format::FormatKeyword;
pub use objects::{
    AdditionalPropertiesKeyword, PatternPropertiesKeyword, PropertiesKeyword,
    PropertyNamesKeyword,
};
pub use unevaluated::{UnevaluatedItemsKeyword, UnevaluatedPropertiesKeyword};

pub(crate) use annotations::parse_unrecognized;

use crate::builder::BuildContext;
use crate::constraint::KeywordConstraint;
use crate::error::SchemaResult;
use crate::schema::{ParseContext, SchemaRef};
use crate::spec_version::SpecVersions;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// A named rule attached to a schema node.
///
/// Implementations are immutable after parsing. `compile` turns the rule into
/// a [`KeywordConstraint`] for one dialect; everything instance-specific
/// happens inside the constraint's evaluation function.
pub trait Keyword: Send + Sync + fmt::Debug {
    /// The keyword as it appears in the schema
    fn name(&self) -> &str;

    /// Drafts this keyword is defined in
    fn spec_versions(&self) -> SpecVersions;

    /// Vocabulary URIs this keyword belongs to; empty means "always active"
    fn vocabularies(&self) -> &'static [&'static str] {
        &[]
    }

    /// Lower priorities compile first; ties keep declaration order
    fn priority(&self) -> i32 {
        0
    }

    /// Build the constraint for this keyword.
    ///
    /// `siblings` holds the constraints already compiled for the same schema
    /// node, in compile order. Their indices are what dependency edges name.
    fn compile(
        &self,
        siblings: &[KeywordConstraint],
        ctx: &mut BuildContext<'_>,
    ) -> SchemaResult<KeywordConstraint>;

    /// Schema nodes nested directly in this keyword's value
    fn subschemas(&self) -> Vec<&SchemaRef> {
        Vec::new()
    }

    /// Resolve the pointer segments following the keyword name to a nested
    /// schema, returning it and how many segments were consumed
    fn subschema_at(&self, _rest: &[String]) -> Option<(&SchemaRef, usize)> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Turns one keyword value into a keyword instance
pub type KeywordParser = fn(&str, &Value, &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>>;

/// Keyword name to parse function
#[derive(Clone, Default)]
pub struct KeywordRegistry {
    parsers: HashMap<String, KeywordParser>,
}

/// The standard keyword set, built once
pub static STANDARD_KEYWORDS: Lazy<KeywordRegistry> = Lazy::new(KeywordRegistry::standard);

impl KeywordRegistry {
    /// An empty registry; every keyword parses as unrecognized
    pub fn new() -> Self {
        Self::default()
    }

    /// Every keyword this crate implements
    pub fn standard() -> Self {
        let mut registry = Self::new();
        core_vocab::register(&mut registry);
        combinators::register(&mut registry);
        conditionals::register(&mut registry);
        objects::register(&mut registry);
        arrays::register(&mut registry);
        unevaluated::register(&mut registry);
        assertions::register(&mut registry);
        format::register(&mut registry);
        annotations::register(&mut registry);
        registry
    }

    /// Add or replace the parser for `name`
    pub fn register(&mut self, name: impl Into<String>, parser: KeywordParser) -> &mut Self {
        self.parsers.insert(name.into(), parser);
        self
    }

    pub fn get(&self, name: &str) -> Option<KeywordParser> {
        self.parsers.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl fmt::Debug for KeywordRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.parsers.keys().collect();
        names.sort();
        f.debug_struct("KeywordRegistry").field("keywords", &names).finish()
    }
}

// Value helpers shared by the keyword parsers

pub(crate) fn schema_array(
    name: &str,
    value: &Value,
    ctx: &ParseContext<'_>,
) -> SchemaResult<Vec<SchemaRef>> {
    let items = value
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| ctx.invalid_value(name, "expected a non-empty array of schemas"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| ctx.parse_subschema(item, [name.to_string(), i.to_string()]))
        .collect()
}

pub(crate) fn schema_map(
    name: &str,
    value: &Value,
    ctx: &ParseContext<'_>,
) -> SchemaResult<IndexMap<String, SchemaRef>> {
    let map = value
        .as_object()
        .ok_or_else(|| ctx.invalid_value(name, "expected an object of schemas"))?;
    map.iter()
        .map(|(key, item)| {
            let schema = ctx.parse_subschema(item, [name, key.as_str()])?;
            Ok((key.clone(), schema))
        })
        .collect()
}

pub(crate) fn string_array(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| ctx.invalid_value(name, "expected an array of strings"))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| ctx.invalid_value(name, "expected an array of strings"))
        })
        .collect()
}

/// Non-negative integers; `2.0` counts as an integer
pub(crate) fn non_negative_integer(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<u64> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(ctx.invalid_value(name, "expected a non-negative integer")),
    }
}

/// `subschema_at` for keywords holding a single schema
pub(crate) fn single_at<'s>(schema: &'s SchemaRef, _rest: &[String]) -> Option<(&'s SchemaRef, usize)> {
    Some((schema, 0))
}

/// `subschema_at` for keywords holding an array of schemas
pub(crate) fn indexed_at<'s>(schemas: &'s [SchemaRef], rest: &[String]) -> Option<(&'s SchemaRef, usize)> {
    let index: usize = rest.first()?.parse().ok()?;
    schemas.get(index).map(|s| (s, 1))
}

/// `subschema_at` for keywords holding a map of schemas
pub(crate) fn keyed_at<'s>(
    schemas: &'s IndexMap<String, SchemaRef>,
    rest: &[String],
) -> Option<(&'s SchemaRef, usize)> {
    schemas.get(rest.first()?.as_str()).map(|s| (s, 1))
}
