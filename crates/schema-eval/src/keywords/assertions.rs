//! Validation vocabulary assertions
//!
//! These keywords never apply subschemas; each checks the local instance and
//! ignores instance types it does not constrain.

use super::{Keyword, KeywordRegistry, non_negative_integer, string_array};
use crate::builder::BuildContext;
use crate::constraint::KeywordConstraint;
use crate::error::{FailureKind, SchemaError, SchemaResult};
use crate::schema::{ParseContext, json_type_name};
use crate::spec_version::{SpecVersion, SpecVersions};
use crate::vocabulary::vocab;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Number, Value};
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;

pub(super) fn register(registry: &mut KeywordRegistry) {
    registry.register("type", parse_type);
    registry.register("enum", parse_enum);
    registry.register("const", parse_const);
    for name in [
        "minimum",
        "maximum",
        "exclusiveMinimum",
        "exclusiveMaximum",
        "multipleOf",
    ] {
        registry.register(name, parse_number_bound);
    }
    for name in [
        "minLength",
        "maxLength",
        "minItems",
        "maxItems",
        "minProperties",
        "maxProperties",
        "minContains",
        "maxContains",
    ] {
        registry.register(name, parse_count);
    }
    registry.register("pattern", parse_pattern);
    registry.register("uniqueItems", parse_unique_items);
    registry.register("required", parse_required);
    registry.register("dependentRequired", parse_dependent_required);
}

/// JSON equality where `1` and `1.0` are the same number
pub(crate) fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x == y
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x == y
            } else {
                x.as_f64() == y.as_f64()
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| json_equal(v, other)))
        }
        _ => a == b,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "null" => JsonType::Null,
            "boolean" => JsonType::Boolean,
            "integer" => JsonType::Integer,
            "number" => JsonType::Number,
            "string" => JsonType::String,
            "array" => JsonType::Array,
            "object" => JsonType::Object,
            _ => return None,
        })
    }

    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (JsonType::Null, Value::Null) => true,
            (JsonType::Boolean, Value::Bool(_)) => true,
            (JsonType::Number, Value::Number(_)) => true,
            (JsonType::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            (JsonType::String, Value::String(_)) => true,
            (JsonType::Array, Value::Array(_)) => true,
            (JsonType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct TypeKeyword {
    types: Vec<JsonType>,
}

impl TypeKeyword {
    pub fn types(&self) -> &[JsonType] {
        &self.types
    }
}

fn parse_type(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let names = match value {
        Value::String(single) => vec![single.clone()],
        Value::Array(_) => string_array(name, value, ctx)?,
        _ => return Err(ctx.invalid_value(name, "expected a type name or an array of type names")),
    };
    let types = names
        .iter()
        .map(|n| {
            JsonType::parse(n).ok_or_else(|| ctx.invalid_value(name, format!("unknown type '{}'", n)))
        })
        .collect::<SchemaResult<Vec<_>>>()?;
    if types.is_empty() {
        return Err(ctx.invalid_value(name, "expected at least one type"));
    }
    Ok(Box::new(TypeKeyword { types }))
}

impl Keyword for TypeKeyword {
    fn name(&self) -> &str {
        "type"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::VALIDATION
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let types = self.types.clone();
        let expected = types.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(" or ");
        Ok(KeywordConstraint::new("type", move |kc| {
            let instance = kc.instance();
            if !types.iter().any(|t| t.matches(instance)) {
                kc.fail(FailureKind::TypeMismatch {
                    expected: expected.clone(),
                    got: json_type_name(instance).to_string(),
                });
            }
            Ok(())
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct EnumKeyword {
    values: Vec<Value>,
}

fn parse_enum(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let values = value
        .as_array()
        .ok_or_else(|| ctx.invalid_value(name, "expected an array"))?;
    Ok(Box::new(EnumKeyword {
        values: values.clone(),
    }))
}

impl Keyword for EnumKeyword {
    fn name(&self) -> &str {
        "enum"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::VALIDATION
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let values = self.values.clone();
        Ok(KeywordConstraint::new("enum", move |kc| {
            let instance = kc.instance();
            if !values.iter().any(|v| json_equal(v, instance)) {
                kc.fail(FailureKind::InvalidEnumValue {
                    value: instance.to_string(),
                    allowed: values.iter().map(Value::to_string).collect(),
                });
            }
            Ok(())
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct ConstKeyword {
    value: Value,
}

fn parse_const(_name: &str, value: &Value, _ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(ConstKeyword {
        value: value.clone(),
    }))
}

impl Keyword for ConstKeyword {
    fn name(&self) -> &str {
        "const"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::since(SpecVersion::Draft6)
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::VALIDATION
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let expected = self.value.clone();
        Ok(KeywordConstraint::new("const", move |kc| {
            if !json_equal(&expected, kc.instance()) {
                kc.fail(FailureKind::ConstMismatch {
                    expected: expected.to_string(),
                });
            }
            Ok(())
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Minimum,
    Maximum,
    ExclusiveMinimum,
    ExclusiveMaximum,
    MultipleOf,
}

impl BoundKind {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "minimum" => BoundKind::Minimum,
            "maximum" => BoundKind::Maximum,
            "exclusiveMinimum" => BoundKind::ExclusiveMinimum,
            "exclusiveMaximum" => BoundKind::ExclusiveMaximum,
            "multipleOf" => BoundKind::MultipleOf,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            BoundKind::Minimum => "minimum",
            BoundKind::Maximum => "maximum",
            BoundKind::ExclusiveMinimum => "exclusiveMinimum",
            BoundKind::ExclusiveMaximum => "exclusiveMaximum",
            BoundKind::MultipleOf => "multipleOf",
        }
    }

    /// The failure for `value`, if it violates this bound
    fn check(self, value: &Number, limit: &Number) -> Option<FailureKind> {
        let ordering = compare_numbers(value, limit)?;
        let (value, limit) = (value.as_f64()?, limit.as_f64()?);
        let out_of_range = |minimum, maximum, exclusive_minimum, exclusive_maximum| FailureKind::NumberOutOfRange {
            value,
            minimum,
            maximum,
            exclusive_minimum,
            exclusive_maximum,
        };
        match self {
            BoundKind::Minimum if ordering.is_lt() => Some(out_of_range(Some(limit), None, None, None)),
            BoundKind::Maximum if ordering.is_gt() => Some(out_of_range(None, Some(limit), None, None)),
            BoundKind::ExclusiveMinimum if ordering.is_le() => Some(out_of_range(None, None, Some(limit), None)),
            BoundKind::ExclusiveMaximum if ordering.is_ge() => Some(out_of_range(None, None, None, Some(limit))),
            BoundKind::MultipleOf if !is_multiple_of(value, limit) => Some(FailureKind::NumberNotMultipleOf {
                value,
                multiple_of: limit,
            }),
            _ => None,
        }
    }
}

/// Order two JSON numbers, exactly when both are integers
fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return Some(x.cmp(&y));
    }
    // One side is a u64 above i64::MAX, the other a negative i64
    if a.is_i64() && b.is_u64() {
        return Some(Ordering::Less);
    }
    if a.is_u64() && b.is_i64() {
        return Some(Ordering::Greater);
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

fn is_multiple_of(value: f64, divisor: f64) -> bool {
    if value.fract() == 0.0 && divisor.fract() == 0.0 {
        return value % divisor == 0.0;
    }
    let quotient = value / divisor;
    if !quotient.is_finite() {
        // Every integer is a multiple of a divisor that divides 1 (0.5, 0.25, ...)
        return value.fract() == 0.0 && (1.0 / divisor).fract() == 0.0;
    }
    // Decimal divisors like 0.01 are not exact in binary
    (quotient - quotient.round()).abs() <= 1e-9 * quotient.abs().max(1.0)
}

#[derive(Debug)]
pub struct NumberBoundKeyword {
    kind: BoundKind,
    limit: Number,
}

impl NumberBoundKeyword {
    pub fn kind(&self) -> BoundKind {
        self.kind
    }

    pub fn limit(&self) -> f64 {
        self.limit.as_f64().unwrap_or_default()
    }
}

fn parse_number_bound(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let kind = BoundKind::from_name(name)
        .ok_or_else(|| SchemaError::Internal(format!("'{}' is not a numeric bound", name)))?;
    let Value::Number(limit) = value else {
        return Err(ctx.invalid_value(name, "expected a number"));
    };
    if kind == BoundKind::MultipleOf && limit.as_f64().is_none_or(|l| l <= 0.0) {
        return Err(ctx.invalid_value(name, "expected a number greater than 0"));
    }
    Ok(Box::new(NumberBoundKeyword {
        kind,
        limit: limit.clone(),
    }))
}

impl Keyword for NumberBoundKeyword {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::VALIDATION
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let (kind, limit) = (self.kind, self.limit.clone());
        Ok(KeywordConstraint::new(kind.name(), move |kc| {
            if let Value::Number(value) = kc.instance()
                && let Some(failure) = kind.check(value, &limit)
            {
                kc.fail(failure);
            }
            Ok(())
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountKind {
    MinLength,
    MaxLength,
    MinItems,
    MaxItems,
    MinProperties,
    MaxProperties,
    MinContains,
    MaxContains,
}

impl CountKind {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "minLength" => CountKind::MinLength,
            "maxLength" => CountKind::MaxLength,
            "minItems" => CountKind::MinItems,
            "maxItems" => CountKind::MaxItems,
            "minProperties" => CountKind::MinProperties,
            "maxProperties" => CountKind::MaxProperties,
            "minContains" => CountKind::MinContains,
            "maxContains" => CountKind::MaxContains,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            CountKind::MinLength => "minLength",
            CountKind::MaxLength => "maxLength",
            CountKind::MinItems => "minItems",
            CountKind::MaxItems => "maxItems",
            CountKind::MinProperties => "minProperties",
            CountKind::MaxProperties => "maxProperties",
            CountKind::MinContains => "minContains",
            CountKind::MaxContains => "maxContains",
        }
    }

    fn is_minimum(self) -> bool {
        matches!(
            self,
            CountKind::MinLength | CountKind::MinItems | CountKind::MinProperties | CountKind::MinContains
        )
    }

    /// The size this bound measures, when it applies to `value`
    fn measure(self, value: &Value) -> Option<usize> {
        match (self, value) {
            (CountKind::MinLength | CountKind::MaxLength, Value::String(s)) => Some(s.chars().count()),
            (CountKind::MinItems | CountKind::MaxItems, Value::Array(items)) => Some(items.len()),
            (CountKind::MinProperties | CountKind::MaxProperties, Value::Object(map)) => Some(map.len()),
            _ => None,
        }
    }

    fn failure(self, size: usize, limit: u64) -> FailureKind {
        let (min, max) = if self.is_minimum() {
            (Some(limit), None)
        } else {
            (None, Some(limit))
        };
        match self {
            CountKind::MinLength | CountKind::MaxLength => FailureKind::StringLengthInvalid {
                length: size,
                min_length: min,
                max_length: max,
            },
            CountKind::MinItems | CountKind::MaxItems => FailureKind::ArrayLengthInvalid {
                length: size,
                min_items: min,
                max_items: max,
            },
            _ => FailureKind::ObjectPropertyCountInvalid {
                count: size,
                min_properties: min,
                max_properties: max,
            },
        }
    }
}

/// Length, item-count and property-count bounds, plus the
/// `minContains`/`maxContains` limits read by `contains`
#[derive(Debug)]
pub struct CountKeyword {
    kind: CountKind,
    limit: u64,
}

impl CountKeyword {
    pub fn kind(&self) -> CountKind {
        self.kind
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

fn parse_count(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let kind = CountKind::from_name(name)
        .ok_or_else(|| SchemaError::Internal(format!("'{}' is not a count bound", name)))?;
    Ok(Box::new(CountKeyword {
        kind,
        limit: non_negative_integer(name, value, ctx)?,
    }))
}

impl Keyword for CountKeyword {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn spec_versions(&self) -> SpecVersions {
        match self.kind {
            CountKind::MinContains | CountKind::MaxContains => SpecVersions::since(SpecVersion::Draft201909),
            _ => SpecVersions::ALL,
        }
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::VALIDATION
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let (kind, limit) = (self.kind, self.limit);
        if matches!(kind, CountKind::MinContains | CountKind::MaxContains) {
            return Ok(KeywordConstraint::skip(kind.name()));
        }
        Ok(KeywordConstraint::new(kind.name(), move |kc| {
            let Some(size) = kind.measure(kc.instance()) else {
                return Ok(());
            };
            let violated = if kind.is_minimum() {
                (size as u64) < limit
            } else {
                size as u64 > limit
            };
            if violated {
                kc.fail(kind.failure(size, limit));
            }
            Ok(())
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct PatternKeyword {
    regex: Regex,
}

fn parse_pattern(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let pattern = value
        .as_str()
        .ok_or_else(|| ctx.invalid_value(name, "expected a regular expression string"))?;
    let regex = Regex::new(pattern).map_err(|e| SchemaError::InvalidRegex {
        keyword: name.to_string(),
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    Ok(Box::new(PatternKeyword { regex }))
}

impl Keyword for PatternKeyword {
    fn name(&self) -> &str {
        "pattern"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::VALIDATION
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let regex = self.regex.clone();
        Ok(KeywordConstraint::new("pattern", move |kc| {
            if let Value::String(s) = kc.instance()
                && !regex.is_match(s)
            {
                kc.fail(FailureKind::StringPatternMismatch {
                    value: s.clone(),
                    pattern: regex.as_str().to_string(),
                });
            }
            Ok(())
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct UniqueItemsKeyword {
    unique: bool,
}

fn parse_unique_items(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let unique = value
        .as_bool()
        .ok_or_else(|| ctx.invalid_value(name, "expected a boolean"))?;
    Ok(Box::new(UniqueItemsKeyword { unique }))
}

impl Keyword for UniqueItemsKeyword {
    fn name(&self) -> &str {
        "uniqueItems"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::VALIDATION
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        if !self.unique {
            return Ok(KeywordConstraint::skip("uniqueItems"));
        }
        Ok(KeywordConstraint::new("uniqueItems", |kc| {
            let Value::Array(items) = kc.instance() else {
                return Ok(());
            };
            for (first, a) in items.iter().enumerate() {
                if let Some(offset) = items[first + 1..].iter().position(|b| json_equal(a, b)) {
                    kc.fail(FailureKind::ArrayItemsNotUnique {
                        first,
                        second: first + 1 + offset,
                    });
                    break;
                }
            }
            Ok(())
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct RequiredKeyword {
    properties: Vec<String>,
}

fn parse_required(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(RequiredKeyword {
        properties: string_array(name, value, ctx)?,
    }))
}

impl Keyword for RequiredKeyword {
    fn name(&self) -> &str {
        "required"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::VALIDATION
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let properties = self.properties.clone();
        Ok(KeywordConstraint::new("required", move |kc| {
            let Value::Object(map) = kc.instance() else {
                return Ok(());
            };
            let missing: Vec<String> = properties
                .iter()
                .filter(|p| !map.contains_key(*p))
                .cloned()
                .collect();
            if !missing.is_empty() {
                kc.fail(FailureKind::MissingRequiredProperties { properties: missing });
            }
            Ok(())
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct DependentRequiredKeyword {
    entries: IndexMap<String, Vec<String>>,
}

fn parse_dependent_required(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let map = value
        .as_object()
        .ok_or_else(|| ctx.invalid_value(name, "expected an object of string arrays"))?;
    let entries = map
        .iter()
        .map(|(property, names)| -> SchemaResult<(String, Vec<String>)> {
            Ok((property.clone(), string_array(name, names, ctx)?))
        })
        .collect::<SchemaResult<IndexMap<_, _>>>()?;
    Ok(Box::new(DependentRequiredKeyword { entries }))
}

impl Keyword for DependentRequiredKeyword {
    fn name(&self) -> &str {
        "dependentRequired"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::since(SpecVersion::Draft201909)
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::VALIDATION
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let entries = self.entries.clone();
        Ok(KeywordConstraint::new("dependentRequired", move |kc| {
            let Value::Object(map) = kc.instance() else {
                return Ok(());
            };
            for (property, names) in &entries {
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
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
