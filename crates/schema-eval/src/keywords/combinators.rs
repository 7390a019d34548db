//! Combinator keywords
//!
//! - allOf: every subschema must match
//! - anyOf: at least one subschema must match
//! - oneOf: exactly one subschema must match
//! - not: the subschema must not match

use super::{Keyword, KeywordRegistry, indexed_at, schema_array, single_at};
use crate::builder::BuildContext;
use crate::constraint::{KeywordConstraint, ShortCircuit, SubschemaConstraint};
use crate::error::{FailureKind, SchemaResult};
use crate::schema::{ParseContext, SchemaRef};
use crate::spec_version::SpecVersions;
use crate::vocabulary::vocab;
use schema_pointer::JsonPointer;
use serde_json::Value;
use std::any::Any;

pub(super) fn register(registry: &mut KeywordRegistry) {
    registry.register("allOf", parse_combinator);
    registry.register("anyOf", parse_combinator);
    registry.register("oneOf", parse_combinator);
    registry.register("not", parse_not);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    All,
    Any,
    One,
}

impl Combinator {
    fn name(self) -> &'static str {
        match self {
            Combinator::All => "allOf",
            Combinator::Any => "anyOf",
            Combinator::One => "oneOf",
        }
    }

    fn short_circuit(self) -> ShortCircuit {
        match self {
            Combinator::All => ShortCircuit::OnFailure,
            Combinator::Any => ShortCircuit::OnSuccess,
            // Counting matches needs every result
            Combinator::One => ShortCircuit::Never,
        }
    }
}

#[derive(Debug)]
pub struct CombinatorKeyword {
    kind: Combinator,
    schemas: Vec<SchemaRef>,
}

impl CombinatorKeyword {
    pub fn kind(&self) -> Combinator {
        self.kind
    }

    pub fn schemas(&self) -> &[SchemaRef] {
        &self.schemas
    }
}

fn parse_combinator(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let kind = match name {
        "anyOf" => Combinator::Any,
        "oneOf" => Combinator::One,
        _ => Combinator::All,
    };
    Ok(Box::new(CombinatorKeyword {
        kind,
        schemas: schema_array(name, value, ctx)?,
    }))
}

impl Keyword for CombinatorKeyword {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::APPLICATOR
    }

    fn compile(&self, _siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let name = self.kind.name();
        let mut subschemas = Vec::with_capacity(self.schemas.len());
        for (i, schema) in self.schemas.iter().enumerate() {
            let id = ctx.build_subschema(schema)?;
            subschemas.push(SubschemaConstraint::new(id, JsonPointer::from_segments([name.to_string(), i.to_string()])));
        }

        let kind = self.kind;
        Ok(KeywordConstraint::new(name, move |kc| {
            let results = kc.subschema_results();
            match kind {
                Combinator::All => {
                    if !kc.all_subschemas_valid() {
                        kc.invalidate();
                    }
                }
                Combinator::Any => {
                    if !results.iter().any(|r| r.is_valid()) {
                        kc.invalidate();
                    }
                }
                Combinator::One => {
                    let matched = results.iter().filter(|r| r.is_valid()).count();
                    if matched != 1 {
                        kc.fail(FailureKind::OneOfMismatch { matched });
                    }
                }
            }
            Ok(())
        })
        .with_subschemas(subschemas)
        .with_short_circuit(kind.short_circuit()))
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
pub struct NotKeyword {
    schema: SchemaRef,
}

fn parse_not(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(NotKeyword {
        schema: ctx.parse_subschema(value, [name])?,
    }))
}

impl Keyword for NotKeyword {
    fn name(&self) -> &str {
        "not"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::APPLICATOR
    }

    fn compile(&self, _siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let id = ctx.build_subschema(&self.schema)?;
        Ok(KeywordConstraint::new("not", |kc| {
            if kc.all_subschemas_valid() {
                kc.fail(FailureKind::NotExpectedMatch);
            }
            Ok(())
        })
        .with_subschemas(vec![SubschemaConstraint::new(id, JsonPointer::from_segments(["not"]))]))
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
