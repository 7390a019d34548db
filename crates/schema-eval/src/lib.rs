//! # schema-eval
//!
//! JSON Schema compilation and evaluation.
//!
//! A schema document is parsed once into a tree of [`Schema`] nodes, each
//! holding its keywords. For a given dialect (draft plus active vocabularies)
//! and [`SchemaRegistry`], the tree is compiled into a [`CompiledSchema`]: an
//! arena of constraint nodes with explicit keyword dependencies, cached on the
//! root schema. Evaluating an instance walks that graph and produces an
//! [`EvaluationResults`] tree, which is projected to the requested
//! [`OutputFormat`].
//!
//! ## Design
//!
//! - Keywords are pluggable through the [`Keyword`] trait and a
//!   [`KeywordRegistry`] of parse functions.
//! - Keywords that read each other (`then` reads `if`, `additionalProperties`
//!   reads `properties`, `unevaluated*` read everything) declare dependency
//!   edges at compile time; the evaluator pulls dependencies first.
//! - Instance validation failures are results, not errors. `Err` is reserved
//!   for broken schemas ([`SchemaError`]) and runtime faults
//!   ([`EvaluationError`]).
//!
//! ## Example
//!
//! ```rust
//! use schema_eval::{EvaluationOptions, OutputFormat, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::from_value(&json!({
//!     "type": "object",
//!     "properties": {"name": {"type": "string"}},
//!     "required": ["name"]
//! }))
//! .unwrap();
//!
//! let options = EvaluationOptions::default().with_output_format(OutputFormat::List);
//! let results = schema.evaluate(&json!({"name": 5}), &options).unwrap();
//! assert!(!results.is_valid());
//! assert!(results.details().iter().any(|r| r.error("type").is_some()));
//! ```

mod builder;
mod constraint;
mod error;
mod evaluator;
pub mod keywords;
mod options;
pub mod output;
mod registry;
mod results;
mod schema;
mod spec_version;
pub mod vocabulary;

pub use builder::{BuildContext, DynamicAnchor, find_sibling};
pub use constraint::{
    CompiledSchema, ConstraintBody, DynamicTargets, InstanceLocator, InstanceTarget, KeywordConstraint,
    KeywordEvaluator, LocatorFn, SchemaConstraint, SchemaId, ShortCircuit, SubschemaConstraint,
};
pub use error::{
    Error, EvaluationError, EvaluationResult, FailureKind, SchemaError, SchemaResult,
};
pub use evaluator::{KeywordContext, KeywordEvaluation, LocatorContext};
pub use keywords::{Keyword, KeywordParser, KeywordRegistry, STANDARD_KEYWORDS};
pub use options::{EvaluationOptions, Verbosity};
pub use output::OutputFormat;
pub use registry::{SchemaRegistry, same_schema};
pub use results::EvaluationResults;
pub use schema::{ParseContext, Schema, SchemaBody, SchemaRef};
pub use spec_version::{SpecVersion, SpecVersions};
pub use vocabulary::DialectSignature;

pub use schema_pointer::{JsonPointer, PathSegment};
