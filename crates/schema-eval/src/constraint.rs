// Compiled constraint graph

use crate::error::EvaluationResult;
use crate::evaluator::{KeywordContext, LocatorContext};
use crate::registry::resource_key;
use crate::schema::format_location;
use crate::vocabulary::DialectSignature;
use once_cell::sync::OnceCell;
use schema_pointer::JsonPointer;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Index of a schema constraint inside its [`CompiledSchema`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaId(pub(crate) usize);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Evaluation function of a keyword constraint
pub type KeywordEvaluator = Arc<dyn Fn(&mut KeywordContext<'_>) -> EvaluationResult<()> + Send + Sync>;

/// Computes instance targets from the local instance and dependency results
pub type LocatorFn = Arc<dyn Fn(&LocatorContext<'_>) -> Vec<InstanceTarget> + Send + Sync>;

/// Where a subschema is applied, relative to the current instance
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceTarget {
    /// A value inside the current instance
    Location(JsonPointer),
    /// A value that does not exist in the instance (e.g. a property name),
    /// reported at `location`
    Synthetic { location: JsonPointer, value: Value },
}

/// How a subschema dependency finds its instance(s)
#[derive(Clone)]
pub enum InstanceLocator {
    /// The current instance
    Same,
    /// A fixed child; skipped when it does not exist
    Relative(JsonPointer),
    /// Computed per evaluation
    Generated(LocatorFn),
}

impl fmt::Debug for InstanceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceLocator::Same => f.write_str("Same"),
            InstanceLocator::Relative(p) => write!(f, "Relative({})", p),
            InstanceLocator::Generated(_) => f.write_str("Generated"),
        }
    }
}

/// Candidate targets of a dynamic reference, one per schema resource.
///
/// Filled once after the whole graph is built, since resources entered later
/// in the build can still supply an anchor.
#[derive(Debug, Clone, Default)]
pub struct DynamicTargets(Arc<OnceCell<HashMap<String, SchemaId>>>);

impl DynamicTargets {
    pub(crate) fn fill(&self, candidates: HashMap<String, SchemaId>) {
        let _ = self.0.set(candidates);
    }

    /// The candidate of the outermost resource in `scope`
    pub fn select<'u>(&self, scope: impl IntoIterator<Item = &'u Url>) -> Option<SchemaId> {
        let candidates = self.0.get()?;
        scope
            .into_iter()
            .find_map(|base| candidates.get(&resource_key(base.clone())).copied())
    }
}

/// A subschema a keyword applies
#[derive(Debug, Clone)]
pub struct SubschemaConstraint {
    pub(crate) target: SchemaId,
    pub(crate) relative_evaluation_path: JsonPointer,
    pub(crate) locator: InstanceLocator,
    /// Replaces `target` when a resource in the dynamic scope supplies one
    pub(crate) dynamic: Option<DynamicTargets>,
}

impl SubschemaConstraint {
    /// Apply `target` to the current instance, under `relative_evaluation_path`
    pub fn new(target: SchemaId, relative_evaluation_path: JsonPointer) -> Self {
        Self {
            target,
            relative_evaluation_path,
            locator: InstanceLocator::Same,
            dynamic: None,
        }
    }

    pub fn with_relative_instance(mut self, pointer: JsonPointer) -> Self {
        self.locator = InstanceLocator::Relative(pointer);
        self
    }

    pub fn with_locator<F>(mut self, locator: F) -> Self
    where
        F: Fn(&LocatorContext<'_>) -> Vec<InstanceTarget> + Send + Sync + 'static,
    {
        self.locator = InstanceLocator::Generated(Arc::new(locator));
        self
    }

    /// Resolve the target against the dynamic scope at evaluation time
    pub fn with_dynamic_targets(mut self, targets: DynamicTargets) -> Self {
        self.dynamic = Some(targets);
        self
    }

    /// The statically resolved target
    pub fn target(&self) -> SchemaId {
        self.target
    }

    pub fn relative_evaluation_path(&self) -> &JsonPointer {
        &self.relative_evaluation_path
    }
}

/// Whether a keyword may stop applying subschemas early
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShortCircuit {
    #[default]
    Never,
    /// Stop at the first failing subschema result
    OnFailure,
    /// Stop at the first passing subschema result
    OnSuccess,
}

/// The compiled form of one keyword
#[derive(Clone)]
pub struct KeywordConstraint {
    pub(crate) keyword: String,
    pub(crate) evaluator: Option<KeywordEvaluator>,
    pub(crate) keyword_dependencies: Vec<usize>,
    pub(crate) subschema_dependencies: Vec<SubschemaConstraint>,
    pub(crate) short_circuit: ShortCircuit,
    pub(crate) collects_annotations: bool,
}

impl KeywordConstraint {
    pub fn new<F>(keyword: impl Into<String>, evaluator: F) -> Self
    where
        F: Fn(&mut KeywordContext<'_>) -> EvaluationResult<()> + Send + Sync + 'static,
    {
        Self {
            keyword: keyword.into(),
            evaluator: Some(Arc::new(evaluator)),
            keyword_dependencies: Vec::new(),
            subschema_dependencies: Vec::new(),
            short_circuit: ShortCircuit::Never,
            collects_annotations: false,
        }
    }

    /// A constraint that never runs: identifiers, `$defs`, inactive forms
    pub fn skip(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            evaluator: None,
            keyword_dependencies: Vec::new(),
            subschema_dependencies: Vec::new(),
            short_circuit: ShortCircuit::Never,
            collects_annotations: false,
        }
    }

    /// Sibling indices (from the `siblings` slice given to `compile`) this keyword reads
    pub fn with_keyword_dependencies(mut self, dependencies: Vec<usize>) -> Self {
        self.keyword_dependencies = dependencies;
        self
    }

    pub fn with_subschemas(mut self, subschemas: Vec<SubschemaConstraint>) -> Self {
        self.subschema_dependencies = subschemas;
        self
    }

    pub fn with_short_circuit(mut self, policy: ShortCircuit) -> Self {
        self.short_circuit = policy;
        self
    }

    /// Mark this keyword as reading annotations from nested frames
    pub fn collecting_annotations(mut self) -> Self {
        self.collects_annotations = true;
        self
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn is_skipped(&self) -> bool {
        self.evaluator.is_none()
    }

    pub fn keyword_dependencies(&self) -> &[usize] {
        &self.keyword_dependencies
    }

    pub fn subschema_dependencies(&self) -> &[SubschemaConstraint] {
        &self.subschema_dependencies
    }

    pub fn short_circuit(&self) -> ShortCircuit {
        self.short_circuit
    }
}

impl fmt::Debug for KeywordConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeywordConstraint")
            .field("keyword", &self.keyword)
            .field("skipped", &self.is_skipped())
            .field("keyword_dependencies", &self.keyword_dependencies)
            .field("subschema_dependencies", &self.subschema_dependencies)
            .field("short_circuit", &self.short_circuit)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum ConstraintBody {
    Bool(bool),
    Keywords(Vec<KeywordConstraint>),
}

/// The compiled form of one schema node
#[derive(Debug, Clone)]
pub struct SchemaConstraint {
    pub(crate) base_uri: Url,
    pub(crate) location: JsonPointer,
    pub(crate) body: ConstraintBody,
}

impl SchemaConstraint {
    pub fn body(&self) -> &ConstraintBody {
        &self.body
    }

    pub fn keywords(&self) -> &[KeywordConstraint] {
        match &self.body {
            ConstraintBody::Bool(_) => &[],
            ConstraintBody::Keywords(keywords) => keywords,
        }
    }

    /// Absolute `base#pointer` location of the source schema node
    pub fn schema_location(&self) -> String {
        format_location(&self.base_uri, &self.location)
    }
}

/// A dialect-resolved, dependency-wired evaluation plan.
///
/// Immutable once built and shared through `Arc` by every evaluation.
#[derive(Debug)]
pub struct CompiledSchema {
    pub(crate) nodes: Vec<SchemaConstraint>,
    pub(crate) root: SchemaId,
    pub(crate) signature: DialectSignature,
    pub(crate) collects_annotations: bool,
}

impl CompiledSchema {
    pub fn root(&self) -> SchemaId {
        self.root
    }

    pub fn node(&self, id: SchemaId) -> Option<&SchemaConstraint> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn signature(&self) -> &DialectSignature {
        &self.signature
    }

    /// Whether any keyword reads annotations of nested frames
    pub fn collects_annotations(&self) -> bool {
        self.collects_annotations
    }
}
