// Constraint builder: schema tree + dialect + registry -> compiled graph

use crate::constraint::{
    CompiledSchema, ConstraintBody, DynamicTargets, KeywordConstraint, SchemaConstraint, SchemaId,
};
use crate::error::{SchemaError, SchemaResult};
use crate::keywords::Keyword;
use crate::options::EvaluationOptions;
use crate::registry::{SchemaRegistry, embedded_resources, resolve_fragment, resource_key};
use crate::schema::{Schema, SchemaBody, SchemaRef};
use crate::spec_version::SpecVersion;
use crate::vocabulary::DialectSignature;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    signature: DialectSignature,
    registry: u64,
}

/// Compiled graphs of one root schema, keyed by dialect and registry.
///
/// Single assignment: when two callers race on a miss, the first insert wins
/// and both get that graph.
#[derive(Default)]
pub(crate) struct CompiledCache {
    entries: RwLock<HashMap<CacheKey, Arc<CompiledSchema>>>,
}

impl CompiledCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<CompiledSchema>> {
        self.entries.read().get(key).cloned()
    }

    fn insert(&self, key: CacheKey, graph: Arc<CompiledSchema>) -> Arc<CompiledSchema> {
        self.entries.write().entry(key).or_insert(graph).clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}

impl fmt::Debug for CompiledCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompiledCache({} entries)", self.len())
    }
}

impl Schema {
    /// Compile this schema for the dialect and registry `options` select.
    ///
    /// The graph is cached on this node; later calls with an equivalent
    /// dialect and the same registry return the same `Arc`.
    pub fn compile(self: &Arc<Self>, options: &EvaluationOptions) -> SchemaResult<Arc<CompiledSchema>> {
        let registry = options.registry();
        registry.ensure_registered(self);

        let signature = DialectSignature::resolve(self, options)?;
        let key = CacheKey {
            signature: signature.clone(),
            registry: registry.id(),
        };
        if let Some(graph) = self.compiled.get(&key) {
            return Ok(graph);
        }

        let graph = Arc::new(compile(self, signature, registry)?);
        Ok(self.compiled.insert(key, graph))
    }

    /// Number of cached compiled graphs
    pub fn compiled_graphs(&self) -> usize {
        self.compiled.len()
    }
}

/// What a dynamic reference looks for in each schema resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicAnchor {
    /// A node declaring `$dynamicAnchor` with this name
    Named(String),
    /// The resource root, when it declares `$recursiveAnchor: true`
    Recursive,
}

/// State of one compilation pass.
///
/// Keywords receive this in [`Keyword::compile`] to build subschemas,
/// resolve references and inspect siblings.
pub struct BuildContext<'a> {
    registry: &'a SchemaRegistry,
    signature: &'a DialectSignature,
    /// Resources of the schema being compiled; searched before the registry
    local: HashMap<String, SchemaRef>,
    dynamic: Vec<(DynamicAnchor, DynamicTargets)>,
    arena: Vec<Option<SchemaConstraint>>,
    /// Schema identity (`Arc` pointer) to reserved arena slot
    visited: HashMap<usize, SchemaId>,
    /// Schema nodes currently being compiled, innermost last
    stack: Vec<SchemaRef>,
    /// Active keyword names of each node on `stack`, in compile order
    active: Vec<Vec<String>>,
    collects_annotations: bool,
}

impl<'a> BuildContext<'a> {
    fn new(root: &SchemaRef, registry: &'a SchemaRegistry, signature: &'a DialectSignature) -> Self {
        let mut local: HashMap<String, SchemaRef> = embedded_resources(root).into_iter().collect();
        if root.location().is_empty() {
            local.insert(resource_key(root.base_uri().clone()), root.clone());
        }
        Self {
            registry,
            signature,
            local,
            dynamic: Vec::new(),
            arena: Vec::new(),
            visited: HashMap::new(),
            stack: Vec::new(),
            active: Vec::new(),
            collects_annotations: false,
        }
    }

    pub fn signature(&self) -> &DialectSignature {
        self.signature
    }

    pub fn spec_version(&self) -> SpecVersion {
        self.signature.version()
    }

    /// The schema node whose keywords are being compiled
    pub fn current_schema(&self) -> SchemaResult<&SchemaRef> {
        self.stack
            .last()
            .ok_or_else(|| SchemaError::Internal("no schema is being compiled".to_string()))
    }

    pub fn base_uri(&self) -> SchemaResult<&Url> {
        Ok(self.current_schema()?.base_uri())
    }

    /// Compile `schema` (or return its id if it is already reserved)
    pub fn build_subschema(&mut self, schema: &SchemaRef) -> SchemaResult<SchemaId> {
        let identity = Arc::as_ptr(schema) as usize;
        if let Some(id) = self.visited.get(&identity) {
            return Ok(*id);
        }

        let id = SchemaId(self.arena.len());
        self.arena.push(None);
        self.visited.insert(identity, id);

        let constraint = self.compile_node(schema)?;
        self.arena[id.0] = Some(constraint);
        Ok(id)
    }

    /// Resolve a reference against the current base URI.
    ///
    /// Resources of the schema being compiled win over registry entries that
    /// share their URI.
    pub fn resolve_reference(&self, reference: &str) -> SchemaResult<SchemaRef> {
        let base = self.base_uri()?;
        let target = base.join(reference).map_err(|e| SchemaError::InvalidUri {
            uri: reference.to_string(),
            message: e.to_string(),
        })?;
        let found = match self.local.get(&resource_key(target.clone())) {
            Some(document) => resolve_fragment(document, target.fragment()),
            None => self.registry.resolve(target.as_str()),
        };
        found.ok_or_else(|| SchemaError::UnresolvedReference {
            reference: reference.to_string(),
            base: base.to_string(),
        })
    }

    /// Candidate targets for a dynamic reference, filled once the graph is complete
    pub fn dynamic_targets(&mut self, anchor: DynamicAnchor) -> DynamicTargets {
        let targets = DynamicTargets::default();
        self.dynamic.push((anchor, targets.clone()));
        targets
    }

    fn resource(&self, key: &str) -> Option<SchemaRef> {
        match self.local.get(key) {
            Some(document) => Some(document.clone()),
            None => self.registry.resolve(key),
        }
    }

    /// Compile what each resource in the graph offers to the dynamic references.
    ///
    /// Compiling a candidate can pull new resources and new dynamic references
    /// into the graph, so this repeats until neither grows.
    fn link_dynamic_targets(&mut self) -> SchemaResult<()> {
        if self.dynamic.is_empty() {
            return Ok(());
        }
        let mut candidates: Vec<HashMap<String, SchemaId>> = Vec::new();
        let mut linked = 0;
        loop {
            if candidates.len() < self.dynamic.len() {
                candidates.resize_with(self.dynamic.len(), HashMap::new);
                linked = 0;
            }
            if linked >= self.arena.len() {
                break;
            }
            let end = self.arena.len();
            let mut bases: Vec<String> = self.arena[linked..end]
                .iter()
                .flatten()
                .map(|node| resource_key(node.base_uri.clone()))
                .collect();
            bases.sort();
            bases.dedup();
            linked = end;

            for base in bases {
                let Some(document) = self.resource(&base) else {
                    continue;
                };
                for i in 0..candidates.len() {
                    if candidates[i].contains_key(&base) {
                        continue;
                    }
                    let found = match &self.dynamic[i].0 {
                        DynamicAnchor::Named(name) => document.find_dynamic_anchor(name),
                        DynamicAnchor::Recursive => {
                            Some(document.clone()).filter(|d| d.has_recursive_anchor())
                        }
                    };
                    if let Some(found) = found {
                        let id = self.build_subschema(&found)?;
                        candidates[i].insert(base.clone(), id);
                    }
                }
            }
        }
        for ((anchor, targets), found) in self.dynamic.iter().zip(candidates) {
            tracing::trace!(anchor = ?anchor, resources = found.len(), "linked dynamic targets");
            targets.fill(found);
        }
        Ok(())
    }

    /// Parsed value of an active sibling keyword on the current node
    pub fn sibling_keyword<K: Keyword + 'static>(&self, name: &str) -> Option<&K> {
        let active = self.active.last()?;
        if !active.iter().any(|n| n == name) {
            return None;
        }
        self.stack.last()?.keyword_as::<K>(name)
    }

    /// Index of a sibling this keyword cannot work without.
    ///
    /// Fails with `MissingDependency` when the sibling is not active on this
    /// node and with `DependencyOrder` when it is compiled later.
    pub fn require_sibling(
        &self,
        siblings: &[KeywordConstraint],
        keyword: &str,
        dependency: &str,
    ) -> SchemaResult<usize> {
        if let Some(index) = find_sibling(siblings, dependency) {
            return Ok(index);
        }
        let declared = self
            .active
            .last()
            .is_some_and(|names| names.iter().any(|n| n == dependency));
        if declared {
            Err(SchemaError::DependencyOrder {
                keyword: keyword.to_string(),
                dependency: dependency.to_string(),
            })
        } else {
            Err(SchemaError::MissingDependency {
                keyword: keyword.to_string(),
                dependency: dependency.to_string(),
            })
        }
    }

    fn compile_node(&mut self, schema: &SchemaRef) -> SchemaResult<SchemaConstraint> {
        let body = match schema.body() {
            SchemaBody::Bool(value) => ConstraintBody::Bool(*value),
            SchemaBody::Keywords(_) => {
                let active = self.signature.active_keywords(schema);
                self.stack.push(schema.clone());
                self.active
                    .push(active.iter().map(|k| k.name().to_string()).collect());
                let compiled = self.compile_keywords(&active);
                self.stack.pop();
                self.active.pop();
                ConstraintBody::Keywords(compiled?)
            }
        };
        Ok(SchemaConstraint {
            base_uri: schema.base_uri().clone(),
            location: schema.location().clone(),
            body,
        })
    }

    fn compile_keywords(&mut self, active: &[&dyn Keyword]) -> SchemaResult<Vec<KeywordConstraint>> {
        let mut compiled: Vec<KeywordConstraint> = Vec::with_capacity(active.len());
        for keyword in active {
            let constraint = keyword.compile(&compiled, self)?;
            if let Some(&bad) = constraint
                .keyword_dependencies
                .iter()
                .find(|&&i| i >= compiled.len())
            {
                return Err(SchemaError::Internal(format!(
                    "keyword '{}' names dependency index {} but only {} siblings precede it",
                    keyword.name(),
                    bad,
                    compiled.len()
                )));
            }
            if constraint.collects_annotations {
                self.collects_annotations = true;
            }
            tracing::trace!(
                keyword = keyword.name(),
                dependencies = ?constraint.keyword_dependencies,
                subschemas = constraint.subschema_dependencies.len(),
                "compiled keyword"
            );
            compiled.push(constraint);
        }
        Ok(compiled)
    }
}

/// Index of an already compiled sibling
pub fn find_sibling(siblings: &[KeywordConstraint], name: &str) -> Option<usize> {
    siblings.iter().position(|s| s.keyword == name)
}

pub(crate) fn compile(
    root: &SchemaRef,
    signature: DialectSignature,
    registry: &SchemaRegistry,
) -> SchemaResult<CompiledSchema> {
    let mut ctx = BuildContext::new(root, registry, &signature);
    let root_id = ctx.build_subschema(root)?;
    ctx.link_dynamic_targets()?;

    let BuildContext {
        arena,
        collects_annotations,
        ..
    } = ctx;
    let nodes = arena
        .into_iter()
        .enumerate()
        .map(|(i, node)| {
            node.ok_or_else(|| SchemaError::Internal(format!("schema constraint {} was never filled", i)))
        })
        .collect::<SchemaResult<Vec<_>>>()?;

    tracing::debug!(
        nodes = nodes.len(),
        version = %signature.version(),
        root = %root.schema_location(),
        "compiled schema graph"
    );
    Ok(CompiledSchema {
        nodes,
        root: root_id,
        signature,
        collects_annotations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_is_cached() {
        let schema = Schema::from_value(&json!({"type": "string"})).unwrap();
        let options = EvaluationOptions::default();
        let first = schema.compile(&options).unwrap();
        let second = schema.compile(&options).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(schema.compiled_graphs(), 1);
    }

    #[test]
    fn test_concurrent_first_compile_has_one_winner() {
        let schema = Schema::from_value(&json!({
            "$defs": {"count": {"type": "integer", "minimum": 0}},
            "properties": {"total": {"$ref": "#/$defs/count"}}
        }))
        .unwrap();
        let options = EvaluationOptions::default();

        let graphs: Vec<Arc<CompiledSchema>> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| schema.compile(&options).unwrap()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });
        assert!(graphs.iter().all(|g| Arc::ptr_eq(g, &graphs[0])));
        assert_eq!(schema.compiled_graphs(), 1);
        assert!(Arc::ptr_eq(&schema.compile(&options).unwrap(), &graphs[0]));
    }

    #[test]
    fn test_local_resources_shadow_the_registry() {
        let first = Schema::from_value(&json!({
            "$id": "https://example.com/shared.json",
            "$defs": {"x": {"type": "integer"}},
            "$ref": "#/$defs/x"
        }))
        .unwrap();
        let second = Schema::from_value(&json!({
            "$id": "https://example.com/shared.json",
            "$defs": {"x": {"type": "string"}},
            "$ref": "#/$defs/x"
        }))
        .unwrap();
        let options = EvaluationOptions::default();
        first.compile(&options).unwrap();
        assert!(Arc::ptr_eq(
            &options.registry().resolve("https://example.com/shared.json").unwrap(),
            &first
        ));

        assert!(second.evaluate(&json!("a"), &options).unwrap().is_valid());
        assert!(!second.evaluate(&json!(1), &options).unwrap().is_valid());
    }

    #[test]
    fn test_cache_keyed_by_dialect_and_registry() {
        let schema = Schema::from_value(&json!({"type": "string"})).unwrap();
        let options = EvaluationOptions::default();
        let latest = schema.compile(&options).unwrap();
        let draft7 = schema
            .compile(&options.clone().with_evaluate_as(SpecVersion::Draft7))
            .unwrap();
        assert!(!Arc::ptr_eq(&latest, &draft7));

        let other_registry = EvaluationOptions::default();
        let third = schema.compile(&other_registry).unwrap();
        assert!(!Arc::ptr_eq(&latest, &third));
        assert_eq!(schema.compiled_graphs(), 3);
    }

    #[test]
    fn test_recursive_reference_terminates() {
        let schema = Schema::from_value(&json!({
            "$defs": {"node": {"properties": {"next": {"$ref": "#/$defs/node"}}}},
            "$ref": "#/$defs/node"
        }))
        .unwrap();
        let graph = schema.compile(&EvaluationOptions::default()).unwrap();
        // root, node, next
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_unresolved_reference() {
        let schema = Schema::from_value(&json!({"$ref": "#/$defs/missing"})).unwrap();
        let err = schema.compile(&EvaluationOptions::default()).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedReference { ref reference, .. } if reference == "#/$defs/missing"));
    }

    #[test]
    fn test_array_items_rejected_in_2020() {
        let schema = Schema::from_value(&json!({"items": [{"type": "string"}]})).unwrap();
        let err = schema.compile(&EvaluationOptions::default()).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedForm { .. }));

        let legacy = EvaluationOptions::default().with_evaluate_as(SpecVersion::Draft201909);
        assert!(schema.compile(&legacy).is_ok());
    }

    #[test]
    fn test_inactive_keywords_are_dropped() {
        let schema = Schema::from_value(&json!({"dependentRequired": {"a": ["b"]}, "minimum": 1}))
            .unwrap();
        let options = EvaluationOptions::default().with_evaluate_as(SpecVersion::Draft7);
        let graph = schema.compile(&options).unwrap();
        let root = graph.node(graph.root()).unwrap();
        let names: Vec<&str> = root.keywords().iter().map(|k| k.keyword()).collect();
        assert_eq!(names, vec!["minimum"]);
    }
}
