// Schema registry for reference resolution

use crate::error::{SchemaError, SchemaResult};
use crate::schema::SchemaRef;
use parking_lot::RwLock;
use schema_pointer::JsonPointer;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Maps resource URIs to schema nodes.
///
/// Lookups take a read lock; registration takes a write lock. Each registry
/// has a process-unique id, which compiled-graph caches key on.
pub struct SchemaRegistry {
    id: u64,
    resources: RwLock<HashMap<String, SchemaRef>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            resources: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Register a schema under its own base URI, plus every embedded resource
    pub fn register(&self, schema: &SchemaRef) -> SchemaResult<()> {
        let uri = schema.base_uri().clone();
        self.insert_resources(uri, schema);
        Ok(())
    }

    /// Register a schema under an explicit URI, plus every embedded resource
    pub fn register_as(&self, uri: &str, schema: &SchemaRef) -> SchemaResult<()> {
        let uri = Url::parse(uri).map_err(|e| SchemaError::InvalidUri {
            uri: uri.to_string(),
            message: e.to_string(),
        })?;
        self.insert_resources(uri, schema);
        Ok(())
    }

    /// Register `schema` unless its base URI is already taken.
    ///
    /// Only resource roots are registered; a nested node does not own its base.
    pub(crate) fn ensure_registered(&self, schema: &SchemaRef) {
        if !schema.location().is_empty() {
            return;
        }
        let key = resource_key(schema.base_uri().clone());
        if !self.resources.read().contains_key(&key) {
            self.insert_resources(schema.base_uri().clone(), schema);
        }
    }

    pub fn contains(&self, uri: &str) -> bool {
        match Url::parse(uri) {
            Ok(url) => self.resources.read().contains_key(&resource_key(url)),
            Err(_) => false,
        }
    }

    /// Resolve an absolute URI, including an optional fragment.
    ///
    /// The fragment may be empty, a JSON Pointer (`#/$defs/a`), or a
    /// plain-name anchor (`#node`).
    pub fn resolve(&self, uri: &str) -> Option<SchemaRef> {
        let url = Url::parse(uri).ok()?;
        let fragment = url.fragment().map(str::to_string);
        let document = self.resources.read().get(&resource_key(url))?.clone();
        resolve_fragment(&document, fragment.as_deref())
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    fn insert_resources(&self, uri: Url, schema: &SchemaRef) {
        let mut resources = self.resources.write();
        let key = resource_key(uri);
        tracing::debug!(uri = %key, "registering schema");
        resources.insert(key, schema.clone());
        for (key, node) in embedded_resources(schema) {
            tracing::debug!(uri = %key, "registering embedded resource");
            resources.insert(key, node);
        }
    }
}

/// Every node below `schema` that declares its own `$id`, keyed by resource URI
pub(crate) fn embedded_resources(schema: &SchemaRef) -> Vec<(String, SchemaRef)> {
    let mut found = Vec::new();
    let mut stack: Vec<&SchemaRef> = schema.subschemas();
    while let Some(node) = stack.pop() {
        if let Some(id) = node.id() {
            found.push((resource_key(id.clone()), node.clone()));
        }
        stack.extend(node.subschemas());
    }
    found
}

/// Resolve an empty, JSON Pointer or plain-name fragment inside `document`
pub(crate) fn resolve_fragment(document: &SchemaRef, fragment: Option<&str>) -> Option<SchemaRef> {
    match fragment {
        None | Some("") => Some(document.clone()),
        Some(pointer) if pointer.starts_with('/') => {
            let pointer = JsonPointer::from_uri_fragment(pointer).ok()?;
            document.find_subschema(&pointer)
        }
        Some(anchor) => document.find_anchor(anchor),
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("id", &self.id)
            .field("resources", &self.len())
            .finish()
    }
}

pub(crate) fn resource_key(mut uri: Url) -> String {
    uri.set_fragment(None);
    uri.to_string()
}

/// Whether two handles are the same schema node
pub fn same_schema(a: &SchemaRef, b: &SchemaRef) -> bool {
    std::sync::Arc::ptr_eq(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use serde_json::json;

    fn sample() -> SchemaRef {
        Schema::from_value(&json!({
            "$id": "https://example.com/root.json",
            "$defs": {
                "name": {"$anchor": "name", "type": "string"},
                "embedded": {
                    "$id": "https://example.com/other.json",
                    "$defs": {"leaf": {"type": "integer"}}
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_resolve_document() {
        let registry = SchemaRegistry::new();
        let root = sample();
        registry.register(&root).unwrap();

        let found = registry.resolve("https://example.com/root.json").unwrap();
        assert!(same_schema(&found, &root));
        let found = registry.resolve("https://example.com/root.json#").unwrap();
        assert!(same_schema(&found, &root));
    }

    #[test]
    fn test_resolve_pointer_and_anchor() {
        let registry = SchemaRegistry::new();
        registry.register(&sample()).unwrap();

        let by_pointer = registry
            .resolve("https://example.com/root.json#/$defs/name")
            .unwrap();
        let by_anchor = registry.resolve("https://example.com/root.json#name").unwrap();
        assert!(same_schema(&by_pointer, &by_anchor));
        assert!(registry.resolve("https://example.com/root.json#/$defs/none").is_none());
        assert!(registry.resolve("https://example.com/root.json#none").is_none());
    }

    #[test]
    fn test_embedded_resources_registered() {
        let registry = SchemaRegistry::new();
        registry.register(&sample()).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("https://example.com/other.json"));
        let leaf = registry
            .resolve("https://example.com/other.json#/$defs/leaf")
            .unwrap();
        assert_eq!(leaf.schema_location(), "https://example.com/other.json#/$defs/leaf");
    }

    #[test]
    fn test_register_as_alias() {
        let registry = SchemaRegistry::new();
        let schema = Schema::from_value(&json!({"type": "string"})).unwrap();
        registry.register_as("urn:example:string", &schema).unwrap();
        assert!(registry.resolve("urn:example:string").is_some());
        assert!(registry.register_as("not a uri", &schema).is_err());
    }

    #[test]
    fn test_registry_ids_are_unique() {
        assert_ne!(SchemaRegistry::new().id(), SchemaRegistry::new().id());
    }
}
