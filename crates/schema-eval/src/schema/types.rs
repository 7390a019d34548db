//! Schema node definitions
//!
//! A schema node is either a boolean literal or an ordered list of keyword
//! instances. Nodes are shared as [`SchemaRef`]; reference targets handed out
//! by the registry are the same `Arc`, never a copy.

use crate::builder::CompiledCache;
use crate::keywords::Keyword;
use schema_pointer::JsonPointer;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Shared handle to a schema node
pub type SchemaRef = Arc<Schema>;

/// Content of a schema node
#[derive(Debug)]
pub enum SchemaBody {
    /// `true` accepts everything, `false` rejects everything
    Bool(bool),
    /// Keyword instances in declaration order
    Keywords(Vec<Box<dyn Keyword>>),
}

/// A parsed schema node.
pub struct Schema {
    pub(crate) body: SchemaBody,
    /// Base URI of the resource this node lives in
    pub(crate) base_uri: Url,
    /// Location inside that resource
    pub(crate) location: JsonPointer,
    /// Set when this node declares its own `$id`
    pub(crate) id: Option<Url>,
    /// Plain-name anchors (`$anchor`, `$dynamicAnchor`, or `$id: "#name"`)
    pub(crate) anchors: Vec<String>,
    /// `$dynamicAnchor` name, also listed in `anchors`
    pub(crate) dynamic_anchor: Option<String>,
    /// `$recursiveAnchor: true`
    pub(crate) recursive_anchor: bool,
    /// Declared `$schema`
    pub(crate) dialect: Option<String>,
    pub(crate) compiled: CompiledCache,
}

impl Schema {
    pub fn body(&self) -> &SchemaBody {
        &self.body
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.body {
            SchemaBody::Bool(value) => Some(value),
            SchemaBody::Keywords(_) => None,
        }
    }

    /// Declared keywords, empty for boolean schemas
    pub fn keywords(&self) -> &[Box<dyn Keyword>] {
        match &self.body {
            SchemaBody::Bool(_) => &[],
            SchemaBody::Keywords(keywords) => keywords,
        }
    }

    pub fn keyword(&self, name: &str) -> Option<&dyn Keyword> {
        self.keywords()
            .iter()
            .find(|k| k.name() == name)
            .map(|k| k.as_ref())
    }

    /// Typed access to a declared keyword
    pub fn keyword_as<K: Keyword + 'static>(&self, name: &str) -> Option<&K> {
        self.keyword(name)?.as_any().downcast_ref::<K>()
    }

    pub fn base_uri(&self) -> &Url {
        &self.base_uri
    }

    pub fn location(&self) -> &JsonPointer {
        &self.location
    }

    pub fn id(&self) -> Option<&Url> {
        self.id.as_ref()
    }

    pub fn anchors(&self) -> &[String] {
        &self.anchors
    }

    pub fn dynamic_anchor(&self) -> Option<&str> {
        self.dynamic_anchor.as_deref()
    }

    pub fn has_recursive_anchor(&self) -> bool {
        self.recursive_anchor
    }

    /// The `$schema` URI this node declares, if any
    pub fn declared_dialect(&self) -> Option<&str> {
        self.dialect.as_deref()
    }

    /// Absolute location in `base#pointer` form
    pub fn schema_location(&self) -> String {
        format_location(&self.base_uri, &self.location)
    }

    /// Directly nested schema nodes, in declaration order
    pub fn subschemas(&self) -> Vec<&SchemaRef> {
        self.keywords()
            .iter()
            .flat_map(|k| k.subschemas())
            .collect()
    }

    /// Follow a JSON Pointer through keyword values to a nested schema node
    pub fn find_subschema(self: &Arc<Self>, pointer: &JsonPointer) -> Option<SchemaRef> {
        let mut current = self.clone();
        let mut rest = pointer.segments();
        while let Some((first, tail)) = rest.split_first() {
            let (next, consumed) = {
                let keyword = current.keyword(first)?;
                let (next, consumed) = keyword.subschema_at(tail)?;
                (next.clone(), consumed)
            };
            rest = &tail[consumed..];
            current = next;
        }
        Some(current)
    }

    /// Find a plain-name anchor inside this node's resource
    pub fn find_anchor(self: &Arc<Self>, name: &str) -> Option<SchemaRef> {
        self.find_in_resource(|node| node.anchors.iter().any(|a| a == name))
    }

    /// Find the node declaring `$dynamicAnchor: name` inside this node's resource
    pub fn find_dynamic_anchor(self: &Arc<Self>, name: &str) -> Option<SchemaRef> {
        self.find_in_resource(|node| node.dynamic_anchor.as_deref() == Some(name))
    }

    fn find_in_resource(self: &Arc<Self>, matches: impl Fn(&Schema) -> bool) -> Option<SchemaRef> {
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            if node.base_uri != self.base_uri {
                continue;
            }
            if matches(node.as_ref()) {
                return Some(node);
            }
            stack.extend(node.subschemas().into_iter().rev().cloned());
        }
        None
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("location", &self.schema_location())
            .field("body", &self.body)
            .finish()
    }
}

pub(crate) fn format_location(base: &Url, location: &JsonPointer) -> String {
    let mut base = base.clone();
    base.set_fragment(None);
    format!("{}#{}", base, location)
}
