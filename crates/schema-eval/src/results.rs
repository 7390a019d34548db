// Evaluation results tree

use indexmap::IndexMap;
use schema_pointer::JsonPointer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One evaluated (schema, instance location) pair and everything beneath it.
///
/// The root of a finished evaluation is immutable. Projections such as
/// [`EvaluationResults::to_list`] build new trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResults {
    valid: bool,
    evaluation_path: JsonPointer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema_location: Option<String>,
    instance_location: JsonPointer,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    annotations: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    errors: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    details: Vec<EvaluationResults>,
}

impl EvaluationResults {
    pub(crate) fn new(
        evaluation_path: JsonPointer,
        schema_location: String,
        instance_location: JsonPointer,
    ) -> Self {
        Self {
            valid: true,
            evaluation_path,
            schema_location: Some(schema_location),
            instance_location,
            annotations: IndexMap::new(),
            errors: IndexMap::new(),
            details: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Keyword path taken from the root schema, references included
    pub fn evaluation_path(&self) -> &JsonPointer {
        &self.evaluation_path
    }

    /// Absolute `base#pointer` location of the schema node
    pub fn schema_location(&self) -> Option<&str> {
        self.schema_location.as_deref()
    }

    pub fn instance_location(&self) -> &JsonPointer {
        &self.instance_location
    }

    pub fn annotations(&self) -> &IndexMap<String, Value> {
        &self.annotations
    }

    pub fn annotation(&self, keyword: &str) -> Option<&Value> {
        self.annotations.get(keyword)
    }

    pub fn errors(&self) -> &IndexMap<String, String> {
        &self.errors
    }

    pub fn error(&self, keyword: &str) -> Option<&str> {
        self.errors.get(keyword).map(String::as_str)
    }

    pub fn details(&self) -> &[EvaluationResults] {
        &self.details
    }

    /// Pre-order walk over this frame and all descendants
    pub fn iter(&self) -> impl Iterator<Item = &EvaluationResults> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.details.iter().rev());
            Some(next)
        })
    }

    /// First frame (pre-order) at the given evaluation path and instance location
    pub fn find(&self, evaluation_path: &str, instance_location: &str) -> Option<&EvaluationResults> {
        self.iter().find(|r| {
            r.evaluation_path.to_string() == evaluation_path
                && r.instance_location.to_string() == instance_location
        })
    }

    /// Root verdict only
    pub fn to_flag(&self) -> EvaluationResults {
        let mut flag = self.shallow();
        flag.schema_location = None;
        flag.annotations.clear();
        flag.errors.clear();
        flag
    }

    /// The root followed by every frame in pre-order, each without nesting
    pub fn to_list(&self, omit_passing: bool) -> EvaluationResults {
        let mut list = self.shallow();
        list.annotations.clear();
        list.errors.clear();
        list.details = self
            .iter()
            .filter(|r| !(omit_passing && r.valid))
            .map(EvaluationResults::shallow)
            .collect();
        list
    }

    /// The root with its own errors, plus its immediately failing children
    pub fn to_basic(&self) -> EvaluationResults {
        let mut basic = self.shallow();
        if !basic.valid {
            basic.annotations.clear();
        }
        basic.details = self
            .details
            .iter()
            .filter(|r| !r.valid)
            .map(EvaluationResults::shallow)
            .collect();
        basic
    }

    /// The tree as built
    pub fn to_hierarchical(&self) -> EvaluationResults {
        self.clone()
    }

    fn shallow(&self) -> EvaluationResults {
        EvaluationResults {
            valid: self.valid,
            evaluation_path: self.evaluation_path.clone(),
            schema_location: self.schema_location.clone(),
            instance_location: self.instance_location.clone(),
            annotations: self.annotations.clone(),
            errors: self.errors.clone(),
            details: Vec::new(),
        }
    }

    // Frame construction, used by the evaluator while the tree is being built.

    pub(crate) fn set_invalid(&mut self) {
        self.valid = false;
    }

    pub(crate) fn add_error(&mut self, keyword: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.errors.insert(keyword.into(), message.into());
    }

    pub(crate) fn add_annotation(&mut self, keyword: impl Into<String>, value: Value) {
        self.annotations.insert(keyword.into(), value);
    }

    pub(crate) fn clear_annotations(&mut self) {
        self.annotations.clear();
    }

    pub(crate) fn push_detail(&mut self, child: EvaluationResults) {
        self.details.push(child);
    }
}
