// Evaluation options

use crate::output::OutputFormat;
use crate::registry::SchemaRegistry;
use crate::spec_version::SpecVersion;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How much the evaluator reports through `tracing`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Verbosity {
    #[default]
    Silent,
    /// One event per evaluation with the final verdict
    Summary,
    /// Plus one event per evaluated keyword
    Keywords,
    /// Plus one event per entered schema frame
    Trace,
}

/// Settings for one compile-and-evaluate call.
///
/// Cloning shares the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluationOptions {
    /// Force a draft instead of reading `$schema`
    pub evaluate_as: SpecVersion,
    pub output_format: OutputFormat,
    /// Make `format` an assertion instead of an annotation
    pub require_format_validation: bool,
    /// Fail `format` keywords naming formats that cannot be checked
    pub only_known_formats: bool,
    /// Allow short-circuiting when the output is `Flag`
    pub apply_optimizations: bool,
    pub verbosity: Verbosity,
    /// Report unrecognized keywords as annotations
    pub add_annotation_for_unknown_keywords: bool,
    /// Drop passing frames from `List` output
    pub omit_passing_in_list: bool,
    /// Upper bound on schema frames entered in one evaluation
    pub max_visits: Option<usize>,
    #[serde(skip)]
    registry: Arc<SchemaRegistry>,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            evaluate_as: SpecVersion::Unspecified,
            output_format: OutputFormat::Flag,
            require_format_validation: false,
            only_known_formats: false,
            apply_optimizations: true,
            verbosity: Verbosity::Silent,
            add_annotation_for_unknown_keywords: false,
            omit_passing_in_list: false,
            max_visits: None,
            registry: Arc::new(SchemaRegistry::new()),
        }
    }
}

impl EvaluationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn with_registry(mut self, registry: Arc<SchemaRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_evaluate_as(mut self, version: SpecVersion) -> Self {
        self.evaluate_as = version;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_require_format_validation(mut self, enabled: bool) -> Self {
        self.require_format_validation = enabled;
        self
    }

    pub fn with_only_known_formats(mut self, enabled: bool) -> Self {
        self.only_known_formats = enabled;
        self
    }

    pub fn with_apply_optimizations(mut self, enabled: bool) -> Self {
        self.apply_optimizations = enabled;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_annotations_for_unknown_keywords(mut self, enabled: bool) -> Self {
        self.add_annotation_for_unknown_keywords = enabled;
        self
    }

    pub fn with_omit_passing_in_list(mut self, enabled: bool) -> Self {
        self.omit_passing_in_list = enabled;
        self
    }

    pub fn with_max_visits(mut self, limit: usize) -> Self {
        self.max_visits = Some(limit);
        self
    }

    /// Whether short-circuiting is allowed for this call
    pub(crate) fn optimizing(&self) -> bool {
        self.apply_optimizations && self.output_format == OutputFormat::Flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let options = EvaluationOptions::default();
        assert_eq!(options.output_format, OutputFormat::Flag);
        assert!(options.apply_optimizations);
        assert!(options.optimizing());
        assert!(!options.with_output_format(OutputFormat::List).optimizing());
    }

    #[test]
    fn test_clone_shares_registry() {
        let options = EvaluationOptions::default();
        let copy = options.clone();
        assert!(Arc::ptr_eq(options.registry(), copy.registry()));
    }

    #[test]
    fn test_deserialize_partial() {
        let options: EvaluationOptions = serde_json::from_value(json!({
            "outputFormat": "Hierarchical",
            "requireFormatValidation": true,
            "maxVisits": 50
        }))
        .unwrap();
        assert_eq!(options.output_format, OutputFormat::Hierarchical);
        assert!(options.require_format_validation);
        assert_eq!(options.max_visits, Some(50));
        assert!(options.apply_optimizations);
    }
}
