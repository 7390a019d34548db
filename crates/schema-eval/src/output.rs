// Output shapes for evaluation results

use crate::results::EvaluationResults;
use serde::{Deserialize, Serialize};

/// Standard output shapes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Verdict only; the evaluator may short-circuit
    #[default]
    Flag,
    /// Every frame, flattened in pre-order
    List,
    /// Root plus immediately failing children
    Basic,
    /// The full nested tree
    Hierarchical,
}

/// Project a finished results tree into `format`
pub fn format(results: &EvaluationResults, format: OutputFormat, omit_passing: bool) -> EvaluationResults {
    match format {
        OutputFormat::Flag => results.to_flag(),
        OutputFormat::List => results.to_list(omit_passing),
        OutputFormat::Basic => results.to_basic(),
        OutputFormat::Hierarchical => results.to_hierarchical(),
    }
}
