// Evaluation engine
//
// Walks a compiled graph depth-first against one instance. Every schema frame
// is pushed through a `FrameGuard`, so the frame stack is unwound on every
// exit path and a partially built results tree stays consistent.

use crate::constraint::{
    CompiledSchema, ConstraintBody, InstanceLocator, InstanceTarget, KeywordConstraint,
    SchemaConstraint, SchemaId, ShortCircuit,
};
use crate::error::{EvaluationError, EvaluationResult, FailureKind};
use crate::options::{EvaluationOptions, Verbosity};
use crate::output;
use crate::results::EvaluationResults;
use crate::spec_version::SpecVersion;
use crate::vocabulary::DialectSignature;
use schema_pointer::JsonPointer;
use serde_json::Value;
use std::ops::{Deref, DerefMut, Range};
use url::Url;

/// Error key used for failures that belong to the schema rather than a keyword
const SCHEMA_ERROR_KEY: &str = "";

impl CompiledSchema {
    /// Evaluate `instance` and project the results to `options.output_format`
    pub fn evaluate(
        &self,
        instance: &Value,
        options: &EvaluationOptions,
    ) -> EvaluationResult<EvaluationResults> {
        let results = self.evaluate_tree(instance, options)?;
        Ok(output::format(
            &results,
            options.output_format,
            options.omit_passing_in_list,
        ))
    }

    fn evaluate_tree(
        &self,
        instance: &Value,
        options: &EvaluationOptions,
    ) -> EvaluationResult<EvaluationResults> {
        let mut ctx = EvaluationContext::new(self, options);
        evaluate_schema(
            &mut ctx,
            self.root,
            instance,
            JsonPointer::new(),
            JsonPointer::new(),
        )?;
        let results = ctx
            .root
            .take()
            .ok_or_else(|| EvaluationError::Internal("root frame was not released".to_string()))?;

        if options.verbosity >= Verbosity::Summary {
            tracing::debug!(
                valid = results.is_valid(),
                visits = ctx.visits,
                format = ?options.output_format,
                "evaluation finished"
            );
        }
        Ok(results)
    }
}

/// A finished keyword evaluation, as seen by keywords that depend on it
#[derive(Debug, Clone, Copy)]
pub struct KeywordEvaluation<'f> {
    record: &'f KeywordRecord,
    subschemas: &'f [EvaluationResults],
}

impl<'f> KeywordEvaluation<'f> {
    pub fn keyword(&self) -> &'f str {
        &self.record.keyword
    }

    pub fn is_valid(&self) -> bool {
        self.record.valid
    }

    pub fn annotation(&self) -> Option<&'f Value> {
        self.record.annotation.as_ref()
    }

    /// Frames produced by this keyword's subschemas
    pub fn subschema_results(&self) -> &'f [EvaluationResults] {
        self.subschemas
    }
}

/// Input to an instance locator: the local instance and dependency results
pub struct LocatorContext<'f> {
    instance: &'f Value,
    instance_location: &'f JsonPointer,
    dependencies: Vec<KeywordEvaluation<'f>>,
}

impl<'f> LocatorContext<'f> {
    pub fn instance(&self) -> &'f Value {
        self.instance
    }

    pub fn instance_location(&self) -> &'f JsonPointer {
        self.instance_location
    }

    pub fn dependency(&self, keyword: &str) -> Option<&KeywordEvaluation<'f>> {
        self.dependencies.iter().find(|d| d.keyword() == keyword)
    }

    pub fn dependencies(&self) -> &[KeywordEvaluation<'f>] {
        &self.dependencies
    }
}

/// What a keyword's evaluation function sees and records.
///
/// Starts valid with no annotation; the function calls [`fail`],
/// [`invalidate`] or [`annotate`] to change that.
///
/// [`fail`]: KeywordContext::fail
/// [`invalidate`]: KeywordContext::invalidate
/// [`annotate`]: KeywordContext::annotate
pub struct KeywordContext<'f> {
    keyword: &'f str,
    instance: &'f Value,
    instance_location: &'f JsonPointer,
    options: &'f EvaluationOptions,
    signature: &'f DialectSignature,
    dependencies: Vec<KeywordEvaluation<'f>>,
    subschemas: &'f [EvaluationResults],
    valid: bool,
    annotation: Option<Value>,
    error: Option<String>,
}

impl<'f> KeywordContext<'f> {
    pub fn keyword(&self) -> &'f str {
        self.keyword
    }

    pub fn instance(&self) -> &'f Value {
        self.instance
    }

    pub fn instance_location(&self) -> &'f JsonPointer {
        self.instance_location
    }

    pub fn options(&self) -> &'f EvaluationOptions {
        self.options
    }

    pub fn signature(&self) -> &'f DialectSignature {
        self.signature
    }

    pub fn spec_version(&self) -> SpecVersion {
        self.signature.version()
    }

    pub fn dependency(&self, keyword: &str) -> Option<&KeywordEvaluation<'f>> {
        self.dependencies.iter().find(|d| d.keyword() == keyword)
    }

    pub fn dependencies(&self) -> &[KeywordEvaluation<'f>] {
        &self.dependencies
    }

    /// Frames produced by this keyword's own subschemas
    pub fn subschema_results(&self) -> &'f [EvaluationResults] {
        self.subschemas
    }

    pub fn all_subschemas_valid(&self) -> bool {
        self.subschemas.iter().all(EvaluationResults::is_valid)
    }

    pub fn annotate(&mut self, value: Value) {
        self.annotation = Some(value);
    }

    /// Record a failure with a message
    pub fn fail(&mut self, kind: FailureKind) {
        self.valid = false;
        self.error = Some(kind.message());
    }

    /// Record a failure whose details live in the subschema frames
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// A runtime fault for this keyword at this instance location
    pub fn fault(&self, message: impl Into<String>) -> EvaluationError {
        EvaluationError::KeywordFault {
            keyword: self.keyword.to_string(),
            instance_location: self.instance_location.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct KeywordRecord {
    keyword: String,
    valid: bool,
    annotation: Option<Value>,
    error: Option<String>,
    /// Range of this keyword's frames in the owning frame's details
    children: Range<usize>,
}

#[derive(Debug)]
enum KeywordState {
    Pending,
    Evaluating,
    Completed(KeywordRecord),
}

#[derive(Debug)]
struct Frame {
    schema: SchemaId,
    results: EvaluationResults,
    keywords: Vec<KeywordState>,
    completed: bool,
}

impl Frame {
    fn evaluations(&self, indices: &[usize]) -> Vec<KeywordEvaluation<'_>> {
        indices
            .iter()
            .filter_map(|&i| match self.keywords.get(i) {
                Some(KeywordState::Completed(record)) => Some(KeywordEvaluation {
                    record,
                    subschemas: self
                        .results
                        .details()
                        .get(record.children.clone())
                        .unwrap_or(&[]),
                }),
                _ => None,
            })
            .collect()
    }

    fn keyword_valid(&self, index: usize) -> bool {
        match self.keywords.get(index) {
            Some(KeywordState::Completed(record)) => record.valid,
            _ => true,
        }
    }

    /// Fold keyword records into the frame's verdict, errors and annotations
    fn complete(&mut self) -> bool {
        for state in &self.keywords {
            let KeywordState::Completed(record) = state else {
                continue;
            };
            if !record.valid {
                self.results.set_invalid();
                if let Some(message) = &record.error {
                    self.results.add_error(record.keyword.clone(), message.clone());
                }
            }
            if let Some(annotation) = &record.annotation {
                self.results
                    .add_annotation(record.keyword.clone(), annotation.clone());
            }
        }
        if !self.results.is_valid() {
            self.results.clear_annotations();
        }
        self.completed = true;
        self.results.is_valid()
    }
}

/// Per-call execution state
struct EvaluationContext<'a> {
    graph: &'a CompiledSchema,
    options: &'a EvaluationOptions,
    optimize: bool,
    /// `OnSuccess` short-circuits would hide annotations from `unevaluated*`
    stop_on_success: bool,
    frames: Vec<Frame>,
    root: Option<EvaluationResults>,
    visits: usize,
}

impl<'a> EvaluationContext<'a> {
    fn new(graph: &'a CompiledSchema, options: &'a EvaluationOptions) -> Self {
        Self {
            graph,
            options,
            optimize: options.optimizing(),
            stop_on_success: !graph.collects_annotations(),
            frames: Vec::new(),
            root: None,
            visits: 0,
        }
    }

    fn enter<'c>(
        &'c mut self,
        id: SchemaId,
        node: &SchemaConstraint,
        instance_location: JsonPointer,
        evaluation_path: JsonPointer,
    ) -> FrameGuard<'c, 'a> {
        let results =
            EvaluationResults::new(evaluation_path, node.schema_location(), instance_location);
        self.frames.push(Frame {
            schema: id,
            results,
            keywords: node.keywords().iter().map(|_| KeywordState::Pending).collect(),
            completed: false,
        });
        FrameGuard { ctx: self }
    }

    /// Pop the innermost frame and attach it to its parent
    fn release(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let mut results = frame.results;
        if !frame.completed {
            results.add_error(SCHEMA_ERROR_KEY, "evaluation aborted");
            results.clear_annotations();
        }
        match self.frames.last_mut() {
            Some(parent) => parent.results.push_detail(results),
            None => self.root = Some(results),
        }
    }

    /// Base URIs of the schema resources on the frame stack, outermost first
    fn dynamic_scope(&self) -> impl Iterator<Item = &'a Url> + '_ {
        let graph = self.graph;
        self.frames
            .iter()
            .filter_map(move |frame| graph.node(frame.schema))
            .map(|node| &node.base_uri)
    }

    fn top(&self) -> EvaluationResult<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| EvaluationError::Internal("no active frame".to_string()))
    }

    fn top_mut(&mut self) -> EvaluationResult<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| EvaluationError::Internal("no active frame".to_string()))
    }

    fn visit(&mut self) -> EvaluationResult<()> {
        self.visits += 1;
        if let Some(limit) = self.options.max_visits
            && self.visits > limit
        {
            return Err(EvaluationError::BudgetExceeded { visits: limit });
        }
        Ok(())
    }

    fn should_stop(&self, policy: ShortCircuit, valid: bool) -> bool {
        self.optimize
            && match policy {
                ShortCircuit::Never => false,
                ShortCircuit::OnFailure => !valid,
                ShortCircuit::OnSuccess => valid && self.stop_on_success,
            }
    }
}

/// Keeps one frame on the stack for its lifetime
struct FrameGuard<'c, 'a> {
    ctx: &'c mut EvaluationContext<'a>,
}

impl FrameGuard<'_, '_> {
    fn finish(&mut self) -> EvaluationResult<bool> {
        Ok(self.ctx.top_mut()?.complete())
    }
}

impl<'a> Deref for FrameGuard<'_, 'a> {
    type Target = EvaluationContext<'a>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for FrameGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for FrameGuard<'_, '_> {
    fn drop(&mut self) {
        self.ctx.release();
    }
}

fn evaluate_schema(
    ctx: &mut EvaluationContext<'_>,
    id: SchemaId,
    instance: &Value,
    instance_location: JsonPointer,
    evaluation_path: JsonPointer,
) -> EvaluationResult<bool> {
    ctx.visit()?;
    let graph = ctx.graph;
    let node = graph
        .node(id)
        .ok_or_else(|| EvaluationError::Internal(format!("unknown schema id {}", id.index())))?;

    if ctx.options.verbosity >= Verbosity::Trace {
        tracing::trace!(
            schema = %node.schema_location(),
            instance = %instance_location,
            path = %evaluation_path,
            "entering schema"
        );
    }

    let mut guard = ctx.enter(id, node, instance_location, evaluation_path);
    match node.body() {
        ConstraintBody::Bool(true) => {}
        ConstraintBody::Bool(false) => {
            guard
                .top_mut()?
                .results
                .add_error(SCHEMA_ERROR_KEY, FailureKind::FalseSchema.message());
        }
        ConstraintBody::Keywords(keywords) => {
            for index in 0..keywords.len() {
                evaluate_keyword(&mut guard, keywords, index, instance)?;
                if guard.optimize && !guard.top()?.keyword_valid(index) {
                    break;
                }
            }
        }
    }
    guard.finish()
}

fn evaluate_keyword(
    ctx: &mut EvaluationContext<'_>,
    keywords: &[KeywordConstraint],
    index: usize,
    instance: &Value,
) -> EvaluationResult<()> {
    let constraint = keywords
        .get(index)
        .ok_or_else(|| EvaluationError::Internal(format!("unknown keyword index {}", index)))?;

    {
        let frame = ctx.top_mut()?;
        match frame.keywords.get(index) {
            Some(KeywordState::Pending) => {}
            Some(KeywordState::Completed(_)) => return Ok(()),
            Some(KeywordState::Evaluating) => {
                return Err(EvaluationError::Reentrant {
                    keyword: constraint.keyword.clone(),
                });
            }
            None => {
                return Err(EvaluationError::Internal(format!(
                    "frame has no state for keyword {}",
                    index
                )));
            }
        }
        frame.keywords[index] = KeywordState::Evaluating;
    }

    for &dependency in &constraint.keyword_dependencies {
        evaluate_keyword(ctx, keywords, dependency, instance)?;
    }

    let Some(evaluator) = &constraint.evaluator else {
        let frame = ctx.top_mut()?;
        let mark = frame.results.details().len();
        frame.keywords[index] = KeywordState::Completed(KeywordRecord {
            keyword: constraint.keyword.clone(),
            valid: true,
            annotation: None,
            error: None,
            children: mark..mark,
        });
        return Ok(());
    };

    let targets = {
        let frame = ctx.top()?;
        let locator = LocatorContext {
            instance,
            instance_location: frame.results.instance_location(),
            dependencies: frame.evaluations(&constraint.keyword_dependencies),
        };
        let mut targets = Vec::new();
        for (i, subschema) in constraint.subschema_dependencies.iter().enumerate() {
            match &subschema.locator {
                InstanceLocator::Same => {
                    targets.push((i, InstanceTarget::Location(JsonPointer::new())));
                }
                InstanceLocator::Relative(pointer) => {
                    if pointer.resolve(instance).is_some() {
                        targets.push((i, InstanceTarget::Location(pointer.clone())));
                    }
                }
                InstanceLocator::Generated(generate) => {
                    targets.extend(generate(&locator).into_iter().map(|t| (i, t)));
                }
            }
        }
        targets
    };

    let mark = ctx.top()?.results.details().len();
    for (i, target) in &targets {
        let subschema = &constraint.subschema_dependencies[*i];
        let (relative, value) = match target {
            InstanceTarget::Location(pointer) => match pointer.resolve(instance) {
                Some(value) => (pointer, value),
                None => continue,
            },
            InstanceTarget::Synthetic { location, value } => (location, value),
        };
        let (instance_location, evaluation_path) = {
            let results = &ctx.top()?.results;
            (
                results.instance_location().join(relative),
                results
                    .evaluation_path()
                    .join(&subschema.relative_evaluation_path),
            )
        };
        let target = subschema
            .dynamic
            .as_ref()
            .and_then(|dynamic| dynamic.select(ctx.dynamic_scope()))
            .unwrap_or(subschema.target);
        let valid = evaluate_schema(ctx, target, value, instance_location, evaluation_path)?;
        if ctx.should_stop(constraint.short_circuit, valid) {
            break;
        }
    }

    let record = {
        let frame = ctx.top()?;
        let end = frame.results.details().len();
        let mut keyword_ctx = KeywordContext {
            keyword: &constraint.keyword,
            instance,
            instance_location: frame.results.instance_location(),
            options: ctx.options,
            signature: &ctx.graph.signature,
            dependencies: frame.evaluations(&constraint.keyword_dependencies),
            subschemas: &frame.results.details()[mark..end],
            valid: true,
            annotation: None,
            error: None,
        };
        evaluator(&mut keyword_ctx)?;

        if ctx.options.verbosity >= Verbosity::Keywords {
            tracing::trace!(
                keyword = %constraint.keyword,
                instance = %keyword_ctx.instance_location,
                valid = keyword_ctx.valid,
                subschemas = end - mark,
                "keyword evaluated"
            );
        }
        KeywordRecord {
            keyword: constraint.keyword.clone(),
            valid: keyword_ctx.valid,
            annotation: keyword_ctx.annotation,
            error: keyword_ctx.error,
            children: mark..end,
        }
    };

    ctx.top_mut()?.keywords[index] = KeywordState::Completed(record);
    Ok(())
}
