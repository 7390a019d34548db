use schema_eval::keywords::NumberBoundKeyword;
use schema_eval::{
    BuildContext, Error, EvaluationError, EvaluationOptions, FailureKind, Keyword,
    KeywordConstraint, KeywordRegistry, OutputFormat, ParseContext, Schema, SchemaError,
    SchemaResult, SpecVersions,
};
use serde_json::{Value, json};
use std::any::Any;

/// `x-step`: numbers must sit on a grid starting at the sibling `minimum`
#[derive(Debug)]
struct StepKeyword {
    name: String,
    step: f64,
    priority: i32,
}

fn parse_step(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let step = value
        .as_f64()
        .filter(|s| *s > 0.0)
        .ok_or_else(|| ctx.invalid_value(name, "expected a positive number"))?;
    // `x-early` asks to be compiled before its dependency
    let priority = if name == "x-early" { -5 } else { 5 };
    Ok(Box::new(StepKeyword {
        name: name.to_string(),
        step,
        priority,
    }))
}

impl Keyword for StepKeyword {
    fn name(&self) -> &str {
        &self.name
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn compile(&self, siblings: &[KeywordConstraint], ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let minimum = ctx.require_sibling(siblings, &self.name, "minimum")?;
        let start = ctx
            .sibling_keyword::<NumberBoundKeyword>("minimum")
            .map(NumberBoundKeyword::limit)
            .unwrap_or_default();
        let step = self.step;

        Ok(KeywordConstraint::new(self.name.clone(), move |kc| {
            let below_minimum = kc.dependency("minimum").is_some_and(|d| !d.is_valid());
            if let Some(n) = kc.instance().as_f64()
                && !below_minimum
                && ((n - start) / step).fract() != 0.0
            {
                kc.fail(FailureKind::Other {
                    message: format!("{} is not on the grid {} + k*{}", n, start, step),
                });
            }
            Ok(())
        })
        .with_keyword_dependencies(vec![minimum]))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `x-explode`: always a runtime fault
#[derive(Debug)]
struct ExplodingKeyword;

fn parse_exploding(_name: &str, _value: &Value, _ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    Ok(Box::new(ExplodingKeyword))
}

impl Keyword for ExplodingKeyword {
    fn name(&self) -> &str {
        "x-explode"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        Ok(KeywordConstraint::new("x-explode", |kc| Err(kc.fault("detonated"))))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn keywords() -> KeywordRegistry {
    let mut keywords = KeywordRegistry::standard();
    keywords
        .register("x-step", parse_step)
        .register("x-early", parse_step)
        .register("x-explode", parse_exploding);
    keywords
}

fn parse(value: Value) -> SchemaResult<schema_eval::SchemaRef> {
    Schema::from_value_with(&value, None, &keywords())
}

#[test]
fn test_custom_keyword_reads_its_dependency() -> anyhow::Result<()> {
    let schema = parse(json!({"minimum": 1, "x-step": 2}))?;
    let options = EvaluationOptions::default().with_output_format(OutputFormat::Hierarchical);

    assert!(schema.evaluate(&json!(5), &options)?.is_valid());
    let off_grid = schema.evaluate(&json!(4), &options)?;
    assert_eq!(off_grid.error("x-step"), Some("4 is not on the grid 1 + k*2"));

    // Only `minimum` reports when the value is below it
    let below = schema.evaluate(&json!(-2), &options)?;
    assert!(below.error("minimum").is_some());
    assert!(below.error("x-step").is_none());
    Ok(())
}

#[test]
fn test_custom_keyword_in_nested_schema() -> anyhow::Result<()> {
    let schema = parse(json!({"items": {"minimum": 0, "x-step": 5}}))?;
    let options = EvaluationOptions::default();
    assert!(schema.evaluate(&json!([0, 5, 10]), &options)?.is_valid());
    assert!(!schema.evaluate(&json!([0, 7]), &options)?.is_valid());
    Ok(())
}

#[test]
fn test_missing_dependency() {
    let schema = parse(json!({"x-step": 2})).unwrap();
    let err = schema.compile(&EvaluationOptions::default()).unwrap_err();
    assert_eq!(
        err,
        SchemaError::MissingDependency {
            keyword: "x-step".to_string(),
            dependency: "minimum".to_string()
        }
    );
}

#[test]
fn test_dependency_compiled_too_late() {
    let schema = parse(json!({"minimum": 0, "x-early": 2})).unwrap();
    let err = schema.compile(&EvaluationOptions::default()).unwrap_err();
    assert!(matches!(err, SchemaError::DependencyOrder { ref keyword, .. } if keyword == "x-early"));
}

#[test]
fn test_standard_registry_treats_custom_names_as_unknown() -> anyhow::Result<()> {
    let schema = Schema::from_value(&json!({"x-step": 2}))?;
    assert!(schema.evaluate(&json!(3), &EvaluationOptions::default())?.is_valid());
    Ok(())
}

#[test]
fn test_keyword_fault_is_an_error() {
    let schema = parse(json!({"properties": {"bomb": {"x-explode": true}}})).unwrap();
    let options = EvaluationOptions::default();
    assert!(schema.evaluate(&json!({"safe": 1}), &options).unwrap().is_valid());

    let err = schema.evaluate(&json!({"bomb": 1}), &options).unwrap_err();
    match err {
        Error::Evaluation(EvaluationError::KeywordFault {
            keyword,
            instance_location,
            message,
        }) => {
            assert_eq!(keyword, "x-explode");
            assert_eq!(instance_location, "/bomb");
            assert_eq!(message, "detonated");
        }
        other => panic!("unexpected error: {other}"),
    }
}
