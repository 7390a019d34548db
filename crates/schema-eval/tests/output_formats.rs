use schema_eval::{EvaluationOptions, EvaluationResults, OutputFormat, Schema};
use serde_json::{Value, json};

fn sample_schema() -> Value {
    json!({
        "title": "pair",
        "properties": {
            "a": {"type": "string"},
            "b": {"minimum": 3}
        }
    })
}

fn evaluate(format: OutputFormat, instance: Value) -> EvaluationResults {
    let schema = Schema::from_value(&sample_schema()).unwrap();
    let options = EvaluationOptions::default().with_output_format(format);
    schema.evaluate(&instance, &options).unwrap()
}

#[test]
fn test_flag_carries_only_the_verdict() {
    let results = evaluate(OutputFormat::Flag, json!({"a": 1, "b": 5}));
    assert!(!results.is_valid());
    assert!(results.errors().is_empty());
    assert!(results.annotations().is_empty());
    assert!(results.details().is_empty());
    assert!(results.schema_location().is_none());

    assert!(evaluate(OutputFormat::Flag, json!({"a": "x"})).is_valid());
}

#[test]
fn test_hierarchical_keeps_the_tree() {
    let results = evaluate(OutputFormat::Hierarchical, json!({"a": 1, "b": 5}));
    assert!(!results.is_valid());
    assert_eq!(results.details().len(), 2);

    let a = results.find("/properties/a", "/a").expect("frame for a");
    assert_eq!(a.error("type"), Some("Expected string, got integer"));
    let b = results.find("/properties/b", "/b").expect("frame for b");
    assert!(b.is_valid());
}

#[test]
fn test_hierarchical_annotations_on_success() {
    let results = evaluate(OutputFormat::Hierarchical, json!({"a": "x", "c": 0}));
    assert!(results.is_valid());
    assert_eq!(results.annotation("title"), Some(&json!("pair")));
    assert_eq!(results.annotation("properties"), Some(&json!(["a"])));
}

#[test]
fn test_list_is_flat() {
    let results = evaluate(OutputFormat::List, json!({"a": 1, "b": 5}));
    assert!(!results.is_valid());
    assert!(results.errors().is_empty());
    let paths: Vec<String> = results
        .details()
        .iter()
        .map(|r| r.evaluation_path().to_string())
        .collect();
    assert_eq!(paths, vec!["", "/properties/a", "/properties/b"]);
    assert!(results.details().iter().all(|r| r.details().is_empty()));
}

#[test]
fn test_list_can_omit_passing_frames() {
    let schema = Schema::from_value(&sample_schema()).unwrap();
    let options = EvaluationOptions::default()
        .with_output_format(OutputFormat::List)
        .with_omit_passing_in_list(true);
    let results = schema.evaluate(&json!({"a": 1, "b": 5}), &options).unwrap();
    assert_eq!(results.details().len(), 2);
    assert!(results.details().iter().all(|r| !r.is_valid()));
}

#[test]
fn test_basic_keeps_failing_children() {
    let results = evaluate(OutputFormat::Basic, json!({"a": 1, "b": 5}));
    assert!(!results.is_valid());
    assert_eq!(results.details().len(), 1);
    let child = &results.details()[0];
    assert_eq!(child.instance_location().to_string(), "/a");
    assert!(child.error("type").is_some());
}

#[test]
fn test_results_serialize_as_json() {
    let results = evaluate(OutputFormat::Hierarchical, json!({"a": 1}));
    let value = serde_json::to_value(&results).unwrap();
    assert_eq!(value["valid"], json!(false));
    assert_eq!(value["details"][0]["evaluationPath"], json!("/properties/a"));
    assert_eq!(value["details"][0]["instanceLocation"], json!("/a"));

    let back: EvaluationResults = serde_json::from_value(value).unwrap();
    assert_eq!(back, results);
}

#[test]
fn test_optimizations_do_not_change_verdicts() {
    let schema = Schema::from_value(&json!({
        "anyOf": [{"type": "string"}, {"minimum": 10}],
        "not": {"const": 11}
    }))
    .unwrap();
    let fast = EvaluationOptions::default();
    let slow = EvaluationOptions::default().with_apply_optimizations(false);
    for instance in [json!("s"), json!(11), json!(12), json!(3), json!(null)] {
        assert_eq!(
            schema.evaluate(&instance, &fast).unwrap().is_valid(),
            schema.evaluate(&instance, &slow).unwrap().is_valid(),
            "{instance}"
        );
    }
}
