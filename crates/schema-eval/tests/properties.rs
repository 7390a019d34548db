// Property tests: verdicts must not depend on output shape, optimization or key order
// (of the instance or of the schema's keywords)

use proptest::prelude::*;
use schema_eval::{EvaluationOptions, OutputFormat, Schema, SchemaRef, Verbosity};
use serde_json::{Map, Value, json};

fn schema_values() -> Vec<Value> {
    vec![
        json!({"type": "object", "required": ["a"], "properties": {"a": {"type": "integer"}}}),
        json!({"anyOf": [{"type": "string"}, {"type": "array", "items": {"type": "boolean"}}]}),
        json!({"oneOf": [{"type": "integer"}, {"minimum": 0}]}),
        json!({"not": {"type": "null"}, "allOf": [{"minLength": 1}, {"maxItems": 2}]}),
        json!({
            "if": {"required": ["a"]},
            "then": {"properties": {"a": {"type": "string"}}},
            "else": {"maxProperties": 1}
        }),
        json!({
            "properties": {"a": true},
            "patternProperties": {"^b": {"type": "array"}},
            "additionalProperties": {"type": "integer"}
        }),
        json!({
            "allOf": [{"properties": {"a": true}}],
            "anyOf": [{"properties": {"b": {"type": "string"}}}, {"required": ["c"]}],
            "unevaluatedProperties": false
        }),
        json!({
            "prefixItems": [{"type": "integer"}],
            "contains": {"type": "string"},
            "unevaluatedItems": {"type": "boolean"}
        }),
        json!({"propertyNames": {"maxLength": 1}, "dependentRequired": {"a": ["b"]}}),
        json!({"uniqueItems": true, "enum": [[1, 2], {"a": null, "b": true}, "x", 3]}),
        json!({"$defs": {"n": {"items": {"$ref": "#/$defs/n"}, "maxItems": 2}}, "$ref": "#/$defs/n"}),
    ]
}

fn schemas() -> Vec<SchemaRef> {
    schema_values()
        .iter()
        .map(|value| Schema::from_value(value).unwrap())
        .collect()
}

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-5i64..5).prop_map(|n| json!(n)),
        "[a-d]{0,3}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec(("[a-d]", inner), 0..4)
                .prop_map(|entries| Value::Object(entries.into_iter().collect())),
        ]
    })
}

/// Same value, every object's keys inserted in reverse order
fn reversed(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, item) in map.iter().rev() {
                out.insert(key.clone(), reversed(item));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(reversed).collect()),
        other => other.clone(),
    }
}

fn verdict(schema: &SchemaRef, instance: &Value, options: &EvaluationOptions) -> bool {
    schema.evaluate(instance, options).unwrap().is_valid()
}

proptest! {
    #[test]
    fn output_format_does_not_change_verdict(index in 0usize..11, instance in json_value()) {
        let schema = &schemas()[index];
        let flag = verdict(schema, &instance, &EvaluationOptions::default());
        for format in [OutputFormat::List, OutputFormat::Basic, OutputFormat::Hierarchical] {
            let options = EvaluationOptions::default().with_output_format(format);
            prop_assert_eq!(flag, verdict(schema, &instance, &options), "{:?}", format);
        }
    }

    #[test]
    fn optimizations_do_not_change_verdict(index in 0usize..11, instance in json_value()) {
        let schema = &schemas()[index];
        let fast = EvaluationOptions::default();
        let slow = EvaluationOptions::default().with_apply_optimizations(false);
        prop_assert_eq!(verdict(schema, &instance, &fast), verdict(schema, &instance, &slow));
    }

    #[test]
    fn evaluation_is_deterministic(index in 0usize..11, instance in json_value()) {
        let schema = &schemas()[index];
        let options = EvaluationOptions::default().with_output_format(OutputFormat::Hierarchical);
        let first = schema.evaluate(&instance, &options).unwrap();
        let second = schema.evaluate(&instance, &options).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn instance_key_order_does_not_change_verdict(index in 0usize..11, instance in json_value()) {
        let schema = &schemas()[index];
        let options = EvaluationOptions::default().with_output_format(OutputFormat::Hierarchical);
        prop_assert_eq!(
            verdict(schema, &instance, &options),
            verdict(schema, &reversed(&instance), &options)
        );
    }

    #[test]
    fn schema_keyword_order_does_not_change_verdict(index in 0usize..11, instance in json_value()) {
        let value = &schema_values()[index];
        let declared = Schema::from_value(value).unwrap();
        let flipped = Schema::from_value(&reversed(value)).unwrap();
        for options in [
            EvaluationOptions::default(),
            EvaluationOptions::default().with_output_format(OutputFormat::Hierarchical),
        ] {
            prop_assert_eq!(
                verdict(&declared, &instance, &options),
                verdict(&flipped, &instance, &options)
            );
        }
    }
}

/// Keywords that read sibling results still see them when declared first
#[test]
fn test_dependents_declared_before_their_dependencies() {
    let cases = [
        (
            json!({"additionalProperties": false, "properties": {"a": true}}),
            vec![(json!({"a": 1}), true), (json!({"a": 1, "b": 2}), false)],
        ),
        (
            json!({
                "else": {"required": ["b"]},
                "then": {"required": ["c"]},
                "if": {"required": ["a"]}
            }),
            vec![
                (json!({"a": 1, "c": 1}), true),
                (json!({"a": 1, "b": 1}), false),
                (json!({"b": 1}), true),
                (json!({}), false),
            ],
        ),
        (
            json!({"unevaluatedProperties": false, "allOf": [{"properties": {"a": true}}]}),
            vec![(json!({"a": 1}), true), (json!({"a": 1, "z": 0}), false)],
        ),
        (
            json!({"unevaluatedItems": false, "prefixItems": [true], "contains": {"type": "string"}}),
            vec![(json!([1, "x"]), true), (json!([1, "x", 2]), false)],
        ),
        (
            json!({"maxContains": 1, "minContains": 0, "contains": {"type": "integer"}}),
            vec![(json!([1, "x"]), true), (json!([1, 2]), false), (json!(["x"]), true)],
        ),
    ];

    for (schema, instances) in cases {
        let declared = Schema::from_value(&schema).unwrap();
        let flipped = Schema::from_value(&reversed(&schema)).unwrap();
        for (instance, expected) in instances {
            for format in [OutputFormat::Flag, OutputFormat::Hierarchical] {
                let options = EvaluationOptions::default().with_output_format(format);
                assert_eq!(verdict(&declared, &instance, &options), expected, "{schema} {instance}");
                assert_eq!(verdict(&flipped, &instance, &options), expected, "{schema} {instance}");
            }
        }
    }
}

#[test]
fn test_verbose_evaluation_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let schema = &schemas()[6];
    let options = EvaluationOptions::default()
        .with_output_format(OutputFormat::Hierarchical)
        .with_verbosity(Verbosity::Trace);
    assert!(verdict(schema, &json!({"a": 1, "b": "x"}), &options));
    assert!(!verdict(schema, &json!({"a": 1, "b": 2, "c": 3}), &options));
}
