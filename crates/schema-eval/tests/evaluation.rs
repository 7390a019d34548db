use schema_eval::{
    Error, EvaluationOptions, OutputFormat, Schema, SchemaError, SchemaRegistry, SpecVersion,
};
use serde_json::{Value, json};
use std::sync::Arc;

fn hierarchical() -> EvaluationOptions {
    EvaluationOptions::default().with_output_format(OutputFormat::Hierarchical)
}

fn is_valid(schema: &Value, instance: &Value) -> bool {
    let schema = Schema::from_value(schema).unwrap();
    schema
        .evaluate(instance, &EvaluationOptions::default())
        .unwrap()
        .is_valid()
}

/// Test a typical object schema end to end
#[test]
fn test_object_schema() -> anyhow::Result<()> {
    let schema = Schema::from_value(&json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "age": {"type": "integer", "minimum": 0}
        },
        "required": ["name"],
        "additionalProperties": false
    }))?;

    let ok = schema.evaluate(&json!({"name": "Ada", "age": 36}), &hierarchical())?;
    assert!(ok.is_valid());
    assert!(ok.errors().is_empty());

    let bad = schema.evaluate(&json!({"age": -1}), &hierarchical())?;
    assert!(!bad.is_valid());
    assert_eq!(bad.error("required"), Some("Missing required property 'name'"));
    let age = bad.find("/properties/age", "/age").expect("age frame");
    assert_eq!(age.error("minimum"), Some("Number -1 is less than minimum 0"));

    let extra = schema.evaluate(&json!({"name": "Ada", "nickname": "A"}), &hierarchical())?;
    assert!(!extra.is_valid());
    let frame = extra
        .find("/additionalProperties", "/nickname")
        .expect("additionalProperties frame");
    assert!(!frame.is_valid());
    assert!(frame.error("").is_some());
    Ok(())
}

#[test]
fn test_boolean_schemas() {
    assert!(is_valid(&json!(true), &json!({"anything": [1, 2]})));
    assert!(!is_valid(&json!(false), &json!(null)));
    assert!(is_valid(&json!({}), &json!("empty schema")));
}

#[test]
fn test_array_schema() {
    let schema = json!({
        "type": "array",
        "prefixItems": [{"type": "string"}],
        "items": {"type": "integer"},
        "contains": {"type": "integer", "minimum": 10},
        "maxContains": 1,
        "uniqueItems": true
    });
    assert!(is_valid(&schema, &json!(["id", 1, 12])));
    assert!(!is_valid(&schema, &json!(["id", 1, "two", 12])));
    assert!(!is_valid(&schema, &json!(["id", 1, 2])));
    assert!(!is_valid(&schema, &json!(["id", 11, 12])));
    assert!(!is_valid(&schema, &json!(["id", 12, 12])));
}

#[test]
fn test_conditionals() {
    let schema = json!({
        "if": {"properties": {"country": {"const": "US"}}},
        "then": {"properties": {"zip": {"pattern": "^[0-9]{5}$"}}},
        "else": {"properties": {"zip": {"pattern": "^[A-Z0-9 ]+$"}}}
    });
    assert!(is_valid(&schema, &json!({"country": "US", "zip": "12345"})));
    assert!(!is_valid(&schema, &json!({"country": "US", "zip": "K1A 0B1"})));
    assert!(is_valid(&schema, &json!({"country": "CA", "zip": "K1A 0B1"})));
    assert!(!is_valid(&schema, &json!({"country": "CA", "zip": "k1a"})));
}

#[test]
fn test_dependent_keywords() {
    let schema = json!({
        "dependentRequired": {"credit_card": ["billing_address"]},
        "dependentSchemas": {"shipping": {"required": ["address"]}}
    });
    assert!(is_valid(&schema, &json!({"name": "x"})));
    assert!(!is_valid(&schema, &json!({"credit_card": 1})));
    assert!(is_valid(&schema, &json!({"credit_card": 1, "billing_address": "y"})));
    assert!(!is_valid(&schema, &json!({"shipping": true})));
}

#[test]
fn test_unevaluated_properties_through_composition() {
    let schema = json!({
        "$defs": {"named": {"properties": {"name": {"type": "string"}}}},
        "allOf": [{"$ref": "#/$defs/named"}],
        "properties": {"id": {"type": "integer"}},
        "unevaluatedProperties": false
    });
    assert!(is_valid(&schema, &json!({"id": 1, "name": "x"})));
    assert!(!is_valid(&schema, &json!({"id": 1, "name": "x", "other": true})));
}

#[test]
fn test_draft7_ref_overrides_siblings() -> anyhow::Result<()> {
    let schema = Schema::from_value(&json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "definitions": {"text": {"type": "string"}},
        "$ref": "#/definitions/text",
        "minLength": 5
    }))?;
    let options = EvaluationOptions::default();
    assert!(schema.evaluate(&json!("ab"), &options)?.is_valid());
    assert!(!schema.evaluate(&json!(12), &options)?.is_valid());

    let latest = options.with_evaluate_as(SpecVersion::Draft202012);
    assert!(!schema.evaluate(&json!("ab"), &latest)?.is_valid());
    Ok(())
}

#[test]
fn test_draft7_tuple_items() {
    let schema = json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "items": [{"type": "string"}, {"type": "integer"}],
        "additionalItems": false
    });
    assert!(is_valid(&schema, &json!(["a", 1])));
    assert!(!is_valid(&schema, &json!(["a", 1, null])));
    assert!(!is_valid(&schema, &json!([1, "a"])));
}

#[test]
fn test_draft7_dependencies() {
    let schema = json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "dependencies": {
            "credit": ["billing"],
            "shipping": {"required": ["address"]}
        }
    });
    assert!(is_valid(&schema, &json!({"credit": 1, "billing": 2})));
    assert!(!is_valid(&schema, &json!({"credit": 1})));
    assert!(!is_valid(&schema, &json!({"shipping": 1})));
}

#[test]
fn test_custom_meta_schema_restricts_vocabularies() -> anyhow::Result<()> {
    let registry = Arc::new(SchemaRegistry::new());
    let meta = Schema::from_value(&json!({
        "$id": "https://example.com/meta/structural",
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$vocabulary": {
            "https://json-schema.org/draft/2020-12/vocab/core": true,
            "https://json-schema.org/draft/2020-12/vocab/applicator": true
        }
    }))?;
    registry.register(&meta)?;

    let schema = Schema::from_value(&json!({
        "$schema": "https://example.com/meta/structural",
        "properties": {"a": {"type": "string"}}
    }))?;
    let options = EvaluationOptions::default().with_registry(registry);

    // The validation vocabulary is off, so `type` is ignored
    assert!(schema.evaluate(&json!({"a": 1}), &options)?.is_valid());
    Ok(())
}

#[test]
fn test_unknown_required_vocabulary() -> anyhow::Result<()> {
    let registry = Arc::new(SchemaRegistry::new());
    let meta = Schema::from_value(&json!({
        "$id": "https://example.com/meta/exotic",
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$vocabulary": {"https://example.com/vocab/exotic": true}
    }))?;
    registry.register(&meta)?;

    let schema = Schema::from_value(&json!({"$schema": "https://example.com/meta/exotic"}))?;
    let options = EvaluationOptions::default().with_registry(registry);
    let err = schema.evaluate(&json!(1), &options).unwrap_err();
    assert!(matches!(
        err,
        Error::Schema(SchemaError::UnknownVocabulary(ref uri)) if uri == "https://example.com/vocab/exotic"
    ));
    Ok(())
}

#[test]
fn test_format_assertion_vocabulary() -> anyhow::Result<()> {
    let registry = Arc::new(SchemaRegistry::new());
    let meta = Schema::from_value(&json!({
        "$id": "https://example.com/meta/formats",
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$vocabulary": {
            "https://json-schema.org/draft/2020-12/vocab/core": true,
            "https://json-schema.org/draft/2020-12/vocab/format-assertion": true
        }
    }))?;
    registry.register(&meta)?;

    let schema = Schema::from_value(&json!({
        "$schema": "https://example.com/meta/formats",
        "format": "date"
    }))?;
    let options = EvaluationOptions::default().with_registry(registry);
    assert!(schema.evaluate(&json!("2024-01-31"), &options)?.is_valid());
    assert!(!schema.evaluate(&json!("2024-01-32"), &options)?.is_valid());

    let plain = Schema::from_value(&json!({"format": "date"}))?;
    assert!(plain.evaluate(&json!("2024-01-32"), &EvaluationOptions::default())?.is_valid());
    Ok(())
}

#[test]
fn test_invalid_schemas_are_rejected_at_parse_time() {
    assert!(matches!(
        Schema::from_value(&json!({"pattern": "("})),
        Err(SchemaError::InvalidRegex { .. })
    ));
    assert!(matches!(
        Schema::from_value(&json!(42)),
        Err(SchemaError::InvalidSchemaType { .. })
    ));
    assert!(Schema::from_value(&json!({"required": "name"})).is_err());
    assert!(Schema::parse("{\"type\": ").is_err());
}

#[test]
fn test_max_visits() {
    let schema = Schema::from_value(&json!({"items": {"items": true}})).unwrap();
    let options = EvaluationOptions::default().with_max_visits(3);
    assert!(schema.evaluate(&json!([[1]]), &options).is_ok());
    let err = schema.evaluate(&json!([[1], [2], [3]]), &options).unwrap_err();
    assert!(matches!(err, Error::Evaluation(_)));
}

#[test]
fn test_closed_object() {
    let schema = Schema::from_value(&json!({
        "properties": {"a": {"type": "string"}},
        "additionalProperties": false
    }))
    .unwrap();
    let results = schema.evaluate(&json!({"a": "x", "b": 1}), &hierarchical()).unwrap();
    assert!(!results.is_valid());
    let frame = results.find("/additionalProperties", "/b").unwrap();
    assert!(!frame.is_valid());
    assert!(schema.evaluate(&json!({"a": "x"}), &hierarchical()).unwrap().is_valid());
}

#[test]
fn test_linked_nodes() {
    let schema = Schema::from_value(&json!({
        "$defs": {
            "node": {
                "type": "object",
                "properties": {"next": {"$ref": "#/$defs/node"}, "v": {"type": "integer"}}
            }
        },
        "$ref": "#/$defs/node"
    }))
    .unwrap();
    assert!(schema.evaluate(&json!({"v": 1, "next": {"v": 2}}), &hierarchical()).unwrap().is_valid());

    let results = schema
        .evaluate(&json!({"v": 1, "next": {"v": "bad"}}), &hierarchical())
        .unwrap();
    assert!(!results.is_valid());
    assert!(
        results
            .iter()
            .any(|r| r.instance_location().to_string() == "/next/v" && r.error("type").is_some())
    );
}

#[test]
fn test_array_bounds() {
    let schema = Schema::from_value(&json!({"type": "array", "minItems": 2, "maxItems": 3})).unwrap();
    let short = schema.evaluate(&json!([1]), &hierarchical()).unwrap();
    assert!(short.error("minItems").is_some());
    assert!(schema.evaluate(&json!([1, 2]), &hierarchical()).unwrap().is_valid());
    let long = schema.evaluate(&json!([1, 2, 3, 4]), &hierarchical()).unwrap();
    assert!(long.error("maxItems").is_some());
    assert!(long.error("minItems").is_none());
}
