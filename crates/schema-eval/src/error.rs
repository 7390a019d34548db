// Error types for schema compilation and evaluation

use crate::spec_version::SpecVersion;
use thiserror::Error;

/// Defects in a schema, detected while parsing or compiling it.
///
/// Every variant is raised before any instance is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// Schema text is not JSON
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// A schema position holds something other than an object or a boolean
    #[error("Schema at '{location}' must be an object or a boolean, got {got}")]
    InvalidSchemaType { location: String, got: String },

    /// A keyword value is structurally malformed
    #[error("Invalid value for '{keyword}' at '{location}': {message}")]
    InvalidKeywordValue {
        keyword: String,
        location: String,
        message: String,
    },

    /// A `pattern` or `patternProperties` regex does not compile
    #[error("Invalid regular expression '{pattern}' in '{keyword}': {message}")]
    InvalidRegex {
        keyword: String,
        pattern: String,
        message: String,
    },

    /// A URI in `$id`, `$ref` or a registry call cannot be parsed
    #[error("Invalid URI '{uri}': {message}")]
    InvalidUri { uri: String, message: String },

    /// A reference names a schema the registry does not know
    #[error("Cannot resolve reference '{reference}' from base '{base}'")]
    UnresolvedReference { reference: String, base: String },

    /// `$schema` names a meta-schema that is neither built in nor registered
    #[error("Cannot resolve meta-schema '{0}'")]
    UnresolvedMetaSchema(String),

    /// A keyword requires a sibling that is not active on the same schema
    #[error("Keyword '{keyword}' requires sibling keyword '{dependency}', which is not present")]
    MissingDependency { keyword: String, dependency: String },

    /// A keyword requires a sibling that is compiled after it
    #[error("Keyword '{keyword}' depends on '{dependency}', which is ordered after it")]
    DependencyOrder { keyword: String, dependency: String },

    /// A custom meta-schema requires a vocabulary this engine does not implement
    #[error("Required vocabulary '{0}' is not known")]
    UnknownVocabulary(String),

    /// A keyword form that the active dialect forbids
    #[error("The {form} form of '{keyword}' is not supported under {version}")]
    UnsupportedForm {
        keyword: String,
        form: String,
        version: SpecVersion,
    },

    #[error("Internal compiler error: {0}")]
    Internal(String),
}

impl From<url::ParseError> for SchemaError {
    fn from(e: url::ParseError) -> Self {
        SchemaError::InvalidUri {
            uri: String::new(),
            message: e.to_string(),
        }
    }
}

/// Result type for schema parsing and compilation
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Runtime faults during evaluation.
///
/// An instance that does not match its schema is not a fault: that is a
/// `false` verdict in the results tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// A keyword's evaluation function could not complete
    #[error("Keyword '{keyword}' faulted at '{instance_location}': {message}")]
    KeywordFault {
        keyword: String,
        instance_location: String,
        message: String,
    },

    /// `max_visits` was reached
    #[error("Evaluation exceeded the budget of {visits} schema visits")]
    BudgetExceeded { visits: usize },

    /// A keyword was pulled again while its own evaluation was in progress
    #[error("Keyword '{keyword}' was re-entered while it was still being evaluated")]
    Reentrant { keyword: String },

    #[error("Internal evaluator error: {0}")]
    Internal(String),
}

/// Result type for evaluation
pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// Either kind of failure, for callers that compile and evaluate in one step
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Structured reasons an instance fails a keyword.
///
/// The rendered `message()` is what ends up in a frame's `errors` map.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FailureKind {
    /// Type mismatch
    TypeMismatch { expected: String, got: String },

    /// The `false` schema rejects everything
    FalseSchema,

    /// Missing required properties
    MissingRequiredProperties { properties: Vec<String> },

    /// A present property requires others that are missing
    DependentRequired {
        property: String,
        missing: Vec<String>,
    },

    /// Value not in enum
    InvalidEnumValue { value: String, allowed: Vec<String> },

    /// Value differs from `const`
    ConstMismatch { expected: String },

    /// Number out of range
    NumberOutOfRange {
        value: f64,
        minimum: Option<f64>,
        maximum: Option<f64>,
        exclusive_minimum: Option<f64>,
        exclusive_maximum: Option<f64>,
    },

    /// Number not a multiple of
    NumberNotMultipleOf { value: f64, multiple_of: f64 },

    /// String length invalid
    StringLengthInvalid {
        length: usize,
        min_length: Option<u64>,
        max_length: Option<u64>,
    },

    /// String doesn't match pattern
    StringPatternMismatch { value: String, pattern: String },

    /// Array length invalid
    ArrayLengthInvalid {
        length: usize,
        min_items: Option<u64>,
        max_items: Option<u64>,
    },

    /// Array items not unique
    ArrayItemsNotUnique { first: usize, second: usize },

    /// Object property count invalid
    ObjectPropertyCountInvalid {
        count: usize,
        min_properties: Option<u64>,
        max_properties: Option<u64>,
    },

    /// `contains` matched the wrong number of items
    ContainsCount {
        count: usize,
        min: u64,
        max: Option<u64>,
    },

    /// `oneOf` matched zero or several subschemas
    OneOfMismatch { matched: usize },

    /// `not` subschema matched
    NotExpectedMatch,

    /// String does not satisfy its `format`
    FormatInvalid { format: String, value: String },

    /// `format` names a format this engine cannot check
    UnknownFormat { format: String },

    /// Last resort for custom keywords
    Other { message: String },
}

impl FailureKind {
    /// Format a human-readable message from this failure kind
    pub fn message(&self) -> String {
        match self {
            FailureKind::TypeMismatch { expected, got } => {
                format!("Expected {}, got {}", expected, got)
            }
            FailureKind::FalseSchema => "All values fail against the false schema".to_string(),
            FailureKind::MissingRequiredProperties { properties } => {
                let quoted: Vec<String> = properties.iter().map(|p| format!("'{}'", p)).collect();
                if quoted.len() == 1 {
                    format!("Missing required property {}", quoted[0])
                } else {
                    format!("Missing required properties {}", quoted.join(", "))
                }
            }
            FailureKind::DependentRequired { property, missing } => {
                format!(
                    "Property '{}' requires properties: {}",
                    property,
                    missing.join(", ")
                )
            }
            FailureKind::InvalidEnumValue { value, allowed } => {
                format!("Value must be one of: {}, got {}", allowed.join(", "), value)
            }
            FailureKind::ConstMismatch { expected } => {
                format!("Expected value {}", expected)
            }
            FailureKind::NumberOutOfRange {
                value,
                minimum,
                maximum,
                exclusive_minimum,
                exclusive_maximum,
            } => {
                if let Some(min) = minimum {
                    format!("Number {} is less than minimum {}", value, min)
                } else if let Some(max) = maximum {
                    format!("Number {} is greater than maximum {}", value, max)
                } else if let Some(min) = exclusive_minimum {
                    format!("Number {} is not greater than {}", value, min)
                } else if let Some(max) = exclusive_maximum {
                    format!("Number {} is not less than {}", value, max)
                } else {
                    format!("Number {} is out of range", value)
                }
            }
            FailureKind::NumberNotMultipleOf { value, multiple_of } => {
                format!("Number {} is not a multiple of {}", value, multiple_of)
            }
            FailureKind::StringLengthInvalid {
                length,
                min_length,
                max_length,
            } => {
                if let Some(min) = min_length {
                    format!("String length {} is less than minimum {}", length, min)
                } else if let Some(max) = max_length {
                    format!("String length {} is greater than maximum {}", length, max)
                } else {
                    format!("String length {} is invalid", length)
                }
            }
            FailureKind::StringPatternMismatch { value, pattern } => {
                format!("String '{}' does not match pattern '{}'", value, pattern)
            }
            FailureKind::ArrayLengthInvalid {
                length,
                min_items,
                max_items,
            } => {
                if let Some(min) = min_items {
                    format!("Array length {} is less than minimum {}", length, min)
                } else if let Some(max) = max_items {
                    format!("Array length {} is greater than maximum {}", length, max)
                } else {
                    format!("Array length {} is invalid", length)
                }
            }
            FailureKind::ArrayItemsNotUnique { first, second } => {
                format!(
                    "Array items must be unique (items {} and {} are equal)",
                    first, second
                )
            }
            FailureKind::ObjectPropertyCountInvalid {
                count,
                min_properties,
                max_properties,
            } => {
                if let Some(min) = min_properties {
                    format!("Object has {} properties, less than minimum {}", count, min)
                } else if let Some(max) = max_properties {
                    format!(
                        "Object has {} properties, greater than maximum {}",
                        count, max
                    )
                } else {
                    format!("Object has {} properties (invalid)", count)
                }
            }
            FailureKind::ContainsCount { count, min, max } => match max {
                Some(max) if *count as u64 > *max => {
                    format!("{} items match, more than the maximum {}", count, max)
                }
                _ => format!("{} items match, fewer than the minimum {}", count, min),
            },
            FailureKind::OneOfMismatch { matched } => {
                format!("Expected exactly one subschema to match, {} matched", matched)
            }
            FailureKind::NotExpectedMatch => {
                "Expected the value to fail the 'not' subschema".to_string()
            }
            FailureKind::FormatInvalid { format, value } => {
                format!("Value '{}' is not a valid {}", value, format)
            }
            FailureKind::UnknownFormat { format } => {
                format!("Unknown format '{}'", format)
            }
            FailureKind::Other { message } => message.clone(),
        }
    }
}
