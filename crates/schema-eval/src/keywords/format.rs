//! The `format` keyword
//!
//! Always annotates the format name. It asserts only when
//! `require_format_validation` is set or the dialect enables the
//! format-assertion vocabulary; non-string instances always pass.

use super::{Keyword, KeywordRegistry};
use crate::builder::BuildContext;
use crate::constraint::KeywordConstraint;
use crate::error::{FailureKind, SchemaResult};
use crate::schema::ParseContext;
use crate::spec_version::SpecVersions;
use crate::vocabulary::vocab;
use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use schema_pointer::JsonPointer;
use serde_json::Value;
use std::any::Any;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::Url;

type Checker = fn(&str) -> bool;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$",
    )
    .expect("email pattern is valid")
});

static HOSTNAME_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("hostname pattern is valid")
});

static REFERENCE_BASE: Lazy<Url> =
    Lazy::new(|| Url::parse("https://json-schema.local/").expect("reference base is a valid URL"));

pub(super) fn register(registry: &mut KeywordRegistry) {
    registry.register("format", parse_format);
}

fn checker(format: &str) -> Option<Checker> {
    let check: Checker = match format {
        "date-time" => is_date_time,
        "date" => is_date,
        "time" => is_time,
        "email" => is_email,
        "hostname" => is_hostname,
        "ipv4" => |s| s.parse::<Ipv4Addr>().is_ok(),
        "ipv6" => |s| s.parse::<Ipv6Addr>().is_ok(),
        "uri" => |s| Url::parse(s).is_ok(),
        "uri-reference" => |s| REFERENCE_BASE.join(s).is_ok(),
        "uuid" => |s| s.len() == 36 && uuid::Uuid::parse_str(s).is_ok(),
        "regex" => |s| Regex::new(s).is_ok(),
        "json-pointer" => |s| JsonPointer::parse(s).is_ok(),
        _ => return None,
    };
    Some(check)
}

fn is_date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
}

fn is_date(s: &str) -> bool {
    s.len() == 10 && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// RFC 3339 `full-time`: checked by pinning it to an arbitrary date
fn is_time(s: &str) -> bool {
    is_date_time(&format!("1970-01-01T{}", s))
}

fn is_email(s: &str) -> bool {
    EMAIL.is_match(s)
}

fn is_hostname(s: &str) -> bool {
    let s = s.strip_suffix('.').unwrap_or(s);
    !s.is_empty() && s.len() <= 253 && s.split('.').all(|label| HOSTNAME_LABEL.is_match(label))
}

#[derive(Debug)]
pub struct FormatKeyword {
    format: String,
}

impl FormatKeyword {
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn is_known(&self) -> bool {
        checker(&self.format).is_some()
    }
}

fn parse_format(name: &str, value: &Value, ctx: &ParseContext<'_>) -> SchemaResult<Box<dyn Keyword>> {
    let format = value
        .as_str()
        .ok_or_else(|| ctx.invalid_value(name, "expected a format name"))?;
    Ok(Box::new(FormatKeyword {
        format: format.to_string(),
    }))
}

impl Keyword for FormatKeyword {
    fn name(&self) -> &str {
        "format"
    }

    fn spec_versions(&self) -> SpecVersions {
        SpecVersions::ALL
    }

    fn vocabularies(&self) -> &'static [&'static str] {
        vocab::FORMAT
    }

    fn compile(&self, _siblings: &[KeywordConstraint], _ctx: &mut BuildContext<'_>) -> SchemaResult<KeywordConstraint> {
        let format = self.format.clone();
        let check = checker(&format);
        if check.is_none() {
            tracing::debug!(format = %format, "no checker for format");
        }

        Ok(KeywordConstraint::new("format", move |kc| {
            kc.annotate(Value::String(format.clone()));
            let options = kc.options();
            match check {
                Some(check) => {
                    let asserting = options.require_format_validation || kc.signature().format_assertion();
                    if asserting
                        && let Value::String(s) = kc.instance()
                        && !check(s)
                    {
                        kc.fail(FailureKind::FormatInvalid {
                            format: format.clone(),
                            value: s.clone(),
                        });
                    }
                }
                None if options.only_known_formats => {
                    kc.fail(FailureKind::UnknownFormat { format: format.clone() });
                }
                None => {}
            }
            Ok(())
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::EvaluationOptions;
    use crate::output::OutputFormat;
    use crate::schema::Schema;
    use serde_json::json;

    fn asserting() -> EvaluationOptions {
        EvaluationOptions::default()
            .with_output_format(OutputFormat::Hierarchical)
            .with_require_format_validation(true)
    }

    #[test]
    fn test_checkers() {
        let cases = [
            ("date-time", "2024-02-29T12:30:00Z", true),
            ("date-time", "2024-02-29 12:30:00", false),
            ("date", "2024-02-29", true),
            ("date", "2023-02-29", false),
            ("time", "08:30:06+02:00", true),
            ("time", "25:00:00Z", false),
            ("email", "joe@example.com", true),
            ("email", "joe.example.com", false),
            ("hostname", "www.example.com", true),
            ("hostname", "-bad-.com", false),
            ("ipv4", "192.168.0.1", true),
            ("ipv4", "256.1.1.1", false),
            ("ipv6", "::1", true),
            ("ipv6", "12345::", false),
            ("uri", "https://example.com/a?b#c", true),
            ("uri", "relative/path", false),
            ("uri-reference", "relative/path", true),
            ("uuid", "2eb8aa08-aa98-11ea-b4aa-73b441d16380", true),
            ("uuid", "2eb8aa08aa9811eab4aa73b441d16380", false),
            ("regex", "^[a-z]+$", true),
            ("regex", "(", false),
            ("json-pointer", "/a/~1b", true),
            ("json-pointer", "a", false),
        ];
        for (format, value, expected) in cases {
            let check = checker(format).unwrap();
            assert_eq!(check(value), expected, "{format}: {value}");
        }
    }

    #[test]
    fn test_annotation_only_by_default() {
        let schema = Schema::from_value(&json!({"format": "email"})).unwrap();
        let options = EvaluationOptions::default().with_output_format(OutputFormat::Hierarchical);
        let results = schema.evaluate(&json!("not an email"), &options).unwrap();
        assert!(results.is_valid());
        assert_eq!(results.annotation("format"), Some(&json!("email")));
    }

    #[test]
    fn test_assertion_when_required() {
        let schema = Schema::from_value(&json!({"format": "ipv4"})).unwrap();
        let results = schema.evaluate(&json!("1.2.3"), &asserting()).unwrap();
        assert_eq!(results.error("format"), Some("Value '1.2.3' is not a valid ipv4"));
        assert!(schema.evaluate(&json!(42), &asserting()).unwrap().is_valid());
    }

    #[test]
    fn test_unknown_formats() {
        let schema = Schema::from_value(&json!({"format": "color"})).unwrap();
        assert!(schema.evaluate(&json!("red"), &asserting()).unwrap().is_valid());
        let strict = asserting().with_only_known_formats(true);
        let results = schema.evaluate(&json!("red"), &strict).unwrap();
        assert_eq!(results.error("format"), Some("Unknown format 'color'"));
    }
}
