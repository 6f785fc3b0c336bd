//! Argument validation at the dispatch boundary.
//!
//! Every failing field is collected so the caller sees one message listing all
//! of them, e.g. `Invalid arguments: name: ..., type: ...`.

use std::collections::HashSet;
use std::fmt;

use jsonschema::error::ValidationErrorKind;
use osc_shared_types::{InstanceName, OscError, Result, INSTANCE_NAME_PATTERN};
use serde_json::Value;
use url::Url;

/// Accumulates field violations while an input is converted into a typed call.
#[derive(Debug, Default)]
pub struct Violations {
    issues: Vec<String>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: &str, reason: impl fmt::Display) {
        self.issues.push(format!("{}: {}", path, reason));
    }

    /// Check an instance, bucket or pipeline name.
    pub fn name(&mut self, path: &str, value: &str) -> Option<InstanceName> {
        match InstanceName::parse(value) {
            Ok(name) => Some(name),
            Err(_) => {
                self.push(
                    path,
                    format!("Invalid name {:?}, must match {}", value, INSTANCE_NAME_PATTERN),
                );
                None
            }
        }
    }

    pub fn non_empty(&mut self, path: &str, value: &str) -> Option<String> {
        if value.trim().is_empty() {
            self.push(path, "Required");
            None
        } else {
            Some(value.to_string())
        }
    }

    /// Absolute URL, returned as given.
    pub fn url(&mut self, path: &str, value: &str) -> Option<String> {
        match Url::parse(value) {
            Ok(_) => Some(value.to_string()),
            Err(e) => {
                self.push(path, format!("Invalid url ({})", e));
                None
            }
        }
    }

    /// Check `arguments` against a JSON schema, recording at most one
    /// violation per field.
    pub fn schema(&mut self, schema: &Value, arguments: &Value) {
        let validator = match jsonschema::options()
            .should_validate_formats(true)
            .build(schema)
        {
            Ok(validator) => validator,
            Err(e) => {
                self.push("arguments", format!("Invalid schema ({})", e));
                return;
            }
        };

        let mut reported = HashSet::new();
        for error in validator.iter_errors(arguments) {
            // Nested objects behind `anyOf` are checked field by field after
            // deserialization.
            if matches!(
                error.kind,
                ValidationErrorKind::AnyOf | ValidationErrorKind::OneOfNotValid
            ) && error.instance.is_object()
            {
                continue;
            }
            let pointer = error.instance_path.to_string();
            let (path, reason) = match &error.kind {
                ValidationErrorKind::Required { property } => {
                    let property = property.as_str().unwrap_or_default();
                    (field_path(&pointer, Some(property)), None)
                }
                _ => (field_path(&pointer, None), Some(&error)),
            };
            if !reported.insert(path.clone()) {
                continue;
            }

            let Some(error) = reason else {
                self.push(&path, "Required");
                continue;
            };
            match (&error.kind, error.instance.as_str()) {
                (ValidationErrorKind::Pattern { .. }, Some(value)) => {
                    self.name(&path, value);
                }
                (ValidationErrorKind::Format { format }, Some(value)) if format == "uri" => {
                    if self.url(&path, value).is_some() {
                        self.push(&path, "Invalid url");
                    }
                }
                (ValidationErrorKind::Enum { options }, _) => {
                    self.push(&path, invalid_enum(options, &error.instance));
                }
                (ValidationErrorKind::MinLength { .. }, _) => self.push(&path, "Required"),
                _ => self.push(&path, error),
            }
        }
    }

    /// Record the message of a failed conversion that already names its field.
    pub fn absorb<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(OscError::Validation(message)) => {
                self.issues.push(message);
                None
            }
            Err(other) => {
                self.issues.push(other.to_string());
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    /// Fail with every collected violation, or build the validated value.
    pub fn finish<T>(self, build: impl FnOnce() -> Option<T>) -> Result<T> {
        if !self.issues.is_empty() {
            return Err(OscError::Validation(self.issues.join(", ")));
        }
        build().ok_or_else(|| OscError::Validation("arguments: incomplete".to_string()))
    }
}

/// Dotted field path of a JSON pointer, `arguments` for the root.
fn field_path(pointer: &str, property: Option<&str>) -> String {
    let segments: Vec<&str> = pointer
        .split('/')
        .filter(|segment| !segment.is_empty())
        .chain(property)
        .collect();
    if segments.is_empty() {
        "arguments".to_string()
    } else {
        segments.join(".")
    }
}

fn invalid_enum(options: &Value, received: &Value) -> String {
    let quoted = |value: &Value| match value.as_str() {
        Some(s) => format!("'{}'", s),
        None => value.to_string(),
    };
    let expected: Vec<String> = options
        .as_array()
        .map(|options| options.iter().map(quoted).collect())
        .unwrap_or_default();
    format!(
        "Invalid enum value. Expected {}, received {}",
        expected.join(" | "),
        quoted(received)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_name() {
        let mut v = Violations::new();
        assert_eq!(v.name("name", "mydb1").unwrap().as_str(), "mydb1");
        assert!(v.is_empty());
    }

    #[test]
    fn test_invalid_name_names_the_field() {
        let mut v = Violations::new();
        assert!(v.name("name", "My-DB").is_none());
        assert_eq!(v.issues().len(), 1);
        assert!(v.issues()[0].starts_with("name: "));
    }

    #[test]
    fn test_aggregated_message() {
        let mut v = Violations::new();
        let name = v.name("name", "Bad Name");
        let source = v.url("source", "not a url");
        let err = v
            .finish(|| Some((name?, source?)))
            .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("Invalid arguments: name: "), "{}", message);
        assert!(message.contains(", source: Invalid url"), "{}", message);
        assert!(matches!(err, OscError::Validation(_)));
    }

    #[test]
    fn test_absorb_keeps_field_prefix() {
        let mut v = Violations::new();
        let result: Result<()> = Err(OscError::Validation("type: Invalid enum value".into()));
        assert!(v.absorb(result).is_none());
        assert_eq!(v.issues(), ["type: Invalid enum value".to_string()]);
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "pattern": INSTANCE_NAME_PATTERN},
                "type": {"type": "string", "enum": ["SQL", "NoSQL", "MemoryDb"]},
                "source": {"type": "string", "format": "uri"},
                "output": {
                    "type": "object",
                    "properties": {
                        "bucket": {"type": "string", "pattern": INSTANCE_NAME_PATTERN}
                    }
                }
            },
            "required": ["name", "type"]
        })
    }

    #[test]
    fn test_schema_reports_every_missing_field() {
        let mut v = Violations::new();
        v.schema(&schema(), &json!({}));
        assert_eq!(v.issues(), ["name: Required".to_string(), "type: Required".to_string()]);
    }

    #[test]
    fn test_schema_reports_mistyped_and_invalid_fields_together() {
        let mut v = Violations::new();
        v.schema(&schema(), &json!({"name": "My-DB", "type": 5}));

        assert_eq!(v.issues().len(), 2, "{:?}", v.issues());
        assert!(v.issues().iter().any(|i| i.starts_with("name: Invalid name")));
        assert!(v.issues().iter().any(|i| i.starts_with("type: ")));
    }

    #[test]
    fn test_schema_enum_and_nested_paths() {
        let mut v = Violations::new();
        v.schema(
            &schema(),
            &json!({"name": "promo", "type": "Graph", "output": {"bucket": "My_Bucket"}}),
        );
        let message = v.finish(|| Some(())).unwrap_err().to_string();
        assert!(
            message.contains("type: Invalid enum value. Expected 'SQL' | 'NoSQL' | 'MemoryDb', received 'Graph'"),
            "{}",
            message
        );
        assert!(message.contains("output.bucket: Invalid name"), "{}", message);
    }

    #[test]
    fn test_schema_checks_urls() {
        let mut v = Violations::new();
        v.schema(&schema(), &json!({"name": "promo", "type": "SQL", "source": "in.mp4"}));
        assert_eq!(v.issues().len(), 1, "{:?}", v.issues());
        assert!(v.issues()[0].starts_with("source: Invalid url"));
    }

    #[test]
    fn test_schema_rejects_non_object_arguments() {
        let mut v = Violations::new();
        v.schema(&schema(), &json!("promo"));
        assert!(v.issues()[0].starts_with("arguments: "), "{:?}", v.issues());
    }

    #[test]
    fn test_required() {
        let mut v = Violations::new();
        assert!(v.non_empty("objectKey", "  ").is_none());
        assert_eq!(v.issues(), ["objectKey: Required".to_string()]);
    }
}
