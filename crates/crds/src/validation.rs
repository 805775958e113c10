//! Field-level validation errors for admission
//!
//! Errors aggregate per object and render like the API server's
//! `Kind.group "name" is invalid: ...` responses.

use std::fmt;

use serde_json::Value;

/// Dotted path to a field, e.g. `spec.template.spec.paused`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A single invalid field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub path: FieldPath,
    pub value: Value,
    pub message: String,
}

impl FieldError {
    pub fn invalid(path: FieldPath, value: Value, message: impl Into<String>) -> Self {
        Self {
            path,
            value,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: Invalid value: {}: {}", self.path, self.value, self.message)
    }
}

/// Every field error found on one object
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}.{group} {name:?} is invalid: {}", summarize(.errors))]
pub struct ValidationError {
    pub kind: String,
    pub group: String,
    pub name: String,
    pub errors: Vec<FieldError>,
}

fn summarize(errors: &[FieldError]) -> String {
    match errors {
        [single] => single.to_string(),
        many => format!(
            "[{}]",
            many.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        ),
    }
}

impl ValidationError {
    /// `Ok` when no field errors were collected
    pub fn check(
        kind: &str,
        group: &str,
        name: &str,
        errors: Vec<FieldError>,
    ) -> Result<(), ValidationError> {
        if errors.is_empty() {
            return Ok(());
        }
        Err(ValidationError {
            kind: kind.to_string(),
            group: group.to_string(),
            name: name.to_string(),
            errors,
        })
    }
}

/// Admission-time checks for a kind
pub trait Validator {
    fn validate_create(&self) -> Result<(), ValidationError>;

    fn validate_update(&self, old: &Self) -> Result<(), ValidationError>;

    fn validate_delete(&self) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_error_renders_without_brackets() {
        let path = FieldPath::new(["spec", "template", "spec"]).child("paused");
        let err = ValidationError::check(
            "ClusterTemplate",
            "exp.cluster.x-k8s.io",
            "tpl",
            vec![FieldError::invalid(path, json!(true), "may not be populated for cluster templates")],
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "ClusterTemplate.exp.cluster.x-k8s.io \"tpl\" is invalid: \
             spec.template.spec.paused: Invalid value: true: may not be populated for cluster templates"
        );
    }

    #[test]
    fn multiple_errors_are_bracketed() {
        let root = FieldPath::new(["spec"]);
        let err = ValidationError::check(
            "Thing",
            "example.io",
            "x",
            vec![
                FieldError::invalid(root.child("a"), json!(1), "bad"),
                FieldError::invalid(root.child("b"), json!("v"), "worse"),
            ],
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Thing.example.io \"x\" is invalid: [spec.a: Invalid value: 1: bad, spec.b: Invalid value: \"v\": worse]"
        );
    }

    #[test]
    fn no_errors_is_ok() {
        assert!(ValidationError::check("Thing", "example.io", "x", Vec::new()).is_ok());
    }
}
