//! Validation failure reporting.
//!
//! Endpoint request types derive `validator::Validate`; this module flattens
//! the nested error tree that produces into a flat list of field/message
//! pairs suitable for a 400 response body.

use serde::{Deserialize, Serialize};
use validator::{ValidationErrors, ValidationErrorsKind};

/// One rejected field, as reported to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub field: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Flattens a `validator` error tree into failure entries.
///
/// Nested struct errors are reported as `parent.child`, list errors as
/// `items[2].name`. When a rule carries no custom message the rule code is
/// used instead.
pub fn collect_failures(errors: &ValidationErrors) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();
    collect_into("", errors, &mut failures);
    failures
}

fn collect_into(prefix: &str, errors: &ValidationErrors, out: &mut Vec<ValidationFailure>) {
    for (field, kind) in errors.errors() {
        let path = join_path(prefix, field);
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for err in field_errors {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    out.push(ValidationFailure::new(path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_into(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_into(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Debug, Validate)]
    struct Profile {
        #[validate(length(min = 1, message = "must not be empty"))]
        bio: String,
    }

    #[derive(Debug, Validate)]
    struct Account {
        #[validate(length(min = 3))]
        name: String,
        #[validate(email(message = "not an email address"))]
        contact: String,
        #[validate(nested)]
        profile: Profile,
    }

    #[test]
    fn test_collect_flat_and_nested_failures() {
        let account = Account {
            name: "ab".to_string(),
            contact: "nope".to_string(),
            profile: Profile { bio: String::new() },
        };
        let errors = account.validate().unwrap_err();
        let mut failures = collect_failures(&errors);
        failures.sort_by(|a, b| a.field.cmp(&b.field));

        assert_eq!(failures.len(), 3);
        assert_eq!(failures[0].field, "contact");
        assert_eq!(failures[0].message, "not an email address");
        assert_eq!(failures[1].field, "name");
        assert_eq!(failures[2].field, "profile.bio");
        assert_eq!(failures[2].message, "must not be empty");
    }

    #[test]
    fn test_rule_code_used_without_message() {
        let account = Account {
            name: "x".to_string(),
            contact: "a@b.example".to_string(),
            profile: Profile {
                bio: "fine".to_string(),
            },
        };
        let errors = account.validate().unwrap_err();
        let failures = collect_failures(&errors);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].field, "name");
        assert_eq!(failures[0].message, "length");
    }

    #[test]
    fn test_serialized_shape() {
        let failure = ValidationFailure::new("username", "taken");
        let json = serde_json::to_string(&failure).unwrap();
        assert_eq!(json, r#"{"field":"username","message":"taken"}"#);
    }
}
