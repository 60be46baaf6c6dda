/// Input validation module
///
/// Input types derive `validator::Validate`; failures are flattened into
/// per-field details and surfaced as `AppError::Validation`.
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidateUrl, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

/// Validate an input, returning per-field details on failure
pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input.validate().map_err(AppError::from)
}

/// Accept a well-formed URL or the empty string (used to clear a link)
pub fn url_or_empty(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.validate_url() {
        Ok(())
    } else {
        Err(ValidationError::new("url").with_message(Cow::Borrowed("Invalid URL")))
    }
}

/// Reject values that are empty once surrounding whitespace is removed
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank").with_message(Cow::Borrowed("Must not be blank")))
    } else {
        Ok(())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details = Vec::new();
        flatten("", &errors, &mut details);
        details.sort_by(|a, b| a.path.cmp(&b.path));
        AppError::Validation(details)
    }
}

fn flatten(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = join_path(prefix, &camel_case(field));
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    out.push(FieldError {
                        path: path.clone(),
                        message: error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Invalid value ({})", error.code)),
                    });
                }
            }
            ValidationErrorsKind::Struct(nested) => flatten(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten(&format!("{}[{}]", path, index), nested, out);
                }
            }
        }
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

/// `social_links` -> `socialLinks`, matching the GraphQL field names
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
