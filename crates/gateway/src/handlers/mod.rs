//! API handlers module

pub mod documents;
pub mod health;
pub mod rag;
pub mod root;
pub mod search;

use ragline_common::errors::AppError;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

/// Convert validator failures into a 400 naming the first offending
/// top-level field, nested list and struct errors included
pub(crate) fn validation_error(errors: ValidationErrors) -> AppError {
    match first_failure(&errors, "") {
        Some((path, reason)) => AppError::Validation {
            field: path.split(['.', '[']).next().map(str::to_string),
            message: format!("{}: {}", path, reason),
        },
        None => AppError::Validation {
            message: "Invalid request".to_string(),
            field: None,
        },
    }
}

/// Depth-first search for the first failing field, in key order.
/// Returns the dotted path (`documents[0].content`) and a readable reason.
fn first_failure(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by_key(|(name, _)| name.to_string());

    entries.into_iter().find_map(|(name, kind)| {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        };

        match kind {
            ValidationErrorsKind::Field(failures) => {
                failures.first().map(|e| (path, describe(e)))
            }
            ValidationErrorsKind::Struct(inner) => first_failure(inner, &path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(index, inner)| first_failure(inner, &format!("{}[{}]", path, index))),
        }
    })
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }

    match (error.params.get("min"), error.params.get("max")) {
        (Some(min), Some(max)) => format!("{} must be between {} and {}", error.code, min, max),
        _ => format!("failed {} check", error.code),
    }
}
