use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse failure classification shared by every record service.
///
/// Service implementations translate their transport details (status codes,
/// connect errors, response bodies) into one of these; the controller never
/// looks past the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClassification {
    NetworkUnavailable,
    Timeout,
    ValidationRejected,
    NotFound,
    Unauthorized,
    Unknown,
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClassification::NetworkUnavailable => "NetworkUnavailable",
            ErrorClassification::Timeout => "Timeout",
            ErrorClassification::ValidationRejected => "ValidationRejected",
            ErrorClassification::NotFound => "NotFound",
            ErrorClassification::Unauthorized => "Unauthorized",
            ErrorClassification::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Field-level detail accompanying a `ValidationRejected` failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRejection {
    pub field: String,
    pub message: String,
}

impl FieldRejection {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn render(classification: &ErrorClassification, message: &Option<String>) -> String {
    match message {
        Some(m) => format!("{classification}: {m}"),
        None => classification.to_string(),
    }
}

/// Classified failure of a record service call.
///
/// Carries the classification, an optional human-readable message from the
/// transport layer, and field-level detail for validation rejections.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}", render(.classification, .message))]
pub struct ServiceError {
    classification: ErrorClassification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    field_errors: Vec<FieldRejection>,
}

impl ServiceError {
    pub fn new(classification: ErrorClassification) -> Self {
        Self {
            classification,
            message: None,
            field_errors: Vec::new(),
        }
    }

    pub fn with_message(classification: ErrorClassification, message: impl Into<String>) -> Self {
        Self {
            classification,
            message: Some(message.into()),
            field_errors: Vec::new(),
        }
    }

    /// Attach field-level detail (meaningful for `ValidationRejected`).
    pub fn with_field_errors(mut self, field_errors: Vec<FieldRejection>) -> Self {
        self.field_errors = field_errors;
        self
    }

    pub fn classification(&self) -> ErrorClassification {
        self.classification
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn field_errors(&self) -> &[FieldRejection] {
        &self.field_errors
    }

    pub fn is_not_found(&self) -> bool {
        self.classification == ErrorClassification::NotFound
    }
}
