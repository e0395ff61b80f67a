//! Errors reported by the issue-tracking API

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation error code GitHub uses for duplicate labels and milestones
pub const ALREADY_EXISTS: &str = "already_exists";

/// One entry of the `errors` array GitHub attaches to 422 responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSubError {
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiSubError {
    pub fn with_code(resource: &str, field: &str, code: &str) -> Self {
        Self {
            resource: Some(resource.to_string()),
            field: Some(field.to_string()),
            code: Some(code.to_string()),
            message: None,
        }
    }
}

impl fmt::Display for ApiSubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = match (&self.resource, &self.field) {
            (Some(resource), Some(field)) => format!("{resource}.{field}"),
            (Some(resource), None) => resource.clone(),
            (None, Some(field)) => field.clone(),
            (None, None) => String::new(),
        };
        let code = self.code.as_deref().unwrap_or("invalid");

        match (&self.message, location.is_empty()) {
            (Some(message), true) => write!(f, "{message}"),
            (Some(message), false) => write!(f, "{location}: {code} ({message})"),
            (None, true) => write!(f, "{code}"),
            (None, false) => write!(f, "{location}: {code}"),
        }
    }
}

/// Error body of a failed GitHub API call
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("GitHub {operation} request failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("GitHub {operation} returned {status}: {message}")]
    Rejected {
        operation: &'static str,
        status: u16,
        message: String,
        errors: Vec<ApiSubError>,
    },

    #[error("GitHub {operation} response could not be parsed: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl ApiError {
    /// Builds a `Rejected` error from a non-success response body
    ///
    /// Bodies that are not GitHub's JSON error shape are kept verbatim as
    /// the message.
    pub fn from_response(operation: &'static str, status: u16, body: &str) -> Self {
        let (message, errors) = match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => {
                let errors = parsed
                    .errors
                    .into_iter()
                    .map(|value| match value {
                        serde_json::Value::String(message) => ApiSubError {
                            message: Some(message),
                            ..ApiSubError::default()
                        },
                        other => serde_json::from_value(other.clone()).unwrap_or(ApiSubError {
                            message: Some(other.to_string()),
                            ..ApiSubError::default()
                        }),
                    })
                    .collect();
                (parsed.message, errors)
            }
            Err(_) => (body.to_string(), Vec::new()),
        };

        ApiError::Rejected {
            operation,
            status,
            message,
            errors,
        }
    }

    /// Structured sub-errors reported by the API, if any
    pub fn sub_errors(&self) -> &[ApiSubError] {
        match self {
            ApiError::Rejected { errors, .. } => errors,
            _ => &[],
        }
    }

    /// True for a validation failure caused by a resource that already exists
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ApiError::Rejected { status: 422, .. })
            && self
                .sub_errors()
                .iter()
                .any(|e| e.code.as_deref() == Some(ALREADY_EXISTS))
    }

    /// True when the token lacks permission for the call
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ApiError::Rejected { status: 403, .. })
    }
}
