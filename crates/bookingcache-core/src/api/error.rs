use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::messages;

/// Failure of a single fetch, as recorded on a cache entry.
///
/// Errors are cloned into every coalesced caller and every subscriber, so the
/// variants carry plain strings rather than the transport's error values.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiError {
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Request rejected with status {status}: {message}")]
    Client { status: u16, message: String },

    #[error("Request has {} field or non-field errors", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

/// One item of a validation error body. `field` is `None` for non-field errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Option<String>,
    pub code: String,
}

impl FieldError {
    /// Human-readable text, or the raw code when it is not known
    pub fn message(&self) -> String {
        messages::describe(self.field.as_deref(), &self.code)
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Shape of a 400 response body carrying field and non-field errors.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    non_field_errors: Vec<ErrorCode>,
    #[serde(default)]
    field_errors: HashMap<String, Vec<ErrorCode>>,
}

#[derive(Debug, Deserialize)]
struct ErrorCode {
    code: String,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            400 => Self::parse_field_errors(body).unwrap_or_else(|| ApiError::Client {
                status,
                message: Self::truncate_body(body),
            }),
            400..=499 => ApiError::Client {
                status,
                message: Self::truncate_body(body),
            },
            500..=599 => ApiError::Server(Self::truncate_body(body)),
            _ => ApiError::Unknown(format!("Status {}: {}", status, Self::truncate_body(body))),
        }
    }

    fn parse_field_errors(body: &str) -> Option<Self> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;

        let mut items: Vec<FieldError> = parsed
            .non_field_errors
            .into_iter()
            .map(|e| FieldError { field: None, code: e.code })
            .collect();

        let mut fields: Vec<_> = parsed.field_errors.into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        for (field, codes) in fields {
            items.extend(codes.into_iter().map(|e| FieldError {
                field: Some(field.clone()),
                code: e.code,
            }));
        }

        if items.is_empty() {
            None
        } else {
            Some(ApiError::Validation(items))
        }
    }

    /// Whether a global handler (server status banner) takes care of this error.
    /// Field and non-field errors belong to the screen that issued the request.
    pub fn handle_globally(&self) -> bool {
        !matches!(self, ApiError::Validation(_))
    }

    /// Text suitable for an alert shown to the user
    pub fn message(&self) -> String {
        match self {
            ApiError::Unreachable(_) => {
                "The server is unreachable. Check your connection and try again.".to_string()
            }
            ApiError::Validation(items) => items
                .iter()
                .map(FieldError::message)
                .collect::<Vec<_>>()
                .join("\n"),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_server_error() {
        let err = ApiError::from_status(503, "maintenance");
        assert_eq!(err, ApiError::Server("maintenance".to_string()));
        assert!(err.handle_globally());
    }

    #[test]
    fn test_from_status_client_error() {
        let err = ApiError::from_status(404, "not here");
        assert_eq!(
            err,
            ApiError::Client {
                status: 404,
                message: "not here".to_string()
            }
        );
    }

    #[test]
    fn test_from_status_field_errors() {
        let body = r#"{
            "code": "err_api_exception",
            "non_field_errors": [{"code": "err_wait_to_rerequest_new_code"}],
            "field_errors": {"phone": [{"code": "err_invalid_phone"}]}
        }"#;
        let err = ApiError::from_status(400, body);

        assert_eq!(
            err,
            ApiError::Validation(vec![
                FieldError {
                    field: None,
                    code: "err_wait_to_rerequest_new_code".to_string()
                },
                FieldError {
                    field: Some("phone".to_string()),
                    code: "err_invalid_phone".to_string()
                },
            ])
        );
        assert!(!err.handle_globally());
        assert_eq!(
            err.message(),
            "Minimum 2 minutes wait required to re-request new code.\nerr_invalid_phone"
        );
    }

    #[test]
    fn test_from_status_400_without_field_errors() {
        let err = ApiError::from_status(400, "bad");
        assert!(matches!(err, ApiError::Client { status: 400, .. }));
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 10);
        let err = ApiError::from_status(500, &body);
        match err {
            ApiError::Server(msg) => assert!(msg.contains("truncated, 510 total bytes")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
