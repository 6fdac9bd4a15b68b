use serde::{Deserialize, Serialize};

use super::ApiError;

/// Outcome of a fetch as seen by consumers.
///
/// A fresh fetch populates exactly one of the two fields. A value read back
/// from a store may carry both: `response` is the last known-good payload and
/// `error` the most recent failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub response: Option<T>,
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(response: T) -> Self {
        Self {
            response: Some(response),
            error: None,
        }
    }

    pub fn err(error: ApiError) -> Self {
        Self {
            response: None,
            error: Some(error),
        }
    }

    /// A failed outcome that still carries the previous good payload
    pub fn with_fallback(error: ApiError, previous: Option<T>) -> Self {
        Self {
            response: previous,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.response.is_some()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

impl<T> From<Result<T, ApiError>> for ApiResponse<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(response) => Self::ok(response),
            Err(error) => Self::err(error),
        }
    }
}
