//! Error types for the NextStep data-access layer.

use serde::Serialize;
use thiserror::Error;

/// Result type alias used by every facade operation.
pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Cannot move {entity} from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Map a non-success HTTP status from the REST backend onto an error kind.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 | 409 | 422 => Self::ValidationFailed(message),
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            _ => Self::Api { status, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Api { status: 404, .. })
    }

    /// The `{ response: { data: { message } } }` shape UI code reads errors from.
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            response: ErrorResponse {
                data: ErrorData {
                    message: self.to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub response: ErrorResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub data: ErrorData,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorData {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(
            ApiError::from_http_status(400, "bad"),
            ApiError::ValidationFailed(_)
        ));
        assert!(matches!(
            ApiError::from_http_status(401, "no"),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            ApiError::from_http_status(403, "no"),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            ApiError::from_http_status(404, "gone"),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_http_status(500, "boom"),
            ApiError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_envelope_carries_message() {
        let err = ApiError::not_found("Job #7 not found");
        let value = serde_json::to_value(err.envelope()).unwrap();
        assert_eq!(value["response"]["data"]["message"], "Job #7 not found");
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = ApiError::InvalidTransition {
            entity: "job",
            from: "Closed".into(),
            to: "Active".into(),
        };
        assert_eq!(err.to_string(), "Cannot move job from 'Closed' to 'Active'");
    }
}
