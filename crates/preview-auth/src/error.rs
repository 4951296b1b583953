//! Error types for preview secret operations
//!
//! This module defines the errors that can occur while issuing, storing or
//! reading preview URL secrets.

use thiserror::Error;

/// Preview secret error types.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The current user may not perform the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The content API rejected the credentials
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The content API returned an error response
    #[error("API error ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// The content API returned an unexpected body
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for preview secret operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Check if this error should be logged at error level.
    ///
    /// Permission and credential failures are expected in normal operation.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            AuthError::Internal(_)
                | AuthError::ConfigError(_)
                | AuthError::InvalidResponse(_)
                | AuthError::RequestFailed(_)
        ) || matches!(self, AuthError::ApiError { status, .. } if *status >= 500)
    }

    /// Get error code for API responses and notifications.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::PermissionDenied(_) => "PERMISSION_DENIED",
            AuthError::AuthenticationFailed => "AUTHENTICATION_FAILED",
            AuthError::RequestFailed(_) => "REQUEST_FAILED",
            AuthError::ApiError { .. } => "API_ERROR",
            AuthError::InvalidResponse(_) => "INVALID_RESPONSE",
            AuthError::ConfigError(_) => "CONFIG_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors() {
        assert!(AuthError::Internal("boom".into()).is_server_error());
        assert!(AuthError::ApiError {
            status: 503,
            message: "unavailable".into()
        }
        .is_server_error());
        assert!(!AuthError::ApiError {
            status: 409,
            message: "conflict".into()
        }
        .is_server_error());
        assert!(!AuthError::PermissionDenied("create".into()).is_server_error());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AuthError::AuthenticationFailed.error_code(), "AUTHENTICATION_FAILED");
        assert_eq!(
            AuthError::ConfigError("missing".into()).error_code(),
            "CONFIG_ERROR"
        );
    }
}
