//! Error types for the terminal's API access layer.

use thiserror::Error;

/// Errors that can occur when calling the POS API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable session token - sign in first.
    #[error("not signed in")]
    Unauthenticated,

    /// A refresh was attempted and failed; the session is over.
    #[error("session expired - sign in again")]
    SessionExpired,

    /// Sign-in was rejected by the server.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The server answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body, or a body snippet.
        message: String,
    },
}

impl ApiError {
    /// Whether this error means the session is unusable and the caller
    /// should force a logout.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::SessionExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::NotFound("product p-123".to_string());
        assert_eq!(err.to_string(), "not found: product p-123");

        let err = ApiError::Api {
            status: 422,
            message: "quantity must be positive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error (422): quantity must be positive"
        );
    }

    #[test]
    fn test_is_auth_covers_terminal_states_only() {
        assert!(ApiError::Unauthenticated.is_auth());
        assert!(ApiError::SessionExpired.is_auth());
        assert!(!ApiError::NotFound(String::new()).is_auth());
        assert!(
            !ApiError::Api {
                status: 500,
                message: String::new()
            }
            .is_auth()
        );
    }
}
