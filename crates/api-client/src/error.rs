//! Error types for the API client

use findixi_discovery::{BackendError, RoutingError};
use std::fmt;
use thiserror::Error;

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// API client errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing environment variable
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// API returned an error response
    #[error("API error ({status}): {message}")]
    ApiResponse {
        /// HTTP status code
        status: u16,
        /// Error message from API
        message: String,
    },

    /// Circuit breaker is open
    #[error("Circuit breaker is open - service temporarily unavailable")]
    CircuitOpen,

    /// Request timeout
    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a missing env var error
    pub fn missing_env(var: impl Into<String>) -> Self {
        Self::MissingEnvVar(var.into())
    }

    /// Create an API response error
    pub fn api_response(status: u16, message: impl Into<String>) -> Self {
        Self::ApiResponse {
            status,
            message: message.into(),
        }
    }

    /// Check if a user-triggered retry could help
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_connect() || e.is_timeout(),
            Self::ApiResponse { status, .. } => *status >= 500 || *status == 429,
            Self::Timeout(_) | Self::CircuitOpen => true,
            Self::Config(_) | Self::MissingEnvVar(_) | Self::Json(_) | Self::InvalidUrl(_) => false,
        }
    }

    /// Check if this is a client error (4xx)
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiResponse { status, .. } if (400..500).contains(status))
    }

    /// Check if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiResponse { status, .. } if *status >= 500)
    }
}

impl From<ApiError> for BackendError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::ApiResponse { status, message } if status < 500 => {
                BackendError::Rejected { status, message }
            }
            ApiError::Json(e) => BackendError::Decode(e.to_string()),
            ApiError::Request(e) if e.is_decode() => BackendError::Decode(e.to_string()),
            other => BackendError::Unavailable(other.to_string()),
        }
    }
}

impl From<ApiError> for RoutingError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::CircuitOpen => RoutingError::CircuitOpen,
            ApiError::Timeout(after) => RoutingError::Timeout(after),
            other => RoutingError::Unavailable(other.to_string()),
        }
    }
}

/// Error context for better debugging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Request ID for correlation
    pub request_id: Option<String>,
    /// Endpoint that was called
    pub endpoint: String,
    /// HTTP method used
    pub method: String,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.endpoint)?;
        if let Some(ref id) = self.request_id {
            write!(f, " (request_id: {id})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_mapping() {
        let rejected: BackendError = ApiError::api_response(400, "bad radius").into();
        assert!(matches!(rejected, BackendError::Rejected { status: 400, .. }));

        let down: BackendError = ApiError::api_response(503, "maintenance").into();
        assert!(matches!(down, BackendError::Unavailable(_)));
    }

    #[test]
    fn test_routing_mapping() {
        assert!(matches!(RoutingError::from(ApiError::CircuitOpen), RoutingError::CircuitOpen));
        assert!(matches!(
            RoutingError::from(ApiError::config("x")),
            RoutingError::Unavailable(_)
        ));
    }

    #[test]
    fn test_transient() {
        assert!(ApiError::api_response(502, "").is_transient());
        assert!(!ApiError::api_response(404, "").is_transient());
        assert!(ApiError::api_response(404, "").is_client_error());
    }

    #[test]
    fn test_context_display() {
        let ctx = ErrorContext {
            request_id: Some("abc".into()),
            endpoint: "rpc/buscar_comercios_filtrados".into(),
            method: "POST".into(),
        };
        assert_eq!(ctx.to_string(), "POST rpc/buscar_comercios_filtrados (request_id: abc)");
    }
}
