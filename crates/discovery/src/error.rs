//! Error types for the discovery crate.
//!
//! Staleness is not represented here: a round overtaken by a newer one
//! resolves to [`crate::QueryOutcome::Superseded`].

use std::time::Duration;
use thiserror::Error;

/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Failures of a proximity query round.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Location permission was refused; nothing is queried until it is granted again
    #[error("Location permission denied")]
    PermissionDenied,

    /// No live, last-known or freshly requested position was available
    #[error("No location available")]
    NoLocation,

    /// The record store failed for this round
    #[error("Nearby query failed: {0}")]
    BackendQuery(#[from] BackendError),
}

/// Error code for integration with findixi-core error handling.
/// Range: 20xxx for discovery errors.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryErrorCode {
    /// Location permission denied
    PermissionDenied = 20001,
    /// No position available
    NoLocation = 20002,
    /// Backend query failed
    BackendQuery = 20003,
}

impl DiscoveryError {
    /// Returns the error code for this error.
    pub fn code(&self) -> DiscoveryErrorCode {
        match self {
            DiscoveryError::PermissionDenied => DiscoveryErrorCode::PermissionDenied,
            DiscoveryError::NoLocation => DiscoveryErrorCode::NoLocation,
            DiscoveryError::BackendQuery(_) => DiscoveryErrorCode::BackendQuery,
        }
    }

    /// Whether a retry affordance makes sense.
    ///
    /// A denied permission stays denied until the user changes it outside
    /// the app.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DiscoveryError::PermissionDenied)
    }

    /// Actionable message for the presentation layer.
    pub fn suggestion(&self) -> &'static str {
        match self {
            DiscoveryError::PermissionDenied => {
                "Enable location access for Findixi in the system settings"
            }
            DiscoveryError::NoLocation => "We could not find your location. Try again",
            DiscoveryError::BackendQuery(_) => "Could not load nearby places. Try again",
        }
    }
}

impl From<LocationError> for DiscoveryError {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::PermissionDenied => DiscoveryError::PermissionDenied,
            LocationError::Unavailable(_) | LocationError::Timeout(_) => DiscoveryError::NoLocation,
        }
    }
}

/// Failures of the record store collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Network failure or server error
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the request
    #[error("Backend rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Server message
        message: String,
    },

    /// The response body could not be decoded
    #[error("Malformed backend response: {0}")]
    Decode(String),
}

/// Failures of the routing collaborator. Never escapes `DistanceResolver`.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The service could not be reached or returned an error
    #[error("Routing unavailable: {0}")]
    Unavailable(String),

    /// The lookup did not finish in time
    #[error("Routing timed out after {0:?}")]
    Timeout(Duration),

    /// The service found no route between the points
    #[error("No route found")]
    NoRoute,

    /// The circuit breaker is open; the service was not called
    #[error("Routing circuit open")]
    CircuitOpen,
}

/// Failures of the device position source.
#[derive(Debug, Error)]
pub enum LocationError {
    /// Permission denied or revoked
    #[error("Location permission denied")]
    PermissionDenied,

    /// The device could not produce a fix
    #[error("Location unavailable: {0}")]
    Unavailable(String),

    /// The fix did not arrive in time
    #[error("Location fix timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures writing the local favorites store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("Favorites store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure
    #[error("Favorites store encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<DiscoveryError> for findixi_core::Error {
    fn from(err: DiscoveryError) -> Self {
        use findixi_core::ErrorCode;

        let code = match &err {
            DiscoveryError::PermissionDenied => ErrorCode::LocationPermissionDenied,
            DiscoveryError::NoLocation => ErrorCode::NoLocation,
            DiscoveryError::BackendQuery(BackendError::Rejected { .. }) => ErrorCode::BackendRejected,
            DiscoveryError::BackendQuery(_) => ErrorCode::BackendUnavailable,
        };
        let suggestion = err.suggestion();
        findixi_core::Error::new(code, err.to_string())
            .with_suggestion(suggestion)
            .with_source(err)
    }
}
