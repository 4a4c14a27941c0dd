//! Collaborator contracts consumed by the discovery engine.
//!
//! These traits define the seams between the engine and the outside world:
//!
//! - [`ProximityBackend`] - authoritative spatial + attribute filter
//! - [`RoutingService`] - best-effort driving duration lookups
//! - [`SessionProvider`] / [`FavoritesBackend`] - the signed-in user's favorites
//! - [`FavoritesStore`] - device-scoped favorites for signed-out use
//! - [`PositionSource`] - the device location API
//!
//! `findixi-api-client` implements the remote ones over HTTP;
//! [`crate::memory`] and [`crate::favorites`] provide local ones.

use crate::error::{BackendError, LocationError, RoutingError, StoreError};
use crate::model::{NearbyQuery, PointOfInterest};
use findixi_geo::Coordinate;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

/// Record store answering radius queries.
pub trait ProximityBackend: Send + Sync {
    /// Records matching the query. The backend decides what matches.
    fn query_nearby(
        &self,
        query: &NearbyQuery,
    ) -> impl Future<Output = Result<Vec<PointOfInterest>, BackendError>> + Send;
}

/// Summary of a driving route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteSummary {
    /// Route length in meters
    pub distance_meters: f64,
    /// Expected duration in seconds
    pub duration_seconds: f64,
}

/// Driving-route lookups. Only duration and length are needed.
pub trait RoutingService: Send + Sync {
    /// Driving route between two points.
    fn driving_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> impl Future<Output = Result<RouteSummary, RoutingError>> + Send;
}

/// Routing that always fails; used when routing is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRouting;

impl RoutingService for NoRouting {
    async fn driving_route(
        &self,
        _origin: Coordinate,
        _destination: Coordinate,
    ) -> Result<RouteSummary, RoutingError> {
        Err(RoutingError::Unavailable("routing disabled".into()))
    }
}

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    /// Backend user id
    pub user_id: String,
}

/// Looks up the current session.
pub trait SessionProvider: Send + Sync {
    /// The signed-in user, or `None` when signed out. Being signed out is not
    /// an error.
    fn current_session(&self) -> impl Future<Output = Result<Option<UserSession>, BackendError>> + Send;
}

/// Remote favorites for a signed-in user.
pub trait FavoritesBackend: Send + Sync {
    /// Favorite record ids of `user_id`.
    fn favorite_ids(&self, user_id: &str) -> impl Future<Output = Result<Vec<i64>, BackendError>> + Send;
}

/// Device-scoped favorites.
pub trait FavoritesStore: Send + Sync {
    /// Stored ids. Unreadable or malformed storage reads as empty.
    fn load(&self) -> Vec<i64>;

    /// Replaces the stored ids.
    fn save(&self, ids: &[i64]) -> Result<(), StoreError>;

    /// Adds `id` if absent, removes it if present. Returns whether it is now
    /// a favorite.
    fn toggle(&self, id: i64) -> Result<bool, StoreError> {
        let mut ids = self.load();
        let now_favorite = if let Some(pos) = ids.iter().position(|x| *x == id) {
            ids.remove(pos);
            false
        } else {
            ids.push(id);
            true
        };
        self.save(&ids)?;
        Ok(now_favorite)
    }
}

/// Location permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    /// Granted
    Granted,
    /// Refused or revoked
    Denied,
    /// Not asked yet
    Undetermined,
}

/// Requested fix accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    /// Regular high accuracy, used for one-shot fixes
    High,
    /// Highest available, used while tracking
    BestForNavigation,
}

/// Parameters of a continuous position watch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    /// Requested accuracy
    pub accuracy: Accuracy,
    /// Minimum time between samples
    pub min_interval: Duration,
    /// Minimum displacement between samples, in meters
    pub min_distance_m: f64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            accuracy: Accuracy::BestForNavigation,
            min_interval: Duration::from_millis(2000),
            min_distance_m: 3.0,
        }
    }
}

/// A raw reading from the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFix {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Compass heading in degrees, any range
    pub heading: Option<f64>,
    /// Speed in meters per second; devices report negative values when unknown
    pub speed_mps: Option<f64>,
}

impl RawFix {
    /// A fix without heading or speed.
    pub const fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            heading: None,
            speed_mps: None,
        }
    }

    /// Sets the heading.
    #[must_use]
    pub const fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Sets the speed.
    #[must_use]
    pub const fn with_speed_mps(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }
}

/// The device location API.
pub trait PositionSource: Send + Sync {
    /// Current permission without prompting.
    fn permission(&self) -> impl Future<Output = PermissionStatus> + Send;

    /// Prompts for permission if needed.
    fn request_permission(&self) -> impl Future<Output = PermissionStatus> + Send;

    /// A single fresh fix.
    fn current_fix(&self, accuracy: Accuracy) -> impl Future<Output = Result<RawFix, LocationError>> + Send;

    /// Last fix the platform has cached, if any.
    fn last_known(&self) -> Option<RawFix>;

    /// Starts a continuous watch. The source stops producing once the
    /// receiver is dropped.
    fn watch(&self, options: WatchOptions) -> Result<mpsc::Receiver<RawFix>, LocationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct VecStore(Mutex<Vec<i64>>);

    impl FavoritesStore for VecStore {
        fn load(&self) -> Vec<i64> {
            self.0.lock().unwrap().clone()
        }

        fn save(&self, ids: &[i64]) -> Result<(), StoreError> {
            *self.0.lock().unwrap() = ids.to_vec();
            Ok(())
        }
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let store = VecStore::default();
        assert!(store.toggle(9).unwrap());
        assert_eq!(store.load(), vec![9]);
        assert!(!store.toggle(9).unwrap());
        assert!(store.load().is_empty());
    }

    #[tokio::test]
    async fn test_no_routing_always_fails() {
        let result = NoRouting
            .driving_route(Coordinate::new(18.0, -66.0), Coordinate::new(18.1, -66.1))
            .await;
        assert!(matches!(result, Err(RoutingError::Unavailable(_))));
    }
}
