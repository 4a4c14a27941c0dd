//! In-memory collaborators.
//!
//! [`MemoryBackend`] answers radius queries over a fixture list and also
//! plays the session and remote-favorites roles. [`ReplaySource`] replays a
//! recorded drive as a device position source. Both are used by tests and
//! by the CLI's `--fixture` / `--track` modes.

use crate::backend::{
    Accuracy, FavoritesBackend, PermissionStatus, PositionSource, ProximityBackend, RawFix,
    SessionProvider, UserSession, WatchOptions,
};
use crate::error::{BackendError, LocationError};
use crate::model::{NearbyQuery, PointOfInterest};
use findixi_geo::within_radius;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Fixture-backed record store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Vec<PointOfInterest>,
    session: Option<UserSession>,
    favorites: HashMap<String, Vec<i64>>,
    latency: Duration,
    scripted_latencies: Mutex<VecDeque<Duration>>,
    scripted_failures: Mutex<VecDeque<BackendError>>,
    favorites_fail: AtomicBool,
    calls: AtomicUsize,
    last_query: Mutex<Option<NearbyQuery>>,
}

impl MemoryBackend {
    /// Store holding `records`.
    pub fn new(records: Vec<PointOfInterest>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// Loads records from a JSON array (fixture or exported RPC rows).
    ///
    /// # Errors
    /// Returns the decode error for malformed input.
    pub fn from_json(json: &str) -> Result<Self, BackendError> {
        let records: Vec<PointOfInterest> =
            serde_json::from_str(json).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(Self::new(records))
    }

    /// Pretends a user is signed in with the given favorites.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>, favorite_ids: Vec<i64>) -> Self {
        let user_id = user_id.into();
        self.favorites.insert(user_id.clone(), favorite_ids);
        self.session = Some(UserSession { user_id });
        self
    }

    /// Latency applied to every query.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Latency for the next query only; queued in call order.
    pub fn push_latency(&self, latency: Duration) {
        lock(&self.scripted_latencies).push_back(latency);
    }

    /// Makes the next query fail with `error`; queued in call order.
    pub fn push_failure(&self, error: BackendError) {
        lock(&self.scripted_failures).push_back(error);
    }

    /// Makes remote favorite lookups fail.
    pub fn fail_favorites(&self, fail: bool) {
        self.favorites_fail.store(fail, Ordering::Relaxed);
    }

    /// Number of queries received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// The most recent query received.
    pub fn last_query(&self) -> Option<NearbyQuery> {
        lock(&self.last_query).clone()
    }
}

impl ProximityBackend for MemoryBackend {
    async fn query_nearby(&self, query: &NearbyQuery) -> Result<Vec<PointOfInterest>, BackendError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        *lock(&self.last_query) = Some(query.clone());
        let latency = lock(&self.scripted_latencies).pop_front().unwrap_or(self.latency);
        let failure = lock(&self.scripted_failures).pop_front();

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = failure {
            return Err(error);
        }

        let ranked = within_radius(&query.center, &self.records, query.radius_km)
            .map_err(|e| BackendError::Rejected {
                status: 400,
                message: e.to_string(),
            })?;

        let rows: Vec<PointOfInterest> = ranked
            .into_iter()
            .map(|r| r.item)
            .filter(|poi| query.category_id.is_none_or(|id| poi.category_ids.contains(&id)))
            .filter(|poi| !query.open_now_only || poi.is_open_now())
            .filter(|poi| !query.exclude_inactive || poi.is_active())
            .take(query.limit)
            .cloned()
            .collect();

        debug!(
            radius_km = query.radius_km,
            rows = rows.len(),
            "Memory backend answered nearby query"
        );
        Ok(rows)
    }
}

impl SessionProvider for MemoryBackend {
    async fn current_session(&self) -> Result<Option<UserSession>, BackendError> {
        Ok(self.session.clone())
    }
}

impl FavoritesBackend for MemoryBackend {
    async fn favorite_ids(&self, user_id: &str) -> Result<Vec<i64>, BackendError> {
        if self.favorites_fail.load(Ordering::Relaxed) {
            return Err(BackendError::Unavailable("favorites lookup failed".into()));
        }
        Ok(self.favorites.get(user_id).cloned().unwrap_or_default())
    }
}

/// One point of a recorded drive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Milliseconds after the previous point
    #[serde(default)]
    pub after_ms: u64,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Compass heading in degrees
    #[serde(default)]
    pub heading: Option<f64>,
    /// Speed in meters per second
    #[serde(default)]
    pub speed_mps: Option<f64>,
}

impl TrackPoint {
    fn fix(&self) -> RawFix {
        RawFix {
            latitude: self.latitude,
            longitude: self.longitude,
            heading: self.heading,
            speed_mps: self.speed_mps,
        }
    }
}

/// Position source that replays a recorded drive.
///
/// The first point is emitted as soon as the watch starts; each following
/// point after its `after_ms`. The stream ends after the last point.
#[derive(Debug)]
pub struct ReplaySource {
    track: Vec<TrackPoint>,
    permission: PermissionStatus,
    last_known: Option<RawFix>,
    fix_delay: Duration,
    fresh_fix: Option<RawFix>,
    watch_unavailable: bool,
    watch_stopped: Arc<(AtomicBool, Notify)>,
}

impl ReplaySource {
    /// Source replaying `track` with permission granted.
    pub fn new(track: Vec<TrackPoint>) -> Self {
        Self {
            track,
            permission: PermissionStatus::Granted,
            last_known: None,
            fix_delay: Duration::ZERO,
            fresh_fix: None,
            watch_unavailable: false,
            watch_stopped: Arc::new((AtomicBool::new(false), Notify::new())),
        }
    }

    /// Source emitting `fixes` at a fixed interval.
    pub fn from_fixes(fixes: Vec<RawFix>, interval: Duration) -> Self {
        let after_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        let track = fixes
            .into_iter()
            .enumerate()
            .map(|(i, fix)| TrackPoint {
                after_ms: if i == 0 { 0 } else { after_ms },
                latitude: fix.latitude,
                longitude: fix.longitude,
                heading: fix.heading,
                speed_mps: fix.speed_mps,
            })
            .collect();
        Self::new(track)
    }

    /// Source whose permission is denied.
    pub fn denied() -> Self {
        Self {
            permission: PermissionStatus::Denied,
            ..Self::new(Vec::new())
        }
    }

    /// Sets the platform's cached position.
    #[must_use]
    pub fn with_last_known(mut self, fix: RawFix) -> Self {
        self.last_known = Some(fix);
        self
    }

    /// Delay before a one-shot fix resolves.
    #[must_use]
    pub fn with_fix_delay(mut self, delay: Duration) -> Self {
        self.fix_delay = delay;
        self
    }

    /// Fix returned by one-shot requests instead of the first track point.
    #[must_use]
    pub fn with_fresh_fix(mut self, fix: RawFix) -> Self {
        self.fresh_fix = Some(fix);
        self
    }

    /// Makes the device watch fail to start although permission is granted.
    #[must_use]
    pub fn with_watch_unavailable(mut self) -> Self {
        self.watch_unavailable = true;
        self
    }

    /// Resolves once the consumer has dropped its watch.
    pub async fn watch_closed(&self) -> bool {
        let (stopped, notify) = &*self.watch_stopped;
        if !stopped.load(Ordering::Acquire) {
            notify.notified().await;
        }
        stopped.load(Ordering::Acquire)
    }
}

impl PositionSource for ReplaySource {
    async fn permission(&self) -> PermissionStatus {
        self.permission
    }

    async fn request_permission(&self) -> PermissionStatus {
        self.permission
    }

    async fn current_fix(&self, _accuracy: Accuracy) -> Result<RawFix, LocationError> {
        if !self.fix_delay.is_zero() {
            tokio::time::sleep(self.fix_delay).await;
        }
        self.fresh_fix
            .or_else(|| self.track.first().map(TrackPoint::fix))
            .ok_or_else(|| LocationError::Unavailable("no fix available".into()))
    }

    fn last_known(&self) -> Option<RawFix> {
        self.last_known
    }

    fn watch(&self, _options: WatchOptions) -> Result<mpsc::Receiver<RawFix>, LocationError> {
        if self.permission != PermissionStatus::Granted {
            return Err(LocationError::PermissionDenied);
        }
        if self.watch_unavailable {
            return Err(LocationError::Unavailable("location services are off".into()));
        }

        let (tx, rx) = mpsc::channel(16);
        let track = self.track.clone();
        let watch_stopped = Arc::clone(&self.watch_stopped);

        tokio::spawn(async move {
            for point in track {
                if point.after_ms > 0 {
                    tokio::select! {
                        () = tx.closed() => break,
                        () = tokio::time::sleep(Duration::from_millis(point.after_ms)) => {}
                    }
                }
                if tx.send(point.fix()).await.is_err() {
                    break;
                }
            }
            if tx.is_closed() {
                let (stopped, notify) = &*watch_stopped;
                stopped.store(true, Ordering::Release);
                notify.notify_one();
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VisibilityFlags;
    use findixi_geo::Coordinate;

    fn poi(id: i64, lat: f64, lon: f64) -> PointOfInterest {
        let mut poi = PointOfInterest::new(id, format!("Comercio {id}"), lat, lon);
        poi.visibility = VisibilityFlags {
            activo: Some(true),
            ..VisibilityFlags::default()
        };
        poi
    }

    fn query(radius_km: f64) -> NearbyQuery {
        NearbyQuery {
            center: Coordinate::new(18.4655, -66.1057),
            radius_km,
            category_id: None,
            open_now_only: false,
            exclude_inactive: true,
            limit: 500,
        }
    }

    #[tokio::test]
    async fn test_radius_and_order() {
        let backend = MemoryBackend::new(vec![
            poi(1, 18.0111, -66.6141),  // Ponce, ~74 km
            poi(2, 18.4755, -66.1057),  // ~1.1 km
            poi(3, 18.4900, -66.1057),  // ~2.7 km
        ]);

        let rows = backend.query_nearby(&query(8.0467)).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_attribute_filters() {
        let mut open = poi(1, 18.4660, -66.1057);
        open.open_now = Some(true);
        open.category_ids = vec![4];
        let mut inactive = poi(2, 18.4661, -66.1057);
        inactive.visibility.activo = Some(false);
        let closed = poi(3, 18.4662, -66.1057);

        let backend = MemoryBackend::new(vec![open, inactive, closed]);

        let mut q = query(5.0);
        q.open_now_only = true;
        assert_eq!(backend.query_nearby(&q).await.unwrap().len(), 1);

        let mut q = query(5.0);
        q.category_id = Some(4);
        assert_eq!(backend.query_nearby(&q).await.unwrap()[0].id, 1);

        let mut q = query(5.0);
        q.exclude_inactive = false;
        q.limit = 2;
        assert_eq!(backend.query_nearby(&q).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let backend = MemoryBackend::new(vec![poi(1, 18.4660, -66.1057)]);
        backend.push_failure(BackendError::Unavailable("503".into()));

        assert!(backend.query_nearby(&query(5.0)).await.is_err());
        assert!(backend.query_nearby(&query(5.0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_session_and_favorites() {
        let backend = MemoryBackend::default().with_user("user-1", vec![3, 5]);

        let session = backend.current_session().await.unwrap().unwrap();
        assert_eq!(backend.favorite_ids(&session.user_id).await.unwrap(), vec![3, 5]);

        backend.fail_favorites(true);
        assert!(backend.favorite_ids("user-1").await.is_err());
    }

    #[test]
    fn test_fixture_json() {
        let backend = MemoryBackend::from_json(
            r#"[{"id": 1, "nombre": "Playa Luquillo", "latitud": 18.38, "longitud": -65.72, "activo": true}]"#,
        )
        .unwrap();
        assert_eq!(backend.records.len(), 1);

        assert!(MemoryBackend::from_json("{").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_ends_after_last_point() {
        let source = ReplaySource::from_fixes(
            vec![RawFix::at(18.0, -66.0), RawFix::at(18.001, -66.0)],
            Duration::from_millis(500),
        );
        let mut rx = source.watch(WatchOptions::default()).unwrap();

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }
}
