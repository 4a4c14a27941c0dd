//! Location tracking.
//!
//! [`LocationTracker::subscribe`] turns the device watch into a
//! [`PositionStream`]. The stream owns the [`TrackingState`], so every
//! sample passes through a single synchronous handler in arrival order.
//! Dropping or closing the stream ends the device watch.
//!
//! Fixes closer than the watch options allow (in time or distance) are
//! dropped by the stream, whatever the source delivers.

use crate::backend::{Accuracy, PermissionStatus, PositionSource, RawFix, WatchOptions};
use crate::error::LocationError;
use crate::model::UserLocation;
use findixi_core::config::TrackingConfig;
use findixi_geo::{Coordinate, haversine_distance_meters, heading_delta, mps_to_mph, normalize_heading};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Heading changes smaller than this are treated as compass noise.
pub const DEFAULT_HEADING_HYSTERESIS_DEG: f64 = 4.0;

/// Upper bound for a one-shot fix.
pub const DEFAULT_FIX_TIMEOUT: Duration = Duration::from_secs(8);

/// Whether samples can be expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    /// No sample yet; show a loading state
    Pending,
    /// Permission refused; show an actionable message
    Denied,
    /// Samples are flowing
    Tracking,
}

/// One accepted position sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    /// Position with the smoothed heading and speed in mph
    pub location: UserLocation,
    /// Great-circle displacement from the previous tracked sample; `None` for
    /// the first one
    pub moved_meters: Option<f64>,
    /// Whether this sample moved the smoothed heading
    pub heading_changed: bool,
}

impl PositionSample {
    /// Whether the sample moved at least `meters`. The first sample always has.
    pub fn moved_at_least(&self, meters: f64) -> bool {
        self.moved_meters.is_none_or(|d| d >= meters)
    }
}

/// Mutable tracking state, written only by [`TrackingState::ingest`] and
/// [`TrackingState::mark_tracked`].
#[derive(Debug, Clone)]
pub struct TrackingState {
    hysteresis_deg: f64,
    last_tracked: Option<Coordinate>,
    heading: Option<f64>,
    live: Option<UserLocation>,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self::new(DEFAULT_HEADING_HYSTERESIS_DEG)
    }
}

impl TrackingState {
    /// Empty state with the given heading hysteresis.
    pub fn new(hysteresis_deg: f64) -> Self {
        Self {
            hysteresis_deg,
            last_tracked: None,
            heading: None,
            live: None,
        }
    }

    /// Folds a raw fix into the state. Fixes with invalid coordinates are
    /// dropped.
    pub fn ingest(&mut self, fix: RawFix) -> Option<PositionSample> {
        let Ok(coord) = Coordinate::checked(fix.latitude, fix.longitude) else {
            debug!(latitude = fix.latitude, longitude = fix.longitude, "Dropping invalid fix");
            return None;
        };

        let moved_meters = self
            .last_tracked
            .map(|previous| haversine_distance_meters(&previous, &coord));
        self.last_tracked = Some(coord);

        let heading_now = fix.heading.and_then(normalize_heading);
        let heading_changed = match (self.heading, heading_now) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(previous), Some(now)) => heading_delta(previous, now) >= self.hysteresis_deg,
        };
        if heading_changed {
            self.heading = heading_now;
        } else if heading_now.is_some() {
            debug!(heading = heading_now, "Heading jitter suppressed");
        }

        let location = UserLocation {
            latitude: coord.latitude,
            longitude: coord.longitude,
            heading: self.heading,
            speed_mph: fix.speed_mps.map_or(0.0, mps_to_mph),
        };
        self.live = Some(location);

        Some(PositionSample {
            location,
            moved_meters,
            heading_changed,
        })
    }

    /// Records a position obtained outside the watch (e.g. on recenter) as
    /// the latest tracked one.
    pub fn mark_tracked(&mut self, location: UserLocation) {
        self.last_tracked = Some(location.coordinate());
        self.live = Some(UserLocation {
            heading: self.heading,
            ..location
        });
    }

    /// The most recent live position.
    pub fn live(&self) -> Option<UserLocation> {
        self.live
    }

    /// The smoothed heading.
    pub fn heading(&self) -> Option<f64> {
        self.heading
    }
}

/// Enforces the watch spacing: a fix is admitted only once both the minimum
/// interval and the minimum distance from the last admitted fix are reached.
#[derive(Debug, Clone)]
pub struct WatchGate {
    min_interval: Duration,
    min_distance_m: f64,
    last: Option<(Instant, Coordinate)>,
}

impl WatchGate {
    /// Gate for `options`.
    pub fn new(options: &WatchOptions) -> Self {
        Self {
            min_interval: options.min_interval,
            min_distance_m: options.min_distance_m,
            last: None,
        }
    }

    /// Whether `fix`, arriving at `now`, should be passed on. Invalid
    /// coordinates pass through untouched and are dropped downstream.
    pub fn admit(&mut self, fix: &RawFix, now: Instant) -> bool {
        let Ok(coord) = Coordinate::checked(fix.latitude, fix.longitude) else {
            return true;
        };
        if let Some((at, previous)) = self.last {
            let elapsed = now.saturating_duration_since(at);
            let moved = haversine_distance_meters(&previous, &coord);
            if elapsed < self.min_interval || moved < self.min_distance_m {
                debug!(elapsed_ms = elapsed.as_millis(), moved_m = moved, "Fix below watch spacing");
                return false;
            }
        }
        self.last = Some((now, coord));
        true
    }
}

/// Cancellable stream of position samples.
#[derive(Debug)]
pub struct PositionStream {
    rx: mpsc::Receiver<RawFix>,
    gate: WatchGate,
    state: TrackingState,
    live: Arc<watch::Sender<Option<UserLocation>>>,
}

impl PositionStream {
    fn new(
        rx: mpsc::Receiver<RawFix>,
        gate: WatchGate,
        state: TrackingState,
        live: Arc<watch::Sender<Option<UserLocation>>>,
    ) -> Self {
        Self { rx, gate, state, live }
    }

    /// Tracking state accumulated so far.
    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    /// Records a position obtained outside the watch (e.g. on recenter).
    pub fn mark_tracked(&mut self, location: UserLocation) {
        self.state.mark_tracked(location);
        self.live.send_replace(self.state.live());
    }

    /// Stops the device watch. Already buffered fixes are still yielded.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl Stream for PositionStream {
    type Item = PositionSample;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(fix)) => {
                    if !this.gate.admit(&fix, Instant::now()) {
                        continue;
                    }
                    if let Some(sample) = this.state.ingest(fix) {
                        this.live.send_replace(Some(sample.location));
                        return Poll::Ready(Some(sample));
                    }
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Wraps the device position source.
#[derive(Debug)]
pub struct LocationTracker<P> {
    source: Arc<P>,
    options: WatchOptions,
    hysteresis_deg: f64,
    fix_timeout: Duration,
    live: Arc<watch::Sender<Option<UserLocation>>>,
}

impl<P: PositionSource> LocationTracker<P> {
    /// Tracker with the default watch options.
    pub fn new(source: Arc<P>) -> Self {
        Self {
            source,
            options: WatchOptions::default(),
            hysteresis_deg: DEFAULT_HEADING_HYSTERESIS_DEG,
            fix_timeout: DEFAULT_FIX_TIMEOUT,
            live: Arc::new(watch::channel(None).0),
        }
    }

    /// Tracker configured from the `[tracking]` section.
    pub fn from_config(source: Arc<P>, config: &TrackingConfig) -> Self {
        Self {
            source,
            options: WatchOptions {
                accuracy: Accuracy::BestForNavigation,
                min_interval: Duration::from_millis(config.min_interval_ms),
                min_distance_m: config.min_distance_m,
            },
            hysteresis_deg: config.heading_hysteresis_deg,
            fix_timeout: Duration::from_millis(config.fix_timeout_ms),
            live: Arc::new(watch::channel(None).0),
        }
    }

    /// Watch options used by [`Self::subscribe`].
    pub fn options(&self) -> &WatchOptions {
        &self.options
    }

    /// Overrides the watch options.
    #[must_use]
    pub fn with_options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    /// The latest position seen by any subscription, kept after it ends.
    pub fn last_live(&self) -> Option<UserLocation> {
        *self.live.borrow()
    }

    async fn ensure_permission(&self) -> PermissionStatus {
        match self.source.permission().await {
            PermissionStatus::Granted => PermissionStatus::Granted,
            _ => self.source.request_permission().await,
        }
    }

    /// Starts tracking. Nothing is watched until this is called.
    ///
    /// # Errors
    /// [`LocationError::PermissionDenied`] if permission is not granted after
    /// asking; the caller should show [`TrackerStatus::Denied`].
    pub async fn subscribe(&self) -> Result<PositionStream, LocationError> {
        if self.ensure_permission().await != PermissionStatus::Granted {
            warn!("Location permission denied, not tracking");
            return Err(LocationError::PermissionDenied);
        }

        let rx = self.source.watch(self.options)?;
        info!(
            min_interval_ms = self.options.min_interval.as_millis(),
            min_distance_m = self.options.min_distance_m,
            "Location tracking started"
        );
        Ok(PositionStream::new(
            rx,
            WatchGate::new(&self.options),
            TrackingState::new(self.hysteresis_deg),
            Arc::clone(&self.live),
        ))
    }

    /// One-shot fix: asks for permission if needed, then a high-accuracy fix
    /// bounded by the fix timeout, then the platform's last known position.
    ///
    /// # Errors
    /// [`LocationError::PermissionDenied`] without permission,
    /// [`LocationError::Unavailable`] when neither a fresh nor a cached fix
    /// exists.
    pub async fn request_fix(&self) -> Result<UserLocation, LocationError> {
        if self.ensure_permission().await != PermissionStatus::Granted {
            return Err(LocationError::PermissionDenied);
        }

        let fresh = tokio::time::timeout(self.fix_timeout, self.source.current_fix(Accuracy::High))
            .await
            .map_err(|_| LocationError::Timeout(self.fix_timeout))
            .and_then(|fix| fix);

        let fix = match fresh {
            Ok(fix) => fix,
            Err(e) => {
                debug!(error = %e, "Fresh fix failed, trying last known position");
                self.source
                    .last_known()
                    .ok_or_else(|| LocationError::Unavailable(e.to_string()))?
            }
        };

        Coordinate::checked(fix.latitude, fix.longitude)
            .map(|coord| {
                let mut location = UserLocation::from(coord);
                location.heading = fix.heading.and_then(normalize_heading);
                location.speed_mph = fix.speed_mps.map_or(0.0, mps_to_mph);
                location
            })
            .map_err(|e| LocationError::Unavailable(e.to_string()))
    }
}
