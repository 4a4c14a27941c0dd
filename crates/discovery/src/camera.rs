//! Camera follow behaviour.
//!
//! The controller is a two-state machine (`Following ⇄ Manual`). While
//! following, every accepted [`PositionSample`] yields a [`CameraCommand`];
//! a manual pan stops that until [`CameraFollowController::recenter`].

use crate::model::UserLocation;
use crate::tracker::PositionSample;
use findixi_core::config::CameraConfig;
use findixi_geo::Coordinate;
use std::time::Duration;
use tracing::{debug, info};

/// Zoom when travelling faster than 45 mph.
pub const HIGH_SPEED_ZOOM: f64 = 12.4;
/// Zoom between 20 and 45 mph; also the initial map zoom.
pub const MEDIUM_SPEED_ZOOM: f64 = 14.0;
/// Zoom under 20 mph.
pub const LOW_SPEED_ZOOM: f64 = 16.5;

const FOLLOW_MOVED_DURATION: Duration = Duration::from_millis(240);
const FOLLOW_STILL_DURATION: Duration = Duration::from_millis(220);
const RECENTER_DURATION: Duration = Duration::from_millis(280);

/// Whether the camera tracks the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowMode {
    /// Viewport follows the live position
    Following,
    /// The user has taken control of the viewport
    Manual,
}

/// One viewport animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraCommand {
    /// New center
    pub center: Coordinate,
    /// Camera heading in degrees
    pub heading: f64,
    /// Camera pitch; always flat
    pub pitch: f64,
    /// Zoom level
    pub zoom: f64,
    /// Animation duration
    pub duration: Duration,
}

/// Speed-bucketed zoom table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomBuckets {
    /// Above 45 mph
    pub high: f64,
    /// 20 to 45 mph
    pub medium: f64,
    /// Below 20 mph
    pub low: f64,
}

impl Default for ZoomBuckets {
    fn default() -> Self {
        Self {
            high: HIGH_SPEED_ZOOM,
            medium: MEDIUM_SPEED_ZOOM,
            low: LOW_SPEED_ZOOM,
        }
    }
}

impl ZoomBuckets {
    /// Target zoom for a speed in mph.
    pub fn target(&self, speed_mph: f64) -> f64 {
        if speed_mph > 45.0 {
            self.high
        } else if speed_mph >= 20.0 {
            self.medium
        } else {
            self.low
        }
    }
}

/// Target zoom for a speed in mph with the default buckets.
pub fn target_zoom_for_speed(speed_mph: f64) -> f64 {
    ZoomBuckets::default().target(speed_mph)
}

/// Derives viewport animations from position samples.
#[derive(Debug, Clone)]
pub struct CameraFollowController {
    mode: FollowMode,
    zoom: f64,
    first_fix_seen: bool,
    last_heading: Option<f64>,
    buckets: ZoomBuckets,
    recenter_min_zoom: f64,
    movement_threshold_m: f64,
}

impl Default for CameraFollowController {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

impl CameraFollowController {
    /// Controller in follow mode with the default tuning.
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller configured from the `[camera]` section.
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            mode: FollowMode::Following,
            zoom: config.medium_speed_zoom,
            first_fix_seen: false,
            last_heading: None,
            buckets: ZoomBuckets {
                high: config.high_speed_zoom,
                medium: config.medium_speed_zoom,
                low: config.low_speed_zoom,
            },
            recenter_min_zoom: config.recenter_min_zoom,
            movement_threshold_m: config.movement_threshold_m,
        }
    }

    /// Current mode.
    pub fn mode(&self) -> FollowMode {
        self.mode
    }

    /// Current zoom.
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Handles an accepted sample. Returns `None` in manual mode.
    ///
    /// The first fix uses the high-speed zoom as its baseline, so the camera
    /// never zooms in sharply on arrival. Afterwards zoom only rises, and only
    /// when the sample moved at least the movement threshold.
    pub fn on_sample(&mut self, sample: &PositionSample) -> Option<CameraCommand> {
        if let Some(heading) = sample.location.heading {
            self.last_heading = Some(heading);
        }
        if self.mode == FollowMode::Manual {
            return None;
        }

        let moved = sample.moved_at_least(self.movement_threshold_m);
        let baseline = if self.first_fix_seen {
            self.zoom
        } else {
            self.first_fix_seen = true;
            self.buckets.high
        };
        let target = self.buckets.target(sample.location.speed_mph);
        self.zoom = if moved { baseline.max(target) } else { baseline };

        debug!(
            zoom = self.zoom,
            speed_mph = sample.location.speed_mph,
            moved_m = sample.moved_meters,
            "Camera follow"
        );

        Some(CameraCommand {
            center: sample.location.coordinate(),
            heading: self.heading_for(&sample.location),
            pitch: 0.0,
            zoom: self.zoom,
            duration: if moved { FOLLOW_MOVED_DURATION } else { FOLLOW_STILL_DURATION },
        })
    }

    /// The user dragged the map.
    pub fn on_pan_drag(&mut self) {
        if self.mode == FollowMode::Following {
            info!("Camera follow disabled by pan");
        }
        self.mode = FollowMode::Manual;
    }

    /// The visible region changed. Zoom follows the latitude span; spans that
    /// are not finite and positive are ignored.
    pub fn on_region_change(&mut self, latitude_delta: f64) {
        if latitude_delta.is_finite() && latitude_delta > 0.0 {
            self.zoom = (360.0 / latitude_delta).log2();
        }
    }

    /// Re-enables follow mode and centers on a fresh fix.
    pub fn recenter(&mut self, location: &UserLocation) -> CameraCommand {
        if self.mode == FollowMode::Manual {
            info!("Camera follow re-enabled");
        }
        self.mode = FollowMode::Following;
        self.first_fix_seen = true;
        self.zoom = self.zoom.max(self.recenter_min_zoom);
        if let Some(heading) = location.heading {
            self.last_heading = Some(heading);
        }

        CameraCommand {
            center: location.coordinate(),
            heading: self.heading_for(location),
            pitch: 0.0,
            zoom: self.zoom,
            duration: RECENTER_DURATION,
        }
    }

    fn heading_for(&self, location: &UserLocation) -> f64 {
        location.heading.or(self.last_heading).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(speed_mph: f64, moved: Option<f64>) -> PositionSample {
        PositionSample {
            location: UserLocation::new(18.4655, -66.1057).with_speed_mph(speed_mph),
            moved_meters: moved,
            heading_changed: false,
        }
    }

    #[test]
    fn test_speed_buckets() {
        assert_eq!(target_zoom_for_speed(60.0), 12.4);
        assert_eq!(target_zoom_for_speed(45.0), 14.0);
        assert_eq!(target_zoom_for_speed(20.0), 14.0);
        assert_eq!(target_zoom_for_speed(19.9), 16.5);
        assert_eq!(target_zoom_for_speed(0.0), 16.5);
    }

    #[test]
    fn test_first_fix_uses_high_speed_baseline() {
        let mut camera = CameraFollowController::new();
        assert_eq!(camera.zoom(), MEDIUM_SPEED_ZOOM);

        // first fix at highway speed: baseline 12.4, target 12.4
        let cmd = camera.on_sample(&sample(60.0, None)).unwrap();
        assert_eq!(cmd.zoom, 12.4);
        assert_eq!(cmd.duration, Duration::from_millis(240));
        assert_eq!(cmd.pitch, 0.0);
    }

    #[test]
    fn test_zoom_rises_only_when_moving() {
        let mut camera = CameraFollowController::new();
        camera.on_sample(&sample(60.0, None));

        let still = camera.on_sample(&sample(5.0, Some(1.0))).unwrap();
        assert_eq!(still.zoom, 12.4);
        assert_eq!(still.duration, Duration::from_millis(220));

        let moved = camera.on_sample(&sample(5.0, Some(4.0))).unwrap();
        assert_eq!(moved.zoom, 16.5);

        // speeding up never lowers zoom
        let fast = camera.on_sample(&sample(60.0, Some(50.0))).unwrap();
        assert_eq!(fast.zoom, 16.5);
    }

    #[test]
    fn test_pan_then_recenter() {
        let mut camera = CameraFollowController::new();
        camera.on_sample(&sample(60.0, None));
        camera.on_pan_drag();
        assert_eq!(camera.mode(), FollowMode::Manual);
        assert!(camera.on_sample(&sample(5.0, Some(10.0))).is_none());

        let location = UserLocation::new(18.0, -66.0).with_heading(90.0);
        let cmd = camera.recenter(&location);
        assert_eq!(camera.mode(), FollowMode::Following);
        assert_eq!(cmd.zoom, 15.0);
        assert_eq!(cmd.heading, 90.0);
        assert_eq!(cmd.duration, Duration::from_millis(280));
    }

    #[test]
    fn test_heading_falls_back_to_last_known() {
        let mut camera = CameraFollowController::new();
        let mut first = sample(5.0, None);
        first.location = first.location.with_heading(45.0);
        assert_eq!(camera.on_sample(&first).unwrap().heading, 45.0);

        assert_eq!(camera.on_sample(&sample(5.0, Some(5.0))).unwrap().heading, 45.0);
        assert_eq!(CameraFollowController::new().on_sample(&sample(5.0, None)).unwrap().heading, 0.0);
    }

    #[test]
    fn test_region_change() {
        let mut camera = CameraFollowController::new();
        camera.on_region_change(360.0 / 1024.0);
        assert!((camera.zoom() - 10.0).abs() < 1e-9);

        camera.on_region_change(0.0);
        camera.on_region_change(f64::NAN);
        assert!((camera.zoom() - 10.0).abs() < 1e-9);

        // recenter lifts a zoomed-out view to at least 15
        let cmd = camera.recenter(&UserLocation::new(18.0, -66.0));
        assert_eq!(cmd.zoom, 15.0);
    }

    proptest! {
        #[test]
        fn prop_zoom_non_increasing_in_speed(a in 0.0f64..200.0, b in 0.0f64..200.0) {
            let (slow, fast) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(target_zoom_for_speed(fast) <= target_zoom_for_speed(slow));
        }
    }
}
