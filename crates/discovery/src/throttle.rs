//! Reload throttling.
//!
//! A new round is warranted when the user has moved far enough from the
//! last *queried* position or enough time has passed since the last
//! successful query. The baseline only moves when a round commits.

use crate::model::UserLocation;
use findixi_core::config::ReloadConfig;
use findixi_geo::{Coordinate, haversine_distance_meters};
use std::time::{Duration, Instant};
use tracing::debug;

/// Displacement that forces a reload, in meters.
pub const DEFAULT_RELOAD_DISTANCE_M: f64 = 120.0;

/// Age that forces a reload.
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(60);

/// Decides when tracked movement should trigger a new query round.
#[derive(Debug, Clone)]
pub struct ReloadThrottler {
    distance_m: f64,
    interval: Duration,
    coalesce_in_flight: bool,
    last: Option<(Coordinate, Instant)>,
    in_flight: usize,
}

impl Default for ReloadThrottler {
    fn default() -> Self {
        Self::new(DEFAULT_RELOAD_DISTANCE_M, DEFAULT_RELOAD_INTERVAL)
    }
}

impl ReloadThrottler {
    /// Throttler with the given thresholds; coalescing enabled.
    pub fn new(distance_m: f64, interval: Duration) -> Self {
        Self {
            distance_m,
            interval,
            coalesce_in_flight: true,
            last: None,
            in_flight: 0,
        }
    }

    /// Throttler configured from the `[reload]` section.
    pub fn from_config(config: &ReloadConfig) -> Self {
        Self {
            coalesce_in_flight: config.coalesce_in_flight,
            ..Self::new(config.distance_m, Duration::from_secs(config.interval_secs))
        }
    }

    /// Threshold check only: true with no baseline, or when either the
    /// distance or the time threshold is reached.
    pub fn should_reload(&self, position: &UserLocation, now: Instant) -> bool {
        let Some((coord, at)) = self.last else {
            return true;
        };

        let elapsed = now.saturating_duration_since(at);
        let distance = haversine_distance_meters(&coord, &position.coordinate());
        let reload = distance >= self.distance_m || elapsed >= self.interval;

        if !reload {
            debug!(
                distance_m = distance,
                elapsed_ms = elapsed.as_millis(),
                "Reload skipped"
            );
        }
        reload
    }

    /// Whether a tracker sample should start a round. With coalescing on,
    /// nothing is triggered while another round is in flight.
    pub fn should_trigger(&self, position: &UserLocation, now: Instant) -> bool {
        if self.coalesce_in_flight && self.in_flight > 0 {
            debug!(in_flight = self.in_flight, "Reload coalesced into in-flight round");
            return false;
        }
        self.should_reload(position, now)
    }

    /// A round has started.
    pub fn round_started(&mut self) {
        self.in_flight += 1;
    }

    /// A round has resolved, whatever the outcome.
    pub fn round_finished(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Rounds currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Moves the baseline after a committed round.
    pub fn record(&mut self, position: &UserLocation, at: Instant) {
        self.last = Some((position.coordinate(), at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Degrees of latitude per meter on the haversine sphere.
    const DEG_PER_M: f64 = 1.0 / 111_194.93;

    fn at(meters_north: f64) -> UserLocation {
        UserLocation::new(18.4655 + meters_north * DEG_PER_M, -66.1057)
    }

    #[test]
    fn test_first_position_always_reloads() {
        let throttler = ReloadThrottler::default();
        assert!(throttler.should_reload(&at(0.0), Instant::now()));
    }

    #[test]
    fn test_thresholds() {
        let t0 = Instant::now();
        let mut throttler = ReloadThrottler::default();
        throttler.record(&at(0.0), t0);

        assert!(!throttler.should_reload(&at(10.0), t0 + Duration::from_secs(5)));
        assert!(throttler.should_reload(&at(125.0), t0 + Duration::from_secs(5)));
        assert!(throttler.should_reload(&at(10.0), t0 + Duration::from_secs(60)));
        assert!(!throttler.should_reload(&at(10.0), t0 + Duration::from_millis(59_999)));
    }

    #[test]
    fn test_baseline_moves_only_on_record() {
        let t0 = Instant::now();
        let mut throttler = ReloadThrottler::default();
        throttler.record(&at(0.0), t0);

        // moving 200 m triggers, but until a round commits the baseline stays
        assert!(throttler.should_reload(&at(200.0), t0 + Duration::from_secs(1)));
        assert!(throttler.should_reload(&at(210.0), t0 + Duration::from_secs(2)));

        throttler.record(&at(200.0), t0 + Duration::from_secs(3));
        assert!(!throttler.should_reload(&at(210.0), t0 + Duration::from_secs(4)));
    }

    #[test]
    fn test_coalescing() {
        let mut throttler = ReloadThrottler::default();
        throttler.round_started();
        assert!(!throttler.should_trigger(&at(0.0), Instant::now()));

        throttler.round_finished();
        assert!(throttler.should_trigger(&at(0.0), Instant::now()));
    }

    #[test]
    fn test_coalescing_disabled() {
        let config = ReloadConfig {
            coalesce_in_flight: false,
            ..ReloadConfig::default()
        };
        let mut throttler = ReloadThrottler::from_config(&config);
        throttler.round_started();
        assert!(throttler.should_trigger(&at(0.0), Instant::now()));
    }
}
