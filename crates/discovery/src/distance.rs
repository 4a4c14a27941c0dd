//! Travel-time resolution.
//!
//! Every estimate starts from an analytic fallback (haversine distance at a
//! bucketed driving speed). A routing lookup then replaces it when it
//! succeeds in time; any routing failure keeps the fallback. Routing errors
//! never leave this module.

use crate::backend::{RouteSummary, RoutingService};
use crate::error::RoutingError;
use crate::model::UserLocation;
use findixi_core::config::RoutingConfig;
use findixi_geo::{Coordinate, haversine_distance};
use findixi_telemetry::{metrics, names};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default per-lookup routing timeout.
pub const DEFAULT_ROUTING_TIMEOUT: Duration = Duration::from_millis(4000);

/// Default number of concurrent routing lookups.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Where an estimate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelSource {
    /// Routing service duration
    Routed,
    /// Distance-bucket speed model
    Analytic,
}

/// Driving estimate for one destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TravelEstimate {
    /// Whole minutes
    pub minutes: u32,
    /// Route length when routed, otherwise great-circle distance
    pub distance_km: f64,
    /// Origin of the estimate
    pub source: TravelSource,
    /// Display text, e.g. `"12 min"` or `"1h 5min"`
    pub text: String,
}

impl TravelEstimate {
    /// Distance rounded for display, e.g. `"3.4 km"`.
    pub fn distance_text(&self) -> String {
        format!("{:.1} km", self.distance_km)
    }
}

/// Analytic driving speed for a great-circle distance, in km/h.
pub fn fallback_speed_kmh(distance_km: f64) -> f64 {
    if distance_km < 5.0 {
        30.0
    } else if distance_km < 15.0 {
        45.0
    } else if distance_km < 40.0 {
        60.0
    } else {
        75.0
    }
}

/// Analytic driving minutes for a great-circle distance.
pub fn fallback_minutes(distance_km: f64) -> u32 {
    to_minutes(distance_km / fallback_speed_kmh(distance_km) * 60.0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_minutes(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

/// Formats minutes as `"N min"` under an hour, `"Hh"` or `"Hh Mmin"` from an
/// hour up, and `"N/D"` when there is nothing to show.
pub fn format_travel_time(minutes: u32) -> String {
    if minutes == 0 {
        return "N/D".to_string();
    }
    if minutes < 60 {
        return format!("{minutes} min");
    }
    let hours = minutes / 60;
    let rest = minutes % 60;
    if rest == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h {rest}min")
    }
}

/// Resolves driving estimates with a routing service and an analytic fallback.
#[derive(Debug)]
pub struct DistanceResolver<R> {
    routing: Arc<R>,
    timeout: Duration,
    max_concurrent: usize,
    circuit_open: Arc<AtomicBool>,
}

impl<R> Clone for DistanceResolver<R> {
    fn clone(&self) -> Self {
        Self {
            routing: Arc::clone(&self.routing),
            timeout: self.timeout,
            max_concurrent: self.max_concurrent,
            circuit_open: Arc::clone(&self.circuit_open),
        }
    }
}

impl<R: RoutingService> DistanceResolver<R> {
    /// Resolver with default timeout and fan-out.
    pub fn new(routing: Arc<R>) -> Self {
        Self {
            routing,
            timeout: DEFAULT_ROUTING_TIMEOUT,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            circuit_open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Resolver configured from the `[routing]` section.
    pub fn from_config(routing: Arc<R>, config: &RoutingConfig) -> Self {
        Self {
            routing,
            timeout: Duration::from_millis(config.timeout_ms),
            max_concurrent: config.max_concurrent.max(1),
            circuit_open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the per-lookup timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether the last routing answer was a refusal from an open circuit.
    pub fn circuit_open(&self) -> bool {
        self.circuit_open.load(Ordering::Relaxed)
    }

    /// Driving minutes between two points. `None` only when a coordinate is
    /// not finite.
    pub async fn resolve(&self, origin: &UserLocation, destination: Coordinate) -> Option<u32> {
        self.estimate(origin, destination).await.map(|e| e.minutes)
    }

    /// Full estimate between two points. `None` only when a coordinate is not
    /// finite.
    pub async fn estimate(&self, origin: &UserLocation, destination: Coordinate) -> Option<TravelEstimate> {
        let from = origin.coordinate();
        if !from.is_finite() || !destination.is_finite() {
            return None;
        }

        let distance_km = haversine_distance(&from, &destination);
        let minutes = fallback_minutes(distance_km);

        let routed = tokio::time::timeout(self.timeout, self.routing.driving_route(from, destination))
            .await
            .map_err(|_| RoutingError::Timeout(self.timeout))
            .and_then(|route| route)
            .and_then(validate_route);

        let estimate = match routed {
            Ok(route) => {
                metrics().increment(names::ROUTING_ROUTED);
                if self.circuit_open.swap(false, Ordering::Relaxed) {
                    info!("Routing service answering again");
                }
                let routed_km = route.distance_meters / 1000.0;
                let minutes = to_minutes(route.duration_seconds / 60.0);
                TravelEstimate {
                    minutes,
                    distance_km: if routed_km > 0.0 { routed_km } else { distance_km },
                    source: TravelSource::Routed,
                    text: format_travel_time(minutes),
                }
            }
            Err(e) => {
                metrics().increment(names::ROUTING_FALLBACK);
                if matches!(e, RoutingError::CircuitOpen) {
                    if !self.circuit_open.swap(true, Ordering::Relaxed) {
                        warn!("Routing circuit open, using analytic estimates until it recovers");
                    }
                } else {
                    debug!(error = %e, distance_km, minutes, "Routing unavailable, using analytic estimate");
                }
                TravelEstimate {
                    minutes,
                    distance_km,
                    source: TravelSource::Analytic,
                    text: format_travel_time(minutes),
                }
            }
        };

        Some(estimate)
    }

    /// Estimates for many destinations, at most `max_concurrent` lookups at a
    /// time. Output order matches input order; `None` destinations stay
    /// `None`.
    pub async fn estimate_all(
        &self,
        origin: &UserLocation,
        destinations: &[Option<Coordinate>],
    ) -> Vec<Option<TravelEstimate>> {
        futures::stream::iter(destinations.iter().copied())
            .map(|destination| async move {
                match destination {
                    Some(d) => self.estimate(origin, d).await,
                    None => None,
                }
            })
            .buffered(self.max_concurrent)
            .collect()
            .await
    }
}

fn validate_route(route: RouteSummary) -> Result<RouteSummary, RoutingError> {
    if route.duration_seconds.is_finite() && route.duration_seconds > 0.0 {
        Ok(route)
    } else {
        Err(RoutingError::NoRoute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ORIGIN: UserLocation = UserLocation::new(18.4655, -66.1057);

    /// 3 km due north of `ORIGIN`.
    fn three_km_north() -> Coordinate {
        Coordinate::new(18.4655 + 3.0 / 111.194_93, -66.1057)
    }

    struct FailingRouting;

    impl RoutingService for FailingRouting {
        async fn driving_route(&self, _: Coordinate, _: Coordinate) -> Result<RouteSummary, RoutingError> {
            Err(RoutingError::Unavailable("connection refused".into()))
        }
    }

    struct SlowRouting;

    impl RoutingService for SlowRouting {
        async fn driving_route(&self, _: Coordinate, _: Coordinate) -> Result<RouteSummary, RoutingError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(RouteSummary {
                distance_meters: 1.0,
                duration_seconds: 1.0,
            })
        }
    }

    #[derive(Default)]
    struct CountingRouting {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RoutingService for CountingRouting {
        async fn driving_route(&self, _: Coordinate, to: Coordinate) -> Result<RouteSummary, RoutingError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(RouteSummary {
                distance_meters: 4200.0,
                // encode the destination so order can be checked
                duration_seconds: (to.latitude - 18.0).abs() * 60_000.0,
            })
        }
    }

    #[test]
    fn test_speed_buckets() {
        assert_eq!(fallback_speed_kmh(4.99), 30.0);
        assert_eq!(fallback_speed_kmh(5.0), 45.0);
        assert_eq!(fallback_speed_kmh(14.9), 45.0);
        assert_eq!(fallback_speed_kmh(15.0), 60.0);
        assert_eq!(fallback_speed_kmh(39.9), 60.0);
        assert_eq!(fallback_speed_kmh(40.0), 75.0);
    }

    #[test]
    fn test_format_travel_time() {
        assert_eq!(format_travel_time(0), "N/D");
        assert_eq!(format_travel_time(1), "1 min");
        assert_eq!(format_travel_time(59), "59 min");
        assert_eq!(format_travel_time(60), "1h");
        assert_eq!(format_travel_time(65), "1h 5min");
        assert_eq!(format_travel_time(150), "2h 30min");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back_to_bucket() {
        let resolver = DistanceResolver::new(Arc::new(SlowRouting));

        let estimate = resolver.estimate(&ORIGIN, three_km_north()).await.unwrap();

        assert_eq!(estimate.minutes, 6);
        assert_eq!(estimate.source, TravelSource::Analytic);
        assert_eq!(estimate.text, "6 min");
        assert!((estimate.distance_km - 3.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_routed_overrides_fallback() {
        struct FixedRouting;
        impl RoutingService for FixedRouting {
            async fn driving_route(&self, _: Coordinate, _: Coordinate) -> Result<RouteSummary, RoutingError> {
                Ok(RouteSummary {
                    distance_meters: 4100.0,
                    duration_seconds: 545.0,
                })
            }
        }

        let resolver = DistanceResolver::new(Arc::new(FixedRouting));
        let estimate = resolver.estimate(&ORIGIN, three_km_north()).await.unwrap();

        assert_eq!(estimate.minutes, 9);
        assert_eq!(estimate.source, TravelSource::Routed);
        assert!((estimate.distance_km - 4.1).abs() < 1e-9);
        assert_eq!(estimate.distance_text(), "4.1 km");
    }

    #[tokio::test]
    async fn test_open_circuit_tracked_until_recovery() {
        #[derive(Default)]
        struct FlakyRouting {
            open: AtomicBool,
        }
        impl RoutingService for FlakyRouting {
            async fn driving_route(&self, _: Coordinate, _: Coordinate) -> Result<RouteSummary, RoutingError> {
                if self.open.load(Ordering::SeqCst) {
                    Err(RoutingError::CircuitOpen)
                } else {
                    Ok(RouteSummary {
                        distance_meters: 3000.0,
                        duration_seconds: 300.0,
                    })
                }
            }
        }

        let routing = Arc::new(FlakyRouting::default());
        routing.open.store(true, Ordering::SeqCst);
        let resolver = DistanceResolver::new(Arc::clone(&routing));
        let shared = resolver.clone();

        let estimate = resolver.estimate(&ORIGIN, three_km_north()).await.unwrap();
        assert_eq!(estimate.source, TravelSource::Analytic);
        assert!(resolver.circuit_open());
        assert!(shared.circuit_open());

        routing.open.store(false, Ordering::SeqCst);
        let estimate = shared.estimate(&ORIGIN, three_km_north()).await.unwrap();
        assert_eq!(estimate.source, TravelSource::Routed);
        assert!(!resolver.circuit_open());
    }

    #[tokio::test]
    async fn test_non_finite_coordinates() {
        let resolver = DistanceResolver::new(Arc::new(FailingRouting));
        assert_eq!(resolver.resolve(&ORIGIN, Coordinate::new(f64::NAN, 0.0)).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_estimate_all_bounded_and_ordered() {
        let routing = Arc::new(CountingRouting::default());
        let resolver = DistanceResolver::new(Arc::clone(&routing));

        let destinations: Vec<Option<Coordinate>> = (0..20)
            .map(|i| if i == 3 { None } else { Some(Coordinate::new(18.0 + f64::from(i) * 0.01, -66.0)) })
            .collect();

        let estimates = resolver.estimate_all(&ORIGIN, &destinations).await;

        assert_eq!(estimates.len(), 20);
        assert!(estimates[3].is_none());
        assert_eq!(estimates[1].as_ref().unwrap().minutes, 10);
        assert_eq!(estimates[10].as_ref().unwrap().minutes, 100);
        assert!(routing.peak.load(Ordering::SeqCst) <= DEFAULT_MAX_CONCURRENT);
    }

    proptest! {
        #[test]
        fn prop_finite_points_always_get_minutes(
            lat1 in -90.0f64..90.0, lon1 in -180.0f64..180.0,
            lat2 in -90.0f64..90.0, lon2 in -180.0f64..180.0,
        ) {
            let resolver = DistanceResolver::new(Arc::new(FailingRouting));
            let origin = UserLocation::new(lat1, lon1);

            let minutes = tokio_test::block_on(resolver.resolve(&origin, Coordinate::new(lat2, lon2)));
            prop_assert!(minutes.is_some());
        }

        #[test]
        fn prop_fallback_never_faster_than_top_bucket(d in 0.0f64..20_000.0) {
            let minutes = f64::from(fallback_minutes(d));
            prop_assert!(minutes + 0.5 >= d / 75.0 * 60.0);
        }
    }
}
