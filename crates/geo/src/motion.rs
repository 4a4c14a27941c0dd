//! Heading, speed and unit conversions used by the location tracker.

/// Kilometers per statute mile.
pub const KM_PER_MILE: f64 = 1.60934;

/// Miles per hour for one meter per second.
pub const MPH_PER_MPS: f64 = 2.23694;

/// Normalises a compass heading into `[0, 360)`.
///
/// Returns `None` for non-finite input, which is how devices report an
/// unknown heading.
///
/// ```
/// use findixi_geo::normalize_heading;
///
/// assert_eq!(normalize_heading(-90.0), Some(270.0));
/// assert_eq!(normalize_heading(725.0), Some(5.0));
/// assert_eq!(normalize_heading(f64::NAN), None);
/// ```
#[inline]
pub fn normalize_heading(heading: f64) -> Option<f64> {
    if !heading.is_finite() {
        return None;
    }
    let normalized = heading.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    Some(if normalized >= 360.0 { 0.0 } else { normalized })
}

/// Smallest angle between two headings, in degrees within `[0, 180]`.
#[inline]
pub fn heading_delta(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    if diff > 180.0 { 360.0 - diff } else { diff }
}

/// Converts meters per second to miles per hour.
///
/// Negative or non-finite speeds (devices report `-1` when unknown) map to 0.
#[inline]
pub fn mps_to_mph(speed_mps: f64) -> f64 {
    if speed_mps.is_finite() && speed_mps > 0.0 {
        speed_mps * MPH_PER_MPS
    } else {
        0.0
    }
}

/// Converts statute miles to kilometers.
#[inline]
pub fn miles_to_km(miles: f64) -> f64 {
    miles * KM_PER_MILE
}
