//! Geospatial primitives for the Findixi proximity surface.
//!
//! This crate provides:
//! - Haversine distance calculations
//! - Heading normalisation and angular deltas
//! - Speed and distance unit conversions
//! - Batch radius filtering with optional parallelism
//!
//! # Example
//!
//! ```
//! use findixi_geo::{haversine_distance, Coordinate};
//!
//! let san_juan = Coordinate::new(18.4655, -66.1057);
//! let ponce = Coordinate::new(18.0111, -66.6141);
//!
//! let distance_km = haversine_distance(&san_juan, &ponce);
//! assert!((distance_km - 73.7).abs() < 1.0);
//! ```

mod error;
mod haversine;
pub mod batch;
pub mod motion;

pub use batch::{Located, Ranked, rank_by_distance, within_radius};
pub use error::{GeoError, GeoErrorCode, Result};
pub use haversine::{EARTH_RADIUS_KM, EARTH_RADIUS_M, haversine_distance, haversine_distance_meters};
pub use motion::{
    KM_PER_MILE, MPH_PER_MPS, heading_delta, miles_to_km, mps_to_mph, normalize_heading,
};

/// A geographic coordinate with latitude and longitude.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a new coordinate.
    #[inline]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Creates a coordinate after checking that both components are finite
    /// and within range.
    pub fn checked(latitude: f64, longitude: f64) -> Result<Self> {
        let coord = Self::new(latitude, longitude);
        if coord.is_valid() {
            Ok(coord)
        } else {
            Err(GeoError::InvalidCoordinate(format!("({latitude}, {longitude})")))
        }
    }

    /// Returns true if both components are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Returns true if the coordinate has finite, in-range values.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    #[inline]
    pub(crate) fn to_radians(self) -> (f64, f64) {
        (self.latitude.to_radians(), self.longitude.to_radians())
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self::new(lat, lng)
    }
}
