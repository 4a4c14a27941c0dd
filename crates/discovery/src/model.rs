//! Data model shared by the discovery components.
//!
//! Record fields accept both the English names used in fixtures and the
//! column names returned by the hosted record store (`nombre`, `latitud`,
//! `municipio`, ...). Numeric columns may arrive as numbers or numeric
//! strings.

use crate::distance::TravelEstimate;
use findixi_core::config::QueryConfig;
use findixi_geo::{Coordinate, Located, miles_to_km};
use serde::{Deserialize, Serialize};

/// Radius used when nothing else is configured, in miles.
pub const DEFAULT_RADIUS_MILES: f64 = 5.0;

/// Row limit used when nothing else is configured.
pub const DEFAULT_LIMIT: usize = 500;

/// The user's position as last reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserLocation {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Smoothed heading in `[0, 360)`, if the device reports one
    pub heading: Option<f64>,
    /// Ground speed in miles per hour, never negative
    pub speed_mph: f64,
}

impl UserLocation {
    /// A stationary location without heading.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            heading: None,
            speed_mph: 0.0,
        }
    }

    /// Sets the heading.
    #[must_use]
    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = findixi_geo::normalize_heading(heading);
        self
    }

    /// Sets the speed.
    #[must_use]
    pub fn with_speed_mph(mut self, speed_mph: f64) -> Self {
        self.speed_mph = if speed_mph.is_finite() { speed_mph.max(0.0) } else { 0.0 };
        self
    }

    /// The position as a coordinate.
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

impl From<Coordinate> for UserLocation {
    fn from(coord: Coordinate) -> Self {
        Self::new(coord.latitude, coord.longitude)
    }
}

impl Located for UserLocation {
    fn coordinate(&self) -> Option<Coordinate> {
        Some(UserLocation::coordinate(self))
    }
}

/// A plan level as stored: either a number or a plan name/slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanValue {
    /// Numeric level
    Level(f64),
    /// Slug or display name, e.g. `"plus"` or `"Findixi Premium"`
    Name(String),
}

/// Visibility inputs carried by a record.
///
/// Explicit booleans win over the values derived from the plan level; see
/// [`crate::plan::resolve_visibility`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct VisibilityFlags {
    #[serde(default)]
    pub activo: Option<bool>,
    #[serde(default)]
    pub aparece_en_cercanos: Option<bool>,
    #[serde(default)]
    pub permite_perfil: Option<bool>,
    #[serde(default)]
    pub permite_menu: Option<bool>,
    #[serde(default)]
    pub permite_especiales: Option<bool>,
    #[serde(default)]
    pub permite_ordenes: Option<bool>,
    #[serde(default, alias = "planNivel", alias = "plan_level", alias = "nivel_plan", alias = "plan_slug")]
    pub plan_nivel: Option<PlanValue>,
    #[serde(default)]
    pub plan_nombre: Option<String>,
    #[serde(default, alias = "planId")]
    pub plan_id: Option<serde_json::Value>,
    #[serde(default)]
    pub estado_propiedad: Option<String>,
    #[serde(default)]
    pub estado_verificacion: Option<String>,
    #[serde(default)]
    pub propietario_verificado: Option<bool>,
}

/// A point of interest as returned by the record store. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    /// Record id
    #[serde(deserialize_with = "lenient::id")]
    pub id: i64,
    /// Display name
    #[serde(default, alias = "nombre")]
    pub name: String,
    /// Latitude, absent for records without a pin
    #[serde(default, alias = "latitud", deserialize_with = "lenient::option_f64")]
    pub latitude: Option<f64>,
    /// Longitude, absent for records without a pin
    #[serde(default, alias = "longitud", deserialize_with = "lenient::option_f64")]
    pub longitude: Option<f64>,
    /// Categories the record belongs to
    #[serde(default, alias = "categoria_ids")]
    pub category_ids: Vec<i64>,
    /// Free-text description
    #[serde(default, alias = "descripcion")]
    pub description: Option<String>,
    /// Phone number
    #[serde(default, alias = "telefono")]
    pub phone: Option<String>,
    /// Municipality name
    #[serde(default, alias = "municipio")]
    pub municipality: Option<String>,
    /// Logo path or URL
    #[serde(default)]
    pub logo: Option<String>,
    /// Cover image path or URL
    #[serde(default, alias = "portada")]
    pub cover: Option<String>,
    /// Open right now, as computed by the backend
    #[serde(default, alias = "abierto_ahora")]
    pub open_now: Option<bool>,
    /// Plan and visibility inputs
    #[serde(flatten)]
    pub visibility: VisibilityFlags,
}

impl PointOfInterest {
    /// A minimal record, mostly useful for fixtures.
    pub fn new(id: i64, name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            name: name.into(),
            latitude: Some(latitude),
            longitude: Some(longitude),
            category_ids: Vec::new(),
            description: None,
            phone: None,
            municipality: None,
            logo: None,
            cover: None,
            open_now: None,
            visibility: VisibilityFlags::default(),
        }
    }

    /// Whether the record is explicitly active.
    pub fn is_active(&self) -> bool {
        self.visibility.activo == Some(true)
    }

    /// Whether the record is explicitly open right now.
    pub fn is_open_now(&self) -> bool {
        self.open_now == Some(true)
    }
}

impl Located for PointOfInterest {
    fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::checked(self.latitude?, self.longitude?).ok()
    }
}

/// A point of interest annotated for display. Rebuilt on every committed round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityResult {
    /// The underlying record
    #[serde(flatten)]
    pub point: PointOfInterest,
    /// Resolved logo URL (placeholder when the record has none)
    pub logo_url: String,
    /// Resolved cover URL (placeholder when the record has none)
    pub cover_url: String,
    /// Travel estimate; `None` only when the record has no valid position
    pub travel: Option<TravelEstimate>,
    /// Whether the id is in the current favorite set
    pub is_favorite: bool,
    /// Whether the record is open right now
    pub is_open_now: bool,
}

impl ProximityResult {
    /// Estimated driving minutes, if the record has a position.
    pub fn travel_minutes(&self) -> Option<u32> {
        self.travel.as_ref().map(|t| t.minutes)
    }

    /// Distance used for display, in kilometers.
    pub fn distance_km(&self) -> Option<f64> {
        self.travel.as_ref().map(|t| t.distance_km)
    }
}

/// Parameters of a proximity query round. Immutable once issued.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Center override; `None` resolves to the live position
    pub center: Option<UserLocation>,
    /// Search radius in miles
    pub radius_miles: f64,
    /// Category filter
    pub category_id: Option<i64>,
    /// Only records open right now
    pub open_now_only: bool,
    /// Only active records
    pub exclude_inactive: bool,
    /// Maximum rows
    pub limit: usize,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            center: None,
            radius_miles: DEFAULT_RADIUS_MILES,
            category_id: None,
            open_now_only: false,
            exclude_inactive: true,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl QueryRequest {
    /// Defaults taken from configuration.
    pub fn from_config(config: &QueryConfig) -> Self {
        Self {
            center: None,
            radius_miles: config.radius_miles,
            category_id: None,
            open_now_only: false,
            exclude_inactive: config.exclude_inactive,
            limit: config.limit,
        }
    }

    /// Search radius in kilometers; radii below one mile count as one mile.
    pub fn radius_km(&self) -> f64 {
        miles_to_km(self.radius_miles.max(1.0))
    }

    /// Sets the center.
    #[must_use]
    pub fn with_center(mut self, center: UserLocation) -> Self {
        self.center = Some(center);
        self
    }

    /// Sets the radius in miles.
    #[must_use]
    pub fn with_radius_miles(mut self, miles: f64) -> Self {
        self.radius_miles = miles;
        self
    }

    /// Sets the category filter. Non-positive ids clear it.
    #[must_use]
    pub fn with_category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = category_id.filter(|id| *id > 0);
        self
    }

    /// Sets the open-now filter.
    #[must_use]
    pub fn with_open_now_only(mut self, open_now_only: bool) -> Self {
        self.open_now_only = open_now_only;
        self
    }
}

/// A query as handed to the record store: center resolved, radius in km.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    /// Search center
    pub center: Coordinate,
    /// Radius in kilometers
    pub radius_km: f64,
    /// Category filter
    pub category_id: Option<i64>,
    /// Only records open right now
    pub open_now_only: bool,
    /// Only active records
    pub exclude_inactive: bool,
    /// Maximum rows
    pub limit: usize,
}

impl NearbyQuery {
    /// Resolves a request against a center.
    pub fn resolve(request: &QueryRequest, center: &UserLocation) -> Self {
        Self {
            center: center.coordinate(),
            radius_km: request.radius_km(),
            category_id: request.category_id,
            open_now_only: request.open_now_only,
            exclude_inactive: request.exclude_inactive,
            limit: request.limit,
        }
    }
}

mod lenient {
    use serde::{Deserialize, Deserializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    impl NumberOrText {
        fn as_f64(&self) -> Option<f64> {
            let value = match self {
                NumberOrText::Number(n) => *n,
                NumberOrText::Text(s) => s.trim().parse().ok()?,
            };
            value.is_finite().then_some(value)
        }
    }

    pub(super) fn option_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<NumberOrText>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(NumberOrText::as_f64))
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(super) fn id<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        NumberOrText::deserialize(deserializer)?
            .as_f64()
            .map(|n| n.trunc() as i64)
            .ok_or_else(|| D::Error::custom("id must be numeric"))
    }
}
