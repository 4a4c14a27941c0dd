//! Configuration schema definitions
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    /// Position subscription settings
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Reload throttling thresholds
    #[serde(default)]
    pub reload: ReloadConfig,

    /// Proximity query defaults
    #[serde(default)]
    pub query: QueryConfig,

    /// Camera follow zoom levels
    #[serde(default)]
    pub camera: CameraConfig,

    /// Routing service settings
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Hosted backend connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Favorites storage
    #[serde(default)]
    pub favorites: FavoritesConfig,

    /// Logging output
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Position subscription configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Minimum time between samples
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Minimum displacement between samples, in meters
    #[serde(default = "default_min_distance_m")]
    pub min_distance_m: f64,

    /// Heading changes below this angle are ignored
    #[serde(default = "default_heading_hysteresis")]
    pub heading_hysteresis_deg: f64,

    /// Upper bound for a one-shot fix request
    #[serde(default = "default_fix_timeout_ms")]
    pub fix_timeout_ms: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            min_distance_m: default_min_distance_m(),
            heading_hysteresis_deg: default_heading_hysteresis(),
            fix_timeout_ms: default_fix_timeout_ms(),
        }
    }
}

fn default_min_interval_ms() -> u64 {
    2000
}

fn default_min_distance_m() -> f64 {
    3.0
}

fn default_heading_hysteresis() -> f64 {
    4.0
}

fn default_fix_timeout_ms() -> u64 {
    8000
}

/// Reload throttling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadConfig {
    /// Displacement from the last queried position that forces a reload
    #[serde(default = "default_reload_distance")]
    pub distance_m: f64,

    /// Time since the last query that forces a reload
    #[serde(default = "default_reload_interval")]
    pub interval_secs: u64,

    /// Skip tracker-triggered reloads while a round is in flight
    #[serde(default = "default_true")]
    pub coalesce_in_flight: bool,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            distance_m: default_reload_distance(),
            interval_secs: default_reload_interval(),
            coalesce_in_flight: true,
        }
    }
}

fn default_reload_distance() -> f64 {
    120.0
}

fn default_reload_interval() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// Proximity query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Initial search radius in miles
    #[serde(default = "default_radius_miles")]
    pub radius_miles: f64,

    /// Smallest radius the UI may select
    #[serde(default = "default_min_radius")]
    pub min_radius_miles: f64,

    /// Largest radius the UI may select
    #[serde(default = "default_max_radius")]
    pub max_radius_miles: f64,

    /// Maximum rows requested per round
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Ask the backend for active records only
    #[serde(default = "default_true")]
    pub exclude_inactive: bool,

    /// Quiet period after a radius change before a round starts
    #[serde(default = "default_radius_debounce_ms")]
    pub radius_debounce_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            radius_miles: default_radius_miles(),
            min_radius_miles: default_min_radius(),
            max_radius_miles: default_max_radius(),
            limit: default_limit(),
            exclude_inactive: true,
            radius_debounce_ms: default_radius_debounce_ms(),
        }
    }
}

fn default_radius_miles() -> f64 {
    5.0
}

fn default_min_radius() -> f64 {
    1.0
}

fn default_max_radius() -> f64 {
    100.0
}

fn default_limit() -> usize {
    500
}

fn default_radius_debounce_ms() -> u64 {
    180
}

/// Camera follow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Zoom above 45 mph
    #[serde(default = "default_high_speed_zoom")]
    pub high_speed_zoom: f64,

    /// Zoom between 20 and 45 mph
    #[serde(default = "default_medium_speed_zoom")]
    pub medium_speed_zoom: f64,

    /// Zoom below 20 mph
    #[serde(default = "default_low_speed_zoom")]
    pub low_speed_zoom: f64,

    /// Recenter never zooms out further than this
    #[serde(default = "default_recenter_min_zoom")]
    pub recenter_min_zoom: f64,

    /// Displacement needed before zoom may be raised
    #[serde(default = "default_movement_threshold")]
    pub movement_threshold_m: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            high_speed_zoom: default_high_speed_zoom(),
            medium_speed_zoom: default_medium_speed_zoom(),
            low_speed_zoom: default_low_speed_zoom(),
            recenter_min_zoom: default_recenter_min_zoom(),
            movement_threshold_m: default_movement_threshold(),
        }
    }
}

fn default_high_speed_zoom() -> f64 {
    12.4
}

fn default_medium_speed_zoom() -> f64 {
    14.0
}

fn default_low_speed_zoom() -> f64 {
    16.5
}

fn default_recenter_min_zoom() -> f64 {
    15.0
}

fn default_movement_threshold() -> f64 {
    3.0
}

/// Routing service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// OSRM base URL
    #[serde(default = "default_routing_url")]
    pub base_url: String,

    /// Per-lookup timeout
    #[serde(default = "default_routing_timeout")]
    pub timeout_ms: u64,

    /// Concurrent lookups per result set
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// When false only the analytic estimate is used
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: default_routing_url(),
            timeout_ms: default_routing_timeout(),
            max_concurrent: default_max_concurrent(),
            enabled: true,
        }
    }
}

fn default_routing_url() -> String {
    "https://osrm.enpe-erre.com".to_string()
}

fn default_routing_timeout() -> u64 {
    4000
}

fn default_max_concurrent() -> usize {
    8
}

/// Hosted backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendConfig {
    /// Project URL
    #[serde(default)]
    pub url: Option<String>,

    /// Public anonymous key
    #[serde(default)]
    pub anon_key: Option<String>,

    /// User access token, when signed in
    #[serde(default)]
    pub access_token: Option<String>,

    /// Base used to resolve relative image paths, defaults to `url`
    #[serde(default)]
    pub storage_base: Option<String>,
}

impl BackendConfig {
    /// Base URL for public storage objects
    #[must_use]
    pub fn storage_base(&self) -> Option<&str> {
        self.storage_base.as_deref().or(self.url.as_deref())
    }
}

/// Favorites configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FavoritesConfig {
    /// Local favorites file; defaults to the platform data directory
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

impl FavoritesConfig {
    /// Resolved location of the local favorites file
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        self.local_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("findixi")
                .join("favorites.json")
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Default level when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON lines instead of compact text
    #[serde(default)]
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
