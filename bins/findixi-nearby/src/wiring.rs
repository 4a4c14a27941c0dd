//! Building an engine from configuration and command-line filters.

use crate::FilterArgs;
use anyhow::{Context, Result};
use findixi_api_client::{ClientConfig, FindixiClient, OsrmClient};
use findixi_core::config::ConfigSchema;
use findixi_discovery::backend::{FavoritesBackend, PositionSource, ProximityBackend, SessionProvider};
use findixi_discovery::memory::MemoryBackend;
use findixi_discovery::{
    DistanceResolver, FavoritesStore, FileFavoritesStore, ImageResolver, LocationTracker, NoRouting,
    ProximityQueryEngine, QueryRequest, RouteSummary, RoutingError, RoutingService,
};
use findixi_geo::Coordinate;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Routing selected at start-up.
#[derive(Debug)]
pub enum Routing {
    /// OSRM lookups behind the circuit breaker
    Osrm(OsrmClient),
    /// Analytic estimates only
    Disabled,
}

impl RoutingService for Routing {
    async fn driving_route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteSummary, RoutingError> {
        match self {
            Self::Osrm(client) => client.driving_route(origin, destination).await,
            Self::Disabled => NoRouting.driving_route(origin, destination).await,
        }
    }
}

impl Routing {
    fn from_config(schema: &ConfigSchema, filters: &FilterArgs) -> Result<Self> {
        if filters.offline || !schema.routing.enabled {
            debug!("Routing disabled");
            return Ok(Self::Disabled);
        }
        let config = ClientConfig {
            routing_url: schema.routing.base_url.clone(),
            routing_timeout: std::time::Duration::from_millis(schema.routing.timeout_ms),
            ..ClientConfig::default()
        };
        Ok(Self::Osrm(OsrmClient::new(&config)?))
    }
}

/// Record store selected at start-up.
pub enum Backend {
    /// Fixture file
    Fixture(Arc<MemoryBackend>),
    /// Hosted backend
    Hosted(Arc<FindixiClient>),
}

impl Backend {
    /// The fixture when one is given, otherwise the hosted backend from the
    /// `[backend]` section.
    pub fn select(schema: &ConfigSchema, fixture: Option<&Path>) -> Result<Self> {
        if let Some(path) = fixture {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read fixture {}", path.display()))?;
            let backend = MemoryBackend::from_json(&json)
                .with_context(|| format!("Invalid fixture {}", path.display()))?;
            return Ok(Self::Fixture(Arc::new(backend)));
        }

        let config = ClientConfig::from_sections(&schema.backend, &schema.routing)
            .context("No record store: pass --fixture or set backend.url")?;
        Ok(Self::Hosted(Arc::new(FindixiClient::with_config(config)?)))
    }
}

/// Query parameters from configuration, overridden by the flags.
pub fn request(schema: &ConfigSchema, filters: &FilterArgs) -> QueryRequest {
    let mut request = QueryRequest::from_config(&schema.query)
        .with_category(filters.category)
        .with_open_now_only(filters.open_now);
    if let Some(radius) = filters.radius.filter(|r| r.is_finite()) {
        request.radius_miles = radius.clamp(schema.query.min_radius_miles, schema.query.max_radius_miles);
    }
    request
}

/// The device-local favorites file.
pub fn local_favorites(schema: &ConfigSchema) -> Arc<dyn FavoritesStore> {
    Arc::new(FileFavoritesStore::new(schema.favorites.resolved_path()))
}

/// Engine over `backend` and `source`.
pub fn engine<B, P>(
    schema: &ConfigSchema,
    filters: &FilterArgs,
    backend: Arc<B>,
    source: P,
) -> Result<ProximityQueryEngine<B, Routing, P>>
where
    B: ProximityBackend + SessionProvider + FavoritesBackend,
    P: PositionSource,
{
    let routing = Routing::from_config(schema, filters)?;
    let resolver = DistanceResolver::from_config(Arc::new(routing), &schema.routing);
    let tracker = LocationTracker::from_config(Arc::new(source), &schema.tracking);
    let images = ImageResolver::new(schema.backend.storage_base().unwrap_or_default());

    Ok(ProximityQueryEngine::new(
        backend,
        resolver,
        Arc::new(tracker),
        local_favorites(schema),
        images,
    ))
}
