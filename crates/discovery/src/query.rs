//! Proximity query rounds.
//!
//! A round takes a [`Generation`] before its first await and checks it after
//! every await. When a newer round has started in between, the round
//! resolves to [`QueryOutcome::Superseded`] and its data is dropped.

use crate::backend::{FavoritesBackend, FavoritesStore, PositionSource, ProximityBackend, RoutingService, SessionProvider};
use crate::distance::DistanceResolver;
use crate::error::Result;
use crate::favorites::{FavoriteSet, FavoritesMerger};
use crate::images::ImageResolver;
use crate::model::{NearbyQuery, PointOfInterest, ProximityResult, QueryRequest, UserLocation};
use crate::plan::resolve_visibility;
use crate::sequence::{Generation, RequestSequencer};
use crate::tracker::LocationTracker;
use findixi_geo::{Coordinate, Located};
use findixi_telemetry::{Timer, metrics, names};
use std::sync::Arc;
use tracing::{debug, error, info};

/// A round that was still current when it resolved.
#[derive(Debug, Clone)]
pub struct QueryRound {
    /// Generation of the round
    pub generation: Generation,
    /// Center the query used
    pub center: UserLocation,
    /// Annotated results, ordered as the backend returned them
    pub results: Vec<ProximityResult>,
    /// Favorite set used for annotation
    pub favorites: FavoriteSet,
}

/// How a round ended.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// Still the latest round; the caller may commit it
    Current(QueryRound),
    /// A newer round started first; nothing to apply
    Superseded(Generation),
}

impl QueryOutcome {
    /// Generation of the round.
    pub fn generation(&self) -> Generation {
        match self {
            QueryOutcome::Current(round) => round.generation,
            QueryOutcome::Superseded(generation) => *generation,
        }
    }

    /// The round, if it is still current.
    pub fn into_round(self) -> Option<QueryRound> {
        match self {
            QueryOutcome::Current(round) => Some(round),
            QueryOutcome::Superseded(_) => None,
        }
    }
}

/// Runs radius queries and turns raw records into annotated results.
pub struct ProximityQueryEngine<B, R, P> {
    backend: Arc<B>,
    favorites: FavoritesMerger<B>,
    resolver: DistanceResolver<R>,
    tracker: Arc<LocationTracker<P>>,
    images: ImageResolver,
    sequencer: RequestSequencer,
}

impl<B, R, P> std::fmt::Debug for ProximityQueryEngine<B, R, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProximityQueryEngine")
            .field("generation", &self.sequencer.current())
            .finish_non_exhaustive()
    }
}

impl<B, R, P> ProximityQueryEngine<B, R, P>
where
    B: ProximityBackend + SessionProvider + FavoritesBackend,
    R: RoutingService,
    P: PositionSource,
{
    /// Engine over its collaborators.
    pub fn new(
        backend: Arc<B>,
        resolver: DistanceResolver<R>,
        tracker: Arc<LocationTracker<P>>,
        local_favorites: Arc<dyn FavoritesStore>,
        images: ImageResolver,
    ) -> Self {
        Self {
            favorites: FavoritesMerger::new(Arc::clone(&backend), local_favorites),
            backend,
            resolver,
            tracker,
            images,
            sequencer: RequestSequencer::new(),
        }
    }

    /// The round counter. Clones share it.
    pub fn sequencer(&self) -> &RequestSequencer {
        &self.sequencer
    }

    /// Favorites resolution used by every round.
    pub fn favorites(&self) -> &FavoritesMerger<B> {
        &self.favorites
    }

    /// The location tracker used to resolve a missing center.
    pub fn tracker(&self) -> &Arc<LocationTracker<P>> {
        &self.tracker
    }

    /// Starts a new round and runs it.
    ///
    /// # Errors
    /// See [`Self::query_as`].
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryOutcome> {
        let generation = self.sequencer.next();
        self.query_as(generation, request).await
    }

    /// Runs a round under a generation the caller already took from
    /// [`Self::sequencer`].
    ///
    /// # Errors
    /// [`crate::DiscoveryError::PermissionDenied`] or
    /// [`crate::DiscoveryError::NoLocation`] when no center can be resolved;
    /// [`crate::DiscoveryError::BackendQuery`] when the record store fails.
    /// A round that fails after being superseded resolves to
    /// [`QueryOutcome::Superseded`] instead.
    pub async fn query_as(&self, generation: Generation, request: &QueryRequest) -> Result<QueryOutcome> {
        metrics().increment(names::QUERIES_ISSUED);
        let _timer = Timer::start(names::QUERY_DURATION_MS);

        match self.run(generation, request).await {
            Ok(outcome) => Ok(outcome),
            Err(_) if !self.sequencer.is_current(generation) => Ok(superseded(generation)),
            Err(e) => {
                metrics().increment(names::QUERIES_FAILED);
                error!(generation = %generation, error = %e, code = e.code() as u32, "Nearby query failed");
                Err(e)
            }
        }
    }

    async fn run(&self, generation: Generation, request: &QueryRequest) -> Result<QueryOutcome> {
        let center = match request.center.or_else(|| self.tracker.last_live()) {
            Some(center) => center,
            None => self.tracker.request_fix().await?,
        };
        if !self.sequencer.is_current(generation) {
            return Ok(superseded(generation));
        }

        let query = NearbyQuery::resolve(request, &center);
        debug!(
            generation = %generation,
            radius_km = query.radius_km,
            category_id = ?query.category_id,
            open_now_only = query.open_now_only,
            "Issuing nearby query"
        );

        let (rows, favorites) = tokio::join!(self.backend.query_nearby(&query), self.favorites.resolve());
        let rows = rows?;
        if !self.sequencer.is_current(generation) {
            return Ok(superseded(generation));
        }

        let points: Vec<PointOfInterest> = rows
            .into_iter()
            .filter(|p| p.id > 0 && !p.name.trim().is_empty())
            .filter(|p| resolve_visibility(&p.visibility).aparece_en_cercanos)
            .collect();

        let destinations: Vec<Option<Coordinate>> = points.iter().map(Located::coordinate).collect();
        let travel = self.resolver.estimate_all(&center, &destinations).await;
        if !self.sequencer.is_current(generation) {
            return Ok(superseded(generation));
        }

        let results: Vec<ProximityResult> = points
            .into_iter()
            .zip(travel)
            .map(|(point, travel)| self.annotate(point, travel, &favorites))
            .collect();

        info!(
            generation = %generation,
            results = results.len(),
            radius_km = query.radius_km,
            favorites = favorites.ids.len(),
            "Nearby round resolved"
        );

        Ok(QueryOutcome::Current(QueryRound {
            generation,
            center,
            results,
            favorites,
        }))
    }

    fn annotate(
        &self,
        point: PointOfInterest,
        travel: Option<crate::distance::TravelEstimate>,
        favorites: &FavoriteSet,
    ) -> ProximityResult {
        ProximityResult {
            logo_url: self.images.resolve(point.logo.as_deref()),
            cover_url: self.images.resolve(point.cover.as_deref()),
            travel,
            is_favorite: favorites.contains(point.id),
            is_open_now: point.is_open_now(),
            point,
        }
    }
}

fn superseded(generation: Generation) -> QueryOutcome {
    metrics().increment(names::QUERIES_SUPERSEDED);
    debug!(generation = %generation, "Discarding superseded round");
    QueryOutcome::Superseded(generation)
}
