//! Location-aware proximity discovery for Findixi
//!
//! This crate turns a moving user position into a live list of nearby
//! places and a map camera that follows the user:
//!
//! - **Tracking**: [`LocationTracker`] turns the device watch into a stream
//!   of [`PositionSample`]s with smoothed heading and speed in mph
//! - **Throttling**: [`ReloadThrottler`] decides when movement warrants a new
//!   query round; [`RequestSequencer`] discards rounds overtaken by newer ones
//! - **Querying**: [`ProximityQueryEngine`] runs radius queries and annotates
//!   the rows with images, favorites and travel estimates
//! - **Travel time**: [`DistanceResolver`] prefers a routing service and
//!   falls back to a distance-bucketed speed model
//! - **Camera**: [`CameraFollowController`] picks zoom from speed and stops
//!   following when the user pans
//! - **Favorites**: [`FavoritesMerger`] prefers remote favorites and degrades
//!   to a device store
//! - **Session**: [`NearbySession`] wires everything into one event loop
//!
//! # Example
//!
//! ```rust,no_run
//! use findixi_discovery::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> findixi_discovery::Result<()> {
//! let backend = Arc::new(MemoryBackend::new(vec![
//!     PointOfInterest::new(1, "Playa Luquillo", 18.38, -65.72),
//! ]));
//! let tracker = Arc::new(LocationTracker::new(Arc::new(ReplaySource::new(Vec::new()))));
//! let engine = ProximityQueryEngine::new(
//!     backend,
//!     DistanceResolver::new(Arc::new(NoRouting)),
//!     tracker,
//!     Arc::new(MemoryFavoritesStore::default()),
//!     ImageResolver::new("https://project.supabase.co"),
//! );
//!
//! let request = QueryRequest::default()
//!     .with_center(UserLocation::new(18.4655, -66.1057))
//!     .with_radius_miles(25.0);
//! if let QueryOutcome::Current(round) = engine.query(&request).await? {
//!     for result in &round.results {
//!         println!("{} {:?}", result.point.name, result.travel_minutes());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod camera;
pub mod distance;
pub mod error;
pub mod favorites;
pub mod filter;
pub mod images;
pub mod memory;
pub mod model;
pub mod plan;
pub mod query;
pub mod sequence;
pub mod session;
pub mod throttle;
pub mod tracker;

pub use backend::{
    FavoritesBackend, FavoritesStore, NoRouting, PositionSource, ProximityBackend, RouteSummary,
    RoutingService, SessionProvider, UserSession,
};
pub use camera::{CameraCommand, CameraFollowController, FollowMode, target_zoom_for_speed};
pub use distance::{DistanceResolver, TravelEstimate, TravelSource, format_travel_time};
pub use error::{BackendError, DiscoveryError, DiscoveryErrorCode, LocationError, Result, RoutingError, StoreError};
pub use favorites::{FavoriteSet, FavoritesMerger, FileFavoritesStore, MemoryFavoritesStore};
pub use filter::DisplayFilter;
pub use images::ImageResolver;
pub use model::{NearbyQuery, PointOfInterest, ProximityResult, QueryRequest, UserLocation};
pub use query::{ProximityQueryEngine, QueryOutcome, QueryRound};
pub use sequence::{Generation, RequestSequencer, ResultBoard};
pub use session::{NearbySession, SessionEvent, SessionHandle, SessionSnapshot, UiCommand};
pub use throttle::ReloadThrottler;
pub use tracker::{LocationTracker, PositionSample, PositionStream, TrackerStatus};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::backend::{
        FavoritesBackend, FavoritesStore, NoRouting, PositionSource, ProximityBackend, RawFix,
        RoutingService, SessionProvider,
    };
    pub use crate::camera::{CameraCommand, CameraFollowController, FollowMode};
    pub use crate::distance::{DistanceResolver, TravelEstimate};
    pub use crate::error::{DiscoveryError, Result};
    pub use crate::favorites::{FavoriteSet, FileFavoritesStore, MemoryFavoritesStore};
    pub use crate::filter::DisplayFilter;
    pub use crate::images::ImageResolver;
    pub use crate::memory::{MemoryBackend, ReplaySource, TrackPoint};
    pub use crate::model::{PointOfInterest, ProximityResult, QueryRequest, UserLocation};
    pub use crate::query::{ProximityQueryEngine, QueryOutcome};
    pub use crate::session::{NearbySession, SessionEvent, SessionHandle, UiCommand};
    pub use crate::tracker::{LocationTracker, TrackerStatus};
}
