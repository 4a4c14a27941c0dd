//! API endpoint implementations

mod favorites;
mod nearby;
mod session;

pub use favorites::FavoritesApi;
pub use nearby::{NearbyApi, NearbyParams};
pub use session::{AuthUser, SessionApi};
