//! HTTP collaborators for the Findixi proximity surface
//!
//! This crate connects `findixi-discovery` to the hosted services:
//!
//! - **Record store**: the `buscar_comercios_filtrados` RPC answers radius
//!   queries with category and open-now filters applied server side
//! - **Session and favorites**: the auth user and the `favoritosusuarios` table
//! - **Routing**: OSRM driving durations, guarded by a circuit breaker
//!
//! Every request carries a correlation id. Nothing is retried automatically.
//!
//! # Example
//!
//! ```rust,no_run
//! use findixi_api_client::{ClientConfig, FindixiClient, OsrmClient};
//! use findixi_discovery::DistanceResolver;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let client = FindixiClient::with_config(config.clone())?;
//! let resolver = DistanceResolver::new(Arc::new(OsrmClient::new(&config)?));
//! # let _ = (client, resolver);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod backend;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod routing;

pub use client::FindixiClient;
pub use config::{ClientConfig, Environment};
pub use error::{ApiError, ApiResult};
pub use routing::OsrmClient;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::client::FindixiClient;
    pub use crate::config::{ClientConfig, Environment};
    pub use crate::endpoints::{AuthUser, FavoritesApi, NearbyApi, SessionApi};
    pub use crate::error::{ApiError, ApiResult};
    pub use crate::routing::OsrmClient;
}
