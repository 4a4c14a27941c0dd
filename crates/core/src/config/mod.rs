//! Configuration loading and schema definitions
//!
//! Settings shared by the discovery engine, the API client and the CLI.

mod loader;
mod schema;

pub use loader::Config;
pub use schema::*;
