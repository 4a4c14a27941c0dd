//! Shared building blocks for the Findixi proximity surface
//!
//! This crate provides functionality used by every other crate in the workspace:
//!
//! - **Error handling**: errors with codes, context, and recovery suggestions
//! - **Configuration**: TOML-based configuration with defaults and env overrides
//! - **Circuit breaker**: stops hammering a failing collaborator
//!
//! # Example
//!
//! ```rust,no_run
//! use findixi_core::config::Config;
//!
//! let config = Config::load(None).expect("invalid configuration");
//! println!("reload after {} m", config.schema.reload.distance_m);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod circuit_breaker;
pub mod config;
pub mod error;

pub use error::{Error, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use crate::config::{Config, ConfigSchema};
    pub use crate::error::{Error, ErrorCode, Result, ResultExt, exit_codes};
}
