//! Subcommand implementations

pub mod favorite;
pub mod query;
pub mod replay;
