//! Configuration module for sitepipe
//!
//! Provides types and parsing for `site.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::{default_config, load_config, ConfigError};
pub use schema::*;
