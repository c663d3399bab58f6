//! Application Configuration Module
//!
//! Provides the service configuration loaded from TOML files plus the static
//! lookup tables (decans, channel wiring) the pipeline stages resolve against.
//!
//! ## Loading Order
//!
//! 1. `COSMO_CONFIG` environment variable (path to TOML file)
//! 2. `cosmo.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Both objects are built once at startup and handed to the components that
//! need them. Nothing is initialised lazily on first use.
//!
//! ```ignore
//! let config = AppConfig::load();
//! let tables = StaticTables::load(&config.tables)?; // fail fast
//! let orchestrator = Orchestrator::new(engine, geo, Arc::new(tables), &config);
//! ```

mod app_config;
mod tables;
pub mod defaults;
pub mod validation;

pub use app_config::*;
pub use tables::StaticTables;
