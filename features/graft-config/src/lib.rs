//! Graft Config holds the settings of a graft compilation and loads them from layered sources.
//!
//! Graft Config is split into two major parts:
//! 1. GraftConfig: The typed settings, every section with defaults
//! 2. ConfigProvider: Merges defaults, an optional TOML file and `GRAFT_` environment variables
//!
//! # Examples
//!
//! ```rust,no_run
//! use graft_config::provider::ConfigProvider;
//!
//! fn load_config() {
//!     let config = match ConfigProvider::new().with_file("graft.toml").load() {
//!         Ok(config) => config,
//!         Err(e) => {
//!             eprintln!("{e}");
//!             return;
//!         }
//!     };
//!
//!     assert_eq!(config.naming.accessor_prefix, "provide_");
//! }
//! ```
//!
//! Graft Config consists of the following components:
//!
//! 1. Config - the typed settings and their validation
//! 2. Provider - for layering the sources and extracting a config
//! 3. Errors - for config errors

pub mod config;
pub mod errors;
pub mod provider;

pub use config::{
    BindingConfig, DuplicatePolicy, GenericFallback, GraftConfig, LoggingConfig, NamingConfig,
    PlacementConfig, ScopeConfig,
};
pub use errors::ConfigError;
pub use provider::ConfigProvider;
