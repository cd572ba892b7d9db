//! Configuration management for the orchestration service
//!
//! Configuration loads from a TOML file or environment variables with
//! defaults, and is validated before the service starts.

pub mod app;

pub use app::{
    validate_config, AmqpSettings, AppConfig, CacheSettings, GameplaySettings, LiveSettings,
    ServiceSettings,
};
