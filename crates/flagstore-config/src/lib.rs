// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the flagstore admin tool.
//!
//! This crate provides:
//! - Layered configuration from defaults, a TOML file and the environment
//! - Consistent environment variable naming (`FLAGSTORE_<SECTION>_<FIELD>`)
//!
//! # Usage
//!
//! ```ignore
//! use flagstore_config::load_config;
//!
//! let config = load_config()?;
//! println!("Using database {}", config.database.url);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::StoreConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved store configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`FLAGSTORE_*`)
/// 2. Config file (`/etc/flagstore/flagstore.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<StoreConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path in place of the system one.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<StoreConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge sources in precedence order and resolve the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<StoreConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = StoreConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: StoreConfigLayer) -> Result<StoreConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&database)?;

	info!(
		database = %database.url,
		max_connections = database.max_connections,
		log_format = %logging.format,
		"Store configuration loaded"
	);

	Ok(StoreConfig { database, logging })
}

fn validate_config(database: &DatabaseConfig) -> Result<(), ConfigError> {
	if database.max_connections == 0 {
		return Err(ConfigError::invalid(
			"database.max_connections",
			"must be at least 1",
		));
	}
	if database.url.is_empty() {
		return Err(ConfigError::invalid("database.url", "must not be empty"));
	}
	// Every connection to an in-memory database opens its own empty database.
	if database.is_in_memory() && database.max_connections > 1 {
		return Err(ConfigError::invalid(
			"database.max_connections",
			format!(
				"in-memory database {} requires max_connections = 1, got {}",
				database.url, database.max_connections
			),
		));
	}

	Ok(())
}
