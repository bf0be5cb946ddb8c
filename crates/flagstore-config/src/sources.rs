// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::StoreConfigLayer;
use crate::sections::{DatabaseConfigLayer, LogFormat, LoggingConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<StoreConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<StoreConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(StoreConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/flagstore/flagstore.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<StoreConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(StoreConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: StoreConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: FLAGSTORE_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<StoreConfigLayer, ConfigError> {
		debug!("loading environment variables");
		load_from_vars(|name| std::env::var(name).ok())
	}
}

/// Builds a layer from a variable lookup; empty values count as unset.
fn load_from_vars<F>(lookup: F) -> Result<StoreConfigLayer, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	let var = |name: &str| lookup(name).filter(|s| !s.is_empty());

	let database = DatabaseConfigLayer {
		url: var("FLAGSTORE_DATABASE_URL"),
		max_connections: parse_var(
			"FLAGSTORE_DATABASE_MAX_CONNECTIONS",
			var("FLAGSTORE_DATABASE_MAX_CONNECTIONS"),
		)?,
		busy_timeout_secs: parse_var(
			"FLAGSTORE_DATABASE_BUSY_TIMEOUT_SECS",
			var("FLAGSTORE_DATABASE_BUSY_TIMEOUT_SECS"),
		)?,
	};

	let logging = LoggingConfigLayer {
		level: var("FLAGSTORE_LOGGING_LEVEL"),
		format: var("FLAGSTORE_LOGGING_FORMAT")
			.map(|v| {
				LogFormat::from_str(&v)
					.map_err(|e| ConfigError::invalid("FLAGSTORE_LOGGING_FORMAT", e))
			})
			.transpose()?,
	};

	Ok(StoreConfigLayer {
		database: Some(database),
		logging: Some(logging),
	})
}

fn parse_var<T>(name: &str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
{
	match value {
		Some(v) => v.parse().map(Some).map_err(|_| {
			ConfigError::invalid(
				name,
				format!("invalid {} value '{v}'", std::any::type_name::<T>()),
			)
		}),
		None => Ok(None),
	}
}
