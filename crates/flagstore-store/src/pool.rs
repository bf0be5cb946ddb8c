// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::str::FromStr;
use std::time::Duration;

use flagstore_config::DatabaseConfig;
use sqlx::sqlite::{
	SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::error::{FlagStoreError, Result};

/// Create a SqlitePool with WAL mode, foreign keys and a busy timeout.
///
/// # Arguments
/// * `config` - Database section of the store configuration
///
/// # Errors
/// Returns `FlagStoreError::Internal` if the URL is not a `sqlite:` URL or
/// cannot be parsed, and `FlagStoreError::Database` if the connection fails.
#[tracing::instrument(skip(config), fields(max_connections = config.max_connections))]
pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
	if !config.url.starts_with("sqlite:") {
		return Err(FlagStoreError::Internal(format!(
			"Invalid database URL: {} is not a sqlite: URL",
			config.url
		)));
	}

	let options = SqliteConnectOptions::from_str(&config.url)
		.map_err(|e| FlagStoreError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.foreign_keys(true)
		.busy_timeout(Duration::from_secs(config.busy_timeout_secs))
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(config.max_connections)
		.connect_with(options)
		.await?;

	tracing::debug!("database pool created");
	Ok(pool)
}
