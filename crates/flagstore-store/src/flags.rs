// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use flagstore_core::{
	Clock, CreateFlagRequest, EntityKind, Flag, Page, SystemClock, UpdateFlagRequest,
};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::{FlagStoreError, Result};
use crate::rows::{encode_ts, fetch_variants, FlagRow};

/// Repository trait for flag lifecycle operations.
#[async_trait]
pub trait FlagRepository: Send + Sync {
	/// Creates a flag with no variants.
	///
	/// Fails with `AlreadyExists` if another flag already uses the key.
	async fn create_flag(&self, req: &CreateFlagRequest) -> Result<Flag>;

	/// Fetches a flag together with all of its variants.
	async fn get_flag(&self, key: &str) -> Result<Flag>;

	/// Collects one page of flags in creation order.
	///
	/// Listed flags carry no variants; use [`FlagRepository::get_flag`] for those.
	async fn list_flags(&self, page: Page) -> Result<Vec<Flag>>;

	/// Streams one page of flags in creation order, without variants.
	///
	/// Rows are read as the stream is polled. Calling again starts over.
	fn stream_flags(&self, page: Page) -> BoxStream<'_, Result<Flag>>;

	/// Total number of flags, for callers that report pagination totals.
	async fn count_flags(&self) -> Result<u64>;

	/// Replaces name, description and enabled state.
	///
	/// The key and `created_at` never change; `updated_at` never moves backwards.
	/// With `expected_updated_at` set, fails with `Modified` if the flag changed
	/// since that timestamp was read.
	async fn update_flag(&self, req: &UpdateFlagRequest) -> Result<Flag>;

	/// Deletes a flag and all of its variants. Deleting a missing flag succeeds.
	async fn delete_flag(&self, key: &str) -> Result<()>;
}

/// SQLite implementation of the flag repository.
#[derive(Clone)]
pub struct SqliteFlagRepository {
	pool: SqlitePool,
	clock: Arc<dyn Clock>,
}

impl SqliteFlagRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool,
			clock: Arc::new(SystemClock),
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}
}

#[async_trait]
impl FlagRepository for SqliteFlagRepository {
	#[instrument(skip(self, req), fields(flag_key = %req.key))]
	async fn create_flag(&self, req: &CreateFlagRequest) -> Result<Flag> {
		req.validate()?;

		let now = self.clock.now();

		// The primary key on `flags.key` decides concurrent creates: exactly
		// one insert succeeds and every other caller gets AlreadyExists.
		sqlx::query(
			r#"
			INSERT INTO flags (key, name, description, enabled, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&req.key)
		.bind(&req.name)
		.bind(&req.description)
		.bind(req.enabled)
		.bind(encode_ts(now))
		.bind(encode_ts(now))
		.execute(&self.pool)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
				FlagStoreError::already_exists(EntityKind::Flag, &req.key)
			}
			_ => FlagStoreError::Database(e),
		})?;

		tracing::debug!(flag_key = %req.key, "flag created");

		Ok(Flag {
			key: req.key.clone(),
			name: req.name.clone(),
			description: req.description.clone(),
			enabled: req.enabled,
			variants: Vec::new(),
			created_at: now,
			updated_at: now,
		})
	}

	#[instrument(skip(self), fields(flag_key = %key))]
	async fn get_flag(&self, key: &str) -> Result<Flag> {
		// One read transaction so a concurrent delete is seen whole or not at all.
		let mut tx = self.pool.begin().await?;

		let row = sqlx::query_as::<_, FlagRow>(
			r#"
			SELECT key, name, description, enabled, created_at, updated_at
			FROM flags
			WHERE key = ?
			"#,
		)
		.bind(key)
		.fetch_optional(&mut *tx)
		.await?
		.ok_or_else(|| FlagStoreError::flag_not_found(key))?;

		let variants = fetch_variants(&mut tx, key).await?;
		tx.commit().await?;

		row.into_flag(variants)
	}

	#[instrument(skip(self), fields(limit = page.limit, offset = page.offset))]
	async fn list_flags(&self, page: Page) -> Result<Vec<Flag>> {
		self.stream_flags(page).try_collect().await
	}

	fn stream_flags(&self, page: Page) -> BoxStream<'_, Result<Flag>> {
		sqlx::query_as::<_, FlagRow>(
			r#"
			SELECT key, name, description, enabled, created_at, updated_at
			FROM flags
			ORDER BY created_at ASC, rowid ASC
			LIMIT ? OFFSET ?
			"#,
		)
		.bind(page.sql_limit())
		.bind(page.sql_offset())
		.fetch(&self.pool)
		.map(|row| {
			row
				.map_err(FlagStoreError::from)
				.and_then(|row| row.into_flag(Vec::new()))
		})
		.boxed()
	}

	#[instrument(skip(self))]
	async fn count_flags(&self) -> Result<u64> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM flags")
			.fetch_one(&self.pool)
			.await?;

		Ok(count as u64)
	}

	#[instrument(skip(self, req), fields(flag_key = %req.key))]
	async fn update_flag(&self, req: &UpdateFlagRequest) -> Result<Flag> {
		req.validate()?;

		let now = encode_ts(self.clock.now());
		let expected = req.expected_updated_at.map(encode_ts);
		let mut tx = self.pool.begin().await?;

		let result = sqlx::query(
			r#"
			UPDATE flags
			SET name = ?, description = ?, enabled = ?, updated_at = MAX(updated_at, ?)
			WHERE key = ? AND (? IS NULL OR updated_at = ?)
			"#,
		)
		.bind(&req.name)
		.bind(&req.description)
		.bind(req.enabled)
		.bind(now)
		.bind(&req.key)
		.bind(&expected)
		.bind(&expected)
		.execute(&mut *tx)
		.await?;

		if result.rows_affected() == 0 {
			let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM flags WHERE key = ?")
				.bind(&req.key)
				.fetch_optional(&mut *tx)
				.await?;

			return Err(match exists {
				Some(_) => FlagStoreError::Modified {
					kind: EntityKind::Flag,
					key: req.key.clone(),
				},
				None => FlagStoreError::flag_not_found(&req.key),
			});
		}

		let row = sqlx::query_as::<_, FlagRow>(
			r#"
			SELECT key, name, description, enabled, created_at, updated_at
			FROM flags
			WHERE key = ?
			"#,
		)
		.bind(&req.key)
		.fetch_one(&mut *tx)
		.await?;

		let variants = fetch_variants(&mut tx, &req.key).await?;
		tx.commit().await?;

		tracing::debug!(flag_key = %req.key, "flag updated");
		row.into_flag(variants)
	}

	#[instrument(skip(self), fields(flag_key = %key))]
	async fn delete_flag(&self, key: &str) -> Result<()> {
		// Variants are removed explicitly as well as by the foreign key cascade,
		// so the delete holds even on connections with foreign keys off.
		let mut tx = self.pool.begin().await?;

		let variants = sqlx::query("DELETE FROM variants WHERE flag_key = ?")
			.bind(key)
			.execute(&mut *tx)
			.await?;

		let flags = sqlx::query("DELETE FROM flags WHERE key = ?")
			.bind(key)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		tracing::debug!(
			flag_key = %key,
			existed = flags.rows_affected() > 0,
			variants_deleted = variants.rows_affected(),
			"flag deleted"
		);
		Ok(())
	}
}
