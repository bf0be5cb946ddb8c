// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

// Database row types for sqlx

use chrono::{DateTime, SecondsFormat, Utc};
use flagstore_core::{Flag, Variant, VariantId};
use sqlx::SqliteConnection;

use crate::error::{FlagStoreError, Result};

/// Timestamps are stored as fixed-width RFC 3339 text so that string order
/// matches time order, both in `ORDER BY` and in `MAX()`.
pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_ts(value: &str, column: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|_| FlagStoreError::Internal(format!("Invalid {column}")))
}

#[derive(sqlx::FromRow)]
pub(crate) struct FlagRow {
	key: String,
	name: String,
	description: Option<String>,
	enabled: bool,
	created_at: String,
	updated_at: String,
}

impl FlagRow {
	pub(crate) fn into_flag(self, variants: Vec<Variant>) -> Result<Flag> {
		Ok(Flag {
			key: self.key,
			name: self.name,
			description: self.description,
			enabled: self.enabled,
			variants,
			created_at: decode_ts(&self.created_at, "created_at")?,
			updated_at: decode_ts(&self.updated_at, "updated_at")?,
		})
	}
}

#[derive(sqlx::FromRow)]
pub(crate) struct VariantRow {
	id: String,
	flag_key: String,
	key: String,
	name: String,
	description: Option<String>,
	created_at: String,
	updated_at: String,
}

impl TryFrom<VariantRow> for Variant {
	type Error = FlagStoreError;

	fn try_from(row: VariantRow) -> Result<Self> {
		Ok(Variant {
			id: VariantId(row.id),
			flag_key: row.flag_key,
			key: row.key,
			name: row.name,
			description: row.description,
			created_at: decode_ts(&row.created_at, "created_at")?,
			updated_at: decode_ts(&row.updated_at, "updated_at")?,
		})
	}
}

/// Load the variants of a flag in creation order.
pub(crate) async fn fetch_variants(
	conn: &mut SqliteConnection,
	flag_key: &str,
) -> Result<Vec<Variant>> {
	let rows = sqlx::query_as::<_, VariantRow>(
		r#"
		SELECT id, flag_key, key, name, description, created_at, updated_at
		FROM variants
		WHERE flag_key = ?
		ORDER BY created_at ASC, rowid ASC
		"#,
	)
	.bind(flag_key)
	.fetch_all(&mut *conn)
	.await?;

	rows.into_iter().map(TryInto::try_into).collect()
}

pub(crate) async fn fetch_variant(
	conn: &mut SqliteConnection,
	id: &VariantId,
	flag_key: &str,
) -> Result<Option<Variant>> {
	let row = sqlx::query_as::<_, VariantRow>(
		r#"
		SELECT id, flag_key, key, name, description, created_at, updated_at
		FROM variants
		WHERE id = ? AND flag_key = ?
		"#,
	)
	.bind(id.as_str())
	.bind(flag_key)
	.fetch_optional(&mut *conn)
	.await?;

	row.map(TryInto::try_into).transpose()
}
