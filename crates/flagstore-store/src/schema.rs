// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Table layout for flags and variants.
//!
//! Key uniqueness lives here: `flags.key` is the primary key and
//! `(flag_key, key)` is unique on `variants`. The repositories rely on these
//! constraints rather than on checks held in memory.

use sqlx::sqlite::SqlitePool;

use crate::error::Result;

const SCHEMA: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS flags (
		key TEXT PRIMARY KEY NOT NULL,
		name TEXT NOT NULL,
		description TEXT,
		enabled INTEGER NOT NULL DEFAULT 0,
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS variants (
		id TEXT PRIMARY KEY NOT NULL,
		flag_key TEXT NOT NULL REFERENCES flags(key) ON DELETE CASCADE,
		key TEXT NOT NULL,
		name TEXT NOT NULL,
		description TEXT,
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL,
		UNIQUE (flag_key, key)
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_flags_created_at ON flags(created_at)",
];

/// Create the flag and variant tables if they do not exist yet.
#[tracing::instrument(skip(pool))]
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
	let mut tx = pool.begin().await?;

	for statement in SCHEMA {
		sqlx::query(*statement).execute(&mut *tx).await?;
	}

	tx.commit().await?;
	tracing::debug!("flag store schema ready");
	Ok(())
}
