// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subcommand definitions and their execution against the store.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use flagstore_config::DatabaseConfig;
use flagstore_store::{
	create_pool, create_schema, CreateFlagRequest, CreateVariantRequest, EntityKind,
	FlagRepository, FlagStoreError, NoRuleReferences, Page, SqliteFlagRepository,
	SqliteVariantRepository, UpdateFlagRequest, UpdateVariantRequest, VariantRepository,
};
use serde_json::{json, Value};

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
	/// Create or upgrade the database schema
	Migrate,

	/// Manage flags
	#[command(subcommand)]
	Flag(FlagCommand),

	/// Manage the variants of a flag
	#[command(subcommand)]
	Variant(VariantCommand),
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum FlagCommand {
	/// Create a flag
	Create {
		key: String,
		#[arg(long)]
		name: String,
		#[arg(long)]
		description: Option<String>,
		#[arg(long)]
		enabled: bool,
	},

	/// Show a flag with its variants
	Get { key: String },

	/// List flags in creation order, without variants
	List {
		/// Maximum number of flags; 0 lists all
		#[arg(long, default_value_t = 0)]
		limit: u32,
		#[arg(long, default_value_t = 0)]
		offset: u32,
	},

	/// Update a flag; omitted options keep their current value
	Update {
		key: String,
		#[arg(long)]
		name: Option<String>,
		#[arg(long)]
		description: Option<String>,
		#[arg(long)]
		enabled: Option<bool>,
	},

	/// Delete a flag and its variants
	Delete { key: String },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum VariantCommand {
	/// Add a variant to a flag
	Create {
		flag_key: String,
		key: String,
		#[arg(long)]
		name: String,
		#[arg(long)]
		description: Option<String>,
	},

	/// Update a variant, addressed by its current key
	Update {
		flag_key: String,
		key: String,
		#[arg(long)]
		new_key: Option<String>,
		#[arg(long)]
		name: Option<String>,
		#[arg(long)]
		description: Option<String>,
	},

	/// Delete a variant, addressed by its key
	Delete { flag_key: String, key: String },
}

/// Repositories opened against the configured database.
pub struct Store {
	flags: SqliteFlagRepository,
	variants: SqliteVariantRepository,
}

impl Store {
	/// Opens the pool and brings the schema up to date.
	pub async fn open(config: &DatabaseConfig) -> Result<Self> {
		let pool = create_pool(config)
			.await
			.with_context(|| format!("failed to open database {}", config.url))?;
		create_schema(&pool)
			.await
			.context("failed to create schema")?;

		// No rule engine is attached to the admin tool.
		let variants = SqliteVariantRepository::new(pool.clone(), Arc::new(NoRuleReferences));
		let flags = SqliteFlagRepository::new(pool);
		Ok(Self { flags, variants })
	}
}

/// Runs one command. Returns the JSON document to print, if any.
pub async fn run(store: &Store, command: Command) -> Result<Option<Value>> {
	match command {
		Command::Migrate => {
			tracing::info!("schema is up to date");
			Ok(None)
		}
		Command::Flag(cmd) => run_flag(store, cmd).await,
		Command::Variant(cmd) => run_variant(store, cmd).await,
	}
}

async fn run_flag(store: &Store, command: FlagCommand) -> Result<Option<Value>> {
	match command {
		FlagCommand::Create {
			key,
			name,
			description,
			enabled,
		} => {
			let flag = store
				.flags
				.create_flag(&CreateFlagRequest {
					key,
					name,
					description,
					enabled,
				})
				.await?;
			Ok(Some(serde_json::to_value(flag)?))
		}
		FlagCommand::Get { key } => {
			let flag = store.flags.get_flag(&key).await?;
			Ok(Some(serde_json::to_value(flag)?))
		}
		FlagCommand::List { limit, offset } => {
			let flags = store.flags.list_flags(Page::new(limit, offset)).await?;
			let total = store.flags.count_flags().await?;
			Ok(Some(json!({ "flags": flags, "total": total })))
		}
		FlagCommand::Update {
			key,
			name,
			description,
			enabled,
		} => {
			// Omitted fields come from this read; the timestamp guard makes the
			// update fail instead of overwriting an edit made in between.
			let current = store.flags.get_flag(&key).await?;
			let flag = store
				.flags
				.update_flag(&UpdateFlagRequest {
					key,
					name: name.unwrap_or(current.name),
					description: description.or(current.description),
					enabled: enabled.unwrap_or(current.enabled),
					expected_updated_at: Some(current.updated_at),
				})
				.await?;
			Ok(Some(serde_json::to_value(flag)?))
		}
		FlagCommand::Delete { key } => {
			store.flags.delete_flag(&key).await?;
			Ok(None)
		}
	}
}

async fn run_variant(store: &Store, command: VariantCommand) -> Result<Option<Value>> {
	match command {
		VariantCommand::Create {
			flag_key,
			key,
			name,
			description,
		} => {
			let variant = store
				.variants
				.create_variant(&CreateVariantRequest {
					flag_key,
					key,
					name,
					description,
				})
				.await?;
			Ok(Some(serde_json::to_value(variant)?))
		}
		VariantCommand::Update {
			flag_key,
			key,
			new_key,
			name,
			description,
		} => {
			let flag = store.flags.get_flag(&flag_key).await?;
			let current = flag
				.variant_by_key(&key)
				.ok_or_else(|| FlagStoreError::NotFound {
					kind: EntityKind::Variant,
					key: key.clone(),
				})?;
			let variant = store
				.variants
				.update_variant(&UpdateVariantRequest {
					id: current.id.clone(),
					flag_key: flag_key.clone(),
					key: new_key.unwrap_or(key),
					name: name.unwrap_or_else(|| current.name.clone()),
					description: description.or_else(|| current.description.clone()),
					expected_updated_at: Some(current.updated_at),
				})
				.await?;
			Ok(Some(serde_json::to_value(variant)?))
		}
		VariantCommand::Delete { flag_key, key } => {
			let flag = match store.flags.get_flag(&flag_key).await {
				Ok(flag) => flag,
				Err(e) if e.is_not_found() => return Ok(None),
				Err(e) => return Err(e.into()),
			};
			if let Some(variant) = flag.variant_by_key(&key) {
				store.variants.delete_variant(&variant.id, &flag_key).await?;
			}
			Ok(None)
		}
	}
}
