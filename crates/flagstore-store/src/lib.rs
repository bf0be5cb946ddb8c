// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for flags and their variants.
//!
//! This crate owns the consistency rules of the flag store: flag keys are
//! unique across the store, variant keys are unique within their flag, a
//! flag always reports its current variant set, and a variant cannot be
//! deleted while a rule references it.
//!
//! # Architecture
//!
//! - `pool` / `schema` - connection pool creation and idempotent migration
//! - `flags` - [`FlagRepository`] and its SQLite implementation
//! - `variants` - [`VariantRepository`] and its SQLite implementation
//! - `rules` - [`RuleReferenceChecker`], the seam to the rule engine
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use flagstore_store::{
//!     create_pool, create_schema, CreateFlagRequest, FlagRepository, NoRuleReferences,
//!     SqliteFlagRepository, SqliteVariantRepository,
//! };
//!
//! let pool = create_pool(&config.database).await?;
//! create_schema(&pool).await?;
//!
//! let flags = SqliteFlagRepository::new(pool.clone());
//! let variants = SqliteVariantRepository::new(pool, Arc::new(NoRuleReferences));
//!
//! let flag = flags.create_flag(&request).await?;
//! ```

pub mod error;
pub mod flags;
pub mod pool;
mod rows;
pub mod rules;
pub mod schema;
#[cfg(test)]
mod testing;
pub mod variants;

pub use error::{FlagStoreError, Result};
pub use flags::{FlagRepository, SqliteFlagRepository};
pub use pool::create_pool;
pub use rules::{NoRuleReferences, RuleReferenceChecker};
pub use schema::create_schema;
pub use variants::{SqliteVariantRepository, VariantRepository};

// Re-export core types for convenience
pub use flagstore_core::*;
