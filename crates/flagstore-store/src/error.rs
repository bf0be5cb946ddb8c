// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use flagstore_core::{EntityKind, VariantId};
use thiserror::Error;

/// Errors returned by the flag and variant repositories.
///
/// Domain kinds carry the offending key or id. Database and rule engine
/// failures are kept apart from them and passed through unchanged.
#[derive(Debug, Error)]
pub enum FlagStoreError {
	#[error(transparent)]
	Validation(#[from] flagstore_core::FlagsError),

	#[error("{kind} \"{key}\" not found")]
	NotFound { kind: EntityKind, key: String },

	#[error("{kind} \"{key}\" is not unique")]
	AlreadyExists { kind: EntityKind, key: String },

	#[error("{kind} \"{key}\" was modified concurrently")]
	Modified { kind: EntityKind, key: String },

	#[error("at least one rule exists that includes this variant")]
	ReferentialConflict { variant_id: VariantId },

	#[error("rule reference check failed: {0}")]
	RuleCheck(#[source] Box<dyn std::error::Error + Send + Sync>),

	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("internal error: {0}")]
	Internal(String),
}

impl FlagStoreError {
	pub fn flag_not_found(key: impl Into<String>) -> Self {
		Self::NotFound {
			kind: EntityKind::Flag,
			key: key.into(),
		}
	}

	pub fn variant_not_found(id: &VariantId) -> Self {
		Self::NotFound {
			kind: EntityKind::Variant,
			key: id.to_string(),
		}
	}

	pub fn already_exists(kind: EntityKind, key: impl Into<String>) -> Self {
		Self::AlreadyExists {
			kind,
			key: key.into(),
		}
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound { .. })
	}

	pub fn is_already_exists(&self) -> bool {
		matches!(self, Self::AlreadyExists { .. })
	}

	pub fn is_modified(&self) -> bool {
		matches!(self, Self::Modified { .. })
	}
}

pub type Result<T> = std::result::Result<T, FlagStoreError>;
