// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request shapes accepted by the flag and variant repositories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FlagsError, Result};
use crate::{Flag, Variant, VariantId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFlagRequest {
	pub key: String,
	pub name: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub enabled: bool,
}

impl CreateFlagRequest {
	pub fn validate(&self) -> Result<()> {
		Flag::validate_key(&self.key)
	}
}

/// Replaces the mutable fields of a flag. `key` selects the flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFlagRequest {
	pub key: String,
	pub name: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub enabled: bool,
	/// When set, the update only applies if the stored `updated_at` still
	/// equals this value.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expected_updated_at: Option<DateTime<Utc>>,
}

impl UpdateFlagRequest {
	pub fn validate(&self) -> Result<()> {
		Flag::validate_key(&self.key)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVariantRequest {
	pub flag_key: String,
	pub key: String,
	pub name: String,
	#[serde(default)]
	pub description: Option<String>,
}

impl CreateVariantRequest {
	pub fn validate(&self) -> Result<()> {
		Flag::validate_key(&self.flag_key)?;
		Variant::validate_key(&self.key)
	}
}

/// Replaces the mutable fields of a variant, including its key.
///
/// `id` and `flag_key` together select the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateVariantRequest {
	pub id: VariantId,
	pub flag_key: String,
	pub key: String,
	pub name: String,
	#[serde(default)]
	pub description: Option<String>,
	/// Same guard as [`UpdateFlagRequest::expected_updated_at`].
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expected_updated_at: Option<DateTime<Utc>>,
}

impl UpdateVariantRequest {
	pub fn validate(&self) -> Result<()> {
		if self.id.as_str().is_empty() {
			return Err(FlagsError::EmptyVariantId);
		}
		Flag::validate_key(&self.flag_key)?;
		Variant::validate_key(&self.key)
	}
}

/// A window over the flag listing.
///
/// `limit == 0` means no limit. An offset past the end yields an empty page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
	#[serde(default)]
	pub limit: u32,
	#[serde(default)]
	pub offset: u32,
}

impl Page {
	pub fn new(limit: u32, offset: u32) -> Self {
		Self { limit, offset }
	}

	/// Every flag, from the first.
	pub fn all() -> Self {
		Self::default()
	}

	/// The limit as SQLite expects it, where a negative value disables the limit.
	pub fn sql_limit(&self) -> i64 {
		if self.limit == 0 {
			-1
		} else {
			i64::from(self.limit)
		}
	}

	pub fn sql_offset(&self) -> i64 {
		i64::from(self.offset)
	}
}
