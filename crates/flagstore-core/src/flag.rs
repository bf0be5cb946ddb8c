// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FlagsError, Result};

/// The two record kinds held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
	Flag,
	Variant,
}

impl std::fmt::Display for EntityKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			EntityKind::Flag => write!(f, "flag"),
			EntityKind::Variant => write!(f, "variant"),
		}
	}
}

/// System-assigned identifier of a variant.
///
/// Ids come from an [`IdGenerator`](crate::IdGenerator) and are opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(pub String);

impl VariantId {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for VariantId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<String> for VariantId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl From<&str> for VariantId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

/// A feature toggle and the variants it can resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
	/// Caller-supplied, globally unique, never changes after creation.
	pub key: String,
	pub name: String,
	pub description: Option<String>,
	pub enabled: bool,
	/// Ordered by creation. Empty for flags returned from a listing.
	#[serde(default)]
	pub variants: Vec<Variant>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Flag {
	/// Checks a flag key before it is written.
	///
	/// Keys are opaque to the store: any non-blank string without control
	/// characters is accepted.
	pub fn validate_key(key: &str) -> Result<()> {
		validate_key(EntityKind::Flag, key)
	}

	pub fn variant_by_key(&self, key: &str) -> Option<&Variant> {
		self.variants.iter().find(|v| v.key == key)
	}
}

/// One named alternative of a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
	pub id: VariantId,
	/// Owning flag. A variant is never re-parented.
	pub flag_key: String,
	/// Unique among the variants of `flag_key` only.
	pub key: String,
	pub name: String,
	pub description: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Variant {
	pub fn validate_key(key: &str) -> Result<()> {
		validate_key(EntityKind::Variant, key)
	}
}

fn validate_key(kind: EntityKind, key: &str) -> Result<()> {
	if key.trim().is_empty() {
		return Err(FlagsError::EmptyKey { kind });
	}

	if key.chars().any(char::is_control) {
		return Err(FlagsError::InvalidKey {
			kind,
			key: key.to_string(),
			reason: "contains control characters",
		});
	}

	Ok(())
}
