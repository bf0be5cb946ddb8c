// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::EntityKind;

/// Validation errors raised before a request reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagsError {
	#[error("{kind} key must not be empty")]
	EmptyKey { kind: EntityKind },

	#[error("invalid {kind} key {key:?}: {reason}")]
	InvalidKey {
		kind: EntityKind,
		key: String,
		reason: &'static str,
	},

	#[error("variant id must not be empty")]
	EmptyVariantId,
}

pub type Result<T> = std::result::Result<T, FlagsError>;
