// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The narrow view this store has of the rule engine.

use async_trait::async_trait;
use flagstore_core::VariantId;

use crate::error::Result;

/// Answers whether any rule still targets a variant.
///
/// Consulted by [`VariantRepository::delete_variant`](crate::VariantRepository::delete_variant)
/// before a variant is removed. The answer is not held across the delete: a
/// rule created between the check and the delete is not detected.
///
/// Implementations report their own failures as
/// [`FlagStoreError::RuleCheck`](crate::FlagStoreError::RuleCheck).
#[async_trait]
pub trait RuleReferenceChecker: Send + Sync {
	async fn exists_rule_referencing(&self, variant_id: &VariantId) -> Result<bool>;
}

/// Checker for deployments without a rule engine: nothing is ever referenced.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRuleReferences;

#[async_trait]
impl RuleReferenceChecker for NoRuleReferences {
	async fn exists_rule_referencing(&self, _variant_id: &VariantId) -> Result<bool> {
		Ok(false)
	}
}
