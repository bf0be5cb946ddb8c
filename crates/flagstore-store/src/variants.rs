// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use flagstore_core::{
	Clock, CreateVariantRequest, EntityKind, IdGenerator, SystemClock, UpdateVariantRequest,
	UuidGenerator, Variant, VariantId,
};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::{FlagStoreError, Result};
use crate::rows::{encode_ts, fetch_variant};
use crate::rules::RuleReferenceChecker;

/// Repository trait for variants. Every operation is scoped by the parent flag key.
#[async_trait]
pub trait VariantRepository: Send + Sync {
	/// Adds a variant to an existing flag.
	///
	/// Fails with `NotFound` naming the flag when the flag does not exist, and
	/// with `AlreadyExists` when the flag already has a variant with this key.
	async fn create_variant(&self, req: &CreateVariantRequest) -> Result<Variant>;

	/// Replaces key, name and description of a variant.
	///
	/// Keeping the current key is not a conflict; taking the key of another
	/// variant of the same flag is. `expected_updated_at` guards the update
	/// the same way as for flags.
	async fn update_variant(&self, req: &UpdateVariantRequest) -> Result<Variant>;

	/// Deletes a variant unless a rule still references it.
	///
	/// Deleting a missing variant succeeds.
	async fn delete_variant(&self, id: &VariantId, flag_key: &str) -> Result<()>;
}

/// SQLite implementation of the variant repository.
#[derive(Clone)]
pub struct SqliteVariantRepository {
	pool: SqlitePool,
	clock: Arc<dyn Clock>,
	ids: Arc<dyn IdGenerator>,
	rules: Arc<dyn RuleReferenceChecker>,
}

impl SqliteVariantRepository {
	pub fn new(pool: SqlitePool, rules: Arc<dyn RuleReferenceChecker>) -> Self {
		Self {
			pool,
			clock: Arc::new(SystemClock),
			ids: Arc::new(UuidGenerator),
			rules,
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
		self.ids = ids;
		self
	}
}

fn map_variant_key_conflict(err: sqlx::Error, key: &str) -> FlagStoreError {
	match err {
		sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
			FlagStoreError::already_exists(EntityKind::Variant, key)
		}
		_ => FlagStoreError::Database(err),
	}
}

#[async_trait]
impl VariantRepository for SqliteVariantRepository {
	#[instrument(skip(self, req), fields(flag_key = %req.flag_key, variant_key = %req.key))]
	async fn create_variant(&self, req: &CreateVariantRequest) -> Result<Variant> {
		req.validate()?;

		let id = VariantId(self.ids.new_id());
		let now = self.clock.now();

		// Selecting from `flags` makes the parent check and the insert a single
		// statement; the (flag_key, key) constraint settles duplicate keys.
		let result = sqlx::query(
			r#"
			INSERT INTO variants (id, flag_key, key, name, description, created_at, updated_at)
			SELECT ?, key, ?, ?, ?, ?, ?
			FROM flags
			WHERE key = ?
			"#,
		)
		.bind(id.as_str())
		.bind(&req.key)
		.bind(&req.name)
		.bind(&req.description)
		.bind(encode_ts(now))
		.bind(encode_ts(now))
		.bind(&req.flag_key)
		.execute(&self.pool)
		.await
		.map_err(|e| map_variant_key_conflict(e, &req.key))?;

		if result.rows_affected() == 0 {
			return Err(FlagStoreError::flag_not_found(&req.flag_key));
		}

		tracing::debug!(variant_id = %id, flag_key = %req.flag_key, "variant created");

		Ok(Variant {
			id,
			flag_key: req.flag_key.clone(),
			key: req.key.clone(),
			name: req.name.clone(),
			description: req.description.clone(),
			created_at: now,
			updated_at: now,
		})
	}

	#[instrument(skip(self, req), fields(variant_id = %req.id, flag_key = %req.flag_key))]
	async fn update_variant(&self, req: &UpdateVariantRequest) -> Result<Variant> {
		req.validate()?;

		let now = encode_ts(self.clock.now());
		let expected = req.expected_updated_at.map(encode_ts);
		let mut tx = self.pool.begin().await?;

		let result = sqlx::query(
			r#"
			UPDATE variants
			SET key = ?, name = ?, description = ?, updated_at = MAX(updated_at, ?)
			WHERE id = ? AND flag_key = ? AND (? IS NULL OR updated_at = ?)
			"#,
		)
		.bind(&req.key)
		.bind(&req.name)
		.bind(&req.description)
		.bind(now)
		.bind(req.id.as_str())
		.bind(&req.flag_key)
		.bind(&expected)
		.bind(&expected)
		.execute(&mut *tx)
		.await
		.map_err(|e| map_variant_key_conflict(e, &req.key))?;

		if result.rows_affected() == 0 {
			return Err(match fetch_variant(&mut tx, &req.id, &req.flag_key).await? {
				Some(_) => FlagStoreError::Modified {
					kind: EntityKind::Variant,
					key: req.id.to_string(),
				},
				None => FlagStoreError::variant_not_found(&req.id),
			});
		}

		let variant = fetch_variant(&mut tx, &req.id, &req.flag_key)
			.await?
			.ok_or_else(|| FlagStoreError::variant_not_found(&req.id))?;
		tx.commit().await?;

		tracing::debug!(variant_id = %req.id, "variant updated");
		Ok(variant)
	}

	#[instrument(skip(self), fields(variant_id = %id, flag_key = %flag_key))]
	async fn delete_variant(&self, id: &VariantId, flag_key: &str) -> Result<()> {
		if self.rules.exists_rule_referencing(id).await? {
			tracing::warn!(variant_id = %id, flag_key = %flag_key, "refusing to delete variant referenced by a rule");
			return Err(FlagStoreError::ReferentialConflict {
				variant_id: id.clone(),
			});
		}

		let result = sqlx::query("DELETE FROM variants WHERE id = ? AND flag_key = ?")
			.bind(id.as_str())
			.bind(flag_key)
			.execute(&self.pool)
			.await?;

		tracing::debug!(
			variant_id = %id,
			existed = result.rows_affected() > 0,
			"variant deleted"
		);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{
		create_file_store, create_test_pool, create_test_store, flag_request, UnreachableRules,
	};
	use crate::FlagRepository;
	use proptest::prelude::*;

	fn variant_request(flag_key: &str, key: &str) -> CreateVariantRequest {
		CreateVariantRequest {
			flag_key: flag_key.to_string(),
			key: key.to_string(),
			name: "foo".to_string(),
			description: Some("bar".to_string()),
		}
	}

	fn update_request(variant: &Variant, key: &str, description: &str) -> UpdateVariantRequest {
		UpdateVariantRequest {
			id: variant.id.clone(),
			flag_key: variant.flag_key.clone(),
			key: key.to_string(),
			name: variant.name.clone(),
			description: Some(description.to_string()),
			expected_updated_at: None,
		}
	}

	#[tokio::test]
	async fn test_create_variant() {
		let store = create_test_store().await;
		store.flags.create_flag(&flag_request("promo")).await.unwrap();

		let variant = store
			.variants
			.create_variant(&variant_request("promo", "A"))
			.await
			.unwrap();

		assert_eq!(variant.id.as_str(), "variant-1");
		assert_eq!(variant.flag_key, "promo");
		assert_eq!(variant.key, "A");
		assert_eq!(variant.name, "foo");
		assert_eq!(variant.description.as_deref(), Some("bar"));
		assert_eq!(variant.created_at, variant.updated_at);

		let flag = store.flags.get_flag("promo").await.unwrap();
		assert_eq!(flag.variants, vec![variant]);
	}

	#[tokio::test]
	async fn test_create_variant_flag_not_found() {
		let store = create_test_store().await;

		let err = store
			.variants
			.create_variant(&variant_request("foo", "A"))
			.await
			.unwrap_err();

		assert!(err.is_not_found());
		assert_eq!(err.to_string(), "flag \"foo\" not found");
	}

	#[tokio::test]
	async fn test_create_variant_duplicate_key() {
		let store = create_test_store().await;
		store.flags.create_flag(&flag_request("promo")).await.unwrap();
		store
			.variants
			.create_variant(&variant_request("promo", "foo"))
			.await
			.unwrap();

		let err = store
			.variants
			.create_variant(&variant_request("promo", "foo"))
			.await
			.unwrap_err();

		assert!(err.is_already_exists());
		assert_eq!(err.to_string(), "variant \"foo\" is not unique");
	}

	#[tokio::test]
	async fn test_create_variant_same_key_different_flag() {
		let store = create_test_store().await;
		store.flags.create_flag(&flag_request("promo")).await.unwrap();
		store.flags.create_flag(&flag_request("promo2")).await.unwrap();

		let first = store
			.variants
			.create_variant(&variant_request("promo", "A"))
			.await
			.unwrap();
		let second = store
			.variants
			.create_variant(&variant_request("promo2", "A"))
			.await
			.unwrap();

		assert_ne!(first.id, second.id);
		assert_eq!(second.flag_key, "promo2");
		assert_eq!(second.key, "A");

		let err = store
			.variants
			.create_variant(&variant_request("promo", "A"))
			.await
			.unwrap_err();
		assert_eq!(err.to_string(), "variant \"A\" is not unique");

		let promo = store.flags.get_flag("promo").await.unwrap();
		assert_eq!(promo.variants.len(), 1);
	}

	#[tokio::test]
	async fn test_create_variant_does_not_touch_flag_updated_at() {
		let store = create_test_store().await;
		let flag = store.flags.create_flag(&flag_request("promo")).await.unwrap();
		store
			.variants
			.create_variant(&variant_request("promo", "A"))
			.await
			.unwrap();

		let fetched = store.flags.get_flag("promo").await.unwrap();
		assert_eq!(fetched.updated_at, flag.updated_at);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_racing_variant_creates_have_one_winner() {
		let dir = tempfile::tempdir().unwrap();
		let store = create_file_store(&dir, 8).await;
		store.flags.create_flag(&flag_request("promo")).await.unwrap();

		for round in 0..10 {
			let key = format!("V{round}");
			let tasks: Vec<_> = (0..8)
				.map(|_| {
					let variants = store.variants.clone();
					let req = variant_request("promo", &key);
					tokio::spawn(async move { variants.create_variant(&req).await })
				})
				.collect();

			let results: Vec<_> = futures::future::join_all(tasks)
				.await
				.into_iter()
				.map(|joined| joined.unwrap())
				.collect();

			assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
			for err in results.iter().filter_map(|r| r.as_ref().err()) {
				assert!(err.is_already_exists(), "unexpected error: {err}");
			}
		}

		let flag = store.flags.get_flag("promo").await.unwrap();
		assert_eq!(flag.variants.len(), 10);
	}

	#[tokio::test]
	async fn test_update_variant() {
		let store = create_test_store().await;
		store.flags.create_flag(&flag_request("promo")).await.unwrap();
		let variant = store
			.variants
			.create_variant(&variant_request("promo", "foo"))
			.await
			.unwrap();

		let updated = store
			.variants
			.update_variant(&update_request(&variant, "foo", "foobar"))
			.await
			.unwrap();

		assert_eq!(updated.id, variant.id);
		assert_eq!(updated.flag_key, variant.flag_key);
		assert_eq!(updated.key, variant.key);
		assert_eq!(updated.name, variant.name);
		assert_eq!(updated.description.as_deref(), Some("foobar"));
		assert_eq!(updated.created_at, variant.created_at);
		assert!(updated.updated_at > variant.updated_at);

		let flag = store.flags.get_flag("promo").await.unwrap();
		assert_eq!(flag.variants, vec![updated]);
	}

	#[tokio::test]
	async fn test_update_variant_rename() {
		let store = create_test_store().await;
		store.flags.create_flag(&flag_request("promo")).await.unwrap();
		let variant = store
			.variants
			.create_variant(&variant_request("promo", "foo"))
			.await
			.unwrap();

		let renamed = store
			.variants
			.update_variant(&update_request(&variant, "baz", "bar"))
			.await
			.unwrap();
		assert_eq!(renamed.key, "baz");

		// The old key is free again.
		store
			.variants
			.create_variant(&variant_request("promo", "foo"))
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn test_update_variant_with_stale_timestamp() {
		let store = create_test_store().await;
		store.flags.create_flag(&flag_request("promo")).await.unwrap();
		let variant = store
			.variants
			.create_variant(&variant_request("promo", "foo"))
			.await
			.unwrap();
		store
			.variants
			.update_variant(&update_request(&variant, "foo", "first"))
			.await
			.unwrap();

		let mut req = update_request(&variant, "foo", "second");
		req.expected_updated_at = Some(variant.updated_at);
		let err = store.variants.update_variant(&req).await.unwrap_err();

		assert!(err.is_modified());
		assert_eq!(err.to_string(), "variant \"variant-1\" was modified concurrently");
		let flag = store.flags.get_flag("promo").await.unwrap();
		assert_eq!(flag.variants[0].description.as_deref(), Some("first"));
	}

	#[tokio::test]
	async fn test_update_variant_not_found() {
		let store = create_test_store().await;
		store.flags.create_flag(&flag_request("promo")).await.unwrap();

		let err = store
			.variants
			.update_variant(&UpdateVariantRequest {
				id: VariantId::from("foo"),
				flag_key: "promo".to_string(),
				key: "foo".to_string(),
				name: "foo".to_string(),
				description: Some("bar".to_string()),
				expected_updated_at: None,
			})
			.await
			.unwrap_err();

		assert!(err.is_not_found());
		assert_eq!(err.to_string(), "variant \"foo\" not found");
	}

	#[tokio::test]
	async fn test_update_variant_under_wrong_flag_is_not_found() {
		let store = create_test_store().await;
		store.flags.create_flag(&flag_request("promo")).await.unwrap();
		store.flags.create_flag(&flag_request("other")).await.unwrap();
		let variant = store
			.variants
			.create_variant(&variant_request("promo", "A"))
			.await
			.unwrap();

		let mut req = update_request(&variant, "A", "moved");
		req.flag_key = "other".to_string();
		let err = store.variants.update_variant(&req).await.unwrap_err();
		assert!(err.is_not_found());

		let promo = store.flags.get_flag("promo").await.unwrap();
		assert_eq!(promo.variants[0].description.as_deref(), Some("bar"));
	}

	#[tokio::test]
	async fn test_update_variant_duplicate_key() {
		let store = create_test_store().await;
		store.flags.create_flag(&flag_request("promo")).await.unwrap();
		let first = store
			.variants
			.create_variant(&variant_request("promo", "foo"))
			.await
			.unwrap();
		let second = store
			.variants
			.create_variant(&variant_request("promo", "bar"))
			.await
			.unwrap();

		let err = store
			.variants
			.update_variant(&update_request(&second, &first.key, "foobar"))
			.await
			.unwrap_err();

		assert!(err.is_already_exists());
		assert_eq!(err.to_string(), "variant \"foo\" is not unique");

		let flag = store.flags.get_flag("promo").await.unwrap();
		let keys: Vec<_> = flag.variants.iter().map(|v| v.key.as_str()).collect();
		assert_eq!(keys, vec!["foo", "bar"]);
	}

	#[tokio::test]
	async fn test_delete_variant() {
		let store = create_test_store().await;
		store.flags.create_flag(&flag_request("promo")).await.unwrap();
		let variant = store
			.variants
			.create_variant(&variant_request("promo", "foo"))
			.await
			.unwrap();

		store
			.variants
			.delete_variant(&variant.id, &variant.flag_key)
			.await
			.unwrap();

		let flag = store.flags.get_flag("promo").await.unwrap();
		assert!(flag.variants.is_empty());
	}

	#[tokio::test]
	async fn test_delete_variant_not_found() {
		let store = create_test_store().await;
		store.flags.create_flag(&flag_request("promo")).await.unwrap();

		store
			.variants
			.delete_variant(&VariantId::from("foo"), "promo")
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn test_delete_variant_existing_rule() {
		let store = create_test_store().await;
		store.flags.create_flag(&flag_request("promo")).await.unwrap();
		let variant = store
			.variants
			.create_variant(&variant_request("promo", "foo"))
			.await
			.unwrap();

		store.rules.add_rule(&variant.id);

		let err = store
			.variants
			.delete_variant(&variant.id, "promo")
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			FlagStoreError::ReferentialConflict { ref variant_id } if *variant_id == variant.id
		));
		assert_eq!(
			err.to_string(),
			"at least one rule exists that includes this variant"
		);
		assert_eq!(store.flags.get_flag("promo").await.unwrap().variants.len(), 1);

		store.rules.remove_rule(&variant.id);

		store
			.variants
			.delete_variant(&variant.id, "promo")
			.await
			.unwrap();
		assert!(store.flags.get_flag("promo").await.unwrap().variants.is_empty());
	}

	#[tokio::test]
	async fn test_delete_variant_rule_check_failure_propagates() {
		let pool = create_test_pool().await;
		let flags = crate::SqliteFlagRepository::new(pool.clone());
		let variants = SqliteVariantRepository::new(pool, Arc::new(UnreachableRules));

		flags.create_flag(&flag_request("promo")).await.unwrap();
		let variant = variants
			.create_variant(&variant_request("promo", "A"))
			.await
			.unwrap();

		let err = variants
			.delete_variant(&variant.id, "promo")
			.await
			.unwrap_err();
		assert!(matches!(err, FlagStoreError::RuleCheck(_)));
		assert_eq!(flags.get_flag("promo").await.unwrap().variants.len(), 1);
	}

	#[tokio::test]
	async fn test_default_ids_are_uuids() {
		let pool = create_test_pool().await;
		let flags = crate::SqliteFlagRepository::new(pool.clone());
		let variants = SqliteVariantRepository::new(pool, Arc::new(crate::NoRuleReferences));

		flags.create_flag(&flag_request("promo")).await.unwrap();
		let a = variants
			.create_variant(&variant_request("promo", "A"))
			.await
			.unwrap();
		let b = variants
			.create_variant(&variant_request("promo", "B"))
			.await
			.unwrap();

		assert_ne!(a.id, b.id);
		assert_eq!(a.id.as_str().len(), 36);
	}

	proptest! {
		#![proptest_config(ProptestConfig::with_cases(16))]

		#[test]
		fn variant_keys_unique_per_flag(
			ops in prop::collection::vec((0usize..2, "[ab]"), 1..12),
		) {
			tokio_test::block_on(async {
				let store = create_test_store().await;
				let flag_keys = ["left", "right"];
				for key in flag_keys {
					store.flags.create_flag(&flag_request(key)).await.unwrap();
				}

				let mut accepted = std::collections::HashSet::new();
				for (flag_idx, key) in &ops {
					let flag_key = flag_keys[*flag_idx];
					let result = store
						.variants
						.create_variant(&variant_request(flag_key, key))
						.await;
					if accepted.insert((flag_key, key.clone())) {
						assert!(result.is_ok());
					} else {
						assert!(result.unwrap_err().is_already_exists());
					}
				}

				for flag_key in flag_keys {
					let flag = store.flags.get_flag(flag_key).await.unwrap();
					let mut keys: Vec<_> = flag.variants.iter().map(|v| v.key.clone()).collect();
					let total = keys.len();
					keys.sort();
					keys.dedup();
					assert_eq!(keys.len(), total);
				}
			});
		}
	}
}
