// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use flagstore_config::DatabaseConfig;
use flagstore_core::{Clock, CreateFlagRequest, IdGenerator, VariantId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::{FlagStoreError, Result};
use crate::pool::create_pool;
use crate::rules::RuleReferenceChecker;
use crate::schema::create_schema;
use crate::{SqliteFlagRepository, SqliteVariantRepository};

pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str(":memory:")
		.unwrap()
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.expect("Failed to create test pool");

	create_schema(&pool).await.unwrap();
	pool
}

/// Clock that moves forward by one second every time it is read.
pub struct StepClock {
	next: Mutex<DateTime<Utc>>,
}

impl StepClock {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			next: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
		})
	}

	/// Move the clock back, for checking that `updated_at` never regresses.
	pub fn rewind(&self, by: Duration) {
		let mut next = self.next.lock().unwrap();
		*next -= by;
	}
}

impl Clock for StepClock {
	fn now(&self) -> DateTime<Utc> {
		let mut next = self.next.lock().unwrap();
		let now = *next;
		*next += Duration::seconds(1);
		now
	}
}

/// Ids of the form `variant-1`, `variant-2`, ...
#[derive(Default)]
pub struct SequentialIds {
	next: AtomicU64,
}

impl IdGenerator for SequentialIds {
	fn new_id(&self) -> String {
		format!("variant-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1)
	}
}

/// Stand-in for the rule engine: a set of referenced variant ids.
#[derive(Default)]
pub struct FakeRules {
	referenced: Mutex<HashSet<VariantId>>,
}

impl FakeRules {
	pub fn add_rule(&self, variant_id: &VariantId) {
		self.referenced.lock().unwrap().insert(variant_id.clone());
	}

	pub fn remove_rule(&self, variant_id: &VariantId) {
		self.referenced.lock().unwrap().remove(variant_id);
	}
}

#[async_trait]
impl RuleReferenceChecker for FakeRules {
	async fn exists_rule_referencing(&self, variant_id: &VariantId) -> Result<bool> {
		Ok(self.referenced.lock().unwrap().contains(variant_id))
	}
}

/// Rule engine that is down.
pub struct UnreachableRules;

#[async_trait]
impl RuleReferenceChecker for UnreachableRules {
	async fn exists_rule_referencing(&self, _variant_id: &VariantId) -> Result<bool> {
		Err(FlagStoreError::RuleCheck("rule engine unavailable".into()))
	}
}

pub struct TestStore {
	pub pool: SqlitePool,
	pub clock: Arc<StepClock>,
	pub rules: Arc<FakeRules>,
	pub flags: SqliteFlagRepository,
	pub variants: SqliteVariantRepository,
}

pub async fn create_test_store() -> TestStore {
	build_test_store(create_test_pool().await)
}

/// Store on a database file with a real multi-connection pool, for tests
/// where writers must actually race.
pub async fn create_file_store(dir: &tempfile::TempDir, max_connections: u32) -> TestStore {
	let config = DatabaseConfig {
		url: format!("sqlite:{}", dir.path().join("flags.db").display()),
		max_connections,
		..Default::default()
	};
	let pool = create_pool(&config).await.unwrap();
	create_schema(&pool).await.unwrap();
	build_test_store(pool)
}

fn build_test_store(pool: SqlitePool) -> TestStore {
	let clock = StepClock::new();
	let rules = Arc::new(FakeRules::default());

	let flags = SqliteFlagRepository::new(pool.clone()).with_clock(clock.clone());
	let variants = SqliteVariantRepository::new(pool.clone(), rules.clone())
		.with_clock(clock.clone())
		.with_id_generator(Arc::new(SequentialIds::default()));

	TestStore {
		pool,
		clock,
		rules,
		flags,
		variants,
	}
}

pub fn flag_request(key: &str) -> CreateFlagRequest {
	CreateFlagRequest {
		key: key.to_string(),
		name: "foo".to_string(),
		description: Some("bar".to_string()),
		enabled: true,
	}
}
