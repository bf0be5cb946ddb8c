// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use uuid::Uuid;

/// Produces globally unique identifiers for new variants.
pub trait IdGenerator: Send + Sync {
	fn new_id(&self) -> String;
}

/// Random UUIDv4 ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
	fn new_id(&self) -> String {
		Uuid::new_v4().to_string()
	}
}
