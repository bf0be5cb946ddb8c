// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the flagstore flag and variant configuration store.
//!
//! This crate provides the records, request shapes and injectable
//! collaborators shared by the storage layer (`flagstore-store`) and its
//! callers.
//!
//! # Overview
//!
//! - [`Flag`] is identified by a caller-supplied key that is unique across
//!   all flags and never changes.
//! - [`Variant`] belongs to exactly one flag. Its key is unique among the
//!   variants of that flag only; its [`VariantId`] is generated.
//! - [`Clock`] and [`IdGenerator`] supply timestamps and ids so tests can
//!   substitute deterministic implementations.
//!
//! # Example
//!
//! ```
//! use flagstore_core::{CreateFlagRequest, Page};
//!
//! let req = CreateFlagRequest {
//!     key: "promo".to_string(),
//!     name: "Promo banner".to_string(),
//!     description: None,
//!     enabled: true,
//! };
//! assert!(req.validate().is_ok());
//!
//! // The second flag only.
//! let page = Page::new(1, 1);
//! assert_eq!(page.sql_limit(), 1);
//! ```

pub mod clock;
pub mod error;
pub mod flag;
pub mod id;
pub mod request;

pub use clock::{Clock, SystemClock};
pub use error::{FlagsError, Result};
pub use flag::{EntityKind, Flag, Variant, VariantId};
pub use id::{IdGenerator, UuidGenerator};
pub use request::{
	CreateFlagRequest, CreateVariantRequest, Page, UpdateFlagRequest, UpdateVariantRequest,
};
