//! # idbkv Testkit
//!
//! Test utilities for idbkv.
//!
//! This crate provides:
//! - Store fixtures with automatic cleanup
//! - Property-based test generators using proptest
//! - A model-checked harness for record and cursor behavior
//! - Golden vectors for the persisted key encodings
//! - A tracing subscriber for tests
//!
//! ## Usage
//!
//! ```rust
//! use idbkv_codec::Key;
//! use idbkv_testkit::prelude::*;
//!
//! with_temp_store(|store| {
//!     let scope = StoreScope::create(store, "db", "os");
//!     let txn = store.begin();
//!     store.put_record(&txn, scope.database_id, scope.object_store_id, &Key::number(1.0), b"v").unwrap();
//!     txn.commit().unwrap();
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod model;
pub mod tracing;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
    pub use crate::tracing::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use model::*;
pub use tracing::*;
pub use vectors::*;
