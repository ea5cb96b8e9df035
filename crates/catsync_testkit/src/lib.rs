//! # Catalog Sync Testkit
//!
//! Test utilities for catalog sync.
//!
//! This crate provides:
//! - Property-based test generators using proptest
//! - A loopback fixture wiring the engine to the reference server
//! - Canned reconciliation scenarios
//!
//! ## Usage
//!
//! ```rust,ignore
//! use catsync_testkit::prelude::*;
//!
//! #[test]
//! fn converges() {
//!     let catalog = TestCatalog::new();
//!     let outcome = catalog.reconciler.reconcile(TEST_CATALOG_TYPE, &scenario_desired()).unwrap();
//!     assert_eq!(outcome.model.len(), 2);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
