//! # Detach Testkit
//!
//! Test utilities for Detach.
//!
//! This crate provides:
//! - A shop schema fixture with a class hierarchy, lazy back references and
//!   every container kind
//! - Property-based graph generators using proptest
//! - Graph assertions: isomorphism between an original and its copy, and
//!   disjointness of the two
//! - Log capture for tests
//!
//! ## Usage
//!
//! ```rust
//! use detach_testkit::prelude::*;
//!
//! let fixture = ShopFixture::populated();
//! let root = fixture.customer_proxy();
//! let copy = deep_copy(&root).unwrap();
//!
//! assert_isomorphic(&root, &copy);
//! assert_disjoint(&root, &copy);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod graph;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::graph::*;
    pub use crate::init_tracing;
    pub use detach_core::*;
}

pub use fixtures::*;
pub use generators::*;
pub use graph::*;

/// Installs a `tracing` subscriber that writes through the test harness.
///
/// The filter is read from `RUST_LOG` and defaults to `warn`. Calling this
/// more than once is harmless.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // Fails once a global subscriber is already installed.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init()
        .ok();
}
