//! Shared configuration and test utilities for the delivery workspace.
//!
//! - Typed config loading with `!include` support
//! - Database test helpers (migrations, truncation, seed rows)

pub mod config;
pub mod yaml_include;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

#[cfg(any(test, feature = "test-helpers"))]
pub use test_helpers::{
    create_test_pool, generate_unique_id, get_test_database_url, setup_test_environment,
    truncate_order_tables,
};
