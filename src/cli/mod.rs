//! CLI command implementations
//!
//! Handles all command-line interface operations:
//! - build: Analyze a test tree and persist the store
//! - query: Run blast-radius queries against a persisted store
//! - status: Show store statistics

mod commands;
mod store_utils;

pub use commands::*;
pub use store_utils::*;
