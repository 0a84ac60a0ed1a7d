//! blastmap: acceptance-test blast radius analysis
//!
//! Statically analyzes Go acceptance tests for an infrastructure provider and
//! answers one question: if resource X changes, which tests must be re-run?
//! Uses tree-sitter for parsing and SQLite for storage.
//!
//! ## Features
//!
//! - Extraction of test functions, step tables and configuration builders
//! - Cross-file call resolution with lightweight receiver typing
//! - Cycle-safe call chain walking with service boundary tracking
//! - Sequential test-group links, with stubs for out-of-scope targets
//! - Direct, indirect and combined blast-radius queries
//!
//! ## MCP Tools
//!
//! - `blastmap_direct` - Literal mentions of a resource
//! - `blastmap_indirect` - Tests reaching a resource through call chains
//! - `blastmap_combined` - Union of both for several resources
//! - `blastmap_status` - Store statistics and loaded resources

pub mod build;
pub mod cli;
pub mod config;
pub mod extraction;
pub mod graph;
pub mod index;
pub mod mcp;
pub mod query;
pub mod sequential;
pub mod service;
pub mod store;
pub mod types;

pub use build::{build_store, build_store_from_sources, BuildStats, SourceFile};
pub use config::AnalysisConfig;
pub use query::BlastRadius;
pub use store::{Store, StoreError};
