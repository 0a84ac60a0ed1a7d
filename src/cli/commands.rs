//! Command implementations for CLI operations

use anyhow::{Context, Result};
use tracing::info;

use crate::build::build_store;
use crate::config::AnalysisConfig;
use crate::mcp::format::{
    format_capabilities, format_rows_markdown, format_run_plan, format_stats,
};
use crate::query::BlastRadius;
use crate::store::Store;

use super::store_utils::{canonicalize_path, discover_files, load_project_store, store_path};

/// Analyze a test tree and persist the store
pub fn build_command(path: &str, targets: &[String]) -> Result<()> {
    let project_root = canonicalize_path(path)?;
    let mut config = AnalysisConfig::load(&project_root)?;
    if !targets.is_empty() {
        config.targets = targets.to_vec();
    }

    let files = discover_files(&config)?;
    let store = Store::in_memory()?;
    let stats = build_store(&store, &files, &config)?;

    println!("\nBuild complete!");
    println!("  Files analyzed: {}", stats.files);
    println!("  Files parsed: {}", stats.parsed);
    println!("  Files skipped: {}", stats.skipped);
    if stats.failed > 0 {
        println!("  Files with errors: {}", stats.failed);
    }
    println!("  Resources: {}", stats.resources);
    println!("  Test functions: {}", stats.test_functions);
    println!("  Config functions: {}", stats.config_functions);
    println!("  Test steps: {}", stats.test_steps);
    println!(
        "  Chain edges: {} ({} cross services)",
        stats.chain_edges, stats.crossing_edges
    );
    println!("  Sequential links: {}", stats.sequential_references);
    println!("  Stubs: {}", stats.stubs);
    println!("  Unresolved calls: {}", stats.unresolved_calls);

    if config.in_memory {
        info!("In-memory mode, store not persisted");
    } else {
        let path = store_path(&project_root);
        store
            .save(&path)
            .with_context(|| format!("Failed to save store to {}", path.display()))?;
        println!("  Store: {}", path.display());
    }

    if !config.targets.is_empty() {
        let plans = BlastRadius::new(&store).run_plan(&config.targets)?;
        println!("\n{}", format_run_plan(&plans));
    }

    Ok(())
}

/// Run a query against the persisted store.
///
/// With no operation, lists the available operations and loaded resources.
pub fn query_command(path: &str, operation: Option<&str>, resources: &[String]) -> Result<()> {
    let project_root = canonicalize_path(path)?;
    let store = load_project_store(&project_root)?;
    let query = BlastRadius::new(&store);

    let Some(operation) = operation else {
        println!("{}", format_capabilities(&query.describe()?));
        return Ok(());
    };

    if resources.is_empty() {
        eprintln!("Usage: blastmap query {} <resource>...", operation);
        return Ok(());
    }

    match operation {
        "direct" => {
            for resource in resources {
                let rows = query.direct(resource)?;
                let title = format!("Direct references to {}", resource);
                println!("{}", format_rows_markdown(&title, &rows));
            }
        }
        "indirect" => {
            for resource in resources {
                let rows = query.indirect(resource)?;
                let title = format!("Tests affected by {}", resource);
                println!("{}", format_rows_markdown(&title, &rows));
            }
        }
        "combined" => {
            let rows = query.combined(resources)?;
            let title = format!("Blast radius of {}", resources.join(", "));
            println!("{}", format_rows_markdown(&title, &rows));
            println!("{}", format_run_plan(&query.run_plan(resources)?));
        }
        other => {
            eprintln!("Unknown query operation: {}", other);
            println!("{}", format_capabilities(&query.describe()?));
        }
    }

    Ok(())
}

/// Show store statistics for a project
pub fn status_command(path: &str) -> Result<()> {
    let project_root = canonicalize_path(path)?;
    let path = store_path(&project_root);

    if !path.exists() {
        println!("No store found at {}", path.display());
        println!("Run 'blastmap build {}' first.", project_root);
        return Ok(());
    }

    let store = load_project_store(&project_root)?;
    println!("Store: {}", path.display());
    println!("{}", format_stats(&store.stats()?));

    let violations = store.verify_integrity()?;
    if !violations.is_empty() {
        println!("Integrity: {} foreign key violations", violations.len());
    }

    Ok(())
}

/// Initialize the store for MCP server mode.
///
/// Loads the persisted store when one exists; otherwise, or when in-memory
/// mode is requested, builds one in memory from the project tree.
pub fn initialize_server_store(in_memory: bool) -> Result<(String, Store)> {
    let project_root = std::env::var(crate::config::ENV_ROOT)
        .or_else(|_| std::env::current_dir().map(|p| p.display().to_string()))
        .context("Could not determine project root")?;
    let project_root = canonicalize_path(&project_root)?;

    let mut config = AnalysisConfig::load(&project_root)?;
    config.in_memory |= in_memory;

    let path = store_path(&project_root);
    if !config.in_memory && path.exists() {
        let store = load_project_store(&project_root)?;
        let resources = store.resource_names()?;
        info!("Store loaded: {} resources", resources.len());
        return Ok((project_root, store));
    }

    info!("Building in-memory store (no filesystem writes)");
    let files = discover_files(&config)?;
    let store = Store::in_memory()?;
    let stats = build_store(&store, &files, &config)?;
    info!(
        "Store built: {} files, {} tests, {} chain edges",
        stats.files, stats.test_functions, stats.chain_edges
    );

    Ok((project_root, store))
}
