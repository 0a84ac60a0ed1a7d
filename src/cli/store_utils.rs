//! Store path, file discovery and initialization utilities

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use tracing::warn;

use crate::config::{AnalysisConfig, CONFIG_DIR};
use crate::store::Store;

const STORE_FILE: &str = "store.db";

/// Get the store path for a project root
pub fn store_path(project_root: &str) -> PathBuf {
    PathBuf::from(project_root).join(CONFIG_DIR).join(STORE_FILE)
}

/// Load the persisted store for a project, read-only
pub fn load_project_store(project_root: &str) -> Result<Store> {
    let path = store_path(project_root);
    Store::load(&path).with_context(|| format!("Failed to load store {}", path.display()))
}

/// Canonicalize and validate a path
pub fn canonicalize_path(path: &str) -> Result<String> {
    let canonical = Path::new(path).canonicalize().context("Invalid path")?;
    Ok(canonical.display().to_string())
}

/// Candidate test files under the configured root
pub fn discover_files(config: &AnalysisConfig) -> Result<Vec<PathBuf>> {
    let root = Path::new(&config.root)
        .canonicalize()
        .with_context(|| format!("Invalid root {}", config.root))?;

    let mut walker = WalkBuilder::new(&root);
    walker
        .hidden(false)
        .git_ignore(config.respect_gitignore)
        .git_global(config.respect_gitignore)
        .git_exclude(config.respect_gitignore);

    let mut files = Vec::new();
    for entry in walker.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!("Error walking directory: {}", err);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if !name.ends_with(&config.test_file_suffix) {
            continue;
        }

        let rel = path.strip_prefix(&root).unwrap_or(path);
        let excluded = rel.components().any(|c| {
            let part = c.as_os_str().to_string_lossy();
            config.exclude_dirs.iter().any(|d| *d == part)
        });
        if excluded {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}
