//! Analysis configuration
//!
//! Defaults, overlaid by `.blastmap/config.json` when present, then by
//! `BLASTMAP_*` environment variables. Command-line arguments are applied last
//! by the caller.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extraction::filter::{
    DefaultTemplateFilter, DEFAULT_EXCLUDED_NAMES, DEFAULT_EXCLUDED_PREFIXES,
};
use crate::service::DEFAULT_SERVICE_MARKER;

pub const CONFIG_DIR: &str = ".blastmap";
pub const CONFIG_FILE: &str = "config.json";

pub const ENV_ROOT: &str = "BLASTMAP_ROOT";
pub const ENV_THREADS: &str = "BLASTMAP_THREADS";
pub const ENV_IN_MEMORY: &str = "BLASTMAP_IN_MEMORY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
}

/// Configuration for one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Root directory to analyze
    pub root: String,
    /// Resource types to search for; empty means every mentioned resource
    pub targets: Vec<String>,
    /// Extraction workers (0 = available parallelism)
    pub threads: usize,
    /// Method names never treated as configuration builders
    pub excluded_names: Vec<String>,
    /// Method name prefixes never treated as configuration builders
    pub excluded_prefixes: Vec<String>,
    /// File name suffix selecting test sources
    pub test_file_suffix: String,
    /// Directory component introducing a service directory
    pub service_marker: String,
    /// Directories to exclude
    pub exclude_dirs: Vec<String>,
    /// Whether to follow gitignore rules
    pub respect_gitignore: bool,
    /// Keep the store in memory instead of persisting it
    pub in_memory: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            targets: Vec::new(),
            threads: 0,
            excluded_names: DEFAULT_EXCLUDED_NAMES.iter().map(|s| s.to_string()).collect(),
            excluded_prefixes: DEFAULT_EXCLUDED_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            test_file_suffix: "_test.go".to_string(),
            service_marker: DEFAULT_SERVICE_MARKER.to_string(),
            exclude_dirs: vec![
                "vendor".to_string(),
                ".git".to_string(),
                "testdata".to_string(),
                CONFIG_DIR.to_string(),
            ],
            respect_gitignore: true,
            in_memory: false,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration for a project root
    pub fn load(project_root: &str) -> Result<Self, ConfigError> {
        let path = config_path(project_root);
        let mut config = if path.is_file() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.root = project_root.to_string();
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay environment variables read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_ROOT) {
            self.root = root;
        }
        if let Some(value) = lookup(ENV_THREADS) {
            self.threads = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_THREADS.to_string(),
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(ENV_IN_MEMORY) {
            self.in_memory = matches!(value.trim(), "1" | "true" | "yes");
        }
        Ok(())
    }

    pub fn template_filter(&self) -> DefaultTemplateFilter {
        DefaultTemplateFilter::new()
            .with_excluded_names(self.excluded_names.iter().cloned())
            .with_excluded_prefixes(self.excluded_prefixes.iter().cloned())
    }

    pub fn worker_threads(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Path of the configuration file for a project root
pub fn config_path(project_root: &str) -> PathBuf {
    PathBuf::from(project_root).join(CONFIG_DIR).join(CONFIG_FILE)
}
