//! Corpus-wide symbol index
//!
//! Merges per-file extraction records into lookups keyed by (struct, name).
//! Built once, after every file has been extracted, by a single thread walking
//! the records in path order so duplicate resolution is reproducible.

use std::collections::HashMap;

use tracing::warn;

use crate::types::{ConfigFunctionDecl, FileAnalysis, TestFunctionDecl};

/// Struct name recorded for test functions that never bind a struct literal
pub const NO_STRUCT: &str = "(none)";

/// Position of a declaration inside the analyzed records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclRef {
    pub file: usize,
    pub function: usize,
}

/// Lookup tables over every declared test and configuration function
pub struct SymbolIndex<'a> {
    files: &'a [FileAnalysis],
    configs: HashMap<(String, String), DeclRef>,
    tests: HashMap<(String, String), DeclRef>,
    tests_by_name: HashMap<String, Vec<DeclRef>>,
    duplicates: usize,
}

impl<'a> SymbolIndex<'a> {
    /// Build the index. `files` must already be sorted by path.
    pub fn build(files: &'a [FileAnalysis]) -> Self {
        let mut index = Self {
            files,
            configs: HashMap::new(),
            tests: HashMap::new(),
            tests_by_name: HashMap::new(),
            duplicates: 0,
        };

        for (file_idx, file) in files.iter().enumerate() {
            for (fn_idx, func) in file.config_functions.iter().enumerate() {
                let key = (func.struct_name.clone(), func.name.clone());
                let decl = DeclRef {
                    file: file_idx,
                    function: fn_idx,
                };
                if let Some(existing) = index.configs.get(&key) {
                    warn!(
                        "Duplicate configuration function {}.{} in {} (keeping {})",
                        key.0, key.1, file.path, files[existing.file].path
                    );
                    index.duplicates += 1;
                    continue;
                }
                index.configs.insert(key, decl);
            }

            for (fn_idx, test) in file.test_functions.iter().enumerate() {
                let key = (test_struct(test).to_string(), test.name.clone());
                let decl = DeclRef {
                    file: file_idx,
                    function: fn_idx,
                };
                if let Some(existing) = index.tests.get(&key) {
                    warn!(
                        "Duplicate test function {} in {} (keeping {})",
                        key.1, file.path, files[existing.file].path
                    );
                    index.duplicates += 1;
                    continue;
                }
                index.tests.insert(key, decl);
                index
                    .tests_by_name
                    .entry(test.name.clone())
                    .or_default()
                    .push(decl);
            }
        }

        index
    }

    pub fn files(&self) -> &'a [FileAnalysis] {
        self.files
    }

    pub fn file(&self, decl: DeclRef) -> &'a FileAnalysis {
        &self.files[decl.file]
    }

    pub fn config_decl(&self, decl: DeclRef) -> &'a ConfigFunctionDecl {
        &self.files[decl.file].config_functions[decl.function]
    }

    pub fn test_decl(&self, decl: DeclRef) -> &'a TestFunctionDecl {
        &self.files[decl.file].test_functions[decl.function]
    }

    /// Configuration function declared on `struct_name` with `name`
    pub fn config(&self, struct_name: &str, name: &str) -> Option<DeclRef> {
        self.configs
            .get(&(struct_name.to_string(), name.to_string()))
            .copied()
    }

    /// Test function bound to `struct_name` with `name`
    pub fn test(&self, struct_name: &str, name: &str) -> Option<DeclRef> {
        self.tests
            .get(&(struct_name.to_string(), name.to_string()))
            .copied()
    }

    /// Test function by bare name, preferring the caller's file, then its service
    pub fn test_by_name(&self, name: &str, from_file: usize) -> Option<DeclRef> {
        let candidates = self.tests_by_name.get(name)?;

        if let Some(same_file) = candidates.iter().find(|c| c.file == from_file) {
            return Some(*same_file);
        }

        let service = self.files.get(from_file).map(|f| f.service.as_str());
        if let Some(same_service) = candidates
            .iter()
            .find(|c| Some(self.files[c.file].service.as_str()) == service)
        {
            return Some(*same_service);
        }

        candidates.first().copied()
    }

    /// Test function by name within one service, for package-qualified targets
    pub fn test_in_service(&self, name: &str, service: &str) -> Option<DeclRef> {
        self.tests_by_name
            .get(name)?
            .iter()
            .find(|c| self.files[c.file].service == service)
            .copied()
    }

    /// Every indexed configuration function, in path then declaration order
    pub fn config_refs(&self) -> Vec<DeclRef> {
        let mut refs: Vec<DeclRef> = self.configs.values().copied().collect();
        refs.sort();
        refs
    }

    /// Every indexed test function, in path then declaration order
    pub fn test_refs(&self) -> Vec<DeclRef> {
        let mut refs: Vec<DeclRef> = self.tests.values().copied().collect();
        refs.sort();
        refs
    }

    pub fn config_count(&self) -> usize {
        self.configs.len()
    }

    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// Declarations dropped because an earlier file declared the same key
    pub fn duplicate_count(&self) -> usize {
        self.duplicates
    }
}

/// Struct a test function is keyed under
pub fn test_struct(test: &TestFunctionDecl) -> &str {
    test.struct_name.as_deref().unwrap_or(NO_STRUCT)
}
