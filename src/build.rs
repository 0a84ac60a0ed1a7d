//! Two-stage store build
//!
//! Stage A extracts every file in parallel, one parser per worker. Stage B
//! runs on the calling thread once every record is in: symbol index, call
//! resolution, chain walking, sequential links and store population, all in
//! one transaction so surrogate ids are reproducible.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::extraction::filter::TemplateFilter;
use crate::extraction::Extractor;
use crate::graph::{resolve_call, CallGraph, CallScope, ChainWalker};
use crate::index::{test_struct, DeclRef, SymbolIndex};
use crate::sequential::{resolve_links, SequentialTarget, StubTarget};
use crate::service::service_for_path;
use crate::store::{NewChainEdge, NewTestStep, Store};
use crate::types::{FileAnalysis, ReferenceType};

/// One source file handed to the extractor
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// Summary of a build
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildStats {
    pub files: u64,
    pub parsed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub resources: u64,
    pub test_functions: u64,
    pub config_functions: u64,
    pub duplicates: u64,
    pub direct_references: u64,
    pub test_steps: u64,
    pub unresolved_steps: u64,
    pub chain_edges: u64,
    pub crossing_edges: u64,
    pub unresolved_calls: u64,
    pub sequential_references: u64,
    pub stubs: u64,
}

/// Build the store from candidate files on disk
pub fn build_store(store: &Store, paths: &[PathBuf], config: &AnalysisConfig) -> Result<BuildStats> {
    let root = Path::new(&config.root);
    info!("Analyzing {} candidate files under {}", paths.len(), root.display());

    let (analyses, skipped) = extract_paths(paths, root, config)?;
    let mut stats = populate_store(store, &analyses, config)?;
    stats.skipped = skipped;
    Ok(stats)
}

/// Build the store from in-memory sources
pub fn build_store_from_sources(
    store: &Store,
    sources: &[SourceFile],
    config: &AnalysisConfig,
) -> Result<BuildStats> {
    let analyses = extract_sources(sources, config)?;
    populate_store(store, &analyses, config)
}

fn worker_pool(config: &AnalysisConfig) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads())
        .build()
        .context("Failed to build extraction worker pool")
}

fn template_filter(config: &AnalysisConfig) -> Arc<dyn TemplateFilter> {
    Arc::new(config.template_filter())
}

/// Stage A over files on disk; unreadable files are skipped and counted
pub fn extract_paths(
    paths: &[PathBuf],
    root: &Path,
    config: &AnalysisConfig,
) -> Result<(Vec<FileAnalysis>, u64)> {
    let filter = template_filter(config);
    let pool = worker_pool(config)?;

    let results: Vec<Option<FileAnalysis>> = pool.install(|| {
        paths
            .par_iter()
            .map_init(
                || Extractor::with_filter(filter.clone()),
                |extractor, path| {
                    let content = match std::fs::read_to_string(path) {
                        Ok(c) => c,
                        Err(err) => {
                            warn!("Failed to read {}: {}", path.display(), err);
                            return None;
                        }
                    };
                    let rel_path = relative_path(path, root);
                    let service = service_for_path(&rel_path, &config.service_marker);
                    debug!("Extracting: {}", rel_path);
                    Some(extractor.extract_file(&rel_path, &service, &content))
                },
            )
            .collect()
    });

    let skipped = results.iter().filter(|r| r.is_none()).count() as u64;
    let mut analyses: Vec<FileAnalysis> = results.into_iter().flatten().collect();
    analyses.sort_by(|a, b| a.path.cmp(&b.path));
    Ok((analyses, skipped))
}

/// Stage A over in-memory sources
pub fn extract_sources(sources: &[SourceFile], config: &AnalysisConfig) -> Result<Vec<FileAnalysis>> {
    let filter = template_filter(config);
    let pool = worker_pool(config)?;

    let mut analyses: Vec<FileAnalysis> = pool.install(|| {
        sources
            .par_iter()
            .map_init(
                || Extractor::with_filter(filter.clone()),
                |extractor, source| {
                    let service = service_for_path(&source.path, &config.service_marker);
                    extractor.extract_file(&source.path, &service, &source.content)
                },
            )
            .collect()
    });
    analyses.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(analyses)
}

/// Path relative to the analysis root with `/` separators
fn relative_path(path: &Path, root: &Path) -> String {
    let rel = match (path.canonicalize(), root.canonicalize()) {
        (Ok(abs), Ok(abs_root)) => abs
            .strip_prefix(&abs_root)
            .map(Path::to_path_buf)
            .unwrap_or(abs),
        _ => path.strip_prefix(root).unwrap_or(path).to_path_buf(),
    };
    rel.display().to_string().replace('\\', "/")
}

/// Stage B: index, resolve and write everything into the store
pub fn populate_store(
    store: &Store,
    analyses: &[FileAnalysis],
    config: &AnalysisConfig,
) -> Result<BuildStats> {
    let mut stats = BuildStats {
        files: analyses.len() as u64,
        ..Default::default()
    };
    for analysis in analyses {
        if analysis.errors.is_empty() {
            stats.parsed += 1;
        } else {
            stats.failed += 1;
            for err in &analysis.errors {
                warn!(
                    "{}:{}: {}",
                    err.file_path,
                    err.line.map(|l| l.to_string()).unwrap_or_default(),
                    err.message
                );
            }
        }
    }

    store.clear().context("Failed to clear store")?;
    store.begin_transaction()?;

    let index = SymbolIndex::build(analyses);
    debug!(
        "Symbol index: {} tests, {} configuration functions",
        index.test_count(),
        index.config_count()
    );
    let mut writer = StoreWriter::new(store, &index);
    match writer.write_all(config, &mut stats) {
        Ok(()) => store.commit()?,
        Err(err) => {
            store.rollback()?;
            return Err(err);
        }
    }

    let violations = store.verify_integrity()?;
    if !violations.is_empty() {
        bail!(
            "Store has {} foreign key violations (first in {})",
            violations.len(),
            violations[0].table
        );
    }

    info!(
        "Build complete: {} files, {} tests, {} config functions, {} steps, {} chain edges",
        stats.files, stats.test_functions, stats.config_functions, stats.test_steps, stats.chain_edges
    );
    Ok(stats)
}

/// Stage B writer: owns the natural-key to surrogate-id maps
struct StoreWriter<'s, 'a> {
    store: &'s Store,
    index: &'s SymbolIndex<'a>,
    resources: BTreeMap<String, i64>,
    services: HashMap<String, i64>,
    structs: HashMap<String, i64>,
    files: HashMap<usize, i64>,
    tests: HashMap<DeclRef, i64>,
    configs: HashMap<DeclRef, i64>,
    stubs: HashMap<StubTarget, i64>,
}

impl<'s, 'a> StoreWriter<'s, 'a> {
    fn new(store: &'s Store, index: &'s SymbolIndex<'a>) -> Self {
        Self {
            store,
            index,
            resources: BTreeMap::new(),
            services: HashMap::new(),
            structs: HashMap::new(),
            files: HashMap::new(),
            tests: HashMap::new(),
            configs: HashMap::new(),
            stubs: HashMap::new(),
        }
    }

    fn write_all(&mut self, config: &AnalysisConfig, stats: &mut BuildStats) -> Result<()> {
        self.write_resources(config)?;
        stats.resources = self.resources.len() as u64;
        stats.duplicates = self.index.duplicate_count() as u64;

        self.write_registrations()?;
        self.write_functions(stats)?;

        let graph = CallGraph::build(self.index);
        for call in graph.unresolved() {
            let caller = self.configs[&call.caller];
            self.store
                .insert_unresolved_call(caller, &call.site.receiver, &call.site.method, call.site.line)?;
            stats.unresolved_calls += 1;
        }

        self.write_steps(&graph, stats)?;
        self.write_sequential(stats)?;
        Ok(())
    }

    fn service_id(&mut self, name: &str) -> Result<i64> {
        if let Some(id) = self.services.get(name) {
            return Ok(*id);
        }
        let id = self.store.get_or_create_service(name)?;
        self.services.insert(name.to_string(), id);
        Ok(id)
    }

    fn struct_id(&mut self, name: &str) -> Result<i64> {
        if let Some(id) = self.structs.get(name) {
            return Ok(*id);
        }
        let id = self.store.get_or_create_struct(name)?;
        self.structs.insert(name.to_string(), id);
        Ok(id)
    }

    fn file_id(&mut self, file: usize) -> Result<i64> {
        if let Some(id) = self.files.get(&file) {
            return Ok(*id);
        }
        let analysis = &self.index.files()[file];
        let service = self.service_id(&analysis.service)?;
        let id = self.store.get_or_create_file(&analysis.path, service)?;
        self.files.insert(file, id);
        Ok(id)
    }

    fn file_service_id(&mut self, file: usize) -> Result<i64> {
        let service = self.index.files()[file].service.clone();
        self.service_id(&service)
    }

    /// Configured targets, or every resource a configuration function names
    fn write_resources(&mut self, config: &AnalysisConfig) -> Result<()> {
        let names: BTreeSet<String> = if config.targets.is_empty() {
            self.index
                .config_refs()
                .into_iter()
                .flat_map(|decl| self.index.config_decl(decl).mentions.iter())
                .map(|m| m.resource.clone())
                .collect()
        } else {
            config.targets.iter().cloned().collect()
        };

        for name in names {
            let id = self.store.get_or_create_resource(&name)?;
            self.resources.insert(name, id);
        }
        Ok(())
    }

    fn write_registrations(&mut self) -> Result<()> {
        for analysis in self.index.files() {
            if analysis.registrations.is_empty() {
                continue;
            }
            let service = self.service_id(&analysis.service)?;
            for registration in &analysis.registrations {
                self.store
                    .get_or_create_registration(&registration.resource, service)?;
            }
        }
        Ok(())
    }

    fn write_functions(&mut self, stats: &mut BuildStats) -> Result<()> {
        for decl in self.index.test_refs() {
            let test = self.index.test_decl(decl);
            let file = self.file_id(decl.file)?;
            let st = self.struct_id(test_struct(test))?;
            let id = self.store.insert_test_function(file, st, &test.name, test.line)?;
            self.tests.insert(decl, id);
            stats.test_functions += 1;
        }

        for decl in self.index.config_refs() {
            let func = self.index.config_decl(decl);
            let file = self.file_id(decl.file)?;
            let st = self.struct_id(&func.struct_name)?;
            let visibility = if func.exported {
                ReferenceType::Exported
            } else {
                ReferenceType::Unexported
            };
            let id = self.store.insert_config_function(
                file,
                st,
                &func.name,
                func.receiver_kind,
                func.returns_text,
                func.line,
                visibility,
            )?;
            self.configs.insert(decl, id);
            stats.config_functions += 1;

            for mention in &func.mentions {
                let Some(resource) = self.resources.get(&mention.resource) else {
                    continue;
                };
                self.store.insert_direct_reference(
                    id,
                    *resource,
                    mention.style.reference_type(),
                    &mention.context,
                    mention.line,
                )?;
                stats.direct_references += 1;
            }
        }
        Ok(())
    }

    /// Target resources each configuration function names directly
    fn target_mentions(&self) -> HashMap<DeclRef, BTreeSet<String>> {
        let mut mentions: HashMap<DeclRef, BTreeSet<String>> = HashMap::new();
        for decl in self.index.config_refs() {
            let names: BTreeSet<String> = self
                .index
                .config_decl(decl)
                .mentions
                .iter()
                .filter(|m| self.resources.contains_key(&m.resource))
                .map(|m| m.resource.clone())
                .collect();
            if !names.is_empty() {
                mentions.insert(decl, names);
            }
        }
        mentions
    }

    fn write_steps(&mut self, graph: &CallGraph<'a>, stats: &mut BuildStats) -> Result<()> {
        let mentions = self.target_mentions();
        let walker = ChainWalker::new(graph, &mentions);

        for decl in self.index.test_refs() {
            let test = self.index.test_decl(decl);
            let test_id = self.tests[&decl];
            let scope = CallScope {
                file: decl.file,
                receiver_struct: None,
                bindings: &test.bindings,
            };

            for step in &test.steps {
                let Some(call) = &step.call else {
                    continue;
                };
                let resolution = resolve_call(self.index, call, &scope);
                let Some(target) = resolution.target() else {
                    debug!(
                        "Unresolved step {} of {}: {}.{}",
                        step.index, test.name, call.receiver, call.method
                    );
                    stats.unresolved_steps += 1;
                    continue;
                };

                let target_decl = self.index.config_decl(target);
                let same_file = target.file == decl.file;
                let same_struct = target_decl.struct_name == test_struct(test);
                let step_id = self.store.insert_test_step(&NewTestStep {
                    test_function_id: test_id,
                    config_function_id: self.configs[&target],
                    step_index: step.index,
                    target_struct_id: self.struct_id(&target_decl.struct_name)?,
                    target_service_id: self.file_service_id(target.file)?,
                    reference_type: ReferenceType::for_step(same_file, same_struct),
                    line: step.line,
                })?;
                stats.test_steps += 1;

                for edge in walker.walk(target, resolution) {
                    let source_service = self.file_service_id(edge.source.file)?;
                    let target_service = self.file_service_id(edge.target.file)?;
                    let crosses = source_service != target_service;
                    let edge_id = self.store.insert_chain_edge(&NewChainEdge {
                        test_step_id: step_id,
                        source_function_id: self.configs[&edge.source],
                        target_function_id: self.configs[&edge.target],
                        source_service_id: source_service,
                        target_service_id: target_service,
                        depth: edge.depth,
                        crosses_boundary: crosses,
                        resolution: edge.resolution.reference_type(),
                    })?;
                    stats.chain_edges += 1;
                    if crosses {
                        stats.crossing_edges += 1;
                    }

                    for resource in &edge.closure {
                        if let Some(resource_id) = self.resources.get(resource) {
                            self.store.insert_closure(edge_id, *resource_id)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn write_sequential(&mut self, stats: &mut BuildStats) -> Result<()> {
        for decl in self.index.test_refs() {
            if self.index.test_decl(decl).sequential.is_empty() {
                continue;
            }
            let entry_id = self.tests[&decl];

            for link in resolve_links(self.index, decl) {
                let (target_id, reference_type) = match link.target {
                    SequentialTarget::Indexed(found) => {
                        (self.tests[&found], ReferenceType::SequentialRun)
                    }
                    SequentialTarget::Stub(stub) => {
                        (self.stub_id(stub, stats)?, ReferenceType::ExternalStub)
                    }
                };
                self.store.insert_sequential_reference(
                    entry_id,
                    target_id,
                    &link.entry.group,
                    &link.entry.key,
                    reference_type,
                )?;
                stats.sequential_references += 1;
            }
        }
        Ok(())
    }

    /// Stub test function, created once per target
    fn stub_id(&mut self, stub: StubTarget, stats: &mut BuildStats) -> Result<i64> {
        if let Some(id) = self.stubs.get(&stub) {
            return Ok(*id);
        }
        let service = self.service_id(&stub.service)?;
        let file = self.store.get_or_create_file(&stub.file_path, service)?;
        let st = self.struct_id(&stub.struct_name)?;
        let id = match self.store.find_test_function(file, st, &stub.name)? {
            Some(existing) => existing,
            None => {
                stats.stubs += 1;
                self.store.insert_test_function(file, st, &stub.name, 0)?
            }
        };
        debug!("Stub test function {} in {}", stub.name, stub.file_path);
        self.stubs.insert(stub, id);
        Ok(id)
    }
}
