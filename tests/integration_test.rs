//! Integration tests for blastmap
//!
//! These tests verify the end-to-end workflow of building a store from Go
//! acceptance tests and querying its blast radius.

use std::fs;

use blastmap::cli::{discover_files, load_project_store, store_path};
use blastmap::types::Origin;
use blastmap::{
    build_store, build_store_from_sources, AnalysisConfig, BlastRadius, SourceFile, Store,
    StoreError,
};
use tempfile::tempdir;

const RG: &str = "azurerm_resource_group";

const FOO_TEST: &str = r#"package net

import (
	"fmt"
	"testing"
)

type FooResource struct{}

func TestAccFoo_basic(t *testing.T) {
	data := acceptance.BuildTestData(t, "azurerm_foo", "test")
	r := FooResource{}

	data.ResourceTest(t, r, []acceptance.TestStep{
		{
			Config: r.basic(data),
		},
		data.ImportStep(),
	})
}

func (r FooResource) basic(data acceptance.TestData) string {
	return fmt.Sprintf(`
%s

resource "azurerm_foo" "test" {
  name = "acctest-%d"
}
`, SharedResource{}.template(data), data.RandomInteger)
}
"#;

const SHARED_TEST: &str = r#"package net

type SharedResource struct{}

func (SharedResource) template(data acceptance.TestData) string {
	return fmt.Sprintf(`
resource "azurerm_resource_group" "test" {
  name = "acctestRG-%d"
}
`, data.RandomInteger)
}
"#;

const CHAIN_TEST: &str = r#"package compute

import "testing"

type ChainResource struct{}

func TestAccChain_basic(t *testing.T) {
	r := ChainResource{}

	acceptance.ResourceTest(t, []acceptance.TestStep{
		{
			Config: r.basic(),
		},
	})
}

func (r ChainResource) basic() string {
	return r.template()
}

func (r ChainResource) template() string {
	return r.network()
}

func (r ChainResource) network() string {
	return `resource "azurerm_virtual_network" "test" {}`
}
"#;

const CYCLE_TEST: &str = r#"package compute

import "testing"

type LoopResource struct{}

func TestAccLoop_basic(t *testing.T) {
	r := LoopResource{}

	acceptance.ResourceTest(t, []acceptance.TestStep{
		{
			Config: r.first(),
		},
	})
}

func (r LoopResource) first() string {
	return r.second()
}

func (r LoopResource) second() string {
	return fmt.Sprintf(`
%s
resource "azurerm_resource_group" "test" {}
`, r.first())
}
"#;

const SEQUENTIAL_TEST: &str = r#"package keyvault

import "testing"

func TestAccKeyVault_sequential(t *testing.T) {
	acceptance.RunTestsInSequence(t, map[string]map[string]func(t *testing.T){
		"basic": {
			"basic":   testAccKeyVault_basic,
			"missing": testAccKeyVault_missing,
		},
		"import": {
			"missing": testAccKeyVault_missing,
		},
	})
}

type KeyVaultResource struct{}

func testAccKeyVault_basic(t *testing.T) {
	r := KeyVaultResource{}

	acceptance.ResourceTest(t, []acceptance.TestStep{
		{
			Config: r.basic(),
		},
	})
}

func (KeyVaultResource) basic() string {
	return `
resource "azurerm_resource_group" "test" {
  name = "acctestRG"
}
`
}
"#;

const ALPHA_TEST: &str = r#"package alpha

type AlphaResource struct{}

func (AlphaResource) a() string {
	return fmt.Sprintf(`
resource "azurerm_x_thing" "test" {}
%s
`, BetaResource{}.b())
}
"#;

const BETA_TEST: &str = r#"package beta

type BetaResource struct{}

func (BetaResource) b() string {
	return AlphaResource{}.a()
}
"#;

const MULTI_TEST: &str = r#"package one

import "testing"

type OneResource struct{}

func TestAccOne_basic(t *testing.T) {
	r := OneResource{}

	acceptance.ResourceTest(t, []acceptance.TestStep{
		{
			Config: r.one(),
		},
	})
}

func TestAccOne_sequential(t *testing.T) {
	r := OneResource{}

	acceptance.ResourceTest(t, []acceptance.TestStep{
		{
			Config: r.two(),
		},
	})

	acceptance.RunTestsInSequence(t, map[string]map[string]func(t *testing.T){
		"one": {
			"basic": TestAccOne_basic,
		},
	})
}

func (OneResource) one() string {
	return `resource "azurerm_one" "test" {}`
}

func (OneResource) two() string {
	return `resource "azurerm_two" "test" {}`
}
"#;

fn root_test(first: &str, second: &str) -> String {
    format!(
        r#"package net

import "testing"

type RootResource struct{{}}

func TestAccRoot_basic(t *testing.T) {{
	r := RootResource{{}}

	acceptance.ResourceTest(t, []acceptance.TestStep{{
		{{
			Config: r.basic(),
		}},
	}})
}}

func (r RootResource) basic() string {{
	return fmt.Sprintf(`
%s
%s
`, {}, {})
}}
"#,
        first, second
    )
}

fn source(path: &str, content: &str) -> SourceFile {
    SourceFile {
        path: path.to_string(),
        content: content.to_string(),
    }
}

fn config(targets: &[&str]) -> AnalysisConfig {
    AnalysisConfig {
        targets: targets.iter().map(|t| t.to_string()).collect(),
        threads: 2,
        ..Default::default()
    }
}

fn build(sources: &[SourceFile], targets: &[&str]) -> Store {
    let store = Store::in_memory().unwrap();
    build_store_from_sources(&store, sources, &config(targets)).unwrap();
    store
}

fn same_service_sources() -> Vec<SourceFile> {
    vec![
        source("internal/services/net/foo_test.go", FOO_TEST),
        source("internal/services/net/shared_test.go", SHARED_TEST),
    ]
}

#[test]
fn test_indirect_through_helper_in_other_file() {
    let store = build(&same_service_sources(), &[RG]);
    let query = BlastRadius::new(&store);

    let rows = query.indirect(RG).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].function_name, "TestAccFoo_basic");
    assert_eq!(rows[0].origin, Origin::Indirect);
    assert_eq!(rows[0].service, "net");
    assert_eq!(rows[0].line, 10);
    assert_eq!(rows[0].chain_depth, 2);
    assert!(!rows[0].crosses_boundary);

    // The test file never names the resource itself
    let direct = query.direct(RG).unwrap();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].file_path, "internal/services/net/shared_test.go");
    assert_eq!(direct[0].function_name, "SharedResource.template");
    assert_eq!(direct[0].line, 7);
    assert!(direct
        .iter()
        .all(|r| r.file_path != "internal/services/net/foo_test.go"));
}

#[test]
fn test_cross_service_chain_sets_flag() {
    let sources = vec![
        source("internal/services/net/foo_test.go", FOO_TEST),
        source("internal/services/resource/shared_test.go", SHARED_TEST),
    ];
    let store = build(&sources, &[RG]);

    let rows = BlastRadius::new(&store).indirect(RG).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].service, "net");
    assert_eq!(rows[0].chain_depth, 2);
    assert!(rows[0].crosses_boundary);
}

#[test]
fn test_transitive_closure_reaches_end_of_chain() {
    let store = build(
        &[source("internal/services/compute/chain_test.go", CHAIN_TEST)],
        &["azurerm_virtual_network"],
    );
    let query = BlastRadius::new(&store);

    let rows = query.indirect("azurerm_virtual_network").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].function_name, "TestAccChain_basic");
    assert_eq!(rows[0].chain_depth, 3);

    let direct = query.direct("azurerm_virtual_network").unwrap();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].function_name, "ChainResource.network");
}

#[test]
fn test_cycle_terminates() {
    let store = Store::in_memory().unwrap();
    let stats = build_store_from_sources(
        &store,
        &[source("internal/services/compute/loop_test.go", CYCLE_TEST)],
        &config(&[RG]),
    )
    .unwrap();

    assert_eq!(stats.test_steps, 1);
    assert_eq!(stats.chain_edges, 2);

    let rows = BlastRadius::new(&store).indirect(RG).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].function_name, "TestAccLoop_basic");
    assert_eq!(rows[0].chain_depth, 2);
}

#[test]
fn test_sequential_entry_point_and_stub() {
    let store = Store::in_memory().unwrap();
    let stats = build_store_from_sources(
        &store,
        &[source("internal/services/keyvault/kv_test.go", SEQUENTIAL_TEST)],
        &config(&[RG]),
    )
    .unwrap();

    assert_eq!(stats.sequential_references, 3);
    // Both references to the missing test share one stub
    assert_eq!(stats.stubs, 1);
    assert_eq!(store.count("test_functions").unwrap(), 3);

    let query = BlastRadius::new(&store);
    let rows = query.indirect(RG).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].function_name, "testAccKeyVault_basic");
    assert_eq!(rows[0].origin, Origin::Indirect);
    assert_eq!(rows[0].chain_depth, 1);
    assert_eq!(rows[1].function_name, "TestAccKeyVault_sequential");
    assert_eq!(rows[1].origin, Origin::Sequential);
    assert_eq!(rows[1].chain_depth, 1);
    assert!(!rows[1].crosses_boundary);

    let plans = query.run_plan(&[RG]).unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].service, "keyvault");
    assert_eq!(plans[0].tests, vec!["TestAccKeyVault_sequential"]);
}

#[test]
fn test_rebuild_is_idempotent() {
    let sources = same_service_sources();
    let store = Store::in_memory().unwrap();

    let first = build_store_from_sources(&store, &sources, &config(&[RG])).unwrap();
    let counts = store.table_counts().unwrap();
    let rg_id = store.resource_id(RG).unwrap();

    let second = build_store_from_sources(&store, &sources, &config(&[RG])).unwrap();
    assert_eq!(store.table_counts().unwrap(), counts);
    assert_eq!(store.resource_id(RG).unwrap(), rg_id);
    assert_eq!(first.chain_edges, second.chain_edges);
    assert_eq!(first.test_steps, second.test_steps);
}

#[test]
fn test_built_store_has_no_dangling_keys() {
    let mut sources = same_service_sources();
    sources.push(source("internal/services/keyvault/kv_test.go", SEQUENTIAL_TEST));
    sources.push(source("internal/services/compute/loop_test.go", CYCLE_TEST));
    let store = build(&sources, &[RG]);
    assert!(store.verify_integrity().unwrap().is_empty());
}

#[test]
fn test_empty_targets_use_every_mentioned_resource() {
    let store = build(&same_service_sources(), &[]);
    let caps = BlastRadius::new(&store).describe().unwrap();
    assert_eq!(caps.resources, vec!["azurerm_foo", RG]);
}

#[test]
fn test_combined_keeps_shallowest_depth() {
    let store = build(&same_service_sources(), &[RG, "azurerm_foo"]);
    let rows = BlastRadius::new(&store)
        .combined(&[RG, "azurerm_foo"])
        .unwrap();

    let direct: Vec<&str> = rows
        .iter()
        .filter(|r| r.origin == Origin::Direct)
        .map(|r| r.function_name.as_str())
        .collect();
    assert_eq!(direct.len(), 2);
    assert!(direct.contains(&"FooResource.basic"));
    assert!(direct.contains(&"SharedResource.template"));

    let indirect: Vec<_> = rows.iter().filter(|r| r.origin == Origin::Indirect).collect();
    assert_eq!(indirect.len(), 1);
    assert_eq!(indirect[0].function_name, "TestAccFoo_basic");
    assert_eq!(indirect[0].chain_depth, 1);
    assert_eq!(indirect[0].resources, vec!["azurerm_foo", RG]);
}

#[test]
fn test_combined_reports_each_test_once_across_resources() {
    let targets = ["azurerm_one", "azurerm_two"];
    let store = build(&[source("internal/services/one/one_test.go", MULTI_TEST)], &targets);
    let rows = BlastRadius::new(&store).combined(&targets).unwrap();

    let sequential: Vec<_> = rows
        .iter()
        .filter(|r| r.function_name == "TestAccOne_sequential")
        .collect();
    assert_eq!(sequential.len(), 1);
    assert_eq!(sequential[0].origin, Origin::Indirect);
    assert_eq!(sequential[0].chain_depth, 1);
    assert_eq!(sequential[0].resources, vec!["azurerm_one", "azurerm_two"]);

    let basic: Vec<_> = rows
        .iter()
        .filter(|r| r.function_name == "TestAccOne_basic")
        .collect();
    assert_eq!(basic.len(), 1);
    assert_eq!(basic[0].resources, vec!["azurerm_one"]);

    let mut keys: Vec<_> = rows
        .iter()
        .map(|r| (&r.service, &r.file_path, &r.function_name, r.line))
        .collect();
    let total = keys.len();
    keys.dedup();
    assert_eq!(keys.len(), total);
}

#[test]
fn test_chain_through_mutual_calls_ignores_call_order() {
    let results: Vec<(u32, bool)> = [
        ("AlphaResource{}.a()", "BetaResource{}.b()"),
        ("BetaResource{}.b()", "AlphaResource{}.a()"),
    ]
    .iter()
    .map(|(first, second)| {
        let sources = vec![
            source("internal/services/net/root_test.go", &root_test(first, second)),
            source("internal/services/alpha/alpha_test.go", ALPHA_TEST),
            source("internal/services/beta/beta_test.go", BETA_TEST),
        ];
        let store = build(&sources, &["azurerm_x_thing"]);
        let rows = BlastRadius::new(&store).indirect("azurerm_x_thing").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].function_name, "TestAccRoot_basic");
        (rows[0].chain_depth, rows[0].crosses_boundary)
    })
    .collect();

    assert_eq!(results[0], results[1]);
    assert_eq!(results[0], (2, true));
}

#[test]
fn test_unknown_resource_returns_nothing() {
    let store = build(&same_service_sources(), &[RG]);
    let query = BlastRadius::new(&store);
    assert!(query.direct("azurerm_nothing").unwrap().is_empty());
    assert!(query.indirect("azurerm_nothing").unwrap().is_empty());
    assert!(query.combined(&["azurerm_nothing"]).unwrap().is_empty());
}

#[test]
fn test_unresolved_calls_and_syntax_errors_do_not_abort() {
    let broken = "package net\n\nfunc (r BrokenResource) basic( string {\n";
    let caller = r#"package net

type CallerResource struct{}

func (r CallerResource) basic() string {
	return MissingResource{}.template()
}
"#;
    let store = Store::in_memory().unwrap();
    let stats = build_store_from_sources(
        &store,
        &[
            source("internal/services/net/broken_test.go", broken),
            source("internal/services/net/caller_test.go", caller),
        ],
        &config(&[RG]),
    )
    .unwrap();

    assert_eq!(stats.files, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.unresolved_calls, 1);
    assert_eq!(store.count("unresolved_calls").unwrap(), 1);
}

#[test]
fn test_file_with_syntax_error_adds_no_rows() {
    let broken = format!("{}\nfunc (r FooResource) broken( string {{\n", FOO_TEST);
    let store = Store::in_memory().unwrap();
    let stats = build_store_from_sources(
        &store,
        &[
            source("internal/services/net/foo_test.go", &broken),
            source("internal/services/net/shared_test.go", SHARED_TEST),
        ],
        &config(&[RG]),
    )
    .unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(store.count("test_functions").unwrap(), 0);
    assert_eq!(store.count("config_functions").unwrap(), 1);
    assert!(BlastRadius::new(&store).indirect(RG).unwrap().is_empty());
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.db");

    let store = build(&same_service_sources(), &[RG]);
    let expected = BlastRadius::new(&store).indirect(RG).unwrap();
    store.save(&path).unwrap();

    let loaded = Store::load(&path).unwrap();
    assert!(loaded.is_read_only());
    assert_eq!(BlastRadius::new(&loaded).indirect(RG).unwrap(), expected);
    assert!(matches!(loaded.clear(), Err(StoreError::ReadOnly)));
}

#[test]
fn test_load_missing_store() {
    let dir = tempdir().unwrap();
    let result = Store::load(dir.path().join("missing.db"));
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[test]
fn test_build_from_disk() {
    let dir = tempdir().unwrap();
    let net = dir.path().join("internal/services/net");
    fs::create_dir_all(&net).unwrap();
    fs::write(net.join("foo_test.go"), FOO_TEST).unwrap();
    fs::write(net.join("shared_test.go"), SHARED_TEST).unwrap();
    fs::write(net.join("registration.go"), "package net\n").unwrap();

    let vendor = dir.path().join("vendor/example");
    fs::create_dir_all(&vendor).unwrap();
    fs::write(vendor.join("ignored_test.go"), SHARED_TEST).unwrap();

    let root = dir.path().canonicalize().unwrap().display().to_string();
    let config = AnalysisConfig {
        root: root.clone(),
        targets: vec![RG.to_string()],
        threads: 2,
        respect_gitignore: false,
        ..Default::default()
    };

    let files = discover_files(&config).unwrap();
    assert_eq!(files.len(), 2);

    let store = Store::in_memory().unwrap();
    let stats = build_store(&store, &files, &config).unwrap();
    assert_eq!(stats.files, 2);
    assert_eq!(stats.skipped, 0);

    let path = store_path(&root);
    store.save(&path).unwrap();

    let loaded = load_project_store(&root).unwrap();
    let rows = BlastRadius::new(&loaded).indirect(RG).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].file_path, "internal/services/net/foo_test.go");
    assert_eq!(rows[0].chain_depth, 2);
}
