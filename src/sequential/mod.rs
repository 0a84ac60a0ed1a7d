//! Sequential test-group resolution
//!
//! Entry-point tests run other tests through grouped tables. Each referenced
//! identifier is resolved against the test index; targets outside the
//! analyzed files become stubs so the link can still be stored.

use crate::index::{test_struct, DeclRef, SymbolIndex, NO_STRUCT};
use crate::types::SequentialEntry;

/// Path prefix of files holding stubs for package-qualified targets
pub const EXTERNAL_PREFIX: &str = "<external>";

/// Placeholder for a test function outside the analyzed files
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StubTarget {
    pub name: String,
    pub file_path: String,
    pub service: String,
    pub struct_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequentialTarget {
    Indexed(DeclRef),
    Stub(StubTarget),
}

/// One (group, key, target) link from an entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequentialLink<'a> {
    pub entry: &'a SequentialEntry,
    pub target: SequentialTarget,
}

/// Split `pkg.Name` into its qualifier and name
fn split_qualified(target: &str) -> (Option<&str>, &str) {
    match target.rsplit_once('.') {
        Some((pkg, name)) => (Some(pkg), name),
        None => (None, target),
    }
}

/// Resolve every sequential entry of an entry-point test
pub fn resolve_links<'a>(index: &SymbolIndex<'a>, entry_point: DeclRef) -> Vec<SequentialLink<'a>> {
    let file = index.file(entry_point);
    let decl = index.test_decl(entry_point);

    decl.sequential
        .iter()
        .map(|entry| {
            let target = match split_qualified(&entry.target) {
                (None, name) => match index.test_by_name(name, entry_point.file) {
                    Some(found) => SequentialTarget::Indexed(found),
                    None => SequentialTarget::Stub(StubTarget {
                        name: name.to_string(),
                        file_path: file.path.clone(),
                        service: file.service.clone(),
                        struct_name: test_struct(decl).to_string(),
                    }),
                },
                (Some(pkg), name) => match index.test_in_service(name, pkg) {
                    Some(found) => SequentialTarget::Indexed(found),
                    None => SequentialTarget::Stub(StubTarget {
                        name: name.to_string(),
                        file_path: format!("{}/{}", EXTERNAL_PREFIX, pkg),
                        service: pkg.to_string(),
                        struct_name: NO_STRUCT.to_string(),
                    }),
                },
            };
            SequentialLink { entry, target }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileAnalysis, TestFunctionDecl};

    fn test_fn(name: &str, sequential: Vec<SequentialEntry>) -> TestFunctionDecl {
        TestFunctionDecl {
            name: name.to_string(),
            struct_name: Some("KeyVaultResource".to_string()),
            line: 10,
            call_sites: Vec::new(),
            bindings: Vec::new(),
            steps: Vec::new(),
            sequential,
        }
    }

    fn entry(group: &str, key: &str, target: &str) -> SequentialEntry {
        SequentialEntry {
            group: group.to_string(),
            key: key.to_string(),
            target: target.to_string(),
            line: 12,
        }
    }

    #[test]
    fn test_links_resolve_or_stub() {
        let files = vec![
            FileAnalysis {
                path: "internal/services/keyvault/kv_test.go".to_string(),
                service: "keyvault".to_string(),
                test_functions: vec![
                    test_fn(
                        "TestAccKeyVault_sequential",
                        vec![
                            entry("basic", "basic", "testAccKeyVault_basic"),
                            entry("basic", "gone", "testAccKeyVault_missing"),
                            entry("other", "x", "network.testAccNet_basic"),
                            entry("other", "y", "storage.testAccStorage_basic"),
                        ],
                    ),
                    test_fn("testAccKeyVault_basic", Vec::new()),
                ],
                ..Default::default()
            },
            FileAnalysis {
                path: "internal/services/network/net_test.go".to_string(),
                service: "network".to_string(),
                test_functions: vec![test_fn("testAccNet_basic", Vec::new())],
                ..Default::default()
            },
        ];
        let index = SymbolIndex::build(&files);
        let links = resolve_links(&index, DeclRef { file: 0, function: 0 });

        assert_eq!(links.len(), 4);
        assert_eq!(
            links[0].target,
            SequentialTarget::Indexed(DeclRef { file: 0, function: 1 })
        );
        match &links[1].target {
            SequentialTarget::Stub(stub) => {
                assert_eq!(stub.name, "testAccKeyVault_missing");
                assert_eq!(stub.file_path, "internal/services/keyvault/kv_test.go");
                assert_eq!(stub.struct_name, "KeyVaultResource");
            }
            other => panic!("expected stub, got {:?}", other),
        }
        assert_eq!(
            links[2].target,
            SequentialTarget::Indexed(DeclRef { file: 1, function: 0 })
        );
        match &links[3].target {
            SequentialTarget::Stub(stub) => {
                assert_eq!(stub.file_path, "<external>/storage");
                assert_eq!(stub.service, "storage");
                assert_eq!(stub.struct_name, NO_STRUCT);
            }
            other => panic!("expected stub, got {:?}", other),
        }
        assert_eq!(links[3].entry.group, "other");
    }
}
