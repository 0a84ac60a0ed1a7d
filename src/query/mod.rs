//! Blast-radius queries over a frozen store
//!
//! All operations are reads. An unknown resource name yields an empty result.

use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::store::{Store, StoreResult};
use crate::types::{BlastRow, Origin, QueryCapabilities, ServiceRunPlan};

/// Operations exposed to presentation layers
pub const OPERATIONS: &[&str] = &["direct", "indirect", "combined"];

/// Prefix of test functions a test runner executes
const RUNNABLE_PREFIX: &str = "Test";

/// Blast-radius query engine
pub struct BlastRadius<'a> {
    store: &'a Store,
}

impl<'a> BlastRadius<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Literal mentions of a resource inside configuration functions
    pub fn direct(&self, resource: &str) -> StoreResult<Vec<BlastRow>> {
        let Some(resource_id) = self.store.resource_id(resource)? else {
            return Ok(Vec::new());
        };

        let rows = self
            .store
            .direct_references(resource_id)?
            .into_iter()
            .map(|row| BlastRow {
                resources: vec![resource.to_string()],
                origin: Origin::Direct,
                service: row.service,
                file_path: row.file_path,
                function_name: format!("{}.{}", row.struct_name, row.function_name),
                line: row.line,
                chain_depth: 0,
                crosses_boundary: false,
                detail: Some(match row.reference_type {
                    Some(rt) => format!("{}: {}", rt.as_str(), row.context),
                    None => row.context,
                }),
            })
            .collect();
        Ok(rows)
    }

    /// Tests reaching a resource through step chains or sequential links
    pub fn indirect(&self, resource: &str) -> StoreResult<Vec<BlastRow>> {
        let Some(resource_id) = self.store.resource_id(resource)? else {
            return Ok(Vec::new());
        };

        let mut rows = Vec::new();
        let mut included: HashSet<i64> = HashSet::new();
        let mut queue: VecDeque<(i64, BlastRow)> = VecDeque::new();

        for chain in self.store.chain_tests(resource_id)? {
            included.insert(chain.test_function_id);
            let row = BlastRow {
                resources: vec![resource.to_string()],
                origin: Origin::Indirect,
                service: chain.service,
                file_path: chain.file_path,
                function_name: chain.test_name,
                line: chain.line,
                chain_depth: chain.depth,
                crosses_boundary: chain.crosses_boundary,
                detail: None,
            };
            queue.push_back((chain.test_function_id, row.clone()));
            rows.push(row);
        }

        // Entry points that transitively run an included test
        while let Some((test_id, reached)) = queue.pop_front() {
            for link in self.store.sequential_callers(test_id)? {
                if !included.insert(link.entry_point_id) {
                    continue;
                }
                let Some(entry) = self.store.test_function(link.entry_point_id)? else {
                    continue;
                };
                let row = BlastRow {
                    resources: vec![resource.to_string()],
                    origin: Origin::Sequential,
                    crosses_boundary: reached.crosses_boundary || entry.service != reached.service,
                    service: entry.service,
                    file_path: entry.file_path,
                    function_name: entry.name,
                    line: entry.line,
                    chain_depth: reached.chain_depth,
                    detail: Some(format!(
                        "{}/{} -> {}",
                        link.group, link.key, reached.function_name
                    )),
                };
                queue.push_back((link.entry_point_id, row.clone()));
                rows.push(row);
            }
        }

        Ok(rows)
    }

    /// Union of direct and indirect rows for several resources.
    ///
    /// One row per (service, file, function, line). A merged row keeps the
    /// strongest origin (direct, then indirect, then sequential), the
    /// shallowest depth, any crossing, and every resource that reached it.
    pub fn combined<S: AsRef<str>>(&self, resources: &[S]) -> StoreResult<Vec<BlastRow>> {
        let mut merged: BTreeMap<(String, String, String, u32), BlastRow> = BTreeMap::new();

        for resource in resources {
            let resource = resource.as_ref();
            let mut rows = self.direct(resource)?;
            rows.extend(self.indirect(resource)?);

            for row in rows {
                let key = (
                    row.service.clone(),
                    row.file_path.clone(),
                    row.function_name.clone(),
                    row.line,
                );
                match merged.get_mut(&key) {
                    Some(existing) => merge_row(existing, row),
                    None => {
                        merged.insert(key, row);
                    }
                }
            }
        }

        Ok(merged.into_values().collect())
    }

    /// Available operations and loaded resource names
    pub fn describe(&self) -> StoreResult<QueryCapabilities> {
        Ok(QueryCapabilities {
            operations: OPERATIONS.iter().map(|s| s.to_string()).collect(),
            resources: self.store.resource_names()?,
        })
    }

    /// Runnable tests per service, one plan per (resource, service)
    pub fn run_plan<S: AsRef<str>>(&self, resources: &[S]) -> StoreResult<Vec<ServiceRunPlan>> {
        let mut plans = Vec::new();

        for resource in resources {
            let resource = resource.as_ref();
            let mut by_service: BTreeMap<String, Vec<String>> = BTreeMap::new();

            for row in self.indirect(resource)? {
                if row.line == 0 || !row.function_name.starts_with(RUNNABLE_PREFIX) {
                    continue;
                }
                let tests = by_service.entry(row.service).or_default();
                if !tests.contains(&row.function_name) {
                    tests.push(row.function_name);
                }
            }

            for (service, mut tests) in by_service {
                tests.sort();
                plans.push(ServiceRunPlan {
                    resource: resource.to_string(),
                    service,
                    tests,
                });
            }
        }

        Ok(plans)
    }
}

fn merge_row(existing: &mut BlastRow, row: BlastRow) {
    if row.origin < existing.origin {
        existing.origin = row.origin;
        existing.detail = row.detail;
    }
    existing.chain_depth = existing.chain_depth.min(row.chain_depth);
    existing.crosses_boundary |= row.crosses_boundary;
    for resource in row.resources {
        if let Err(pos) = existing.resources.binary_search(&resource) {
            existing.resources.insert(pos, resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_resource_is_empty() {
        let store = Store::in_memory().unwrap();
        let query = BlastRadius::new(&store);
        assert!(query.direct("azurerm_unknown").unwrap().is_empty());
        assert!(query.indirect("azurerm_unknown").unwrap().is_empty());
        assert!(query.combined(&["azurerm_unknown"]).unwrap().is_empty());
        assert!(query.run_plan(&["azurerm_unknown"]).unwrap().is_empty());
    }

    fn row(resource: &str, origin: Origin, depth: u32, crosses: bool) -> BlastRow {
        BlastRow {
            resources: vec![resource.to_string()],
            origin,
            service: "keyvault".to_string(),
            file_path: "internal/services/keyvault/kv_test.go".to_string(),
            function_name: "TestAccKeyVault_sequential".to_string(),
            line: 5,
            chain_depth: depth,
            crosses_boundary: crosses,
            detail: None,
        }
    }

    #[test]
    fn test_merge_prefers_stronger_origin() {
        let mut existing = row("azurerm_subnet", Origin::Sequential, 1, true);
        merge_row(&mut existing, row("azurerm_key_vault", Origin::Indirect, 3, false));
        assert_eq!(existing.origin, Origin::Indirect);
        assert_eq!(existing.chain_depth, 1);
        assert!(existing.crosses_boundary);
        assert_eq!(existing.resources, vec!["azurerm_key_vault", "azurerm_subnet"]);

        merge_row(&mut existing, row("azurerm_subnet", Origin::Sequential, 0, false));
        assert_eq!(existing.origin, Origin::Indirect);
        assert_eq!(existing.chain_depth, 0);
        assert_eq!(existing.resources.len(), 2);
    }

    #[test]
    fn test_describe_lists_operations_and_resources() {
        let store = Store::in_memory().unwrap();
        store.get_or_create_resource("azurerm_subnet").unwrap();
        let caps = BlastRadius::new(&store).describe().unwrap();
        assert_eq!(caps.operations, vec!["direct", "indirect", "combined"]);
        assert_eq!(caps.resources, vec!["azurerm_subnet"]);
    }
}
