//! Service derivation from file paths
//!
//! A service is the code-organization boundary a file belongs to. For provider
//! layouts like `internal/services/network/foo_test.go` it is the directory
//! following the marker component; otherwise the file's parent directory.

/// Directory component that introduces a service directory
pub const DEFAULT_SERVICE_MARKER: &str = "services";

/// Service name used for files at the root of the analyzed tree
pub const ROOT_SERVICE: &str = "root";

/// Derive the service name for a file path
pub fn service_for_path(path: &str, marker: &str) -> String {
    let components: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();

    // Last component is the file itself
    let dirs = match components.split_last() {
        Some((_, dirs)) => dirs,
        None => return ROOT_SERVICE.to_string(),
    };

    if let Some(pos) = dirs.iter().position(|c| *c == marker) {
        if let Some(service) = dirs.get(pos + 1) {
            return service.to_string();
        }
    }

    dirs.last()
        .map(|d| d.to_string())
        .unwrap_or_else(|| ROOT_SERVICE.to_string())
}
