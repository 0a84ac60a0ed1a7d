//! Store schema definition

pub const SCHEMA: &str = r#"
-- Reference types: closed classification seeded at creation
CREATE TABLE IF NOT EXISTS reference_types (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    category TEXT NOT NULL
);

-- Services: code-organization boundaries derived from file paths
CREATE TABLE IF NOT EXISTS services (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

-- Resources: target resource types being searched for
CREATE TABLE IF NOT EXISTS resources (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

-- Resource registrations: every known resource type and its owning service
CREATE TABLE IF NOT EXISTS resource_registrations (
    id INTEGER PRIMARY KEY,
    owning_service_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    UNIQUE (owning_service_id, name),
    FOREIGN KEY (owning_service_id) REFERENCES services(id)
);

CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    service_id INTEGER NOT NULL,
    FOREIGN KEY (service_id) REFERENCES services(id)
);

CREATE TABLE IF NOT EXISTS structs (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

-- Test functions; line 0 marks a stub for an out-of-scope target
CREATE TABLE IF NOT EXISTS test_functions (
    id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL,
    struct_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    line INTEGER NOT NULL,
    UNIQUE (file_id, struct_id, name),
    FOREIGN KEY (file_id) REFERENCES files(id),
    FOREIGN KEY (struct_id) REFERENCES structs(id)
);

-- Configuration-builder functions
CREATE TABLE IF NOT EXISTS config_functions (
    id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL,
    struct_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    receiver_kind TEXT NOT NULL,
    returns_text INTEGER NOT NULL,
    line INTEGER NOT NULL,
    visibility_type_id INTEGER NOT NULL,
    UNIQUE (struct_id, name),
    FOREIGN KEY (file_id) REFERENCES files(id),
    FOREIGN KEY (struct_id) REFERENCES structs(id),
    FOREIGN KEY (visibility_type_id) REFERENCES reference_types(id)
);

CREATE TABLE IF NOT EXISTS test_steps (
    id INTEGER PRIMARY KEY,
    test_function_id INTEGER NOT NULL,
    config_function_id INTEGER NOT NULL,
    step_index INTEGER NOT NULL,
    target_struct_id INTEGER NOT NULL,
    target_service_id INTEGER NOT NULL,
    reference_type_id INTEGER NOT NULL,
    line INTEGER NOT NULL,
    FOREIGN KEY (test_function_id) REFERENCES test_functions(id),
    FOREIGN KEY (config_function_id) REFERENCES config_functions(id),
    FOREIGN KEY (target_struct_id) REFERENCES structs(id),
    FOREIGN KEY (target_service_id) REFERENCES services(id),
    FOREIGN KEY (reference_type_id) REFERENCES reference_types(id)
);

-- Call chain edges; depth 0 is the step's own function (source = target)
CREATE TABLE IF NOT EXISTS call_chain_edges (
    id INTEGER PRIMARY KEY,
    test_step_id INTEGER NOT NULL,
    source_config_function_id INTEGER NOT NULL,
    target_config_function_id INTEGER NOT NULL,
    source_service_id INTEGER NOT NULL,
    target_service_id INTEGER NOT NULL,
    depth INTEGER NOT NULL,
    crosses_boundary INTEGER NOT NULL,
    reference_type_id INTEGER NOT NULL,
    resolution_type_id INTEGER NOT NULL,
    FOREIGN KEY (test_step_id) REFERENCES test_steps(id),
    FOREIGN KEY (source_config_function_id) REFERENCES config_functions(id),
    FOREIGN KEY (target_config_function_id) REFERENCES config_functions(id),
    FOREIGN KEY (source_service_id) REFERENCES services(id),
    FOREIGN KEY (target_service_id) REFERENCES services(id),
    FOREIGN KEY (reference_type_id) REFERENCES reference_types(id),
    FOREIGN KEY (resolution_type_id) REFERENCES reference_types(id)
);

-- Resources reachable from an edge's target
CREATE TABLE IF NOT EXISTS chain_resource_closure (
    chain_edge_id INTEGER NOT NULL,
    resource_id INTEGER NOT NULL,
    PRIMARY KEY (chain_edge_id, resource_id),
    FOREIGN KEY (chain_edge_id) REFERENCES call_chain_edges(id),
    FOREIGN KEY (resource_id) REFERENCES resources(id)
);

CREATE TABLE IF NOT EXISTS direct_resource_references (
    id INTEGER PRIMARY KEY,
    config_function_id INTEGER NOT NULL,
    resource_id INTEGER NOT NULL,
    reference_type_id INTEGER NOT NULL,
    context TEXT NOT NULL,
    line INTEGER NOT NULL,
    FOREIGN KEY (config_function_id) REFERENCES config_functions(id),
    FOREIGN KEY (resource_id) REFERENCES resources(id),
    FOREIGN KEY (reference_type_id) REFERENCES reference_types(id)
);

-- Entry points running other test functions through grouped tables
CREATE TABLE IF NOT EXISTS sequential_references (
    id INTEGER PRIMARY KEY,
    entry_point_function_id INTEGER NOT NULL,
    referenced_function_id INTEGER NOT NULL,
    group_name TEXT NOT NULL,
    key TEXT NOT NULL,
    reference_type_id INTEGER NOT NULL,
    FOREIGN KEY (entry_point_function_id) REFERENCES test_functions(id),
    FOREIGN KEY (referenced_function_id) REFERENCES test_functions(id),
    FOREIGN KEY (reference_type_id) REFERENCES reference_types(id)
);

-- Calls on struct-like receivers that no indexed function matched
CREATE TABLE IF NOT EXISTS unresolved_calls (
    id INTEGER PRIMARY KEY,
    config_function_id INTEGER NOT NULL,
    receiver TEXT NOT NULL,
    method TEXT NOT NULL,
    line INTEGER NOT NULL,
    reference_type_id INTEGER NOT NULL,
    FOREIGN KEY (config_function_id) REFERENCES config_functions(id),
    FOREIGN KEY (reference_type_id) REFERENCES reference_types(id)
);

-- Indexes for efficient queries
CREATE INDEX IF NOT EXISTS idx_test_functions_name ON test_functions(name);
CREATE INDEX IF NOT EXISTS idx_config_functions_file ON config_functions(file_id);
CREATE INDEX IF NOT EXISTS idx_test_steps_test ON test_steps(test_function_id);
CREATE INDEX IF NOT EXISTS idx_edges_step ON call_chain_edges(test_step_id);
CREATE INDEX IF NOT EXISTS idx_edges_target ON call_chain_edges(target_config_function_id);
CREATE INDEX IF NOT EXISTS idx_closure_resource ON chain_resource_closure(resource_id);
CREATE INDEX IF NOT EXISTS idx_direct_refs_resource ON direct_resource_references(resource_id);
CREATE INDEX IF NOT EXISTS idx_direct_refs_function ON direct_resource_references(config_function_id);
CREATE INDEX IF NOT EXISTS idx_sequential_referenced ON sequential_references(referenced_function_id);
"#;

/// Every table with its column list, in creation order
pub const TABLES: &[(&str, &[&str])] = &[
    ("reference_types", &["id", "name", "category"]),
    ("services", &["id", "name"]),
    ("resources", &["id", "name"]),
    ("resource_registrations", &["id", "owning_service_id", "name"]),
    ("files", &["id", "path", "service_id"]),
    ("structs", &["id", "name"]),
    ("test_functions", &["id", "file_id", "struct_id", "name", "line"]),
    (
        "config_functions",
        &[
            "id",
            "file_id",
            "struct_id",
            "name",
            "receiver_kind",
            "returns_text",
            "line",
            "visibility_type_id",
        ],
    ),
    (
        "test_steps",
        &[
            "id",
            "test_function_id",
            "config_function_id",
            "step_index",
            "target_struct_id",
            "target_service_id",
            "reference_type_id",
            "line",
        ],
    ),
    (
        "call_chain_edges",
        &[
            "id",
            "test_step_id",
            "source_config_function_id",
            "target_config_function_id",
            "source_service_id",
            "target_service_id",
            "depth",
            "crosses_boundary",
            "reference_type_id",
            "resolution_type_id",
        ],
    ),
    ("chain_resource_closure", &["chain_edge_id", "resource_id"]),
    (
        "direct_resource_references",
        &[
            "id",
            "config_function_id",
            "resource_id",
            "reference_type_id",
            "context",
            "line",
        ],
    ),
    (
        "sequential_references",
        &[
            "id",
            "entry_point_function_id",
            "referenced_function_id",
            "group_name",
            "key",
            "reference_type_id",
        ],
    ),
    (
        "unresolved_calls",
        &[
            "id",
            "config_function_id",
            "receiver",
            "method",
            "line",
            "reference_type_id",
        ],
    ),
];

/// Tables emptied by a rebuild, children before parents
pub const CLEAR_ORDER: &[&str] = &[
    "chain_resource_closure",
    "call_chain_edges",
    "test_steps",
    "direct_resource_references",
    "unresolved_calls",
    "sequential_references",
    "config_functions",
    "test_functions",
    "files",
    "structs",
    "resource_registrations",
    "services",
    "resources",
];
