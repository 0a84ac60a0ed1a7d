//! Normalized dependency store
//!
//! Handles SQLite storage for the analysis results including:
//! - Schema creation and reference-type seeding
//! - Get-or-create lookups keyed by natural value
//! - Append-only relationship inserts
//! - Persistence to a single file and validated read-only reload
//! - Read queries used by the blast-radius engine

mod schema;

pub use schema::TABLES;

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use thiserror::Error;

use crate::types::{ReceiverKind, ReferenceType, StoreStats};

/// Errors raised by the store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store not found: {0}")]
    NotFound(PathBuf),

    #[error("store is missing table `{0}`")]
    MissingTable(String),

    #[error("table `{table}` has columns [{found}], expected [{expected}]")]
    ColumnMismatch {
        table: String,
        expected: String,
        found: String,
    },

    #[error("store has {found} reference types, expected {expected}")]
    ReferenceTypes { expected: usize, found: usize },

    #[error("store is read-only")]
    ReadOnly,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A foreign key that points at a missing row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityViolation {
    pub table: String,
    pub rowid: Option<i64>,
    pub parent: String,
}

/// New test step row
#[derive(Debug, Clone, Copy)]
pub struct NewTestStep {
    pub test_function_id: i64,
    pub config_function_id: i64,
    pub step_index: u32,
    pub target_struct_id: i64,
    pub target_service_id: i64,
    pub reference_type: ReferenceType,
    pub line: u32,
}

/// New call chain edge row
#[derive(Debug, Clone, Copy)]
pub struct NewChainEdge {
    pub test_step_id: i64,
    pub source_function_id: i64,
    pub target_function_id: i64,
    pub source_service_id: i64,
    pub target_service_id: i64,
    pub depth: u32,
    pub crosses_boundary: bool,
    pub resolution: ReferenceType,
}

/// Direct mention joined with its function, file and service
#[derive(Debug, Clone)]
pub struct DirectRow {
    pub service: String,
    pub file_path: String,
    pub struct_name: String,
    pub function_name: String,
    pub line: u32,
    pub context: String,
    pub reference_type: Option<ReferenceType>,
}

/// Test function reached through a resource closure
#[derive(Debug, Clone)]
pub struct ChainRow {
    pub test_function_id: i64,
    pub test_name: String,
    pub service: String,
    pub file_path: String,
    pub line: u32,
    pub depth: u32,
    pub crosses_boundary: bool,
}

/// Test function joined with its file and service
#[derive(Debug, Clone)]
pub struct TestRow {
    pub id: i64,
    pub name: String,
    pub service: String,
    pub file_path: String,
    pub line: u32,
}

/// Sequential link pointing at a test function
#[derive(Debug, Clone)]
pub struct SequentialRow {
    pub entry_point_id: i64,
    pub group: String,
    pub key: String,
}

/// Store handle for the dependency graph
pub struct Store {
    conn: Connection,
    read_only: bool,
}

impl Store {
    /// Create an in-memory store
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            read_only: false,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Load a persisted store for querying.
    ///
    /// Every table and its column list is validated; the returned store is
    /// read-only.
    pub fn load<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let store = Self {
            conn,
            read_only: true,
        };
        store.validate()?;
        Ok(store)
    }

    /// Write the whole store to a single file, replacing any existing one
    pub fn save<P: AsRef<Path>>(&self, path: P) -> StoreResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let target = path.to_string_lossy().replace('\'', "''");
        self.conn
            .execute_batch(&format!("VACUUM INTO '{}'", target))?;
        Ok(())
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Initialize the schema and seed reference types
    fn initialize(&self) -> StoreResult<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(schema::SCHEMA)?;

        for rt in ReferenceType::ALL {
            self.conn.execute(
                "INSERT OR IGNORE INTO reference_types (id, name, category) VALUES (?1, ?2, ?3)",
                params![rt.id(), rt.as_str(), rt.category().as_str()],
            )?;
        }
        Ok(())
    }

    fn validate(&self) -> StoreResult<()> {
        for (table, expected) in TABLES {
            let mut stmt = self
                .conn
                .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
            let columns = stmt
                .query_map(params![table], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;

            if columns.is_empty() {
                return Err(StoreError::MissingTable(table.to_string()));
            }
            if columns != *expected {
                return Err(StoreError::ColumnMismatch {
                    table: table.to_string(),
                    expected: expected.join(", "),
                    found: columns.join(", "),
                });
            }
        }

        let found: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM reference_types", [], |row| row.get(0))?;
        if found as usize != ReferenceType::ALL.len() {
            return Err(StoreError::ReferenceTypes {
                expected: ReferenceType::ALL.len(),
                found: found as usize,
            });
        }
        Ok(())
    }

    fn ensure_writable(&self) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }

    /// Remove every non-seed row so a rebuild assigns the same ids
    pub fn clear(&self) -> StoreResult<()> {
        self.ensure_writable()?;
        for table in schema::CLEAR_ORDER {
            self.conn.execute(&format!("DELETE FROM {}", table), [])?;
        }
        Ok(())
    }

    // =========================================================================
    // Lookup Tables
    // =========================================================================

    fn get_or_create(&self, select: &str, insert: &str, key: &str) -> StoreResult<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(select, params![key], |row| row.get(0))
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        self.ensure_writable()?;
        self.conn.execute(insert, params![key])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_or_create_resource(&self, name: &str) -> StoreResult<i64> {
        self.get_or_create(
            "SELECT id FROM resources WHERE name = ?1",
            "INSERT INTO resources (name) VALUES (?1)",
            name,
        )
    }

    pub fn get_or_create_service(&self, name: &str) -> StoreResult<i64> {
        self.get_or_create(
            "SELECT id FROM services WHERE name = ?1",
            "INSERT INTO services (name) VALUES (?1)",
            name,
        )
    }

    pub fn get_or_create_struct(&self, name: &str) -> StoreResult<i64> {
        self.get_or_create(
            "SELECT id FROM structs WHERE name = ?1",
            "INSERT INTO structs (name) VALUES (?1)",
            name,
        )
    }

    /// Get or create a file; an existing path keeps its original service
    pub fn get_or_create_file(&self, path: &str, service_id: i64) -> StoreResult<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row("SELECT id FROM files WHERE path = ?1", params![path], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        self.ensure_writable()?;
        self.conn.execute(
            "INSERT INTO files (path, service_id) VALUES (?1, ?2)",
            params![path, service_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_or_create_registration(&self, name: &str, service_id: i64) -> StoreResult<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM resource_registrations WHERE owning_service_id = ?1 AND name = ?2",
                params![service_id, name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        self.ensure_writable()?;
        self.conn.execute(
            "INSERT INTO resource_registrations (owning_service_id, name) VALUES (?1, ?2)",
            params![service_id, name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn resource_id(&self, name: &str) -> StoreResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM resources WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn resource_names(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM resources ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    // =========================================================================
    // Functions
    // =========================================================================

    pub fn insert_test_function(
        &self,
        file_id: i64,
        struct_id: i64,
        name: &str,
        line: u32,
    ) -> StoreResult<i64> {
        self.ensure_writable()?;
        self.conn.execute(
            "INSERT INTO test_functions (file_id, struct_id, name, line) VALUES (?1, ?2, ?3, ?4)",
            params![file_id, struct_id, name, line],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_test_function(
        &self,
        file_id: i64,
        struct_id: i64,
        name: &str,
    ) -> StoreResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM test_functions WHERE file_id = ?1 AND struct_id = ?2 AND name = ?3",
                params![file_id, struct_id, name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn insert_config_function(
        &self,
        file_id: i64,
        struct_id: i64,
        name: &str,
        receiver_kind: ReceiverKind,
        returns_text: bool,
        line: u32,
        visibility: ReferenceType,
    ) -> StoreResult<i64> {
        self.ensure_writable()?;
        self.conn.execute(
            r#"
            INSERT INTO config_functions (
                file_id, struct_id, name, receiver_kind, returns_text, line, visibility_type_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                file_id,
                struct_id,
                name,
                receiver_kind.as_str(),
                returns_text,
                line,
                visibility.id(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    // =========================================================================
    // Relationships
    // =========================================================================

    pub fn insert_test_step(&self, step: &NewTestStep) -> StoreResult<i64> {
        self.ensure_writable()?;
        self.conn.execute(
            r#"
            INSERT INTO test_steps (
                test_function_id, config_function_id, step_index, target_struct_id,
                target_service_id, reference_type_id, line
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                step.test_function_id,
                step.config_function_id,
                step.step_index,
                step.target_struct_id,
                step.target_service_id,
                step.reference_type.id(),
                step.line,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_chain_edge(&self, edge: &NewChainEdge) -> StoreResult<i64> {
        self.ensure_writable()?;
        self.conn.execute(
            r#"
            INSERT INTO call_chain_edges (
                test_step_id, source_config_function_id, target_config_function_id,
                source_service_id, target_service_id, depth, crosses_boundary,
                reference_type_id, resolution_type_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                edge.test_step_id,
                edge.source_function_id,
                edge.target_function_id,
                edge.source_service_id,
                edge.target_service_id,
                edge.depth,
                edge.crosses_boundary,
                ReferenceType::for_boundary(edge.crosses_boundary).id(),
                edge.resolution.id(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_closure(&self, chain_edge_id: i64, resource_id: i64) -> StoreResult<()> {
        self.ensure_writable()?;
        self.conn.execute(
            "INSERT OR IGNORE INTO chain_resource_closure (chain_edge_id, resource_id) VALUES (?1, ?2)",
            params![chain_edge_id, resource_id],
        )?;
        Ok(())
    }

    pub fn insert_direct_reference(
        &self,
        config_function_id: i64,
        resource_id: i64,
        reference_type: ReferenceType,
        context: &str,
        line: u32,
    ) -> StoreResult<i64> {
        self.ensure_writable()?;
        self.conn.execute(
            r#"
            INSERT INTO direct_resource_references (
                config_function_id, resource_id, reference_type_id, context, line
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                config_function_id,
                resource_id,
                reference_type.id(),
                context,
                line
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_sequential_reference(
        &self,
        entry_point_id: i64,
        referenced_id: i64,
        group: &str,
        key: &str,
        reference_type: ReferenceType,
    ) -> StoreResult<i64> {
        self.ensure_writable()?;
        self.conn.execute(
            r#"
            INSERT INTO sequential_references (
                entry_point_function_id, referenced_function_id, group_name, key, reference_type_id
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                entry_point_id,
                referenced_id,
                group,
                key,
                reference_type.id()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_unresolved_call(
        &self,
        config_function_id: i64,
        receiver: &str,
        method: &str,
        line: u32,
    ) -> StoreResult<i64> {
        self.ensure_writable()?;
        self.conn.execute(
            r#"
            INSERT INTO unresolved_calls (
                config_function_id, receiver, method, line, reference_type_id
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                config_function_id,
                receiver,
                method,
                line,
                ReferenceType::UnresolvedExternal.id()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    // =========================================================================
    // Query Operations
    // =========================================================================

    /// Literal mentions of a resource inside configuration functions
    pub fn direct_references(&self, resource_id: i64) -> StoreResult<Vec<DirectRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT sv.name, f.path, st.name, cf.name, d.line, d.context, d.reference_type_id
            FROM direct_resource_references d
            JOIN config_functions cf ON cf.id = d.config_function_id
            JOIN structs st ON st.id = cf.struct_id
            JOIN files f ON f.id = cf.file_id
            JOIN services sv ON sv.id = f.service_id
            WHERE d.resource_id = ?1
            ORDER BY sv.name, f.path, d.line, cf.name
            "#,
        )?;
        let rows = stmt
            .query_map(params![resource_id], |row| {
                Ok(DirectRow {
                    service: row.get(0)?,
                    file_path: row.get(1)?,
                    struct_name: row.get(2)?,
                    function_name: row.get(3)?,
                    line: row.get(4)?,
                    context: row.get(5)?,
                    reference_type: ReferenceType::from_id(row.get(6)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Test functions whose step chains reach a resource.
    ///
    /// Depth counts hops from the test to the nearest function mentioning the
    /// resource; the crossing flag is set when any edge whose closure holds the
    /// resource crosses a service boundary.
    pub fn chain_tests(&self, resource_id: i64) -> StoreResult<Vec<ChainRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT tf.id, tf.name, sv.name, f.path, tf.line,
                   COALESCE(MIN(CASE WHEN d.id IS NOT NULL THEN e.depth + 1 END), MIN(e.depth) + 1),
                   MAX(e.crosses_boundary)
            FROM chain_resource_closure c
            JOIN call_chain_edges e ON e.id = c.chain_edge_id
            JOIN test_steps ts ON ts.id = e.test_step_id
            JOIN test_functions tf ON tf.id = ts.test_function_id
            JOIN files f ON f.id = tf.file_id
            JOIN services sv ON sv.id = f.service_id
            LEFT JOIN direct_resource_references d
                ON d.config_function_id = e.target_config_function_id
               AND d.resource_id = c.resource_id
            WHERE c.resource_id = ?1
            GROUP BY tf.id
            ORDER BY sv.name, f.path, tf.line, tf.name
            "#,
        )?;
        let rows = stmt
            .query_map(params![resource_id], |row| {
                Ok(ChainRow {
                    test_function_id: row.get(0)?,
                    test_name: row.get(1)?,
                    service: row.get(2)?,
                    file_path: row.get(3)?,
                    line: row.get(4)?,
                    depth: row.get(5)?,
                    crosses_boundary: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Sequential links that run the given test function
    pub fn sequential_callers(&self, test_function_id: i64) -> StoreResult<Vec<SequentialRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT entry_point_function_id, group_name, key
            FROM sequential_references
            WHERE referenced_function_id = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map(params![test_function_id], |row| {
                Ok(SequentialRow {
                    entry_point_id: row.get(0)?,
                    group: row.get(1)?,
                    key: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn test_function(&self, id: i64) -> StoreResult<Option<TestRow>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT tf.id, tf.name, sv.name, f.path, tf.line
                FROM test_functions tf
                JOIN files f ON f.id = tf.file_id
                JOIN services sv ON sv.id = f.service_id
                WHERE tf.id = ?1
                "#,
                params![id],
                |row| {
                    Ok(TestRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        service: row.get(2)?,
                        file_path: row.get(3)?,
                        line: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // =========================================================================
    // Statistics & Integrity
    // =========================================================================

    /// Foreign keys pointing at missing rows; empty for a consistent store
    pub fn verify_integrity(&self) -> StoreResult<Vec<IntegrityViolation>> {
        let mut stmt = self.conn.prepare("PRAGMA foreign_key_check")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(IntegrityViolation {
                    table: row.get(0)?,
                    rowid: row.get(1)?,
                    parent: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count(&self, table: &str) -> StoreResult<u64> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

    pub fn table_counts(&self) -> StoreResult<Vec<(String, u64)>> {
        TABLES
            .iter()
            .map(|(table, _)| Ok((table.to_string(), self.count(table)?)))
            .collect()
    }

    pub fn stats(&self) -> StoreResult<StoreStats> {
        let db_size_bytes: u64 = self
            .conn
            .query_row(
                "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        Ok(StoreStats {
            table_counts: self.table_counts()?,
            db_size_bytes,
        })
    }

    /// Begin a transaction
    pub fn begin_transaction(&self) -> StoreResult<()> {
        self.ensure_writable()?;
        self.conn.execute("BEGIN TRANSACTION", [])?;
        Ok(())
    }

    /// Commit a transaction
    pub fn commit(&self) -> StoreResult<()> {
        self.conn.execute("COMMIT", [])?;
        Ok(())
    }

    /// Rollback a transaction
    pub fn rollback(&self) -> StoreResult<()> {
        self.conn.execute("ROLLBACK", [])?;
        Ok(())
    }
}
