//! Core type definitions for blastmap
//!
//! Defines the fundamental types shared by the analysis pipeline:
//! - Reference types: the closed classification of every stored relationship
//! - Extraction records: what the extractor emits for one source file
//! - Query rows: what the query engine hands to presentation layers

use serde::{Deserialize, Serialize};

/// Category a [`ReferenceType`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceCategory {
    TestToConfiguration,
    FileLocality,
    ReferenceStyle,
    ServiceBoundary,
    DependencyKind,
    Visibility,
}

impl ReferenceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceCategory::TestToConfiguration => "test_to_configuration",
            ReferenceCategory::FileLocality => "file_locality",
            ReferenceCategory::ReferenceStyle => "reference_style",
            ReferenceCategory::ServiceBoundary => "service_boundary",
            ReferenceCategory::DependencyKind => "dependency_kind",
            ReferenceCategory::Visibility => "visibility",
        }
    }
}

/// Closed set of relationship classifications.
///
/// Every variant is seeded into the `reference_types` table when a store is
/// created; its surrogate id is fixed by declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// Step calls a function on the test's own struct, declared in the test's file
    EmbeddedSelfContained,
    /// Step calls a function on another struct, declared in the test's file
    EmbeddedCrossStruct,
    /// Step calls a function on the test's own struct, declared in another file
    CrossFileSelfContained,
    /// Step calls a function on another struct, declared in another file
    CrossFileCrossStruct,
    LocalResolved,
    CrossFileResolved,
    UnresolvedExternal,
    /// `resource "type" "name"` block
    ResourceBlock,
    /// `data "type" "name"` block
    DataSourceBlock,
    /// `type.name.attribute` expression
    AttributeReference,
    SameService,
    CrossService,
    /// Entry point runs the referenced test as part of a sequential group
    SequentialRun,
    /// Referenced test lies outside the analyzed file set and is a stub row
    ExternalStub,
    Exported,
    Unexported,
}

impl ReferenceType {
    pub const ALL: [ReferenceType; 16] = [
        ReferenceType::EmbeddedSelfContained,
        ReferenceType::EmbeddedCrossStruct,
        ReferenceType::CrossFileSelfContained,
        ReferenceType::CrossFileCrossStruct,
        ReferenceType::LocalResolved,
        ReferenceType::CrossFileResolved,
        ReferenceType::UnresolvedExternal,
        ReferenceType::ResourceBlock,
        ReferenceType::DataSourceBlock,
        ReferenceType::AttributeReference,
        ReferenceType::SameService,
        ReferenceType::CrossService,
        ReferenceType::SequentialRun,
        ReferenceType::ExternalStub,
        ReferenceType::Exported,
        ReferenceType::Unexported,
    ];

    /// Surrogate id in the `reference_types` table
    pub fn id(&self) -> i64 {
        *self as i64 + 1
    }

    pub fn from_id(id: i64) -> Option<Self> {
        usize::try_from(id - 1)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::EmbeddedSelfContained => "embedded_self_contained",
            ReferenceType::EmbeddedCrossStruct => "embedded_cross_struct",
            ReferenceType::CrossFileSelfContained => "cross_file_self_contained",
            ReferenceType::CrossFileCrossStruct => "cross_file_cross_struct",
            ReferenceType::LocalResolved => "local_resolved",
            ReferenceType::CrossFileResolved => "cross_file_resolved",
            ReferenceType::UnresolvedExternal => "unresolved_external",
            ReferenceType::ResourceBlock => "resource_block",
            ReferenceType::DataSourceBlock => "data_source_block",
            ReferenceType::AttributeReference => "attribute_reference",
            ReferenceType::SameService => "same_service",
            ReferenceType::CrossService => "cross_service",
            ReferenceType::SequentialRun => "sequential_run",
            ReferenceType::ExternalStub => "external_stub",
            ReferenceType::Exported => "exported",
            ReferenceType::Unexported => "unexported",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    pub fn category(&self) -> ReferenceCategory {
        match self {
            ReferenceType::EmbeddedSelfContained
            | ReferenceType::EmbeddedCrossStruct
            | ReferenceType::CrossFileSelfContained
            | ReferenceType::CrossFileCrossStruct => ReferenceCategory::TestToConfiguration,
            ReferenceType::LocalResolved
            | ReferenceType::CrossFileResolved
            | ReferenceType::UnresolvedExternal => ReferenceCategory::FileLocality,
            ReferenceType::ResourceBlock
            | ReferenceType::DataSourceBlock
            | ReferenceType::AttributeReference => ReferenceCategory::ReferenceStyle,
            ReferenceType::SameService | ReferenceType::CrossService => {
                ReferenceCategory::ServiceBoundary
            }
            ReferenceType::SequentialRun | ReferenceType::ExternalStub => {
                ReferenceCategory::DependencyKind
            }
            ReferenceType::Exported | ReferenceType::Unexported => ReferenceCategory::Visibility,
        }
    }

    /// Classify a test step by where its configuration function lives
    pub fn for_step(same_file: bool, same_struct: bool) -> Self {
        match (same_file, same_struct) {
            (true, true) => ReferenceType::EmbeddedSelfContained,
            (true, false) => ReferenceType::EmbeddedCrossStruct,
            (false, true) => ReferenceType::CrossFileSelfContained,
            (false, false) => ReferenceType::CrossFileCrossStruct,
        }
    }

    pub fn for_boundary(crosses: bool) -> Self {
        if crosses {
            ReferenceType::CrossService
        } else {
            ReferenceType::SameService
        }
    }
}

/// How a configuration function receives its struct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiverKind {
    Value,
    Pointer,
}

impl ReceiverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiverKind::Value => "value",
            ReceiverKind::Pointer => "pointer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "value" => Some(ReceiverKind::Value),
            "pointer" => Some(ReceiverKind::Pointer),
            _ => None,
        }
    }
}

/// What the receiver expression of a method call is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallReceiver {
    /// The enclosing function's own receiver variable (`r.template(data)`)
    SelfReceiver,
    /// An identifier that is not the receiver (`vnet.basic(data)`)
    LocalVariable,
    /// A struct literal (`NetworkResource{}.basic(data)`)
    StructLiteral,
    /// Anything else: package selectors, call results, plain functions
    External,
}

impl CallReceiver {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallReceiver::SelfReceiver => "self_receiver",
            CallReceiver::LocalVariable => "local_variable",
            CallReceiver::StructLiteral => "struct_literal",
            CallReceiver::External => "external",
        }
    }

    /// Whether the receiver could name one of the analyzed structs
    pub fn is_struct_like(&self) -> bool {
        !matches!(self, CallReceiver::External)
    }
}

/// A method call found inside a function body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub line: u32,
    /// Source text of the receiver expression
    pub receiver: String,
    pub method: String,
    pub kind: CallReceiver,
    /// Struct name when the receiver is a struct literal
    pub literal_struct: Option<String>,
}

/// A local identifier bound to a struct value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalBinding {
    pub name: String,
    pub struct_name: String,
    pub line: u32,
}

/// One entry of a literal step table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStepDecl {
    /// Position in the step table, counting non-literal entries too
    pub index: u32,
    pub line: u32,
    /// Source text of the `Config` field, if the entry has one
    pub expression: Option<String>,
    /// The `Config` expression when it is a method call
    pub call: Option<CallSite>,
}

/// One `(group, key, target)` triple of a sequential invocation table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequentialEntry {
    pub group: String,
    pub key: String,
    /// Target identifier, possibly package qualified (`pkg.testAccFoo_basic`)
    pub target: String,
    pub line: u32,
}

/// Style of a literal resource mention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionStyle {
    ResourceBlock,
    DataSourceBlock,
    Attribute,
}

impl MentionStyle {
    pub fn reference_type(&self) -> ReferenceType {
        match self {
            MentionStyle::ResourceBlock => ReferenceType::ResourceBlock,
            MentionStyle::DataSourceBlock => ReferenceType::DataSourceBlock,
            MentionStyle::Attribute => ReferenceType::AttributeReference,
        }
    }
}

/// A resource type named inside a configuration template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMention {
    pub resource: String,
    pub style: MentionStyle,
    pub line: u32,
    /// The trimmed source line containing the mention
    pub context: String,
}

/// A declared test function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFunctionDecl {
    pub name: String,
    /// Struct of the first struct literal bound in the body
    pub struct_name: Option<String>,
    pub line: u32,
    pub call_sites: Vec<CallSite>,
    pub bindings: Vec<LocalBinding>,
    pub steps: Vec<TestStepDecl>,
    pub sequential: Vec<SequentialEntry>,
}

/// A declared configuration-builder function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFunctionDecl {
    pub name: String,
    pub struct_name: String,
    /// Receiver variable, `None` for `func (Foo) basic(...)`
    pub receiver_name: Option<String>,
    pub receiver_kind: ReceiverKind,
    pub returns_text: bool,
    pub exported: bool,
    pub line: u32,
    pub call_sites: Vec<CallSite>,
    pub bindings: Vec<LocalBinding>,
    pub mentions: Vec<ResourceMention>,
}

/// A resource type registered by the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationDecl {
    pub resource: String,
    pub line: u32,
}

/// Error during extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionError {
    pub message: String,
    pub file_path: String,
    pub line: Option<u32>,
}

/// Everything the extractor learned about one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub path: String,
    pub service: String,
    pub test_functions: Vec<TestFunctionDecl>,
    pub config_functions: Vec<ConfigFunctionDecl>,
    pub registrations: Vec<RegistrationDecl>,
    pub errors: Vec<ExtractionError>,
}

impl FileAnalysis {
    /// A record for a file that could not be analyzed at all
    pub fn failed(path: &str, service: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            service: service.to_string(),
            errors: vec![ExtractionError {
                message: message.into(),
                file_path: path.to_string(),
                line: None,
            }],
            ..Default::default()
        }
    }
}

/// Where a query row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Direct,
    Indirect,
    Sequential,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Direct => "direct",
            Origin::Indirect => "indirect",
            Origin::Sequential => "sequential",
        }
    }
}

/// One row of a blast-radius query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlastRow {
    /// Queried resources that produced this row, sorted
    pub resources: Vec<String>,
    pub origin: Origin,
    pub service: String,
    pub file_path: String,
    /// Configuration function for direct rows, test function otherwise
    pub function_name: String,
    pub line: u32,
    pub chain_depth: u32,
    pub crosses_boundary: bool,
    /// Reference style and context for direct rows, group/key for sequential rows
    pub detail: Option<String>,
}

/// Answer to a zero-argument query invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCapabilities {
    pub operations: Vec<String>,
    pub resources: Vec<String>,
}

/// Tests a service must run for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRunPlan {
    pub resource: String,
    pub service: String,
    pub tests: Vec<String>,
}

/// Store statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub table_counts: Vec<(String, u64)>,
    pub db_size_bytes: u64,
}
