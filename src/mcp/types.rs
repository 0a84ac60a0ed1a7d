//! Request types for MCP tools

use rmcp::schemars;
use serde::Deserialize;

/// Request for single-resource tools (direct, indirect)
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ResourceRequest {
    #[schemars(description = "Resource type name, e.g. 'azurerm_resource_group'")]
    pub resource: String,
}

/// Request for the combined tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CombinedRequest {
    #[schemars(
        description = "Resource type names. If empty, lists the available operations and loaded resources."
    )]
    pub resources: Vec<String>,
}
