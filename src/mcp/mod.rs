//! MCP (Model Context Protocol) server implementation
//!
//! Exposes blast-radius queries as MCP tools:
//! - blastmap_direct: Literal mentions of a resource
//! - blastmap_indirect: Tests reaching a resource through chains and sequential links
//! - blastmap_combined: Union of both for several resources
//! - blastmap_status: Store statistics

pub mod format;
pub mod types;

use std::sync::{Arc, Mutex};

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};

use crate::query::BlastRadius;
use crate::store::Store;

use format::{format_capabilities, format_rows_markdown, format_run_plan, format_stats};
use types::{CombinedRequest, ResourceRequest};

/// MCP server handler for blastmap
#[derive(Clone)]
pub struct BlastMapHandler {
    tool_router: ToolRouter<Self>,
    store: Arc<Mutex<Store>>,
    project_root: String,
}

#[tool_router]
impl BlastMapHandler {
    pub fn new(store: Store, project_root: String) -> Self {
        Self::new_shared(Arc::new(Mutex::new(store)), project_root)
    }

    /// Create a handler with a pre-wrapped store (for sharing across HTTP sessions)
    pub fn new_shared(store: Arc<Mutex<Store>>, project_root: String) -> Self {
        Self {
            tool_router: Self::tool_router(),
            store,
            project_root,
        }
    }

    /// Literal mentions of a resource
    #[tool(description = "List configuration functions whose templates mention a resource type directly.")]
    fn blastmap_direct(&self, Parameters(req): Parameters<ResourceRequest>) -> String {
        let store = match self.store.lock() {
            Ok(store) => store,
            Err(e) => return format!("Error: {}", e),
        };

        match BlastRadius::new(&store).direct(&req.resource) {
            Ok(rows) => format_rows_markdown(&format!("Direct references to {}", req.resource), &rows),
            Err(e) => format!("Error: {}", e),
        }
    }

    /// Tests reached through call chains and sequential links
    #[tool(description = "List test functions affected by a resource type through configuration call chains or sequential test groups.")]
    fn blastmap_indirect(&self, Parameters(req): Parameters<ResourceRequest>) -> String {
        let store = match self.store.lock() {
            Ok(store) => store,
            Err(e) => return format!("Error: {}", e),
        };

        match BlastRadius::new(&store).indirect(&req.resource) {
            Ok(rows) => format_rows_markdown(&format!("Tests affected by {}", req.resource), &rows),
            Err(e) => format!("Error: {}", e),
        }
    }

    /// Full blast radius for several resources
    #[tool(description = "Full blast radius for one or more resource types: direct mentions, affected tests and the per-service run plan. With no resources, lists available operations and loaded resources.")]
    fn blastmap_combined(&self, Parameters(req): Parameters<CombinedRequest>) -> String {
        let store = match self.store.lock() {
            Ok(store) => store,
            Err(e) => return format!("Error: {}", e),
        };
        let query = BlastRadius::new(&store);

        if req.resources.is_empty() {
            return match query.describe() {
                Ok(caps) => format_capabilities(&caps),
                Err(e) => format!("Error: {}", e),
            };
        }

        let rows = match query.combined(&req.resources) {
            Ok(rows) => rows,
            Err(e) => return format!("Error: {}", e),
        };
        let plans = match query.run_plan(&req.resources) {
            Ok(plans) => plans,
            Err(e) => return format!("Error: {}", e),
        };

        let mut output = format_rows_markdown(
            &format!("Blast radius of {}", req.resources.join(", ")),
            &rows,
        );
        output.push('\n');
        output.push_str(&format_run_plan(&plans));
        output
    }

    /// Store statistics
    #[tool(description = "Get the status of the blastmap store: row counts per table and store size.")]
    fn blastmap_status(&self) -> String {
        let store = match self.store.lock() {
            Ok(store) => store,
            Err(e) => return format!("Error: {}", e),
        };

        match store.stats() {
            Ok(stats) => format!("**Project root:** {}\n\n{}", self.project_root, format_stats(&stats)),
            Err(e) => format!("Error: {}", e),
        }
    }
}

#[tool_handler]
impl ServerHandler for BlastMapHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "blastmap finds the acceptance tests affected by a change to a resource type. \
                Use blastmap_combined for the full blast radius and run plan, \
                blastmap_direct/indirect for one side of it, and blastmap_status for store statistics."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
