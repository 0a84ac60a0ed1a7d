//! MCP server startup for the stdio and HTTP transports

use std::sync::{Arc, Mutex};

use anyhow::Result;
use rmcp::{
    transport::stdio,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
    },
    ServiceExt,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use blastmap::cli::initialize_server_store;
use blastmap::mcp::BlastMapHandler;
use blastmap::Store;

const MCP_PATH: &str = "/mcp";

fn announce(project_root: &str, store: &Store) {
    info!("Project root: {}", project_root);
    match store.resource_names() {
        Ok(names) => info!("Serving blast radius for {} resources", names.len()),
        Err(err) => info!("Store opened, resource list unavailable: {}", err),
    }
}

/// Serve over stdin/stdout until the client disconnects
#[tokio::main]
pub async fn start_stdio(in_memory: bool) -> Result<()> {
    let (project_root, store) = initialize_server_store(in_memory)?;
    announce(&project_root, &store);

    let running = BlastMapHandler::new(store, project_root)
        .serve(stdio())
        .await?;
    info!("blastmap MCP server ready on stdio");
    running.waiting().await?;

    Ok(())
}

/// Serve streamable HTTP on localhost until Ctrl-C
#[tokio::main]
pub async fn start_http(port: u16, in_memory: bool) -> Result<()> {
    let (project_root, store) = initialize_server_store(in_memory)?;
    announce(&project_root, &store);

    // Every HTTP session queries the same read-only store
    let shared = Arc::new(Mutex::new(store));
    let shutdown = CancellationToken::new();

    let session_handler = move || Ok(BlastMapHandler::new_shared(shared.clone(), project_root.clone()));
    let mcp = StreamableHttpService::new(
        session_handler,
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig {
            cancellation_token: shutdown.child_token(),
            ..Default::default()
        },
    );
    let app = axum::Router::new().nest_service(MCP_PATH, mcp);

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("blastmap MCP server ready on http://{}{}", addr, MCP_PATH);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_interrupt(shutdown))
        .await?;

    Ok(())
}

async fn wait_for_interrupt(shutdown: CancellationToken) {
    tokio::signal::ctrl_c().await.ok();
    info!("Interrupted, closing MCP sessions");
    shutdown.cancel();
}
