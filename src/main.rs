//! blastmap: acceptance-test blast radius analysis
//!
//! Usage:
//!   blastmap build [path] [--target <resource>]...   Analyze tests and persist the store
//!   blastmap query [direct|indirect|combined] <resource>...
//!   blastmap status [path]                           Show store statistics
//!   blastmap serve                                   Start the MCP server (stdio transport)
//!   blastmap serve --port 8080                       Start the MCP server (HTTP transport)

mod server;

use std::env;

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use blastmap::cli::{build_command, query_command, status_command};

/// Environment variable holding a tracing filter directive
const ENV_LOG: &str = "BLASTMAP_LOG";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "serve" => {
            let port = flag_value(&args, "--port").and_then(|p| p.parse::<u16>().ok());
            let in_memory = args.iter().any(|a| a == "--in-memory");

            setup_logging(Level::DEBUG);
            if let Some(port) = port {
                server::start_http(port, in_memory)?;
            } else {
                server::start_stdio(in_memory)?;
            }
        }
        "build" => {
            setup_logging(Level::INFO);
            let (path, targets) = parse_build_args(&args[2..]);
            build_command(path, &targets)?;
        }
        "query" => {
            setup_logging(Level::WARN);
            let operation = args.get(2).map(|s| s.as_str());
            let resources = args.get(3..).map(|r| r.to_vec()).unwrap_or_default();
            query_command(".", operation, &resources)?;
        }
        "status" => {
            setup_logging(Level::WARN);
            let path = args.get(2).map(|s| s.as_str()).unwrap_or(".");
            status_command(path)?;
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        "--version" | "-V" | "version" => {
            print_version();
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
        }
    }

    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
}

/// Split `[path] [--target <resource>]...` into the path and the targets
fn parse_build_args(args: &[String]) -> (&str, Vec<String>) {
    let mut path = ".";
    let mut targets = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--target" | "-t" => {
                if let Some(target) = iter.next() {
                    targets.extend(target.split(',').map(|t| t.trim().to_string()));
                }
            }
            other => path = other,
        }
    }
    (path, targets)
}

fn print_usage() {
    println!(
        r#"blastmap: Acceptance-test blast radius analysis

USAGE:
    blastmap <COMMAND> [OPTIONS]

COMMANDS:
    build [path] [--target <resource>]...   Analyze test files and persist the store
    query                                   List available operations and loaded resources
    query direct <resource>...              Configuration functions mentioning a resource
    query indirect <resource>...            Tests reaching a resource through chains
    query combined <resource>...            Both, deduplicated, plus the run plan
    status [path]                           Show store statistics
    serve                                   Start the MCP server (stdio transport)
    serve --port <PORT>                     Start the MCP server (HTTP transport)
    serve --in-memory                       Build the store in memory instead of loading it
    help                                    Show this help message

ENVIRONMENT:
    BLASTMAP_ROOT         Project root for the server (default: current directory)
    BLASTMAP_THREADS      Extraction worker threads (default: available parallelism)
    BLASTMAP_IN_MEMORY    Set to 1 to never read or write the persisted store
    BLASTMAP_LOG          Tracing filter, e.g. "blastmap=debug"

EXAMPLES:
    blastmap build --target azurerm_resource_group
    blastmap build ~/src/provider -t azurerm_subnet,azurerm_virtual_network
    blastmap query combined azurerm_subnet
    blastmap serve --port 8080
"#
    );
}

fn print_version() {
    println!("blastmap {}", env!("CARGO_PKG_VERSION"));
}

fn setup_logging(level: Level) {
    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_writer(std::io::stderr);

    match env::var(ENV_LOG).ok().and_then(|v| EnvFilter::try_new(v).ok()) {
        Some(filter) => {
            tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish()).ok();
        }
        None => {
            tracing::subscriber::set_global_default(builder.with_max_level(level).finish()).ok();
        }
    }
}
