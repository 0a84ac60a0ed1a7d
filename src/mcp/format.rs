//! Shared formatting for query results
//!
//! Used by both the MCP tools and the CLI.

use crate::types::{BlastRow, Origin, QueryCapabilities, ServiceRunPlan, StoreStats};

/// Normalize file path (remove leading ./)
pub fn normalize_path(path: &str) -> &str {
    path.trim_start_matches("./")
}

/// Format one result row as a list item with location
pub fn format_row(row: &BlastRow) -> String {
    let mut output = format!(
        "- **{}** `{}` - {}:{}",
        row.origin.as_str(),
        row.function_name,
        normalize_path(&row.file_path),
        row.line
    );
    if row.origin != Origin::Direct {
        output.push_str(&format!(" (depth {}", row.chain_depth));
        if row.crosses_boundary {
            output.push_str(", crosses service boundary");
        }
        output.push(')');
    }
    if row.resources.len() > 1 {
        output.push_str(&format!(" [{}]", row.resources.join(", ")));
    }
    if let Some(ref detail) = row.detail {
        output.push_str(&format!("\n  `{}`", detail));
    }
    output.push('\n');
    output
}

/// Format rows grouped by service under a heading
pub fn format_rows_markdown(title: &str, rows: &[BlastRow]) -> String {
    if rows.is_empty() {
        return format!("## {}\n\nNo results.\n", title);
    }

    let mut output = format!("## {}\n\n{} results\n", title, rows.len());
    let mut current: Option<&str> = None;
    for row in rows {
        if current != Some(row.service.as_str()) {
            output.push_str(&format!("\n### {}\n\n", row.service));
            current = Some(row.service.as_str());
        }
        output.push_str(&format_row(row));
    }
    output
}

pub fn format_capabilities(caps: &QueryCapabilities) -> String {
    let mut output = String::from("## Available operations\n\n");
    for op in &caps.operations {
        output.push_str(&format!("- {}\n", op));
    }
    output.push_str("\n## Loaded resources\n\n");
    if caps.resources.is_empty() {
        output.push_str("None.\n");
    }
    for resource in &caps.resources {
        output.push_str(&format!("- {}\n", resource));
    }
    output
}

pub fn format_run_plan(plans: &[ServiceRunPlan]) -> String {
    if plans.is_empty() {
        return String::from("## Run plan\n\nNo tests to run.\n");
    }
    let mut output = String::from("## Run plan\n\n");
    for plan in plans {
        output.push_str(&format!(
            "- **{}** `{}`: {}\n",
            plan.service,
            plan.resource,
            plan.tests.join(", ")
        ));
    }
    output
}

pub fn format_stats(stats: &StoreStats) -> String {
    let mut output = String::from("## blastmap Store Status\n\n");
    for (table, count) in &stats.table_counts {
        output.push_str(&format!("- {}: {}\n", table, count));
    }
    output.push_str(&format!(
        "\n**Store Size:** {:.2} KB\n",
        stats.db_size_bytes as f64 / 1024.0
    ));
    output
}
