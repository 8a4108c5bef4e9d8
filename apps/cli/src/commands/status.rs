//! Status, health and node listing.

use colored::Colorize;
use echosync_orchestrator::{CallMode, DispatchCoordinator, NodeStatus};

use super::credentials::print_table;

/// Shows the full system status.
pub async fn execute_status(coordinator: &DispatchCoordinator, json_output: bool) -> anyhow::Result<()> {
    let status = coordinator.system_status().await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "EchoSync Status".bold().cyan());
    println!();
    println!("  State: {}", status.state.green());
    println!("  Version: {}", status.version);
    println!("  Uptime: {}s", status.uptime_secs);
    println!();

    println!("{}", "Nodes:".bold());
    print_nodes(&status.nodes);
    println!();

    println!("{}", "Credentials:".bold());
    print_table(&status.apis);
    Ok(())
}

/// Shows the compact health report.
pub async fn execute_health(coordinator: &DispatchCoordinator, json_output: bool) -> anyhow::Result<()> {
    let health = coordinator.health().await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&health)?);
        return Ok(());
    }

    println!("  Status: {}", health.status.green());
    println!("  Version: {}", health.version);
    println!("  Nodes: {}", health.nodes);
    println!("  Active credentials: {}", health.active_credentials);
    println!(
        "  Requests: {} total, {} ok, {} failed",
        health.metrics.total_requests, health.metrics.successful_requests, health.metrics.failed_requests
    );
    Ok(())
}

/// Lists the configured nodes.
pub async fn execute_nodes(coordinator: &DispatchCoordinator, json_output: bool) -> anyhow::Result<()> {
    let nodes = coordinator.node_statuses().await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    print_nodes(&nodes);
    Ok(())
}

fn print_nodes(nodes: &[NodeStatus]) {
    for node in nodes {
        let mode = match node.mode {
            CallMode::Live => "live".green(),
            CallMode::Simulated => "simulated".yellow(),
        };
        println!(
            "  {:<12} {:<24} {:<10} {}",
            node.key.bold(),
            node.name,
            node.provider.label(),
            mode
        );
    }
}
