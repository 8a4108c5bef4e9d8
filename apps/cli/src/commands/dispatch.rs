//! Dispatch command implementation.

use colored::Colorize;
use echosync_orchestrator::{CallMode, DispatchCoordinator, NodeOutcome, NodeSelector, RequestContext};

/// Execute the dispatch command.
///
/// Sends `message` to the nodes picked by `nodes` and prints every reply.
pub async fn execute(
    coordinator: &DispatchCoordinator,
    message: &str,
    nodes: Option<&str>,
    json_output: bool,
) -> anyhow::Result<()> {
    let selector: NodeSelector = nodes.unwrap_or_default().parse()?;
    let outcome = coordinator.dispatch_all(message, &selector, RequestContext::new()).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let analysis = &outcome.task_analysis;
    println!(
        "{} {} (confidence {:.1}, complexity {}, urgency {})",
        "Task:".bold(),
        analysis.primary_type.to_string().cyan(),
        analysis.confidence,
        analysis.complexity,
        analysis.urgency
    );
    println!();

    for (key, response) in &outcome.responses {
        match response {
            NodeOutcome::Completed(reply) => {
                let mode = match reply.mode {
                    CallMode::Live => "live".green(),
                    CallMode::Simulated => "simulated".yellow(),
                };
                let marker = if reply.success { "✓".green() } else { "✗".red() };
                println!("{} {} [{}, {} ms]", marker, key.bold(), mode, reply.elapsed_ms);
                println!("  {}", reply.message);
            }
            NodeOutcome::Failed { error, .. } => {
                println!("{} {}", "✗".red(), key.bold());
                println!("  {}", error.red());
            }
        }
        println!();
    }

    Ok(())
}
