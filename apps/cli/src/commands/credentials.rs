//! Credentials command implementation.

use colored::Colorize;
use echosync_core::{CredentialState, CredentialStatus};
use echosync_orchestrator::DispatchCoordinator;
use serde_json::json;

use super::CredentialsCommand;

/// Executes the credentials command.
pub async fn execute(
    coordinator: &DispatchCoordinator,
    command: CredentialsCommand,
    json_output: bool,
) -> anyhow::Result<()> {
    match command {
        CredentialsCommand::Set { provider, key } => {
            set_credential(coordinator, &provider, &key, json_output).await
        }
        CredentialsCommand::Unset { provider } => {
            set_credential(coordinator, &provider, "", json_output).await
        }
        CredentialsCommand::Status => show_status(coordinator, json_output).await,
    }
}

async fn set_credential(
    coordinator: &DispatchCoordinator,
    provider: &str,
    key: &str,
    json_output: bool,
) -> anyhow::Result<()> {
    let status = coordinator.set_credential(provider, key).await?;
    let provider = provider.trim().to_lowercase();
    let entry = status.apis.iter().find(|api| api.provider == provider);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&json!({ "success": true, "provider": entry }))?);
    } else if key.trim().is_empty() {
        println!("{} Removed key for {}", "✓".green(), provider.cyan());
    } else {
        let preview = entry.map_or("", |e| e.preview.as_str());
        println!("{} Stored key for {} ({})", "✓".green(), provider.cyan(), preview.dimmed());
    }
    Ok(())
}

async fn show_status(coordinator: &DispatchCoordinator, json_output: bool) -> anyhow::Result<()> {
    let vault = coordinator.vault();
    let apis = vault.status().await;
    let failures = vault.load_failures().await;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "apis": apis, "load_failures": failures }))?
        );
        return Ok(());
    }

    println!("{}", "Credentials".bold().cyan());
    println!("  Store: {}", vault.credentials_path().display().to_string().dimmed());
    println!();
    print_table(&apis);

    if !failures.is_empty() {
        println!();
        println!("  {} {}", "Unreadable entries:".yellow(), failures.join(", "));
    }
    Ok(())
}

pub(crate) fn print_table(apis: &[CredentialStatus]) {
    for api in apis {
        let state = match api.state {
            CredentialState::Active => "active".green(),
            CredentialState::Missing => "missing".yellow(),
        };
        println!("  {:<12} {:<8} {}", api.provider, state, api.preview.dimmed());
    }
}
