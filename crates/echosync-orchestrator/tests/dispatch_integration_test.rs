//! Integration tests for the dispatch coordinator
//!
//! Drives full dispatches against a temp-dir vault: simulated fallback,
//! node selection, partial failures, concurrency, status broadcast and the
//! bounded session history.

use echosync_core::{CredentialState, CredentialVault, EchoConfig};
use echosync_orchestrator::{
    CallMode, DispatchCoordinator, DispatchError, NodeSelector, RequestContext, TaskType,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;

fn test_config(dir: &Path) -> EchoConfig {
    let mut config = EchoConfig::default();
    config.storage.data_dir = dir.to_path_buf();
    config.simulation.min_delay_ms = 5;
    config.simulation.max_delay_ms = 20;
    config
}

async fn coordinator_with(config: &EchoConfig) -> DispatchCoordinator {
    let vault = Arc::new(CredentialVault::new(config));
    let coordinator = DispatchCoordinator::new(config, vault);
    coordinator.initialize().await;
    coordinator
}

/// Every node falls back to simulation without credentials
#[tokio::test]
async fn test_all_nodes_simulated_without_credentials() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator_with(&test_config(temp.path())).await;

    let outcome = coordinator
        .dispatch_all("hello", &NodeSelector::All, RequestContext::new())
        .await
        .unwrap();

    assert_eq!(outcome.responses.len(), 4);
    for (key, response) in &outcome.responses {
        let reply = response.reply().unwrap_or_else(|| panic!("{key} has no reply"));
        assert!(reply.success, "{key} failed: {}", reply.message);
        assert_eq!(reply.mode, CallMode::Simulated);
    }

    let metrics = coordinator.metrics().await;
    assert_eq!(metrics.total_requests, 1);
    assert_eq!(metrics.successful_requests, 1);
    assert_eq!(metrics.failed_requests, 0);
}

/// Empty messages are rejected before any node runs
#[tokio::test]
async fn test_empty_message_invokes_no_node() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator_with(&test_config(temp.path())).await;

    let result = coordinator.dispatch_all("", &NodeSelector::All, RequestContext::new()).await;
    assert!(matches!(result, Err(DispatchError::EmptyMessage)));

    for status in coordinator.node_statuses().await {
        assert_eq!(status.metrics.total_calls, 0, "{} was called", status.key);
    }
    assert_eq!(coordinator.metrics().await.total_requests, 0);
    assert!(coordinator.history().await.is_empty());
}

/// Explicit lists drop unknown keys and duplicates
#[tokio::test]
async fn test_explicit_selection_size() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator_with(&test_config(temp.path())).await;

    let selector = NodeSelector::from_value(Some(&serde_json::json!(["gpt", "ghost", "gpt", "perplexity"])));
    let outcome = coordinator.dispatch_all("status?", &selector, RequestContext::new()).await.unwrap();

    let keys: Vec<_> = outcome.responses.keys().cloned().collect();
    assert_eq!(keys, vec!["gpt", "perplexity"]);
}

/// Without a selection the classifier picks the nodes
#[tokio::test]
async fn test_auto_selection_follows_classifier() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator_with(&test_config(temp.path())).await;

    let outcome = coordinator
        .dispatch_all("Write a short story about a lighthouse", &NodeSelector::Auto, RequestContext::new())
        .await
        .unwrap();

    assert_eq!(outcome.task_analysis.primary_type, TaskType::Creative);
    assert_eq!(outcome.responses.len(), 3);
    assert!(outcome.responses.contains_key("gpt"));
    assert!(outcome.responses.contains_key("claude"));
    assert!(outcome.responses.contains_key("gemini"));
}

/// Explicit selections still report the task analysis
#[tokio::test]
async fn test_analysis_reported_for_explicit_selection() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator_with(&test_config(temp.path())).await;

    let outcome = coordinator
        .dispatch_all("Fix this bug in the server", &"gemini".parse().unwrap(), RequestContext::new())
        .await
        .unwrap();

    assert_eq!(outcome.task_analysis.primary_type, TaskType::Technical);
    assert_eq!(outcome.responses.len(), 1);
    assert!(outcome.responses.contains_key("gemini"));
}

/// One failing live provider does not affect its siblings
#[tokio::test]
async fn test_partial_failure_is_isolated() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/messages")
        .with_status(503)
        .with_body("overloaded")
        .create_async()
        .await;

    let temp = TempDir::new().unwrap();
    let mut config = test_config(temp.path());
    config.providers.claude.endpoint = server.url();
    let coordinator = coordinator_with(&config).await;
    coordinator.set_credential("claude", "sk-ant-test-0001").await.unwrap();

    let outcome = coordinator
        .dispatch_all("hello", &NodeSelector::All, RequestContext::new())
        .await
        .unwrap();
    mock.assert_async().await;

    let claude = outcome.responses["claude"].reply().unwrap();
    assert!(!claude.success);
    assert_eq!(claude.mode, CallMode::Live);
    assert!(claude.message.contains("503"));

    for key in ["gpt", "gemini", "perplexity"] {
        assert!(outcome.responses[key].is_success(), "{key} should succeed");
    }

    let metrics = coordinator.metrics().await;
    assert_eq!(metrics.successful_requests, 1);

    let claude_status = coordinator.node("claude").unwrap().metrics().await;
    assert_eq!(claude_status.failed_calls, 1);
}

/// Nodes run concurrently rather than one after another
#[tokio::test]
async fn test_nodes_run_concurrently() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(temp.path());
    config.simulation.min_delay_ms = 150;
    config.simulation.max_delay_ms = 150;
    let coordinator = coordinator_with(&config).await;

    let start = Instant::now();
    let outcome = coordinator
        .dispatch_all("hello", &NodeSelector::All, RequestContext::new())
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(outcome.responses.len(), 4);
    assert!(elapsed.as_millis() < 500, "dispatch took {elapsed:?}");
}

/// Credential changes publish a status snapshot
#[tokio::test]
async fn test_set_credential_broadcasts_status() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator_with(&test_config(temp.path())).await;
    let mut rx = coordinator.subscribe_status();

    coordinator.set_credential("openai", "sk-test-abcd-wxyz").await.unwrap();

    let status = rx.recv().await.unwrap();
    let openai = status.apis.iter().find(|api| api.provider == "openai").unwrap();
    assert_eq!(openai.state, CredentialState::Active);
    assert_eq!(openai.preview, "sk-t...wxyz");

    let gpt = status.nodes.iter().find(|node| node.key == "gpt").unwrap();
    assert_eq!(gpt.mode, CallMode::Live);

    coordinator.set_credential("openai", "").await.unwrap();
    let status = rx.recv().await.unwrap();
    let gpt = status.nodes.iter().find(|node| node.key == "gpt").unwrap();
    assert_eq!(gpt.mode, CallMode::Simulated);
}

/// Credentials persist and are reloaded by a new coordinator
#[tokio::test]
async fn test_credentials_survive_restart() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    {
        let coordinator = coordinator_with(&config).await;
        coordinator.set_credential("perplexity", "pplx-0000-1111").await.unwrap();
    }

    let coordinator = coordinator_with(&config).await;
    assert_eq!(coordinator.health().await.active_credentials, 1);
    assert_eq!(
        coordinator.vault().get("perplexity").await.as_deref(),
        Some("pplx-0000-1111")
    );
}

/// Session history keeps only the most recent dispatches
#[tokio::test]
async fn test_history_is_bounded() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(temp.path());
    config.server.history_limit = 2;
    let coordinator = coordinator_with(&config).await;

    for message in ["first", "second", "third"] {
        coordinator.dispatch_all(message, &"gpt".parse().unwrap(), RequestContext::new()).await.unwrap();
    }

    let history = coordinator.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].message, "second");
    assert_eq!(history[1].message, "third");
    assert_eq!(history[1].nodes, vec!["gpt"]);
}

/// Health and status reflect node and request counters
#[tokio::test]
async fn test_health_and_status_reports() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator_with(&test_config(temp.path())).await;
    coordinator.dispatch_all("hello", &NodeSelector::All, RequestContext::new()).await.unwrap();

    let health = coordinator.health().await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.nodes, 4);
    assert_eq!(health.active_credentials, 0);
    assert_eq!(health.metrics.successful_requests, 1);

    let status = coordinator.system_status().await;
    assert_eq!(status.state, "active");
    assert_eq!(status.nodes.len(), 4);
    assert_eq!(status.apis.len(), 4);
    for node in &status.nodes {
        assert_eq!(node.metrics.total_calls, 1);
        assert_eq!(node.metrics.successful_calls, 1);
    }

    let serialized = serde_json::to_value(&status).unwrap();
    assert_eq!(serialized["nodes"][0]["mode"], "simulated");
}
