//! Deploy actions against real processes
//!
//! Uses `echo`, `printenv`, `pwd`, `false` and `sleep` through the managed
//! process backend, so these tests only run on Unix.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use deployd_cli::commands::run::process_backend;
use deployd_dispatch::{
    ActionRegistry, ActorSettings, DeploydConfig, Dispatcher, EnvironmentConfig,
    EnvironmentReport, Event, EventType, KvStore, ManagedProcessBackend, MemorySink,
    ResultRecord,
};
use tempfile::TempDir;

async fn deploy_once(
    env: KvStore,
    timeout: Option<Duration>,
) -> (Vec<ResultRecord>, EnvironmentReport) {
    let mut backend = ManagedProcessBackend::new();
    if let Some(limit) = timeout {
        backend = backend.with_timeout(limit);
    }
    let sink = Arc::new(MemorySink::new());
    let registry = ActionRegistry::with_defaults(Arc::new(backend)).unwrap();
    let settings = ActorSettings {
        action_timeout: timeout.map(|t| t * 4),
        ..ActorSettings::default()
    };
    let mut dispatcher = Dispatcher::new(registry, sink.clone(), settings);
    dispatcher
        .add_environment("prod", env.with("git-branch", "main"))
        .unwrap();

    let event = Event::new(
        EventType::Push,
        KvStore::new()
            .with("git-branch", "main")
            .with("git-commit", "abc123"),
    );
    dispatcher.submit("prod", event).await.unwrap();
    let mut reports = dispatcher.shutdown().await;
    (sink.records(), reports.remove(0))
}

fn result_json(record: &ResultRecord) -> serde_json::Value {
    serde_json::from_slice(&record.payload).unwrap()
}

#[tokio::test]
async fn test_echo_deploy_captures_substituted_output() {
    let env = KvStore::new()
        .with("deploy-command", "echo")
        .with("deploy-args", "deploying {{environment}} at {{event.git-commit}}");

    let (records, report) = deploy_once(env, None).await;

    assert_eq!(report.actions_succeeded, 1);
    let result = result_json(&records[0]);
    assert_eq!(result["stdout"], "deploying prod at abc123\n");
    assert_eq!(result["status"], "succeeded");
}

#[tokio::test]
async fn test_child_sees_exported_variables() {
    let env = KvStore::new()
        .with("deploy-command", "printenv")
        .with("deploy-args", "DEPLOYD_ENVIRONMENT DEPLOYD_EVENT_TYPE DEPLOYD_GIT_BRANCH");

    let (records, _) = deploy_once(env, None).await;

    assert_eq!(result_json(&records[0])["stdout"], "prod\npush\nmain\n");
}

#[tokio::test]
async fn test_deploy_dir_sets_working_directory() {
    let dir = TempDir::new().unwrap();
    let canonical = dir.path().canonicalize().unwrap();
    let env = KvStore::new()
        .with("deploy-command", "pwd")
        .with("deploy-dir", canonical.to_string_lossy());

    let (records, _) = deploy_once(env, None).await;

    let stdout = result_json(&records[0])["stdout"]
        .as_str()
        .unwrap()
        .trim()
        .to_string();
    assert_eq!(stdout, canonical.to_string_lossy());
}

#[tokio::test]
async fn test_failing_command_produces_failed_result() {
    let env = KvStore::new().with("deploy-command", "false");

    let (records, report) = deploy_once(env, None).await;

    assert_eq!(report.actions_failed, 0);
    let result = result_json(&records[0]);
    assert_eq!(result["status"], "failed");
    assert_eq!(result["exit_code"], 1);
}

#[tokio::test]
async fn test_slow_command_times_out_and_is_not_recorded() {
    let env = KvStore::new()
        .with("deploy-command", "sleep")
        .with("deploy-args", "30");

    let started = std::time::Instant::now();
    let (records, report) = deploy_once(env, Some(Duration::from_millis(200))).await;

    assert!(records.is_empty());
    assert_eq!(report.actions_failed, 1);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_missing_binary_is_a_failed_action() {
    let env = KvStore::new().with("deploy-command", "/nonexistent/deploy-binary");

    let (records, report) = deploy_once(env, None).await;

    assert!(records.is_empty());
    assert_eq!(report.actions_failed, 1);
}

#[tokio::test]
async fn test_cli_timeout_kills_whole_deploy_process_group() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("deploy.sh");
    let marker = dir.path().join("survived");
    std::fs::write(&script, "trap '' TERM\n(sleep 1; touch \"$1\") &\nsleep 30\n").unwrap();

    let config = DeploydConfig {
        action_timeout_ms: 300,
        environments: vec![EnvironmentConfig {
            name: "prod".to_string(),
            data: KvStore::new()
                .with("git-branch", "main")
                .with("deploy-command", "sh")
                .with(
                    "deploy-args",
                    format!("{} {}", script.display(), marker.display()),
                ),
        }],
        ..DeploydConfig::default()
    };

    let dispatcher = Dispatcher::from_config(&config, Arc::new(process_backend(&config)))
        .await
        .unwrap();
    dispatcher
        .submit(
            "prod",
            Event::new(EventType::Push, KvStore::new().with("git-branch", "main")),
        )
        .await
        .unwrap();
    let reports = dispatcher.shutdown().await;
    assert_eq!(reports[0].actions_failed, 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!marker.exists(), "a deploy subprocess outlived the action timeout");
}
