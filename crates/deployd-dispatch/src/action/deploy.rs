//! Factory for the deploy action
//!
//! Turns dispatch options into an [`ExecAction`] running the environment's
//! deploy command. Arguments come from `deploy-args`, split on whitespace,
//! and may reference any option with `{{key}}` placeholders:
//!
//! ```yaml
//! deploy-command: ./scripts/deploy.sh
//! deploy-args: "--env {{environment}} --rev {{event.git-commit}}"
//! ```

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use super::{
    exec::{CommandRequest, ExecAction, ProcessBackend},
    Action, ActionFactory,
};
use crate::{
    error::{DispatchError, Result},
    store::{KvStore, WellKnownKey, EVENT_KEY_PREFIX},
    types::ActionKind,
};

/// Builds [`ExecAction`]s that run an environment's deploy command
#[derive(Debug, Clone)]
pub struct DeployFactory {
    backend: Arc<dyn ProcessBackend>,
}

impl DeployFactory {
    pub fn new(backend: Arc<dyn ProcessBackend>) -> Self {
        Self { backend }
    }

    fn construction_error(reason: impl Into<String>) -> DispatchError {
        DispatchError::ActionConstruction {
            kind: ActionKind::Deploy,
            reason: reason.into(),
        }
    }
}

impl ActionFactory for DeployFactory {
    fn kind(&self) -> ActionKind {
        ActionKind::Deploy
    }

    fn make_action(&self, options: &KvStore) -> Result<Box<dyn Action>> {
        let environment = options
            .known_non_empty(WellKnownKey::Environment)
            .ok_or_else(|| Self::construction_error("dispatch options carry no environment name"))?;
        let command = options
            .deploy_command()
            .ok_or_else(|| Self::construction_error("no deploy-command configured"))?;

        let args = options
            .known(WellKnownKey::DeployArgs)
            .unwrap_or_default()
            .split_whitespace()
            .map(|arg| substitute(arg, options))
            .collect::<Result<Vec<_>>>()?;

        let mut request = CommandRequest::new(command).args(args);
        request.working_dir = options
            .known_non_empty(WellKnownKey::DeployDir)
            .map(PathBuf::from);

        let exported = [
            ("DEPLOYD_ENVIRONMENT", Some(environment)),
            ("DEPLOYD_EVENT_ID", options.known(WellKnownKey::EventId)),
            ("DEPLOYD_EVENT_TYPE", options.known(WellKnownKey::EventType)),
            ("DEPLOYD_GIT_BRANCH", event_value(options, WellKnownKey::GitBranch)),
            ("DEPLOYD_GIT_COMMIT", event_value(options, WellKnownKey::GitCommit)),
        ];
        for (name, value) in exported {
            if let Some(value) = value {
                request.env.insert(name.to_string(), value.to_string());
            }
        }

        Ok(Box::new(ExecAction::new(
            ActionKind::Deploy,
            request,
            self.backend.clone(),
        )))
    }
}

fn event_value(options: &KvStore, key: WellKnownKey) -> Option<&str> {
    options
        .get(&format!("{}{}", EVENT_KEY_PREFIX, key.as_str()))
        .filter(|v| !v.is_empty())
}

fn placeholder_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// Replace `{{key}}` placeholders with option values
fn substitute(template: &str, options: &KvStore) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut last = 0;

    for cap in placeholder_regex().captures_iter(template) {
        let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let value = options.get(name.as_str()).ok_or_else(|| {
            DeployFactory::construction_error(format!(
                "deploy-args references unknown option '{}'",
                name.as_str()
            ))
        })?;
        result.push_str(&template[last..whole.start()]);
        result.push_str(value);
        last = whole.end();
    }

    result.push_str(&template[last..]);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::action::exec::CommandOutput;

    #[derive(Debug, Default)]
    struct RecordingBackend {
        seen: Mutex<Vec<CommandRequest>>,
    }

    #[async_trait]
    impl ProcessBackend for RecordingBackend {
        async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(CommandOutput {
                exit_code: Some(0),
                ..CommandOutput::default()
            })
        }
    }

    fn options() -> KvStore {
        KvStore::new()
            .with("environment", "prod")
            .with("event-id", "evt-1")
            .with("event-type", "push")
            .with("deploy-command", "./deploy.sh")
            .with("event.git-branch", "main")
            .with("event.git-commit", "abc123")
    }

    async fn run_with(options: &KvStore) -> CommandRequest {
        let backend = Arc::new(RecordingBackend::default());
        let action = DeployFactory::new(backend.clone())
            .make_action(options)
            .unwrap();
        assert_eq!(action.kind(), ActionKind::Deploy);

        action.run().await.unwrap();
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        seen[0].clone()
    }

    #[tokio::test]
    async fn test_builds_request_from_options() {
        let opts = options()
            .with("deploy-args", "--env {{environment}} --rev {{event.git-commit}}")
            .with("deploy-dir", "/srv/app");

        let request = run_with(&opts).await;

        assert_eq!(request.command, "./deploy.sh");
        assert_eq!(request.args, vec!["--env", "prod", "--rev", "abc123"]);
        assert_eq!(request.working_dir, Some(PathBuf::from("/srv/app")));
        assert_eq!(request.env["DEPLOYD_ENVIRONMENT"], "prod");
        assert_eq!(request.env["DEPLOYD_EVENT_ID"], "evt-1");
        assert_eq!(request.env["DEPLOYD_EVENT_TYPE"], "push");
        assert_eq!(request.env["DEPLOYD_GIT_BRANCH"], "main");
        assert_eq!(request.env["DEPLOYD_GIT_COMMIT"], "abc123");
    }

    #[tokio::test]
    async fn test_optional_values_are_omitted() {
        let opts = KvStore::new()
            .with("environment", "staging")
            .with("deploy-command", "make");

        let request = run_with(&opts).await;

        assert!(request.args.is_empty());
        assert_eq!(request.working_dir, None);
        assert!(!request.env.contains_key("DEPLOYD_GIT_COMMIT"));
        assert_eq!(request.env["DEPLOYD_ENVIRONMENT"], "staging");
    }

    #[test]
    fn test_missing_deploy_command_is_construction_error() {
        let opts = KvStore::new()
            .with("environment", "prod")
            .with("git-branch", "main");

        let err = DeployFactory::new(Arc::new(RecordingBackend::default()))
            .make_action(&opts)
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::ActionConstruction {
                kind: ActionKind::Deploy,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_environment_is_construction_error() {
        let opts = KvStore::new().with("deploy-command", "./deploy.sh");
        let factory = DeployFactory::new(Arc::new(RecordingBackend::default()));
        assert!(factory.make_action(&opts).is_err());
    }

    #[test]
    fn test_unknown_placeholder_is_construction_error() {
        let opts = options().with("deploy-args", "--tag {{event.tag}}");
        let factory = DeployFactory::new(Arc::new(RecordingBackend::default()));

        let err = factory.make_action(&opts).unwrap_err();
        assert!(err.to_string().contains("event.tag"));
    }

    #[test]
    fn test_substitute_keeps_literal_text() {
        let opts = options();
        assert_eq!(
            substitute("release-{{ event.git-branch }}-final", &opts).unwrap(),
            "release-main-final"
        );
        assert_eq!(substitute("plain", &opts).unwrap(), "plain");
    }
}
