//! `deployd check`: validate configuration and show what would run

use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

use deployd_dispatch::{
    ActionRegistry, DeploydConfig, ExecutionMode, ManagedProcessBackend, SinkKind,
};

use super::{load_config, registry::render_registry};
use crate::error::CliResult;

/// Validates a configuration file
#[derive(Debug)]
pub struct CheckCommand {
    config: Option<PathBuf>,
}

impl CheckCommand {
    pub fn new(config: Option<PathBuf>) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> CliResult<()> {
        let (path, config) = load_config(self.config.clone())?;
        let registry = ActionRegistry::with_defaults(Arc::new(ManagedProcessBackend::new()))?;

        println!("Configuration OK: {}", path.display());
        print!("{}", render_config(&config));
        println!();
        print!("{}", render_registry(&registry));
        Ok(())
    }
}

/// Human-readable summary of a validated configuration
pub fn render_config(config: &DeploydConfig) -> String {
    let mut out = String::new();

    let mode = match config.execution.mode {
        ExecutionMode::Inline => "inline".to_string(),
        ExecutionMode::Pool => format!("pool ({} workers)", config.execution.workers),
    };
    let timeout = match config.action_timeout() {
        Some(limit) => format!("{}ms", limit.as_millis()),
        None => "none".to_string(),
    };
    let sink = match (config.results.sink, &config.results.path) {
        (SinkKind::Jsonl, Some(path)) => format!("jsonl ({})", path.display()),
        (SinkKind::Jsonl, None) => "jsonl".to_string(),
        (SinkKind::Log, _) => "log".to_string(),
    };

    let _ = writeln!(out, "execution:      {}", mode);
    let _ = writeln!(out, "inbox capacity: {}", config.inbox_capacity);
    let _ = writeln!(out, "action timeout: {}", timeout);
    let _ = writeln!(out, "results:        {}", sink);
    let _ = writeln!(out, "environments:   {}", config.environments.len());

    for env in &config.environments {
        let branch = env.data.git_branch().unwrap_or("-");
        let command = env.data.deploy_command().unwrap_or("(no deploy-command)");
        let _ = writeln!(out, "  {} [{}] {}", env.name, branch, command);
    }

    out
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use deployd_dispatch::{ConfigLoader, EnvironmentConfig, KvStore};
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_render_config_lists_environments() {
        let mut config = DeploydConfig::default();
        config.environments = vec![
            EnvironmentConfig {
                name: "prod".to_string(),
                data: KvStore::new()
                    .with("git-branch", "main")
                    .with("deploy-command", "./deploy.sh"),
            },
            EnvironmentConfig {
                name: "scratch".to_string(),
                data: KvStore::new(),
            },
        ];

        let text = render_config(&config);

        assert!(text.contains("execution:      inline"));
        assert!(text.contains("action timeout: 600000ms"));
        assert!(text.contains("results:        log"));
        assert!(text.contains("  prod [main] ./deploy.sh"));
        assert!(text.contains("  scratch [-] (no deploy-command)"));
    }

    #[test]
    fn test_render_pool_mode() {
        let mut config = DeploydConfig::default();
        config.execution.mode = ExecutionMode::Pool;
        config.execution.workers = 3;
        config.action_timeout_ms = 0;

        let text = render_config(&config);
        assert!(text.contains("execution:      pool (3 workers)"));
        assert!(text.contains("action timeout: none"));
    }

    #[test]
    fn test_render_loaded_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "environments:\n  - name: staging\n    data:\n      git-branch: develop"
        )
        .unwrap();

        let config = ConfigLoader::with_env_prefix("DEPLOYD_CLI_TEST_CHECK")
            .load(file.path())
            .unwrap();
        assert!(render_config(&config).contains("  staging [develop] (no deploy-command)"));
    }
}
