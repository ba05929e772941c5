//! Post-build shell command, run as the pipeline's plugin hook.
//!
//! The command runs in the project root through the platform shell with
//! `ULTRA_OUTPUT` set to the absolute output directory and `ULTRA_RESULTS`
//! holding the per-target results as JSON. A non-zero exit is reported as a
//! plugin failure; the published output is left as is.

use async_trait::async_trait;
use tokio::process::Command;
use ultra_build::{BuildPlugin, BuildResult, Builder, Error};

#[derive(Debug, Clone)]
pub struct CommandPlugin {
    command: String,
}

impl CommandPlugin {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn failure(&self, message: String) -> Error {
        Error::Plugin {
            plugin: self.name().to_string(),
            message,
        }
    }
}

#[async_trait]
impl BuildPlugin for CommandPlugin {
    fn name(&self) -> &str {
        "plugin-command"
    }

    async fn on_build(&self, builder: &Builder, results: &[BuildResult]) -> ultra_build::Result<()> {
        let context = builder.context();
        let results_json = serde_json::to_string(results)
            .map_err(|e| self.failure(format!("failed to serialize build results: {}", e)))?;

        tracing::debug!(command = %self.command, "running plugin command");
        let output = shell(&self.command)
            .current_dir(&context.root)
            .env("ULTRA_OUTPUT", &context.output)
            .env("ULTRA_RESULTS", results_json)
            .output()
            .await
            .map_err(|e| self.failure(format!("failed to spawn `{}`: {}", self.command, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            tracing::info!(plugin = self.name(), "{}", line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(format!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;
    use ultra_build::{BuildOptions, PassthroughCompiler};

    fn builder_for(root: &std::path::Path) -> Builder {
        let context = BuildOptions::new("./client.tsx", "./server.tsx")
            .root(root)
            .into_context()
            .unwrap();
        Builder::new(context, Arc::new(PassthroughCompiler))
    }

    #[tokio::test]
    async fn test_command_sees_output_dir() {
        let temp = TempDir::new().unwrap();
        let builder = builder_for(temp.path());
        let plugin = CommandPlugin::new("printf '%s' \"$ULTRA_OUTPUT\" > seen.txt");

        plugin.on_build(&builder, &[]).await.unwrap();

        let seen = std::fs::read_to_string(temp.path().join("seen.txt")).unwrap();
        assert_eq!(seen, temp.path().join(".ultra").display().to_string());
    }

    #[tokio::test]
    async fn test_failing_command_is_a_plugin_error() {
        let temp = TempDir::new().unwrap();
        let builder = builder_for(temp.path());
        let plugin = CommandPlugin::new("echo 'upload refused' >&2; exit 3");

        match plugin.on_build(&builder, &[]).await {
            Err(Error::Plugin { plugin, message }) => {
                assert_eq!(plugin, "plugin-command");
                assert!(message.contains("upload refused"), "{message}");
            }
            other => panic!("expected a plugin error, got {other:?}"),
        }
    }
}
