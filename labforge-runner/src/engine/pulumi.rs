//! Pulumi CLI engine
//!
//! Drives the `pulumi` executable as one child process per operation. The
//! working directory, stack and environment of every invocation come from the
//! [`EngineContext`]; long-running operations stream their output to the
//! caller's sink.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use tokio::process::Command;
use tracing::{debug, info};

use super::process::{run_captured, run_streaming};
use super::{Engine, EngineContext, EngineError, ProgressSink};

/// [`Engine`] implementation backed by the Pulumi CLI
#[derive(Debug, Clone)]
pub struct PulumiCli {
    binary: String,
}

impl PulumiCli {
    /// Creates a new Pulumi CLI engine
    ///
    /// # Arguments
    /// * `binary` - Executable name or path (e.g. "pulumi")
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, ctx: &EngineContext, args: &[&str]) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .current_dir(&ctx.work_dir)
            .args(args)
            .envs(&ctx.env);
        command
    }

    /// Command for an operation that streams progress
    fn streaming_command(&self, ctx: &EngineContext, args: &[&str]) -> Command {
        let mut command = self.command(ctx, args);
        command
            .arg("--stack")
            .arg(&ctx.stack)
            .arg("--non-interactive")
            .arg("--color")
            .arg("never");
        command
    }
}

#[derive(Debug, Deserialize)]
struct StackSummary {
    name: String,
}

/// Parses `pulumi stack ls --json` output into bare stack names
///
/// Names may come back qualified (`org/project/stack`); only the last segment
/// is kept.
fn parse_stack_list(raw: &str) -> Result<Vec<String>, EngineError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let stacks: Vec<StackSummary> =
        serde_json::from_str(raw).map_err(|e| EngineError::Parse {
            operation: "stack ls".to_string(),
            message: e.to_string(),
        })?;

    Ok(stacks
        .into_iter()
        .map(|s| match s.name.rsplit_once('/') {
            Some((_, name)) => name.to_string(),
            None => s.name,
        })
        .collect())
}

/// Parses `pulumi stack output --json` into an untyped map
fn parse_output_map(raw: &str) -> Result<Map<String, JsonValue>, EngineError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<JsonValue>(raw) {
        Ok(JsonValue::Object(map)) => Ok(map),
        Ok(other) => Err(EngineError::Parse {
            operation: "stack output".to_string(),
            message: format!("expected an object, got {}", other),
        }),
        Err(e) => Err(EngineError::Parse {
            operation: "stack output".to_string(),
            message: e.to_string(),
        }),
    }
}

#[async_trait]
impl Engine for PulumiCli {
    async fn select_stack(&self, ctx: &EngineContext) -> Result<(), EngineError> {
        let command = self.command(ctx, &["stack", "select", &ctx.stack, "--non-interactive"]);
        run_captured(command, "stack select", None)
            .await?
            .into_stdout("stack select")?;
        debug!("Selected stack {} in {}", ctx.stack, ctx.work_dir.display());
        Ok(())
    }

    async fn create_stack(&self, ctx: &EngineContext) -> Result<(), EngineError> {
        let command = self.command(ctx, &["stack", "init", &ctx.stack, "--non-interactive"]);
        run_captured(command, "stack init", None)
            .await?
            .into_stdout("stack init")?;
        info!("Created stack {} in {}", ctx.stack, ctx.work_dir.display());
        Ok(())
    }

    async fn list_stacks(&self, ctx: &EngineContext) -> Result<Vec<String>, EngineError> {
        let command = self.command(ctx, &["stack", "ls", "--json", "--non-interactive"]);
        let stdout = run_captured(command, "stack ls", None)
            .await?
            .into_stdout("stack ls")?;
        parse_stack_list(&stdout)
    }

    async fn set_config(
        &self,
        ctx: &EngineContext,
        key: &str,
        value: &str,
        secret: bool,
    ) -> Result<(), EngineError> {
        let mut command = self.command(ctx, &["config", "set", key, "--stack", &ctx.stack]);
        if secret {
            command.arg("--secret");
        }

        // the value goes through stdin so it never shows up in argv
        run_captured(command, "config set", Some(value))
            .await?
            .into_stdout("config set")?;
        Ok(())
    }

    async fn preview(
        &self,
        ctx: &EngineContext,
        sink: &dyn ProgressSink,
    ) -> Result<(), EngineError> {
        let command = self.streaming_command(ctx, &["preview", "--diff"]);
        run_streaming(command, "preview", sink).await
    }

    async fn up(&self, ctx: &EngineContext, sink: &dyn ProgressSink) -> Result<(), EngineError> {
        let command = self.streaming_command(ctx, &["up", "--yes", "--skip-preview"]);
        run_streaming(command, "up", sink).await
    }

    async fn destroy(
        &self,
        ctx: &EngineContext,
        sink: &dyn ProgressSink,
    ) -> Result<(), EngineError> {
        let command = self.streaming_command(ctx, &["destroy", "--yes", "--skip-preview"]);
        run_streaming(command, "destroy", sink).await
    }

    async fn remove_stack(&self, ctx: &EngineContext) -> Result<(), EngineError> {
        let command = self.command(
            ctx,
            &["stack", "rm", &ctx.stack, "--yes", "--non-interactive"],
        );
        run_captured(command, "stack rm", None)
            .await?
            .into_stdout("stack rm")?;
        info!("Removed stack {}", ctx.stack);
        Ok(())
    }

    async fn refresh(
        &self,
        ctx: &EngineContext,
        sink: &dyn ProgressSink,
    ) -> Result<(), EngineError> {
        let command = self.streaming_command(ctx, &["refresh", "--yes", "--skip-preview"]);
        run_streaming(command, "refresh", sink).await
    }

    async fn read_outputs(
        &self,
        ctx: &EngineContext,
    ) -> Result<Map<String, JsonValue>, EngineError> {
        let command = self.command(
            ctx,
            &[
                "stack",
                "output",
                "--json",
                "--show-secrets",
                "--stack",
                &ctx.stack,
                "--non-interactive",
            ],
        );
        let stdout = run_captured(command, "stack output", None)
            .await?
            .into_stdout("stack output")?;
        parse_output_map(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stack_list_strips_qualifiers() {
        let raw = r#"[
            {"name": "dev", "current": true},
            {"name": "organization/labforge-lab/staging", "current": false}
        ]"#;

        let stacks = parse_stack_list(raw).unwrap();
        assert_eq!(stacks, vec!["dev".to_string(), "staging".to_string()]);
    }

    #[test]
    fn test_parse_stack_list_empty() {
        assert!(parse_stack_list("").unwrap().is_empty());
        assert!(parse_stack_list("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_stack_list_garbage() {
        assert!(matches!(
            parse_stack_list("no stacks"),
            Err(EngineError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_output_map() {
        let map = parse_output_map(r#"{"clusterId": "abc", "nodes": 3}"#).unwrap();
        assert_eq!(map.get("clusterId"), Some(&JsonValue::from("abc")));
        assert_eq!(map.len(), 2);

        assert!(parse_output_map("[1, 2]").is_err());
        assert!(parse_output_map("  ").unwrap().is_empty());
    }
}
