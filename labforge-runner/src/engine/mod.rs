//! Infrastructure-as-code engine abstraction
//!
//! The driver talks to the engine only through the [`Engine`] trait. Every
//! call is scoped to a working directory, a stack name and an explicit
//! environment map carried by [`EngineContext`]; nothing is read from or
//! written to the orchestrator's own process environment.

mod process;
mod pulumi;

pub use process::{CommandOutcome, run_captured, run_streaming};
pub use pulumi::PulumiCli;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by engine and toolchain processes
#[derive(Debug, Error)]
pub enum EngineError {
    /// The executable could not be started
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully
    #[error("'{operation}' exited with code {code}: {detail}")]
    Failed {
        operation: String,
        code: i32,
        detail: String,
    },

    /// The process output could not be interpreted
    #[error("Failed to parse '{operation}' output: {message}")]
    Parse { operation: String, message: String },

    /// Pipe or wait failure while the process was running
    #[error("I/O error during '{operation}': {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

/// Sink receiving progress lines in the order the engine emits them
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Appends one line of progress
    async fn line(&self, line: String);
}

/// Scope of a single engine invocation
#[derive(Clone)]
pub struct EngineContext {
    /// Working directory holding the project descriptor and local state
    pub work_dir: PathBuf,
    /// Stack the operation targets
    pub stack: String,
    /// Variables added to the child process environment
    pub env: BTreeMap<String, String>,
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // values carry credentials
        f.debug_struct("EngineContext")
            .field("work_dir", &self.work_dir)
            .field("stack", &self.stack)
            .field("env_keys", &self.env.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Operations the driver needs from the infrastructure-as-code engine
#[async_trait]
pub trait Engine: Send + Sync {
    /// Selects an existing stack
    async fn select_stack(&self, ctx: &EngineContext) -> Result<(), EngineError>;

    /// Creates the stack
    async fn create_stack(&self, ctx: &EngineContext) -> Result<(), EngineError>;

    /// Lists the names of all stacks known to the backend
    async fn list_stacks(&self, ctx: &EngineContext) -> Result<Vec<String>, EngineError>;

    /// Sets one stack configuration value
    async fn set_config(
        &self,
        ctx: &EngineContext,
        key: &str,
        value: &str,
        secret: bool,
    ) -> Result<(), EngineError>;

    /// Plans changes without applying them
    async fn preview(&self, ctx: &EngineContext, sink: &dyn ProgressSink)
    -> Result<(), EngineError>;

    /// Creates or updates resources to match the program
    async fn up(&self, ctx: &EngineContext, sink: &dyn ProgressSink) -> Result<(), EngineError>;

    /// Tears down every resource of the stack
    async fn destroy(&self, ctx: &EngineContext, sink: &dyn ProgressSink)
    -> Result<(), EngineError>;

    /// Removes the stack's bookkeeping entry from the backend
    async fn remove_stack(&self, ctx: &EngineContext) -> Result<(), EngineError>;

    /// Reconciles recorded state with the cloud
    async fn refresh(&self, ctx: &EngineContext, sink: &dyn ProgressSink)
    -> Result<(), EngineError>;

    /// Reads the stack's untyped output map
    async fn read_outputs(&self, ctx: &EngineContext) -> Result<Map<String, JsonValue>, EngineError>;
}
