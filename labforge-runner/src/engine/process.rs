//! Child process execution
//!
//! Shared by the engine and toolchain implementations. Output of streaming
//! commands is forwarded line by line through a single channel so the sink
//! sees lines in arrival order.

use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{EngineError, ProgressSink};

/// Lines of output kept to describe a failed streaming command
const TAIL_LINES: usize = 20;

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Converts a non-zero exit into [`EngineError::Failed`], returning stdout otherwise
    pub fn into_stdout(self, operation: &str) -> Result<String, EngineError> {
        if self.success() {
            return Ok(self.stdout);
        }

        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        };

        Err(EngineError::Failed {
            operation: operation.to_string(),
            code: self.code,
            detail,
        })
    }
}

fn program_name(command: &Command) -> String {
    command.as_std().get_program().to_string_lossy().to_string()
}

/// Runs a command to completion and captures its output
///
/// # Arguments
/// * `command` - Fully configured command (program, args, cwd, env)
/// * `operation` - Name used in logs and errors
/// * `stdin` - Optional input written to the process before waiting
pub async fn run_captured(
    mut command: Command,
    operation: &str,
    stdin: Option<&str>,
) -> Result<CommandOutcome, EngineError> {
    let program = program_name(&command);
    debug!("Running '{}' ({})", operation, program);

    command
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| EngineError::Spawn {
        program: program.clone(),
        source,
    })?;

    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input.as_bytes())
                .await
                .map_err(|source| EngineError::Io {
                    operation: operation.to_string(),
                    source,
                })?;
            // closing stdin signals end of input
            drop(pipe);
        }
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|source| EngineError::Io {
            operation: operation.to_string(),
            source,
        })?;

    let outcome = CommandOutcome {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    if !outcome.success() {
        debug!(
            "'{}' failed: exit_code={} stderr='{}'",
            operation,
            outcome.code,
            outcome.stderr.trim()
        );
    }

    Ok(outcome)
}

/// Runs a command and forwards every stdout/stderr line to the sink
///
/// # Returns
/// `Ok(())` on a zero exit status, [`EngineError::Failed`] carrying the last
/// lines of output otherwise
pub async fn run_streaming(
    mut command: Command,
    operation: &str,
    sink: &dyn ProgressSink,
) -> Result<(), EngineError> {
    let program = program_name(&command);
    debug!("Streaming '{}' ({})", operation, program);

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| EngineError::Spawn {
        program: program.clone(),
        source,
    })?;

    let io_error = |what: &str| EngineError::Io {
        operation: operation.to_string(),
        source: std::io::Error::other(format!("{} was not captured", what)),
    };
    let stdout = child.stdout.take().ok_or_else(|| io_error("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| io_error("stderr"))?;

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let tx_stderr = tx.clone();

    let stdout_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let stderr_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx_stderr.send(line).is_err() {
                break;
            }
        }
    });

    // The channel closes once both readers hit EOF
    let mut tail: VecDeque<String> = VecDeque::with_capacity(TAIL_LINES);
    while let Some(line) = rx.recv().await {
        if tail.len() == TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line.clone());
        sink.line(line).await;
    }

    if let Err(e) = stdout_handle.await {
        warn!("stdout reader for '{}' panicked: {}", operation, e);
    }
    if let Err(e) = stderr_handle.await {
        warn!("stderr reader for '{}' panicked: {}", operation, e);
    }

    let status = child.wait().await.map_err(|source| EngineError::Io {
        operation: operation.to_string(),
        source,
    })?;

    if status.success() {
        return Ok(());
    }

    let detail = if tail.is_empty() {
        "no output".to_string()
    } else {
        tail.into_iter().collect::<Vec<_>>().join("\n")
    };

    Err(EngineError::Failed {
        operation: operation.to_string(),
        code: status.code().unwrap_or(-1),
        detail,
    })
}
