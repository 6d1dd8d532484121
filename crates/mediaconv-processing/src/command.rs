//! Process execution seam.

use std::collections::VecDeque;
use std::io;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;

/// Result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// stdout followed by stderr, lossy UTF-8.
    pub output: String,
}

impl CommandOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            output: String::new(),
        }
    }

    pub fn failed(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            output: output.into(),
        }
    }
}

/// Runs one external program to completion. An `Err` means the program
/// could not be started; a non-zero exit is reported through
/// [`CommandOutput::success`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

/// Spawns real processes with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        let start = std::time::Instant::now();
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        tracing::debug!(
            program = %program,
            exit_code = ?output.status.code(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Command finished"
        );

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            output: combined,
        })
    }
}

/// One recorded call to a [`RecordingRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Test runner: records every invocation and replays scripted results.
///
/// Calls beyond the script succeed. With `touch_outputs`, a successful call
/// writes a small file at its last argument, standing in for the tool's
/// output.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    calls: Arc<Mutex<Vec<RecordedCommand>>>,
    script: Arc<Mutex<VecDeque<io::Result<CommandOutput>>>>,
    touch_outputs: bool,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touching_outputs() -> Self {
        Self {
            touch_outputs: true,
            ..Self::default()
        }
    }

    /// Queue the result of the next unscripted call.
    pub async fn push_result(&self, result: io::Result<CommandOutput>) {
        self.script.lock().await.push_back(result);
    }

    pub async fn calls(&self) -> Vec<RecordedCommand> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        self.calls.lock().await.push(RecordedCommand {
            program: program.to_string(),
            args: args.to_vec(),
        });

        let result = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput::ok()));

        if self.touch_outputs {
            if let (Ok(out), Some(target)) = (&result, args.last()) {
                if out.success {
                    tokio::fs::write(target, format!("{} output", program)).await?;
                }
            }
        }
        result
    }
}
