//! Process seam for the CLI-backed gateways.
//!
//! `CommandRunner` is the trait the kubectl and gcloud gateways use to execute
//! external programs. `ProcessRunner` spawns real processes; `MockRunner`
//! records every invocation and replays canned output.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::GatewayError;

/// What a finished (or abandoned) process left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
    /// The process outlived the runner's own deadline and was killed.
    pub killed_on_timeout: bool,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> CommandOutput {
        CommandOutput { success: true, status: "exit status: 0".to_string(), stdout: stdout.into(), ..Default::default() }
    }

    pub fn failed(stderr: impl Into<String>) -> CommandOutput {
        CommandOutput { success: false, status: "exit status: 1".to_string(), stderr: stderr.into(), ..Default::default() }
    }

    /// Stdout of a successful run, or `CommandFailed` otherwise.
    pub fn into_stdout(self, program: &str) -> Result<String, GatewayError> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(GatewayError::CommandFailed { program: program.to_string(), status: self.status, stderr: self.stderr.trim().to_string() })
        }
    }
}

#[async_trait]
pub trait CommandRunner: std::fmt::Debug + Send + Sync {
    /// Runs `program` with `args`. A process that cannot be started is an error;
    /// a process that exits non-zero is reported through `CommandOutput`.
    async fn run(&self, program: &str, args: &[String], timeout: Option<Duration>) -> Result<CommandOutput, GatewayError>;
}

/// Production runner built on `tokio::process`.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Option<Duration>) -> Result<CommandOutput, GatewayError> {
        log::debug!("exec: {} {}", program, args.join(" "));

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GatewayError::Spawn { program: program.to_string(), source })?;

        let waited = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(waited) => waited,
                Err(_) => {
                    return Ok(CommandOutput {
                        success: false,
                        status: format!("killed after {}s", limit.as_secs()),
                        killed_on_timeout: true,
                        ..Default::default()
                    });
                }
            },
            None => child.wait_with_output().await,
        };
        let output = waited.map_err(|source| GatewayError::Spawn { program: program.to_string(), source })?;

        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            killed_on_timeout: false,
        })
    }
}

/// Test double that records argv and returns pre-configured responses in order.
/// Once the responses run out every call succeeds with empty output.
#[derive(Debug, Default)]
pub struct MockRunner {
    responses: Mutex<VecDeque<Result<CommandOutput, String>>>,
    commands: Mutex<Vec<Vec<String>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Err(msg)` responses simulate a process that could not be spawned.
    pub fn with_responses(responses: Vec<Result<CommandOutput, String>>) -> Self {
        MockRunner { responses: Mutex::new(responses.into()), commands: Mutex::new(Vec::new()) }
    }

    /// Every command executed so far, program first.
    pub fn executed_commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, program: &str, args: &[String], _timeout: Option<Duration>) -> Result<CommandOutput, GatewayError> {
        let mut argv = vec![program.to_string()];
        argv.extend(args.iter().cloned());
        self.commands.lock().unwrap_or_else(|e| e.into_inner()).push(argv);

        match self.responses.lock().unwrap_or_else(|e| e.into_inner()).pop_front() {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(GatewayError::Spawn { program: program.to_string(), source: std::io::Error::other(message) }),
            None => Ok(CommandOutput::ok("")),
        }
    }
}
