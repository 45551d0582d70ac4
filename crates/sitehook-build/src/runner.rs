//! External command execution with the provisioned toolchain.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use sitehook_core::Redactor;
use sitehook_toolchain::Toolchain;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::RunnerError;

/// A command to run: program, arguments and optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<std::ffi::OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Command line as logged.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Command line, redacted
    pub command: String,
    /// Exit code; -1 when terminated by a signal
    pub exit_code: i32,
    /// stdout followed by stderr
    pub output: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs commands with the toolchain's search path and tool variables.
///
/// Program names are resolved against the toolchain `PATH`, so provisioned
/// tools shadow host ones.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    toolchain: Arc<Toolchain>,
    redactor: Redactor,
}

impl ProcessRunner {
    pub fn new(toolchain: Arc<Toolchain>) -> Self {
        Self {
            toolchain,
            redactor: Redactor::new(),
        }
    }

    /// Hide these values in logged command lines and output.
    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = redactor;
        self
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Run to completion and capture output.
    ///
    /// Returns `Ok` whatever the exit status; callers decide what a non-zero
    /// exit means. Fails only if the process cannot be started or awaited.
    pub async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        let command_line = self.redactor.redact(&spec.display());
        info!(event = "command.started", command = %command_line);
        let start = Instant::now();

        let env = self.toolchain.command_env()?;
        let program = self.resolve(&spec.program, &env);

        let mut command = Command::new(&program);
        command
            .args(&spec.args)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let child = command.spawn().map_err(|source| {
            warn!(event = "command.spawn_failed", command = %command_line, error = %source);
            RunnerError::Spawn {
                program: spec.program.clone(),
                source,
            }
        })?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|source| RunnerError::Wait {
                program: spec.program.clone(),
                source,
            })?;

        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));
        let captured = self.redactor.redact(&captured);

        let result = CommandOutput {
            command: command_line,
            exit_code: output.status.code().unwrap_or(-1),
            output: captured,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            event = "command.finished",
            command = %result.command,
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            output = %result.output,
        );
        Ok(result)
    }

    /// Look a bare program name up on the toolchain `PATH`; anything with a
    /// path separator is used as given.
    fn resolve(
        &self,
        program: &str,
        env: &[(std::ffi::OsString, std::ffi::OsString)],
    ) -> PathBuf {
        if program.contains(std::path::MAIN_SEPARATOR) {
            return PathBuf::from(program);
        }
        env.iter()
            .find(|(k, _)| k == "PATH")
            .and_then(|(_, path)| {
                std::env::split_paths(path)
                    .map(|dir| dir.join(program))
                    .find(|candidate| candidate.is_file())
            })
            .unwrap_or_else(|| PathBuf::from(program))
    }
}
