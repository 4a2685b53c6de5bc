use crate::{Solver, SolverError, SolverOutput};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Placeholder substituted with the program path inside a command template.
pub const PROGRAM_PLACEHOLDER: &str = "{program}";

/// Runs the solver as a child process, one invocation per `solve` call.
///
/// The command template is split on whitespace; every occurrence of
/// [`PROGRAM_PLACEHOLDER`] is replaced with the program path. A template
/// without the placeholder gets the path appended as the last argument.
#[derive(Clone, Debug)]
pub struct ProcessSolver {
    command: String,
    timeout: Option<Duration>,
}

impl ProcessSolver {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    /// Kill the solver and fail with [`SolverError::Timeout`] past this limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self, program: &Path) -> Result<Vec<String>, SolverError> {
        let program = program.to_string_lossy();
        let mut substituted = false;
        let mut args: Vec<String> = self
            .command
            .split_whitespace()
            .map(|part| {
                if part.contains(PROGRAM_PLACEHOLDER) {
                    substituted = true;
                    part.replace(PROGRAM_PLACEHOLDER, &program)
                } else {
                    part.to_owned()
                }
            })
            .collect();
        if args.is_empty() {
            return Err(SolverError::EmptyCommand);
        }
        if !substituted {
            args.push(program.into_owned());
        }
        Ok(args)
    }
}

impl Solver for ProcessSolver {
    async fn solve(&mut self, program: &Path) -> Result<SolverOutput, SolverError> {
        let args = self.args(program)?;
        let (bin, rest) = args.split_first().ok_or(SolverError::EmptyCommand)?;

        let mut command = Command::new(bin);
        command
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(command = %args.join(" "), "invoking solver");
        let pending = command.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| SolverError::Timeout(limit))?,
            None => pending.await,
        }
        .map_err(|source| SolverError::Spawn {
            command: bin.clone(),
            source,
        })?;

        let result = SolverOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !result.stderr.trim().is_empty() {
            tracing::debug!(stderr = %result.stderr.trim(), "solver wrote to stderr");
        }
        Ok(result)
    }
}
