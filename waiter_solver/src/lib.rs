//! Boundary to the external answer-set solver.
//!
//! The solver is a black box: it is handed the path of a logic program and
//! returns whatever it printed. Interpreting that text is the caller's job.

pub mod process;
pub mod scripted;

pub use process::ProcessSolver;
pub use scripted::ScriptedSolver;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SolverOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl SolverOutput {
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// True when the solver printed nothing at all on stdout.
    pub fn is_empty(&self) -> bool {
        self.stdout.trim().is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("solver command is empty")]
    EmptyCommand,
    #[error("failed to run solver `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read program {path}: {source}")]
    Program {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("solver timed out after {0:?}")]
    Timeout(Duration),
}

pub trait Solver {
    fn solve(
        &mut self,
        program: &Path,
    ) -> impl Future<Output = Result<SolverOutput, SolverError>> + Send;

    fn boxed(self) -> Box<dyn SolverDyn>
    where
        Self: Sized + Send + 'static,
    {
        Box::new(self)
    }
}

pub trait SolverDyn: Send {
    fn solve<'a>(
        &'a mut self,
        program: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<SolverOutput, SolverError>> + Send + 'a>>;
}

impl<T: Solver + Send + 'static> SolverDyn for T {
    fn solve<'a>(
        &'a mut self,
        program: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<SolverOutput, SolverError>> + Send + 'a>> {
        Box::pin(Solver::solve(self, program))
    }
}
