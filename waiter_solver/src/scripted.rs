use crate::{Solver, SolverError, SolverOutput};
use std::path::Path;
use std::sync::{Arc, Mutex};

type Script = dyn Fn(&str) -> String + Send + Sync;

/// A solver that never leaves the process: the script maps the program text
/// to the raw output a real solver would have printed.
///
/// Every program it is handed is recorded, so callers can inspect exactly
/// what was submitted on each invocation.
#[derive(Clone)]
pub struct ScriptedSolver {
    script: Arc<Script>,
    transcript: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSolver {
    pub fn new(script: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            script: Arc::new(script),
            transcript: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always print the same output, regardless of the program.
    pub fn constant(output: impl Into<String>) -> Self {
        let output = output.into();
        Self::new(move |_| output.clone())
    }

    /// Programs seen so far, oldest first.
    pub fn transcript(&self) -> Vec<String> {
        match self.transcript.lock() {
            Ok(transcript) => transcript.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn calls(&self) -> usize {
        self.transcript().len()
    }
}

impl std::fmt::Debug for ScriptedSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedSolver")
            .field("calls", &self.calls())
            .finish()
    }
}

impl Solver for ScriptedSolver {
    async fn solve(&mut self, program: &Path) -> Result<SolverOutput, SolverError> {
        let text = tokio::fs::read_to_string(program)
            .await
            .map_err(|source| SolverError::Program {
                path: program.to_path_buf(),
                source,
            })?;
        let stdout = (self.script)(&text);
        if let Ok(mut transcript) = self.transcript.lock() {
            transcript.push(text);
        }
        Ok(SolverOutput::from_stdout(stdout))
    }
}
