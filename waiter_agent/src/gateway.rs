use crate::answer::AnswerSet;
use crate::knowledge::{KnowledgeError, KnowledgeStore};
use std::time::Duration;
use waiter_solver::{SolverDyn, SolverError};

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("no answer set at any horizon up to {max_horizon}: the program is inconsistent")]
    Inconsistent { max_horizon: u32 },
    #[error("no plan found within {max_horizon} steps; the horizon cap may be too low")]
    NoPlanFound { max_horizon: u32 },
    #[error("solver timed out after {limit:?} at horizon {horizon}")]
    Timeout { horizon: u32, limit: Duration },
    #[error(transparent)]
    Solver(SolverError),
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
}

impl PlanError {
    /// Recoverable failures leave the published plan in place and are
    /// retried on the next observation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlanError::Inconsistent { .. } | PlanError::NoPlanFound { .. } | PlanError::Timeout { .. }
        )
    }
}

/// Outcome of a single solver invocation.
#[derive(Debug, Clone)]
pub struct Probe {
    pub horizon: u32,
    pub silent: bool,
    pub answer: Option<AnswerSet>,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub horizon: u32,
    pub answer: AnswerSet,
}

pub struct SolverGateway {
    solver: Box<dyn SolverDyn>,
}

impl SolverGateway {
    pub fn new(solver: Box<dyn SolverDyn>) -> Self {
        Self { solver }
    }

    /// Run the solver once with the artifact's horizon set to `horizon`.
    pub async fn probe(
        &mut self,
        store: &mut KnowledgeStore,
        horizon: u32,
    ) -> Result<Probe, PlanError> {
        store.set_step_horizon(horizon)?;
        store.flush().await?;
        let output = self
            .solver
            .solve(store.path())
            .await
            .map_err(|err| match err {
                SolverError::Timeout(limit) => PlanError::Timeout { horizon, limit },
                other => PlanError::Solver(other),
            })?;
        if let Some(code) = output.exit_code.filter(|code| *code != 0) {
            tracing::debug!(horizon, code, stderr = %output.stderr.trim(), "solver exited with failure");
        }
        let answer = AnswerSet::parse(&output.stdout);
        tracing::debug!(horizon, satisfiable = answer.is_some(), "solver probe");
        Ok(Probe {
            horizon,
            silent: output.is_empty(),
            answer,
        })
    }

    /// Iterative deepening: the first horizon in `0..=max_horizon` that
    /// yields an answer set.
    pub async fn find_minimal_plan(
        &mut self,
        store: &mut KnowledgeStore,
        max_horizon: u32,
    ) -> Result<Plan, PlanError> {
        let mut all_silent = true;
        for horizon in 0..=max_horizon {
            let probe = self.probe(store, horizon).await?;
            if let Some(answer) = probe.answer {
                return Ok(Plan { horizon, answer });
            }
            all_silent &= probe.silent;
        }
        if all_silent {
            Err(PlanError::Inconsistent { max_horizon })
        } else {
            Err(PlanError::NoPlanFound { max_horizon })
        }
    }
}

impl std::fmt::Debug for SolverGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverGateway").finish_non_exhaustive()
    }
}
