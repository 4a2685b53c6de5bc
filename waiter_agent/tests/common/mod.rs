#![allow(dead_code)]

use std::path::PathBuf;
use tempfile::TempDir;
use waiter_agent::KnowledgeStore;
use waiter_solver::ScriptedSolver;

pub const PROGRAM: &str = "\
% restaurant domain fixture
#const nstep = 0.
sorts
#step = 0..nstep.
#agent = {agent}.

%b_init
%e_init

%b_obs
% observations are appended here
%e_obs

%b_goal
%e_goal

rules
holds(F,0) :- init(F).
";

/// Horizon written into a program by the planner.
pub fn horizon_of(program: &str) -> Option<u32> {
    program.lines().find_map(|line| {
        let value = line.trim().strip_prefix("#const nstep =")?;
        value.trim().trim_end_matches('.').parse().ok()
    })
}

/// Silent below `min`, then always prints `answer`.
pub fn satisfiable_from(min: u32, answer: &'static str) -> ScriptedSolver {
    ScriptedSolver::new(move |program| match horizon_of(program) {
        Some(horizon) if horizon >= min => format!("SPARC V2.58\n\n{answer}\n"),
        _ => "SPARC V2.58\n\n".to_owned(),
    })
}

pub fn horizons(solver: &ScriptedSolver) -> Vec<u32> {
    solver
        .transcript()
        .iter()
        .filter_map(|program| horizon_of(program))
        .collect()
}

pub async fn fixture() -> (TempDir, PathBuf, KnowledgeStore) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("program.sparc");
    tokio::fs::write(&path, PROGRAM)
        .await
        .expect("Failed to write fixture program");
    let store = KnowledgeStore::open(&path, "nstep")
        .await
        .expect("Failed to open fixture program");
    (dir, path, store)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
