use crate::answer::ActionEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub fact: String,
    pub truth: bool,
}

impl Observation {
    pub fn new(fact: impl Into<String>, truth: bool) -> Self {
        Self {
            fact: fact.into(),
            truth,
        }
    }

    pub fn clause(&self, step: u32) -> String {
        format!("obs({},{},{}).", self.fact, self.truth, step)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub fact: String,
}

impl Goal {
    pub fn new(fact: impl Into<String>) -> Self {
        Self { fact: fact.into() }
    }

    pub fn clause(&self) -> String {
        format!("goal(I):- holds({},I).", self.fact)
    }
}

pub fn initial_clause(fact: &str) -> String {
    format!("holds({fact},0).")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlannerPhase {
    #[default]
    Idle,
    Buffering,
    Solving,
    Published,
}

/// Everything written into the knowledge artifact for one solve attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub number: u64,
    /// Time step stamped on this episode's observations.
    pub observation_step: u32,
    pub initial_situation: Vec<String>,
    pub observations: Vec<Observation>,
    pub goals: Vec<Goal>,
}

impl Episode {
    pub fn initial_clauses(&self) -> Vec<String> {
        self.initial_situation
            .iter()
            .map(|fact| initial_clause(fact))
            .collect()
    }

    pub fn observation_clauses(&self) -> Vec<String> {
        self.observations
            .iter()
            .map(|obs| obs.clause(self.observation_step))
            .collect()
    }

    pub fn goal_clauses(&self) -> Vec<String> {
        self.goals.iter().map(Goal::clause).collect()
    }
}

/// An immutable, published action stack.
#[derive(Debug, Clone)]
pub struct PlanSnapshot {
    pub id: Uuid,
    pub episode: u64,
    pub actions: Arc<[ActionEntry]>,
    pub horizon: u32,
    pub published_at: DateTime<Utc>,
}

impl PlanSnapshot {
    pub fn new(episode: u64, horizon: u32, actions: Vec<ActionEntry>) -> Self {
        Self {
            id: Uuid::now_v7(),
            episode,
            actions: actions.into(),
            horizon,
            published_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(0, 0, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ActionEntry> {
        self.actions.get(index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerState {
    pub phase: PlannerPhase,
    pub active: bool,
    /// Episodes attempted since the last reset.
    pub episode: u64,
    pub horizon: u32,
    pub pending_observations: Vec<Observation>,
    pub pending_goals: Vec<Goal>,
    pub initial_situation: Vec<String>,
    /// Fluents harvested from the last successful answer at its goal step.
    pub next_initial_situation: Option<Vec<String>>,
    pub last_published: Option<u64>,
}

impl PlannerState {
    /// A later observation of the same fact replaces the earlier one.
    pub fn buffer_observation(&mut self, observation: Observation) {
        match self
            .pending_observations
            .iter_mut()
            .find(|pending| pending.fact == observation.fact)
        {
            Some(pending) => pending.truth = observation.truth,
            None => self.pending_observations.push(observation),
        }
    }

    pub fn buffer_goal(&mut self, goal: Goal) {
        if !self.pending_goals.contains(&goal) {
            self.pending_goals.push(goal);
        }
    }

    pub fn ready_to_solve(&self) -> bool {
        self.active && self.phase != PlannerPhase::Solving && !self.pending_observations.is_empty()
    }
}
