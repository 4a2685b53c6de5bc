//! Things that happen in the dining room, turned into planner input.

use crate::scene::Scene;
use crate::sim::Restaurant;
use waiter_agent::{Observation, PlannerHandle};

/// Observations and goals produced by one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stimulus {
    pub observations: Vec<Observation>,
    pub goals: Vec<String>,
}

impl Stimulus {
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty() && self.goals.is_empty()
    }

    pub fn send(&self, handle: &PlannerHandle) {
        for goal in &self.goals {
            handle.submit_goal(goal.clone());
        }
        for observation in &self.observations {
            handle.submit_observation(observation.fact.clone(), observation.truth);
        }
    }
}

/// A group of clients walks in and wants a table.
pub fn clients_enter(world: &mut Restaurant, count: usize) -> Stimulus {
    let group = world.clients_enter(count);
    let mut stimulus = Stimulus::default();
    for id in &group {
        stimulus.goals.push(format!("isattable(c{id},T)"));
        stimulus
            .observations
            .push(Observation::new(format!("has_entered(c{id})"), true));
    }
    for pair in group.windows(2) {
        stimulus
            .observations
            .push(Observation::new(format!("group(c{},c{})", pair[0], pair[1]), true));
    }
    tracing::info!(clients = ?group, "clients entered");
    stimulus
}

/// Someone at `table` waves for the bill; everyone seated there has to pay.
pub fn table_calls_bill(world: &Restaurant, scene: &Scene, table: &str) -> Stimulus {
    let clients = world.clients_at_table(scene, table);
    if clients.is_empty() {
        tracing::warn!(table, "bill requested at an empty table");
        return Stimulus::default();
    }
    tracing::info!(table, clients = ?clients, "bill requested");
    Stimulus {
        observations: vec![Observation::new(format!("bill_wave({table})"), true)],
        goals: clients.iter().map(|id| format!("haspaid(c{id})")).collect(),
    }
}
