pub mod handler;
pub mod types;
pub mod worker;

pub use handler::{Command, EpisodeOutcome, Event, Planner, PlannerError};
pub use types::{Episode, Goal, Observation, PlanSnapshot, PlannerPhase, PlannerState};
pub use worker::{PlannerHandle, PlannerMessage, PlannerWorker};
