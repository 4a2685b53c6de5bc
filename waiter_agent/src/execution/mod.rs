pub mod action;
pub mod tracker;

pub use action::RobotAction;
pub use tracker::{ExecutionTracker, TrackerEvent, run_execution_loop};

use crate::planner::Observation;
use std::time::Duration;

/// Motion interface of the robot.
pub trait Actuator {
    /// Whether the robot is close enough to `target` to count as arrived.
    fn is_near(&self, target: &str) -> bool;
    /// Start moving towards `target`. Replaces any previous destination.
    fn move_to(&mut self, target: &str);
    fn current_goal_location(&self) -> Option<String>;
    /// Advance the physical world by one frame.
    fn tick(&mut self, _dt: Duration) {}
}

/// Bookkeeping side effects of the non-motion actions. Each hook may report
/// observations back to the planner.
pub trait Effects {
    fn seat(&mut self, _client: &str, _table: &str) -> Vec<Observation> {
        Vec::new()
    }

    fn pick(&mut self, _client: &str) -> Vec<Observation> {
        Vec::new()
    }

    fn give_bill(&mut self, _target: &str) -> Vec<Observation> {
        Vec::new()
    }
}

pub trait Robot: Actuator + Effects {}

impl<T: Actuator + Effects> Robot for T {}
