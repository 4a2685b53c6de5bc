pub mod answer;
pub mod config;
pub mod execution;
pub mod gateway;
pub mod graph;
pub mod handler;
pub mod knowledge;
pub mod planner;

pub use answer::{ActionEntry, AnswerSet, FluentEntry};
pub use config::{ExecutionConfig, PlannerConfig};
pub use execution::{Actuator, Effects, ExecutionTracker, Robot, RobotAction};
pub use gateway::{PlanError, SolverGateway};
pub use graph::{Pose, PositionGraph};
pub use handler::Handler;
pub use knowledge::{KnowledgeError, KnowledgeStore, Region};
pub use planner::{Observation, PlanSnapshot, PlannerHandle, PlannerPhase, PlannerWorker};
