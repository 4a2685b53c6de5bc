pub mod app;
pub mod scenario;
pub mod scene;
pub mod sim;

pub use app::{Simulation, SimulationReport, run_simulation};
pub use scene::{Scene, restaurant};
pub use sim::{Restaurant, SimulatedRobot};
