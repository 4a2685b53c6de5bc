//! Planner and execution configuration shared between the CLI and tests

use eyre::{Result, WrapErr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use waiter_solver::ProcessSolver;

/// Default solver invocation; `{program}` is replaced with the artifact path
pub const DEFAULT_SOLVER_COMMAND: &str = "java -jar sparc.jar {program} -A -n 1";

pub const DEFAULT_PROGRAM_PATH: &str = "ProgramASP.sparc";

/// Name of the constant bounding the plan length
pub const DEFAULT_HORIZON_CONSTANT: &str = "nstep";

/// Highest horizon tried by the iterative-deepening search
pub const DEFAULT_MAX_HORIZON_PROBE: u32 = 15;

/// Steps added on top of the minimal plan length after each episode
pub const DEFAULT_HORIZON_SLACK: u32 = 10;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

pub const DEFAULT_SOLVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Simulation frames per second
pub const DEFAULT_TICK_RATE: f64 = 24.0;

pub const DEFAULT_ARRIVAL_TOLERANCE: f64 = 0.05;

pub const DEFAULT_WAYPOINT_TOLERANCE: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    pub solver_command: String,
    pub program_path: PathBuf,
    pub horizon_constant: String,
    pub max_horizon_probe: u32,
    pub horizon_slack: u32,
    pub debounce: Duration,
    /// `None` lets the solver run unbounded
    pub solver_timeout: Option<Duration>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            solver_command: DEFAULT_SOLVER_COMMAND.to_string(),
            program_path: PathBuf::from(DEFAULT_PROGRAM_PATH),
            horizon_constant: DEFAULT_HORIZON_CONSTANT.to_string(),
            max_horizon_probe: DEFAULT_MAX_HORIZON_PROBE,
            horizon_slack: DEFAULT_HORIZON_SLACK,
            debounce: DEFAULT_DEBOUNCE,
            solver_timeout: Some(DEFAULT_SOLVER_TIMEOUT),
        }
    }
}

impl PlannerConfig {
    /// Defaults overridden by `WAITER_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(command) = std::env::var("WAITER_SOLVER_CMD") {
            config.solver_command = command;
        }
        if let Ok(path) = std::env::var("WAITER_PROGRAM") {
            config.program_path = PathBuf::from(path);
        }
        if let Ok(name) = std::env::var("WAITER_HORIZON_CONSTANT") {
            config.horizon_constant = name;
        }
        if let Some(max) = env_parse("WAITER_MAX_HORIZON")? {
            config.max_horizon_probe = max;
        }
        if let Some(slack) = env_parse("WAITER_HORIZON_SLACK")? {
            config.horizon_slack = slack;
        }
        if let Some(millis) = env_parse("WAITER_DEBOUNCE_MS")? {
            config.debounce = Duration::from_millis(millis);
        }
        if let Some(secs) = env_parse::<u64>("WAITER_SOLVER_TIMEOUT_SECS")? {
            config.solver_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn solver(&self) -> ProcessSolver {
        let solver = ProcessSolver::new(&self.solver_command);
        match self.solver_timeout {
            Some(timeout) => solver.with_timeout(timeout),
            None => solver,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub tick_rate: f64,
    pub arrival_tolerance: f64,
    pub waypoint_tolerance: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            arrival_tolerance: DEFAULT_ARRIVAL_TOLERANCE,
            waypoint_tolerance: DEFAULT_WAYPOINT_TOLERANCE,
        }
    }
}

impl ExecutionConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(rate) = env_parse::<f64>("WAITER_TICK_RATE")? {
            if rate <= 0.0 {
                eyre::bail!("WAITER_TICK_RATE must be positive, got {rate}");
            }
            config.tick_rate = rate;
        }
        if let Some(tolerance) = env_parse("WAITER_ARRIVAL_TOLERANCE")? {
            config.arrival_tolerance = tolerance;
        }
        if let Some(tolerance) = env_parse("WAITER_WAYPOINT_TOLERANCE")? {
            config.waypoint_tolerance = tolerance;
        }
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate)
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .wrap_err_with(|| format!("invalid value for {key}: {value:?}")),
        Err(_) => Ok(None),
    }
}
