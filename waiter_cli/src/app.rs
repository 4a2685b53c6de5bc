use crate::scenario::{clients_enter, table_calls_bill};
use crate::scene::{Scene, restaurant};
use crate::sim::{Restaurant, SharedRestaurant, SimulatedRobot, lock};
use eyre::{Result, WrapErr};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use waiter_agent::execution::run_execution_loop;
use waiter_agent::{
    ExecutionConfig, ExecutionTracker, KnowledgeStore, PlanSnapshot, PlannerConfig, PlannerHandle,
    PlannerWorker, Pose, SolverGateway,
};
use waiter_solver::SolverDyn;

/// How long the planner gets to finish its current episode on shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Simulation {
    /// Size of the group entering at the start, 0 for none.
    pub clients: usize,
    pub bill_table: Option<String>,
    pub bill_after: Duration,
    pub duration: Duration,
    /// Chairs occupied before the first episode.
    pub seated: Vec<String>,
    pub robot_speed: f64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            clients: 2,
            bill_table: None,
            bill_after: Duration::from_secs(20),
            duration: Duration::from_secs(60),
            seated: Vec::new(),
            robot_speed: crate::sim::ROBOT_SPEED,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub plans: usize,
    pub robot: Pose,
    pub seated: BTreeMap<String, u32>,
    pub billed: BTreeSet<String>,
}

/// Run the planner, the simulated robot and the scenario together until
/// `duration` elapses or `stop` resolves.
pub async fn run_simulation(
    store: KnowledgeStore,
    solver: Box<dyn SolverDyn>,
    planner: PlannerConfig,
    execution: ExecutionConfig,
    simulation: Simulation,
    stop: impl Future<Output = ()>,
) -> Result<SimulationReport> {
    let scene = Arc::new(restaurant()?);
    let world: SharedRestaurant = Arc::new(Mutex::new(Restaurant::new()));
    {
        let mut world = lock(&world);
        for chair in &simulation.seated {
            if world.seat_new_client(&scene, chair).is_none() {
                eyre::bail!("chair {chair} is unknown or already taken");
            }
        }
    }

    let (worker, handle) = PlannerWorker::new(store, SolverGateway::new(solver), planner);
    let mut worker = worker.spawn();
    let watcher = tokio::spawn(watch_plans(handle.plans()));

    handle.seed_initial_situation(lock(&world).initial_situation(&scene));
    handle.set_active(true);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let robot = SimulatedRobot::new(scene.clone(), world.clone(), execution.clone())
        .with_speed(simulation.robot_speed);
    let tracker = ExecutionTracker::for_planner(handle.clone());
    let execution_task = tokio::spawn(run_execution_loop(tracker, robot, execution, shutdown_rx));

    let scenario = tokio::spawn(drive_scenario(
        handle.clone(),
        scene,
        world.clone(),
        simulation.clone(),
    ));

    let finished = tokio::select! {
        _ = tokio::time::sleep(simulation.duration) => {
            tracing::info!("simulation time is up");
            None
        }
        _ = stop => {
            tracing::info!("simulation interrupted");
            None
        }
        result = &mut worker => Some(result),
    };

    scenario.abort();
    let _ = scenario.await;
    let _ = shutdown_tx.send(true);
    let robot = execution_task.await.wrap_err("execution loop panicked")?;
    drop(handle);

    let result = match finished {
        Some(result) => result,
        None => match tokio::time::timeout(SHUTDOWN_GRACE, &mut worker).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("planner did not stop in time, aborting it");
                worker.abort();
                Ok(Ok(()))
            }
        },
    };
    result.wrap_err("planner worker panicked")??;
    let plans = watcher.await.wrap_err("plan watcher panicked")?;

    let world = lock(&world);
    Ok(SimulationReport {
        plans,
        robot: robot.pose(),
        seated: world.seated().clone(),
        billed: world.billed().clone(),
    })
}

async fn drive_scenario(
    handle: PlannerHandle,
    scene: Arc<Scene>,
    world: SharedRestaurant,
    simulation: Simulation,
) {
    if simulation.clients > 0 {
        let stimulus = clients_enter(&mut lock(&world), simulation.clients);
        stimulus.send(&handle);
    }
    if let Some(table) = simulation.bill_table {
        tokio::time::sleep(simulation.bill_after).await;
        let stimulus = table_calls_bill(&lock(&world), &scene, &table);
        stimulus.send(&handle);
    }
}

/// Log every published plan; returns how many non-empty plans were seen.
async fn watch_plans(mut plans: watch::Receiver<Arc<PlanSnapshot>>) -> usize {
    let mut published = 0;
    while plans.changed().await.is_ok() {
        let plan = plans.borrow_and_update().clone();
        if plan.is_empty() {
            continue;
        }
        published += 1;
        let actions: Vec<String> = plan.actions.iter().map(ToString::to_string).collect();
        tracing::info!(
            episode = plan.episode,
            horizon = plan.horizon,
            actions = ?actions,
            "plan published"
        );
    }
    published
}
