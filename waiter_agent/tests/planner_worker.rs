mod common;

use common::{fixture, horizon_of, init_tracing};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use waiter_agent::execution::{Actuator, Effects};
use waiter_agent::{
    ExecutionTracker, PlanSnapshot, PlannerConfig, PlannerHandle, PlannerPhase, PlannerWorker,
    SolverGateway,
};
use waiter_solver::{ScriptedSolver, Solver};

const ANSWER: &str = "{occurs(go_to(agent,n2),0), occurs(go_to(agent,n5),1), \
holds(currentlocation(agent,n5),2), holds(isattable(c1,table1),2), goal(2)}";

fn config() -> PlannerConfig {
    PlannerConfig {
        debounce: Duration::from_millis(20),
        ..PlannerConfig::default()
    }
}

/// Satisfiable from horizon 2, unless the program mentions client c9.
fn solver() -> ScriptedSolver {
    ScriptedSolver::new(|program| {
        if program.contains("has_entered(c9)") {
            return String::new();
        }
        match horizon_of(program) {
            Some(horizon) if horizon >= 2 => format!("SPARC V2.58\n\n{ANSWER}\n"),
            _ => "SPARC V2.58\n\n".to_owned(),
        }
    })
}

async fn next_plan(handle: &PlannerHandle) -> Arc<PlanSnapshot> {
    let mut plans = handle.plans();
    let current = plans.borrow_and_update().id;
    timeout(Duration::from_secs(5), plans.wait_for(|plan| plan.id != current))
        .await
        .expect("timed out waiting for a plan")
        .expect("planner worker stopped")
        .clone()
}

async fn settle(handle: &PlannerHandle, solver: &ScriptedSolver, calls: usize) {
    timeout(Duration::from_secs(5), async {
        while solver.calls() < calls || handle.phase() == PlannerPhase::Solving {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for the planner to settle");
}

#[derive(Default)]
struct Waypoints {
    location: String,
    goal: Option<String>,
}

impl Actuator for Waypoints {
    fn is_near(&self, target: &str) -> bool {
        self.location == target
    }

    fn move_to(&mut self, target: &str) {
        self.goal = Some(target.to_owned());
    }

    fn current_goal_location(&self) -> Option<String> {
        self.goal.clone()
    }
}

impl Effects for Waypoints {}

#[tokio::test]
async fn test_episode_end_to_end() {
    init_tracing();
    let (_dir, path, store) = fixture().await;
    let solver = solver();
    let (worker, handle) =
        PlannerWorker::new(store, SolverGateway::new(solver.clone().boxed()), config());
    let task = worker.spawn();

    handle.set_active(true);
    handle.seed_initial_situation(["currentlocation(agent,n1)"]);
    handle.submit_goal("isattable(c1,T)");
    handle.submit_observation("has_entered(c1)", true);

    let plan = next_plan(&handle).await;
    assert_eq!(plan.episode, 1);
    assert_eq!(plan.horizon, 12);
    let names: Vec<_> = plan.actions.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["go_to(agent,n2)", "go_to(agent,n5)"]);

    // 0, 1, 2 for the minimal plan, then the widened horizon.
    let probed: Vec<_> = solver
        .transcript()
        .iter()
        .filter_map(|program| horizon_of(program))
        .collect();
    assert_eq!(probed, vec![0, 1, 2, 12]);

    let program = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(program.contains("#const nstep = 12."));
    assert!(program.contains("holds(currentlocation(agent,n1),0).\n%e_init"));
    assert!(program.contains("obs(has_entered(c1),true,0).\n%e_obs"));
    assert!(program.contains("goal(I):- holds(isattable(c1,T),I).\n%e_goal"));

    let mut tracker = ExecutionTracker::for_planner(handle.clone());
    let mut robot = Waypoints::default();
    tracker.poll(&mut robot);
    assert_eq!(tracker.cursor(), 0);
    assert_eq!(robot.goal.as_deref(), Some("n2"));

    robot.location = "n2".into();
    tracker.poll(&mut robot);
    assert_eq!(tracker.cursor(), 1);
    assert_eq!(robot.goal.as_deref(), Some("n5"));

    drop(tracker);
    drop(handle);
    timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_second_episode_uses_harvested_situation() {
    let (_dir, _path, store) = fixture().await;
    let solver = solver();
    let (worker, handle) =
        PlannerWorker::new(store, SolverGateway::new(solver.clone().boxed()), config());
    let _task = worker.spawn();

    handle.set_active(true);
    handle.submit_observation("has_entered(c1)", true);
    next_plan(&handle).await;

    handle.submit_observation("bill_wave(table1)", true);
    let plan = next_plan(&handle).await;
    assert_eq!(plan.episode, 2);
    assert_eq!(plan.horizon, 12, "horizon never shrinks");

    let transcript = solver.transcript();
    let second = transcript.last().unwrap();
    assert!(second.contains("holds(currentlocation(agent,n5),0)."));
    assert!(second.contains("holds(isattable(c1,table1),0)."));
    assert!(second.contains("obs(bill_wave(table1),true,1)."));
    assert!(!second.contains("has_entered(c1)"));
}

#[tokio::test]
async fn test_goals_are_rewritten_until_cleared() {
    let (_dir, path, store) = fixture().await;
    let solver = solver();
    let (worker, handle) =
        PlannerWorker::new(store, SolverGateway::new(solver.clone().boxed()), config());
    let task = worker.spawn();

    handle.set_active(true);
    handle.submit_goal("isattable(c1,T)");
    handle.submit_goal("haspaid(c2)");
    handle.submit_observation("has_entered(c1)", true);
    next_plan(&handle).await;

    handle.submit_observation("bill_wave(table1)", true);
    next_plan(&handle).await;
    let second = solver.transcript().last().unwrap().clone();
    assert!(second.contains(
        "goal(I):- holds(isattable(c1,T),I).\ngoal(I):- holds(haspaid(c2),I).\n%e_goal"
    ));

    handle.clear_goals();
    handle.submit_observation("has_entered(c2)", true);
    next_plan(&handle).await;
    let third = solver.transcript().last().unwrap().clone();
    assert!(third.contains("%b_goal\n%e_goal"));

    drop(handle);
    timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let program = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(!program.contains("haspaid(c2)"));
}

#[tokio::test]
async fn test_failed_replan_keeps_plan_and_cursor() {
    let (_dir, _path, store) = fixture().await;
    let solver = solver();
    let (worker, handle) =
        PlannerWorker::new(store, SolverGateway::new(solver.clone().boxed()), config());
    let _task = worker.spawn();

    handle.set_active(true);
    handle.submit_observation("has_entered(c1)", true);
    let plan = next_plan(&handle).await;

    let mut tracker = ExecutionTracker::for_planner(handle.clone());
    let mut robot = Waypoints {
        location: "n2".into(),
        goal: None,
    };
    tracker.poll(&mut robot);
    assert_eq!(tracker.cursor(), 1);

    let before = solver.calls();
    handle.submit_observation("has_entered(c9)", true);
    settle(&handle, &solver, before + 16).await;

    assert_eq!(handle.phase(), PlannerPhase::Buffering);
    assert_eq!(handle.latest_plan().id, plan.id);
    tracker.poll(&mut robot);
    assert_eq!(tracker.cursor(), 1);
    assert_eq!(tracker.plan().id, plan.id);
}

#[tokio::test]
async fn test_burst_of_observations_is_one_episode() {
    let (_dir, _path, store) = fixture().await;
    let solver = solver();
    let (worker, handle) =
        PlannerWorker::new(store, SolverGateway::new(solver.clone().boxed()), config());
    let _task = worker.spawn();

    handle.set_active(true);
    handle.submit_observation("has_entered(c1)", true);
    handle.submit_observation("has_entered(c2)", true);
    handle.submit_observation("group(c1,c2)", true);
    next_plan(&handle).await;

    let first = &solver.transcript()[0];
    assert!(first.contains("obs(has_entered(c1),true,0)."));
    assert!(first.contains("obs(has_entered(c2),true,0)."));
    assert!(first.contains("obs(group(c1,c2),true,0)."));
}

#[tokio::test]
async fn test_inactive_planner_waits() {
    let (_dir, _path, store) = fixture().await;
    let solver = solver();
    let (worker, handle) =
        PlannerWorker::new(store, SolverGateway::new(solver.clone().boxed()), config());
    let _task = worker.spawn();

    handle.submit_observation("has_entered(c1)", true);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(solver.calls(), 0);
    assert_eq!(handle.phase(), PlannerPhase::Buffering);

    handle.set_active(true);
    let plan = next_plan(&handle).await;
    assert_eq!(plan.episode, 1);
}

#[tokio::test]
async fn test_reset_clears_plan_and_artifact() {
    let (_dir, path, store) = fixture().await;
    let solver = solver();
    let (worker, handle) =
        PlannerWorker::new(store, SolverGateway::new(solver.clone().boxed()), config());
    let task = worker.spawn();

    handle.set_active(true);
    handle.submit_goal("isattable(c1,T)");
    handle.submit_observation("has_entered(c1)", true);
    next_plan(&handle).await;

    handle.reset_all();
    let plan = next_plan(&handle).await;
    assert!(plan.is_empty());
    assert_eq!(handle.phase(), PlannerPhase::Idle);

    drop(handle);
    timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let program = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(program, common::PROGRAM);
}
