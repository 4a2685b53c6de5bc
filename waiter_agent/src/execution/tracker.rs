use crate::answer::ActionEntry;
use crate::config::ExecutionConfig;
use crate::execution::{RobotAction, Robot};
use crate::planner::{Observation, PlanSnapshot, PlannerHandle};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    PlanAdopted { episode: u64, actions: usize },
    ActionStarted { index: usize, action: ActionEntry },
    ActionCompleted { index: usize, action: ActionEntry },
    /// The action could not be decoded and was skipped
    ActionSkipped { index: usize, action: ActionEntry },
    PlanExhausted { episode: u64 },
}

/// Walks the published action stack one entry at a time.
///
/// The tracker is the only owner of the execution cursor. A newly published
/// snapshot replaces the stack in full and resets the cursor to 0.
pub struct ExecutionTracker {
    plans: watch::Receiver<Arc<PlanSnapshot>>,
    feedback: Option<PlannerHandle>,
    plan: Arc<PlanSnapshot>,
    cursor: usize,
    started: bool,
    exhausted: bool,
}

impl ExecutionTracker {
    pub fn new(mut plans: watch::Receiver<Arc<PlanSnapshot>>) -> Self {
        let plan = plans.borrow_and_update().clone();
        Self {
            plans,
            feedback: None,
            plan,
            cursor: 0,
            started: false,
            exhausted: false,
        }
    }

    /// Track the plans of `handle` and send action feedback back to it.
    pub fn for_planner(handle: PlannerHandle) -> Self {
        let mut tracker = Self::new(handle.plans());
        tracker.feedback = Some(handle);
        tracker
    }

    pub fn plan(&self) -> &Arc<PlanSnapshot> {
        &self.plan
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_action(&self) -> Option<&ActionEntry> {
        self.plan.get(self.cursor)
    }

    /// Mark the current action done and return the one after it.
    pub fn complete_current_action(&mut self) -> Option<&ActionEntry> {
        if self.cursor < self.plan.len() {
            self.cursor += 1;
            self.started = false;
        }
        self.current_action()
    }

    /// One execution cycle: adopt a newer plan if one was published, then
    /// drive the current action as far as it goes in this cycle.
    pub fn poll<R: Robot + ?Sized>(&mut self, robot: &mut R) -> Vec<TrackerEvent> {
        let mut events = Vec::new();
        self.adopt_latest(&mut events);

        while let Some(entry) = self.current_action().cloned() {
            let index = self.cursor;
            if !self.started {
                self.started = true;
                tracing::debug!(index, action = %entry.name, "action started");
                events.push(TrackerEvent::ActionStarted {
                    index,
                    action: entry.clone(),
                });
            }

            let action = RobotAction::decode(&entry.name);
            let feedback = match &action {
                RobotAction::GoTo { target, .. } => {
                    if !robot.is_near(target) {
                        if robot.current_goal_location().as_deref() != Some(target.as_str()) {
                            robot.move_to(target);
                        }
                        break;
                    }
                    Vec::new()
                }
                RobotAction::Seat { client, table, .. } => robot.seat(client, table),
                RobotAction::Pick { client, .. } => robot.pick(client),
                RobotAction::GiveBill { target, .. } => robot.give_bill(target),
                RobotAction::Unknown { .. } => {
                    tracing::warn!(index, action = %entry.name, "unknown action, skipping");
                    events.push(TrackerEvent::ActionSkipped {
                        index,
                        action: entry.clone(),
                    });
                    Vec::new()
                }
            };

            self.forward(feedback);
            if !matches!(action, RobotAction::Unknown { .. }) {
                tracing::info!(index, step = entry.step, "order completed: {action}");
            }
            events.push(TrackerEvent::ActionCompleted {
                index,
                action: entry,
            });
            self.complete_current_action();
        }

        if self.current_action().is_none() && !self.exhausted {
            self.exhausted = true;
            if !self.plan.is_empty() {
                tracing::info!(episode = self.plan.episode, "plan exhausted");
            }
            events.push(TrackerEvent::PlanExhausted {
                episode: self.plan.episode,
            });
        }
        events
    }

    fn adopt_latest(&mut self, events: &mut Vec<TrackerEvent>) {
        if !self.plans.has_changed().unwrap_or(false) {
            return;
        }
        let latest = self.plans.borrow_and_update().clone();
        if latest.id == self.plan.id {
            return;
        }
        tracing::info!(
            episode = latest.episode,
            actions = latest.len(),
            "adopting new plan"
        );
        events.push(TrackerEvent::PlanAdopted {
            episode: latest.episode,
            actions: latest.len(),
        });
        self.plan = latest;
        self.cursor = 0;
        self.started = false;
        self.exhausted = false;
    }

    fn forward(&self, observations: Vec<Observation>) {
        let Some(handle) = &self.feedback else {
            return;
        };
        for observation in observations {
            tracing::debug!(fact = %observation.fact, truth = observation.truth, "feedback observation");
            handle.submit_observation(observation.fact, observation.truth);
        }
    }
}

/// Tick the robot and the tracker at the configured frame rate until
/// `shutdown` flips to true or its sender is dropped. Returns the robot.
pub async fn run_execution_loop<R>(
    mut tracker: ExecutionTracker,
    mut robot: R,
    config: ExecutionConfig,
    mut shutdown: watch::Receiver<bool>,
) -> R
where
    R: Robot + Send,
{
    let dt = config.tick_interval();
    let mut interval = tokio::time::interval(dt);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                robot.tick(dt);
                tracker.poll(&mut robot);
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!(cursor = tracker.cursor(), "execution loop stopped");
    robot
}
