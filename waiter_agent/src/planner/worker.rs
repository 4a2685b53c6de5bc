//! Async driver around the planner state machine.
//!
//! The worker task owns the knowledge artifact and the solver gateway. Event
//! producers talk to it through a [`PlannerHandle`]; published plans and the
//! current phase are observable through `watch` channels.

use crate::config::PlannerConfig;
use crate::gateway::{PlanError, SolverGateway};
use crate::handler::Handler;
use crate::knowledge::{KnowledgeError, KnowledgeStore, Region};
use crate::planner::handler::{Command, EpisodeOutcome, Event, Planner};
use crate::planner::types::{Episode, Goal, Observation, PlanSnapshot, PlannerPhase};
use crate::answer::AnswerSet;
use eyre::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};

#[derive(Debug, Clone)]
pub enum PlannerMessage {
    Observation(Observation),
    Goal(Goal),
    ClearGoals,
    SeedInitialSituation(Vec<String>),
    SetActive(bool),
    Reset,
}

impl From<PlannerMessage> for Command {
    fn from(message: PlannerMessage) -> Self {
        match message {
            PlannerMessage::Observation(observation) => Command::SubmitObservation(observation),
            PlannerMessage::Goal(goal) => Command::SubmitGoal(goal),
            PlannerMessage::ClearGoals => Command::ClearGoals,
            PlannerMessage::SeedInitialSituation(facts) => Command::SeedInitialSituation(facts),
            PlannerMessage::SetActive(active) => Command::SetActive(active),
            PlannerMessage::Reset => Command::Reset,
        }
    }
}

/// Cloneable, non-blocking entry point into a running planner.
#[derive(Debug, Clone)]
pub struct PlannerHandle {
    tx: mpsc::UnboundedSender<PlannerMessage>,
    plans: watch::Receiver<Arc<PlanSnapshot>>,
    phase: watch::Receiver<PlannerPhase>,
}

impl PlannerHandle {
    fn send(&self, message: PlannerMessage) {
        if self.tx.send(message).is_err() {
            tracing::warn!("planner worker is gone, message dropped");
        }
    }

    pub fn submit_observation(&self, fact: impl Into<String>, truth: bool) {
        self.send(PlannerMessage::Observation(Observation::new(fact, truth)));
    }

    pub fn submit_goal(&self, fact: impl Into<String>) {
        self.send(PlannerMessage::Goal(Goal::new(fact)));
    }

    pub fn clear_goals(&self) {
        self.send(PlannerMessage::ClearGoals);
    }

    pub fn seed_initial_situation<I, S>(&self, facts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let facts = facts.into_iter().map(Into::into).collect();
        self.send(PlannerMessage::SeedInitialSituation(facts));
    }

    pub fn set_active(&self, active: bool) {
        self.send(PlannerMessage::SetActive(active));
    }

    pub fn reset_all(&self) {
        self.send(PlannerMessage::Reset);
    }

    pub fn plans(&self) -> watch::Receiver<Arc<PlanSnapshot>> {
        self.plans.clone()
    }

    pub fn latest_plan(&self) -> Arc<PlanSnapshot> {
        self.plans.borrow().clone()
    }

    pub fn phase(&self) -> PlannerPhase {
        *self.phase.borrow()
    }

    pub fn phases(&self) -> watch::Receiver<PlannerPhase> {
        self.phase.clone()
    }
}

pub struct PlannerWorker {
    planner: Planner,
    store: KnowledgeStore,
    gateway: SolverGateway,
    config: PlannerConfig,
    rx: mpsc::UnboundedReceiver<PlannerMessage>,
    plans: watch::Sender<Arc<PlanSnapshot>>,
    phase: watch::Sender<PlannerPhase>,
}

impl PlannerWorker {
    pub fn new(
        store: KnowledgeStore,
        gateway: SolverGateway,
        config: PlannerConfig,
    ) -> (Self, PlannerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (plans, plans_rx) = watch::channel(Arc::new(PlanSnapshot::empty()));
        let (phase, phase_rx) = watch::channel(PlannerPhase::Idle);
        let worker = Self {
            planner: Planner::new(),
            store,
            gateway,
            config,
            rx,
            plans,
            phase,
        };
        let handle = PlannerHandle {
            tx,
            plans: plans_rx,
            phase: phase_rx,
        };
        (worker, handle)
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    /// Run until every handle is dropped. Fatal errors stop the worker.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(program = %self.store.path().display(), "planner worker started");
        let result = self.run_inner().await;
        if let Err(err) = &result {
            tracing::error!(error = %err, "planner worker stopped");
        }
        self.store.close().await?;
        result
    }

    async fn run_inner(&mut self) -> Result<()> {
        loop {
            if self.planner.state().ready_to_solve() {
                if !self.debounce().await? {
                    return Ok(());
                }
                self.run_episode().await?;
                continue;
            }
            match self.rx.recv().await {
                Some(message) => self.handle(message)?,
                None => return Ok(()),
            }
        }
    }

    /// Let a burst of events settle. Returns `false` once the channel closed.
    async fn debounce(&mut self) -> Result<bool> {
        let deadline = Instant::now() + self.config.debounce;
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return Ok(true),
                message = self.rx.recv() => match message {
                    Some(message) => self.handle(message)?,
                    None => return Ok(false),
                },
            }
        }
    }

    fn handle(&mut self, message: PlannerMessage) -> Result<()> {
        tracing::debug!(?message, "planner message");
        let events = self.planner.process(message.into())?;
        for event in &events {
            if matches!(event, Event::Reset) {
                self.store.reset()?;
                self.plans.send_replace(Arc::new(PlanSnapshot::empty()));
                tracing::info!("planner reset");
            }
        }
        self.sync_phase();
        Ok(())
    }

    async fn run_episode(&mut self) -> Result<()> {
        let events = self.planner.process(Command::BeginEpisode)?;
        let Some(Event::EpisodeStarted(episode)) = events.into_iter().next() else {
            return Ok(());
        };
        self.sync_phase();
        tracing::info!(
            episode = episode.number,
            observations = episode.observations.len(),
            goals = episode.goals.len(),
            "replanning"
        );

        self.rewrite(&episode)?;
        let outcome = match self.solve().await {
            Ok((horizon, answer)) => EpisodeOutcome::Solved { horizon, answer },
            Err(err) if err.is_recoverable() => {
                tracing::warn!(episode = episode.number, error = %err, "replanning failed, keeping the current plan");
                EpisodeOutcome::Failed {
                    reason: err.to_string(),
                }
            }
            Err(err) => return Err(err.into()),
        };

        for event in self.planner.process(Command::CompleteEpisode(outcome))? {
            if let Event::PlanPublished {
                episode,
                horizon,
                actions,
                ..
            } = event
            {
                let snapshot = PlanSnapshot::new(episode, horizon, actions);
                tracing::info!(
                    episode,
                    horizon,
                    actions = snapshot.len(),
                    "plan published"
                );
                for (index, action) in snapshot.actions.iter().enumerate() {
                    tracing::debug!(index, step = action.step, action = %action.name, "planned action");
                }
                self.plans.send_replace(Arc::new(snapshot));
            }
        }
        self.sync_phase();
        Ok(())
    }

    fn rewrite(&mut self, episode: &Episode) -> Result<(), KnowledgeError> {
        for region in Region::ALL {
            self.store.clear_region(region)?;
        }
        self.store
            .write_region(Region::InitialSituation, episode.initial_clauses())?;
        self.store
            .write_region(Region::Observations, episode.observation_clauses())?;
        self.store
            .write_region(Region::Goals, episode.goal_clauses())?;
        Ok(())
    }

    /// Minimal plan first, then widen the horizon to leave room for what
    /// comes next. The published actions always come from the minimal answer.
    async fn solve(&mut self) -> Result<(u32, AnswerSet), PlanError> {
        let plan = self
            .gateway
            .find_minimal_plan(&mut self.store, self.config.max_horizon_probe)
            .await?;
        let horizon = self
            .planner
            .state()
            .horizon
            .max(plan.horizon + self.config.horizon_slack);
        tracing::debug!(minimal = plan.horizon, horizon, "minimal plan found");

        match self.gateway.probe(&mut self.store, horizon).await {
            Ok(probe) if probe.answer.is_some() => {}
            Ok(_) => tracing::warn!(horizon, "no answer set at the widened horizon"),
            Err(err) if err.is_recoverable() => {
                tracing::warn!(horizon, error = %err, "widened horizon probe failed")
            }
            Err(err) => return Err(err),
        }
        Ok((horizon, plan.answer))
    }

    fn sync_phase(&self) {
        self.phase.send_if_modified(|phase| {
            let current = self.planner.phase();
            let changed = *phase != current;
            *phase = current;
            changed
        });
    }
}
