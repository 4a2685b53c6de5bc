use crate::answer::{ActionEntry, AnswerSet};
use crate::handler::Handler;
use crate::planner::types::{Episode, Goal, Observation, PlannerPhase, PlannerState};
use serde::{Deserialize, Serialize};

/// Commands accepted by the planner state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    SubmitObservation(Observation),
    SubmitGoal(Goal),
    ClearGoals,
    SeedInitialSituation(Vec<String>),
    SetActive(bool),
    /// Take the pending buffers and start a solve attempt
    BeginEpisode,
    /// Report how the running solve attempt ended
    CompleteEpisode(EpisodeOutcome),
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EpisodeOutcome {
    Solved { horizon: u32, answer: AnswerSet },
    Failed { reason: String },
}

/// Events emitted by the planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ObservationBuffered(Observation),
    GoalBuffered(Goal),
    GoalsCleared,
    InitialSituationSeeded(Vec<String>),
    ActivationChanged(bool),
    EpisodeStarted(Episode),
    PlanPublished {
        episode: u64,
        horizon: u32,
        actions: Vec<ActionEntry>,
        /// `None` when the answer had no goal atom
        next_initial_situation: Option<Vec<String>>,
    },
    ReplanFailed {
        episode: u64,
        reason: String,
    },
    Reset,
}

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("cannot {command} while {phase:?}")]
    InvalidTransition {
        phase: PlannerPhase,
        command: &'static str,
    },
}

/// Event-sourced planner state machine. Holds no I/O; the worker drives it.
#[derive(Debug, Default)]
pub struct Planner {
    state: PlannerState,
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PlannerState {
        &self.state
    }

    pub fn phase(&self) -> PlannerPhase {
        self.state.phase
    }

    fn apply_event(&mut self, event: &Event) {
        let state = &mut self.state;
        match event {
            Event::ObservationBuffered(observation) => {
                state.buffer_observation(observation.clone());
                state.phase = Self::after_input(state.phase);
            }
            Event::GoalBuffered(goal) => {
                state.buffer_goal(goal.clone());
                state.phase = Self::after_input(state.phase);
            }
            Event::GoalsCleared => state.pending_goals.clear(),
            Event::InitialSituationSeeded(facts) => {
                state.initial_situation = facts.clone();
                state.next_initial_situation = None;
            }
            Event::ActivationChanged(active) => state.active = *active,
            Event::EpisodeStarted(episode) => {
                state.phase = PlannerPhase::Solving;
                state.episode = episode.number;
                state.initial_situation = episode.initial_situation.clone();
                state.next_initial_situation = None;
                state.pending_observations.clear();
            }
            Event::PlanPublished {
                episode,
                horizon,
                next_initial_situation,
                ..
            } => {
                state.horizon = *horizon;
                state.next_initial_situation = next_initial_situation.clone();
                state.last_published = Some(*episode);
                state.phase = if state.pending_observations.is_empty() {
                    PlannerPhase::Published
                } else {
                    PlannerPhase::Buffering
                };
            }
            Event::ReplanFailed { .. } => state.phase = PlannerPhase::Buffering,
            Event::Reset => {
                *state = PlannerState {
                    active: state.active,
                    ..PlannerState::default()
                };
            }
        }
    }

    fn after_input(phase: PlannerPhase) -> PlannerPhase {
        match phase {
            PlannerPhase::Solving => PlannerPhase::Solving,
            _ => PlannerPhase::Buffering,
        }
    }

    fn begin_episode(&self) -> Option<Episode> {
        if !self.state.ready_to_solve() {
            return None;
        }
        let initial_situation = self
            .state
            .next_initial_situation
            .clone()
            .unwrap_or_else(|| self.state.initial_situation.clone());
        Some(Episode {
            number: self.state.episode + 1,
            observation_step: u32::try_from(self.state.episode).unwrap_or(u32::MAX),
            initial_situation,
            observations: self.state.pending_observations.clone(),
            goals: self.state.pending_goals.clone(),
        })
    }

    fn complete_episode(&self, outcome: EpisodeOutcome) -> Event {
        let episode = self.state.episode;
        match outcome {
            EpisodeOutcome::Solved { horizon, answer } => Event::PlanPublished {
                episode,
                horizon,
                actions: answer.action_stack(),
                next_initial_situation: answer
                    .current_goal_step()
                    .map(|step| answer.fluents_at(step)),
            },
            EpisodeOutcome::Failed { reason } => Event::ReplanFailed { episode, reason },
        }
    }
}

impl Handler for Planner {
    type Command = Command;
    type Event = Event;
    type Error = PlannerError;

    fn process(&mut self, command: Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = match command {
            Command::SubmitObservation(observation) => vec![Event::ObservationBuffered(observation)],
            Command::SubmitGoal(goal) => vec![Event::GoalBuffered(goal)],
            Command::ClearGoals => vec![Event::GoalsCleared],
            Command::SeedInitialSituation(facts) => vec![Event::InitialSituationSeeded(facts)],
            Command::SetActive(true) => vec![Event::ActivationChanged(true)],
            Command::SetActive(false) => vec![Event::ActivationChanged(false), Event::Reset],
            Command::BeginEpisode => {
                if self.state.phase == PlannerPhase::Solving {
                    return Err(PlannerError::InvalidTransition {
                        phase: self.state.phase,
                        command: "begin an episode",
                    });
                }
                self.begin_episode()
                    .map(Event::EpisodeStarted)
                    .into_iter()
                    .collect()
            }
            Command::CompleteEpisode(outcome) => {
                if self.state.phase != PlannerPhase::Solving {
                    return Err(PlannerError::InvalidTransition {
                        phase: self.state.phase,
                        command: "complete an episode",
                    });
                }
                vec![self.complete_episode(outcome)]
            }
            Command::Reset => vec![Event::Reset],
        };
        for event in &events {
            self.apply_event(event);
        }
        Ok(events)
    }

    fn fold(events: &[Self::Event]) -> Self {
        let mut planner = Self::new();
        for event in events {
            planner.apply_event(event);
        }
        planner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(raw: &str) -> AnswerSet {
        AnswerSet::parse(raw).unwrap()
    }

    fn active() -> Planner {
        let mut planner = Planner::new();
        planner.process(Command::SetActive(true)).unwrap();
        planner
    }

    fn start(planner: &mut Planner) -> Episode {
        match planner.process(Command::BeginEpisode).unwrap().as_slice() {
            [Event::EpisodeStarted(episode)] => episode.clone(),
            other => panic!("expected an episode, got {other:?}"),
        }
    }

    #[test]
    fn test_phase_transitions() {
        let mut planner = active();
        assert_eq!(planner.phase(), PlannerPhase::Idle);

        planner
            .process(Command::SubmitObservation(Observation::new("has_entered(c1)", true)))
            .unwrap();
        assert_eq!(planner.phase(), PlannerPhase::Buffering);

        start(&mut planner);
        assert_eq!(planner.phase(), PlannerPhase::Solving);

        planner
            .process(Command::CompleteEpisode(EpisodeOutcome::Solved {
                horizon: 13,
                answer: answer("{occurs(go_to(agent,n2),0) goal(1)}"),
            }))
            .unwrap();
        assert_eq!(planner.phase(), PlannerPhase::Published);
        assert_eq!(planner.state().horizon, 13);

        planner
            .process(Command::SubmitGoal(Goal::new("haspaid(c1)")))
            .unwrap();
        assert_eq!(planner.phase(), PlannerPhase::Buffering);
    }

    #[test]
    fn test_goals_alone_do_not_start_an_episode() {
        let mut planner = active();
        planner
            .process(Command::SubmitGoal(Goal::new("isattable(c1,T)")))
            .unwrap();
        assert!(planner.process(Command::BeginEpisode).unwrap().is_empty());
    }

    #[test]
    fn test_inactive_planner_does_not_solve() {
        let mut planner = Planner::new();
        planner
            .process(Command::SubmitObservation(Observation::new("has_entered(c1)", true)))
            .unwrap();
        assert!(planner.process(Command::BeginEpisode).unwrap().is_empty());
    }

    #[test]
    fn test_observations_are_stamped_with_the_episode_counter() {
        let mut planner = active();
        planner
            .process(Command::SubmitObservation(Observation::new("has_entered(c1)", true)))
            .unwrap();
        let first = start(&mut planner);
        assert_eq!(first.observation_clauses(), vec!["obs(has_entered(c1),true,0)."]);
        planner
            .process(Command::CompleteEpisode(EpisodeOutcome::Failed {
                reason: "no plan".into(),
            }))
            .unwrap();

        planner
            .process(Command::SubmitObservation(Observation::new("has_entered(c2)", true)))
            .unwrap();
        let second = start(&mut planner);
        assert_eq!(second.number, 2);
        assert_eq!(second.observation_clauses(), vec!["obs(has_entered(c2),true,1)."]);
    }

    #[test]
    fn test_failed_episode_keeps_goals_and_drops_observations() {
        let mut planner = active();
        planner
            .process(Command::SubmitGoal(Goal::new("isattable(c1,T)")))
            .unwrap();
        planner
            .process(Command::SubmitObservation(Observation::new("has_entered(c1)", true)))
            .unwrap();
        start(&mut planner);
        let events = planner
            .process(Command::CompleteEpisode(EpisodeOutcome::Failed {
                reason: "inconsistent".into(),
            }))
            .unwrap();

        assert!(matches!(events.as_slice(), [Event::ReplanFailed { episode: 1, .. }]));
        assert_eq!(planner.phase(), PlannerPhase::Buffering);
        assert_eq!(planner.state().pending_goals, vec![Goal::new("isattable(c1,T)")]);
        assert!(planner.state().pending_observations.is_empty());
        assert_eq!(planner.state().last_published, None);
    }

    #[test]
    fn test_goals_outlive_a_published_plan() {
        let mut planner = active();
        planner
            .process(Command::SubmitGoal(Goal::new("isattable(c1,T)")))
            .unwrap();
        planner
            .process(Command::SubmitGoal(Goal::new("haspaid(c2)")))
            .unwrap();
        planner
            .process(Command::SubmitObservation(Observation::new("has_entered(c1)", true)))
            .unwrap();
        start(&mut planner);
        planner
            .process(Command::CompleteEpisode(EpisodeOutcome::Solved {
                horizon: 10,
                answer: answer("{occurs(go_to(agent,n2),0) goal(1)}"),
            }))
            .unwrap();
        assert_eq!(planner.state().pending_goals.len(), 2);

        planner
            .process(Command::SubmitObservation(Observation::new("bill_wave(table1)", true)))
            .unwrap();
        let second = start(&mut planner);
        assert_eq!(
            second.goal_clauses(),
            vec![
                "goal(I):- holds(isattable(c1,T),I).",
                "goal(I):- holds(haspaid(c2),I).",
            ]
        );

        planner.process(Command::ClearGoals).unwrap();
        assert!(planner.state().pending_goals.is_empty());
    }

    #[test]
    fn test_next_initial_situation_comes_from_goal_step() {
        let mut planner = active();
        planner
            .process(Command::SeedInitialSituation(vec!["currentlocation(agent,n1)".into()]))
            .unwrap();
        planner
            .process(Command::SubmitObservation(Observation::new("has_entered(c1)", true)))
            .unwrap();
        let first = start(&mut planner);
        assert_eq!(first.initial_clauses(), vec!["holds(currentlocation(agent,n1),0)."]);

        planner
            .process(Command::CompleteEpisode(EpisodeOutcome::Solved {
                horizon: 12,
                answer: answer(
                    "{holds(currentlocation(agent,n1),0) holds(currentlocation(agent,n2),2) \
                     holds(isattable(c1,table1),2) goal(2)}",
                ),
            }))
            .unwrap();
        planner
            .process(Command::SubmitObservation(Observation::new("bill_wave(table1)", true)))
            .unwrap();
        let second = start(&mut planner);
        assert_eq!(
            second.initial_situation,
            vec!["currentlocation(agent,n2)", "isattable(c1,table1)"]
        );
    }

    #[test]
    fn test_answer_without_goal_keeps_initial_situation() {
        let mut planner = active();
        planner
            .process(Command::SeedInitialSituation(vec!["currentlocation(agent,n1)".into()]))
            .unwrap();
        planner
            .process(Command::SubmitObservation(Observation::new("has_entered(c1)", true)))
            .unwrap();
        start(&mut planner);
        planner
            .process(Command::CompleteEpisode(EpisodeOutcome::Solved {
                horizon: 10,
                answer: answer("{holds(currentlocation(agent,n4),0)}"),
            }))
            .unwrap();
        planner
            .process(Command::SubmitObservation(Observation::new("has_entered(c2)", true)))
            .unwrap();
        assert_eq!(
            start(&mut planner).initial_situation,
            vec!["currentlocation(agent,n1)"]
        );
    }

    #[test]
    fn test_completing_outside_an_episode_is_rejected() {
        let mut planner = active();
        let result = planner.process(Command::CompleteEpisode(EpisodeOutcome::Failed {
            reason: "late".into(),
        }));
        assert!(matches!(
            result,
            Err(PlannerError::InvalidTransition { phase: PlannerPhase::Idle, .. })
        ));
    }

    #[test]
    fn test_deactivation_resets() {
        let mut planner = active();
        planner
            .process(Command::SubmitObservation(Observation::new("has_entered(c1)", true)))
            .unwrap();
        planner
            .process(Command::SubmitGoal(Goal::new("isattable(c1,T)")))
            .unwrap();
        planner.process(Command::SetActive(false)).unwrap();

        assert_eq!(planner.state(), &PlannerState::default());
    }

    #[test]
    fn test_fold_replays_history() {
        let mut planner = active();
        let mut history = vec![Event::ActivationChanged(true)];
        history.extend(
            planner
                .process(Command::SubmitObservation(Observation::new("has_entered(c1)", true)))
                .unwrap(),
        );
        history.extend(planner.process(Command::BeginEpisode).unwrap());
        history.extend(
            planner
                .process(Command::CompleteEpisode(EpisodeOutcome::Solved {
                    horizon: 11,
                    answer: answer("{occurs(go_to(agent,n2),0) goal(1)}"),
                }))
                .unwrap(),
        );

        assert_eq!(Planner::fold(&history).state(), planner.state());
    }
}
