//! Per-set decision phases and the mutable simulation state of one match.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sim_core::MatchId;
use tracing::debug;

use crate::catalogue::{choices_for, PhaseChoice};
use crate::ledger::{ModifierLedger, Perspective};
use crate::EngineError;

/// Decision point within a set, plus the between-set FEEDBACK step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Draft,
    Early,
    Mid,
    Late,
    End,
    Feedback,
}

impl Phase {
    /// Linear progression inside one set.
    pub const SET_ORDER: [Phase; 5] = [
        Phase::Draft,
        Phase::Early,
        Phase::Mid,
        Phase::Late,
        Phase::End,
    ];

    /// Successor within the set. END is terminal and FEEDBACK is out of band.
    pub fn next_in_set(self) -> Option<Phase> {
        match self {
            Phase::Draft => Some(Phase::Early),
            Phase::Early => Some(Phase::Mid),
            Phase::Mid => Some(Phase::Late),
            Phase::Late => Some(Phase::End),
            Phase::End | Phase::Feedback => None,
        }
    }

    /// Upper-case tag, also the prefix of every modifier source of the phase.
    pub fn tag(self) -> &'static str {
        match self {
            Phase::Draft => "DRAFT",
            Phase::Early => "EARLY",
            Phase::Mid => "MID",
            Phase::Late => "LATE",
            Phase::End => "END",
            Phase::Feedback => "FEEDBACK",
        }
    }
}

/// One audited submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub set_number: u8,
    pub choice_id: String,
    pub at: DateTime<Utc>,
}

/// The single mutable record of an in-progress match.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub current_phase: Option<Phase>,
    pub is_waiting_for_user: bool,
    pub ledger: ModifierLedger,
    pub current_choices: Vec<PhaseChoice>,
    pub match_id: Option<MatchId>,
    /// 1-based; 0 before start.
    pub current_set: u8,
    pub phase_history: Vec<PhaseRecord>,
}

/// Owns the [`SimulationState`] and enforces phase transitions.
#[derive(Clone, Debug, Default)]
pub struct PhaseStateMachine {
    state: SimulationState,
}

impl PhaseStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn ledger(&self) -> &ModifierLedger {
        &self.state.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut ModifierLedger {
        &mut self.state.ledger
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.state.current_phase
    }

    pub fn current_set(&self) -> u8 {
        self.state.current_set
    }

    /// Fresh state for `match_id` at set 1, DRAFT.
    pub fn begin(&mut self, match_id: MatchId) {
        self.state = SimulationState {
            match_id: Some(match_id),
            current_set: 1,
            ..SimulationState::default()
        };
        self.enter(Phase::Draft);
    }

    /// Back to the empty pre-start state.
    pub fn reset(&mut self) {
        self.state = SimulationState::default();
    }

    fn enter(&mut self, phase: Phase) {
        debug!(set = self.state.current_set, phase = phase.tag(), "entering phase");
        self.state.current_phase = Some(phase);
        if phase == Phase::End {
            self.state.is_waiting_for_user = false;
            self.state.current_choices.clear();
        } else {
            self.state.is_waiting_for_user = true;
            self.state.current_choices = choices_for(phase);
        }
    }

    /// Move to the next phase. A no-op before start and at END.
    /// From FEEDBACK the next set begins at DRAFT with carried effects only.
    pub fn advance(&mut self) -> Option<Phase> {
        match self.state.current_phase {
            None | Some(Phase::End) => {}
            Some(Phase::Feedback) => {
                self.state.ledger.carry_into_next_set();
                self.state.current_set += 1;
                self.enter(Phase::Draft);
            }
            Some(phase) => {
                if let Some(next) = phase.next_in_set() {
                    self.enter(next);
                }
            }
        }
        self.state.current_phase
    }

    /// Between sets of an unfinished series: drop set-scoped effects and
    /// wait for the feedback choice.
    pub fn enter_feedback(&mut self) {
        self.state.ledger.clear_for_next_set();
        self.enter(Phase::Feedback);
    }

    /// Validate a pending choice, bind its effects to `perspective` and
    /// record it. Nothing changes when this returns an error.
    pub fn take_choice(
        &mut self,
        choice_id: &str,
        perspective: &Perspective,
        at: DateTime<Utc>,
    ) -> Result<PhaseChoice, EngineError> {
        let (Some(phase), true) = (self.state.current_phase, self.state.is_waiting_for_user) else {
            return Err(EngineError::NotWaitingForInput);
        };
        let idx = self
            .state
            .current_choices
            .iter()
            .position(|c| c.id == choice_id)
            .ok_or_else(|| EngineError::InvalidChoiceId(choice_id.to_string()))?;
        let bound = self.state.current_choices[idx]
            .modifiers
            .iter()
            .map(|template| template.bind(perspective))
            .collect();
        self.state.ledger.extend(bound)?;

        self.state.phase_history.push(PhaseRecord {
            phase,
            set_number: self.state.current_set,
            choice_id: choice_id.to_string(),
            at,
        });
        let choice = self.state.current_choices.swap_remove(idx);
        self.state.current_choices.clear();
        self.state.is_waiting_for_user = false;
        Ok(choice)
    }
}
