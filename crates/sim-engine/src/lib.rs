#![deny(warnings)]

//! Series simulation engine.
//!
//! - Team strength from first-team rosters
//! - A ledger of sourced, team-scoped win-rate modifiers
//! - The per-set phase state machine and its fixed choice menus
//! - Seeded set resolution and series bookkeeping up to match completion
//!
//! Everything here is synchronous and free of I/O apart from config loading.

pub mod catalogue;
pub mod config;
pub mod controller;
pub mod league;
pub mod ledger;
pub mod phase;
pub mod resolver;
pub mod strength;

pub use catalogue::{choices_for, PhaseChoice};
pub use config::{ConfigError, EngineConfig};
pub use controller::{select_pog, MatchController, SeriesScore, SetReport, SubmitOutcome};
pub use league::League;
pub use ledger::{
    is_carry_over_source, ModifierLedger, ModifierTemplate, Perspective, Side, WinRateModifier,
};
pub use phase::{Phase, PhaseRecord, PhaseStateMachine, SimulationState};
pub use resolver::{win_probability, NeutralDice, SeededDice, SetDice, SetResolution, SetResolver};
pub use strength::{compute_strength, line_power, TeamStrength};

use sim_core::{MatchId, TeamId, ValidationError};
use thiserror::Error;

/// Errors returned by engine operations. None are transient; callers decide
/// whether to re-issue a command.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("match not found: {0}")]
    MatchNotFound(MatchId),
    #[error("team not found: {0}")]
    TeamNotFound(TeamId),
    #[error("not waiting for input")]
    NotWaitingForInput,
    #[error("invalid choice id: {0}")]
    InvalidChoiceId(String),
    #[error("match already completed: {0}")]
    AlreadyCompleted(MatchId),
    #[error("match id already in use: {0}")]
    DuplicateMatch(MatchId),
    #[error("modifier source must not be empty")]
    UnsourcedModifier,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
