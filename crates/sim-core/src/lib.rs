#![deny(warnings)]

//! Core domain models and invariants for the series simulator.
//!
//! This crate defines serializable types shared by the engine, the scripted
//! controllers and the runtime, with validation helpers that guard the basic
//! roster and series invariants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Unique identifier for a player.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub String);

/// Unique identifier for a team.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub String);

/// Unique identifier for a match (series).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lane assignment of a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Position {
    /// Top lane.
    #[serde(rename = "TOP")]
    Top,
    /// Jungle.
    #[serde(rename = "JGL")]
    Jungle,
    /// Mid lane.
    #[serde(rename = "MID")]
    Mid,
    /// Bot lane carry.
    #[serde(rename = "ADC")]
    Adc,
    /// Bot lane support.
    #[serde(rename = "SPT")]
    Support,
}

impl Position {
    /// The five positions in lineup order.
    pub const ALL: [Position; 5] = [
        Position::Top,
        Position::Jungle,
        Position::Mid,
        Position::Adc,
        Position::Support,
    ];

    /// Short tag used in logs, e.g. "JGL".
    pub fn tag(self) -> &'static str {
        match self {
            Position::Top => "TOP",
            Position::Jungle => "JGL",
            Position::Mid => "MID",
            Position::Adc => "ADC",
            Position::Support => "SPT",
        }
    }
}

/// Squad a player is registered in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Division {
    /// Eligible to start.
    FirstTeam,
    /// Registered but never fielded.
    Reserve,
}

/// The six ability scores of a player, each in [1, 100].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abilities {
    /// Lane control and trading.
    pub laning: u8,
    /// Raw mechanical execution.
    pub mechanics: u8,
    /// Positioning and output in fights.
    pub teamfight: u8,
    /// Map awareness and ward control.
    pub vision: u8,
    /// Rotations, objective timing, shotcalling.
    pub macro_play: u8,
    /// Composure under pressure.
    pub mental: u8,
}

impl Abilities {
    /// Same score for every ability; handy for fixtures.
    pub fn uniform(score: u8) -> Self {
        Self {
            laning: score,
            mechanics: score,
            teamfight: score,
            vision: score,
            macro_play: score,
            mental: score,
        }
    }

    /// Scores in declaration order.
    pub fn as_array(&self) -> [u8; 6] {
        [
            self.laning,
            self.mechanics,
            self.teamfight,
            self.vision,
            self.macro_play,
            self.mental,
        ]
    }

    /// Unweighted sum of the six scores.
    pub fn total(&self) -> u32 {
        self.as_array().iter().map(|&s| u32::from(s)).sum()
    }
}

/// A rostered player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Unique player identifier.
    pub id: PlayerId,
    /// Display name (in-game handle).
    pub name: String,
    /// Lane the player is registered for.
    pub position: Position,
    /// Ability scores, each in [1, 100].
    pub abilities: Abilities,
    /// First team or reserve; only the first team plays.
    pub division: Division,
}

/// A team and its roster, in registration order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Team {
    /// Unique team identifier.
    pub id: TeamId,
    /// Display name.
    pub name: String,
    /// All registered players, first team and reserves.
    pub roster: Vec<Player>,
}

impl Team {
    /// First-team players, roster order preserved.
    pub fn first_team(&self) -> impl Iterator<Item = &Player> {
        self.roster
            .iter()
            .filter(|p| p.division == Division::FirstTeam)
    }

    /// First first-team player registered at `position`, if any.
    pub fn starter_at(&self, position: Position) -> Option<&Player> {
        self.first_team().find(|p| p.position == position)
    }
}

/// Series length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    /// Best of three sets.
    Bo3,
    /// Best of five sets.
    Bo5,
}

impl MatchType {
    /// Sets needed to take the series.
    pub fn sets_to_win(self) -> u8 {
        match self {
            MatchType::Bo5 => 3,
            MatchType::Bo3 => 2,
        }
    }

    /// Upper bound on sets played.
    pub fn max_sets(self) -> u8 {
        self.sets_to_win() * 2 - 1
    }
}

/// Lifecycle of a match record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Not started yet.
    Scheduled,
    /// Sets are being played.
    InProgress,
    /// A side reached the winning set count.
    Completed,
}

/// Outcome of one set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetResult {
    /// Team that took the set.
    pub winner: TeamId,
    /// Game length in minutes.
    pub duration_minutes: u32,
}

/// Player of the game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pog {
    /// Selected player.
    pub player_id: PlayerId,
    /// Selected player's display name.
    pub player_name: String,
    /// Team of the selected player (the series winner).
    pub team_id: TeamId,
}

/// Final record emitted when a series completes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Sets won by the home team.
    pub home_score: u8,
    /// Sets won by the away team.
    pub away_score: u8,
    /// Series winner.
    pub winner: TeamId,
    /// `None` only when the winning side fielded no first-team players.
    pub pog: Option<Pog>,
    /// Every set in play order.
    pub sets: Vec<SetResult>,
}

/// A scheduled, running or finished series between two teams.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Unique match identifier.
    pub id: MatchId,
    /// Home team.
    pub home: TeamId,
    /// Away team.
    pub away: TeamId,
    /// Series length.
    pub match_type: MatchType,
    /// Sets won so far by the home team.
    pub home_score: u8,
    /// Sets won so far by the away team.
    pub away_score: u8,
    /// Sets played so far; length equals the score total.
    pub current_sets: Vec<SetResult>,
    /// Lifecycle state.
    pub status: MatchStatus,
    /// Final record, present once the match is completed.
    pub result: Option<MatchResult>,
}

impl Match {
    /// A fresh scheduled series with no sets played.
    pub fn scheduled(id: MatchId, home: TeamId, away: TeamId, match_type: MatchType) -> Self {
        Self {
            id,
            home,
            away,
            match_type,
            home_score: 0,
            away_score: 0,
            current_sets: Vec::new(),
            status: MatchStatus::Scheduled,
            result: None,
        }
    }

    /// Whether either side has reached the winning set count.
    pub fn is_decided(&self) -> bool {
        let target = self.match_type.sets_to_win();
        self.home_score == target || self.away_score == target
    }

    /// Whether `team` plays in this match.
    pub fn involves(&self, team: &TeamId) -> bool {
        &self.home == team || &self.away == team
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Ability score outside [1, 100].
    #[error("ability score {score} of player {player} is out of range [1, 100]")]
    AbilityOutOfRange { player: String, score: u8 },
    /// Identifiers and names must be non-blank.
    #[error("blank identifier or name")]
    BlankName,
    /// A player id appears twice on one roster.
    #[error("duplicate player id on roster: {0}")]
    DuplicatePlayer(String),
    /// A match must be played between two different teams.
    #[error("team {0} cannot play against itself")]
    SameTeam(String),
    /// A side's score exceeds the sets needed to win.
    #[error("score {score} exceeds sets to win ({sets_to_win})")]
    ScoreOutOfRange { score: u8, sets_to_win: u8 },
    /// Set list does not match the running score.
    #[error("{sets} sets recorded but score adds up to {score_total}")]
    SetCountMismatch { sets: usize, score_total: usize },
    /// Status and score disagree about completion.
    #[error("match status {0:?} is inconsistent with the score")]
    StatusMismatch(MatchStatus),
}

/// Validate a player's identity and ability ranges.
pub fn validate_player(p: &Player) -> Result<(), ValidationError> {
    if p.id.0.trim().is_empty() || p.name.trim().is_empty() {
        return Err(ValidationError::BlankName);
    }
    for score in p.abilities.as_array() {
        if !(1..=100).contains(&score) {
            return Err(ValidationError::AbilityOutOfRange {
                player: p.id.0.clone(),
                score,
            });
        }
    }
    Ok(())
}

/// Validate a team, its players and roster uniqueness.
///
/// A missing position is not an error: it only lowers team strength.
pub fn validate_team(t: &Team) -> Result<(), ValidationError> {
    if t.id.0.trim().is_empty() || t.name.trim().is_empty() {
        return Err(ValidationError::BlankName);
    }
    let mut seen: BTreeSet<&PlayerId> = BTreeSet::new();
    for p in &t.roster {
        validate_player(p)?;
        if !seen.insert(&p.id) {
            return Err(ValidationError::DuplicatePlayer(p.id.0.clone()));
        }
    }
    Ok(())
}

/// Validate the series bookkeeping invariants of a match.
pub fn validate_match(m: &Match) -> Result<(), ValidationError> {
    if m.id.0.trim().is_empty() {
        return Err(ValidationError::BlankName);
    }
    if m.home == m.away {
        return Err(ValidationError::SameTeam(m.home.0.clone()));
    }
    let sets_to_win = m.match_type.sets_to_win();
    for score in [m.home_score, m.away_score] {
        if score > sets_to_win {
            return Err(ValidationError::ScoreOutOfRange { score, sets_to_win });
        }
    }
    let score_total = usize::from(m.home_score) + usize::from(m.away_score);
    if m.current_sets.len() != score_total {
        return Err(ValidationError::SetCountMismatch {
            sets: m.current_sets.len(),
            score_total,
        });
    }
    let completed = m.status == MatchStatus::Completed;
    if completed != m.is_decided() || completed != m.result.is_some() {
        return Err(ValidationError::StatusMismatch(m.status));
    }
    Ok(())
}
