//! Team strength derived from first-team rosters.
//!
//! Each position converts a different mix of four abilities into its line
//! power; the team's `overall` is the plain mean of the five lines.

use serde::Serialize;
use sim_core::{Abilities, Position, Team};

/// One of the six ability scores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ability {
    Laning,
    Mechanics,
    Teamfight,
    Vision,
    MacroPlay,
    Mental,
}

impl Ability {
    pub fn score(self, a: &Abilities) -> u8 {
        match self {
            Ability::Laning => a.laning,
            Ability::Mechanics => a.mechanics,
            Ability::Teamfight => a.teamfight,
            Ability::Vision => a.vision,
            Ability::MacroPlay => a.macro_play,
            Ability::Mental => a.mental,
        }
    }
}

/// Position-specific ability weights; each row sums to 1.0.
pub fn line_weights(position: Position) -> [(Ability, f64); 4] {
    use Ability::*;
    match position {
        Position::Top => [(Laning, 0.35), (Mechanics, 0.25), (Teamfight, 0.25), (Mental, 0.15)],
        Position::Jungle => [(MacroPlay, 0.35), (Vision, 0.25), (Mechanics, 0.20), (Teamfight, 0.20)],
        Position::Mid => [(Laning, 0.30), (Mechanics, 0.30), (Teamfight, 0.20), (MacroPlay, 0.20)],
        Position::Adc => [(Mechanics, 0.35), (Laning, 0.30), (Teamfight, 0.25), (Mental, 0.10)],
        Position::Support => [(MacroPlay, 0.30), (Mental, 0.30), (Vision, 0.25), (Teamfight, 0.15)],
    }
}

/// A single player's contribution when fielded at `position`.
pub fn line_power(position: Position, abilities: &Abilities) -> f64 {
    line_weights(position)
        .iter()
        .map(|&(ability, w)| w * f64::from(ability.score(abilities)))
        .sum()
}

/// Per-position line powers plus their mean.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct TeamStrength {
    pub top: f64,
    pub jungle: f64,
    pub mid: f64,
    pub adc: f64,
    pub support: f64,
    pub overall: f64,
}

impl TeamStrength {
    pub fn line(&self, position: Position) -> f64 {
        match position {
            Position::Top => self.top,
            Position::Jungle => self.jungle,
            Position::Mid => self.mid,
            Position::Adc => self.adc,
            Position::Support => self.support,
        }
    }
}

/// Compute strength for `team`. Total: a vacant position counts as 0.
pub fn compute_strength(team: &Team) -> TeamStrength {
    let power = |position: Position| {
        team.starter_at(position)
            .map(|p| line_power(position, &p.abilities))
            .unwrap_or(0.0)
    };
    let mut s = TeamStrength {
        top: power(Position::Top),
        jungle: power(Position::Jungle),
        mid: power(Position::Mid),
        adc: power(Position::Adc),
        support: power(Position::Support),
        overall: 0.0,
    };
    s.overall = Position::ALL.iter().map(|&p| s.line(p)).sum::<f64>() / Position::ALL.len() as f64;
    s
}
