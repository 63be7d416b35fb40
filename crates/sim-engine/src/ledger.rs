//! Win-rate modifier ledger.
//!
//! Modifiers are signed percentages scoped to a team. They are applied to a
//! team's power as `power *= 1 + total/100`, never to the probability itself.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{Match, TeamId};

use crate::EngineError;

/// Source prefix of post-set feedback effects.
pub const CARRY_OVER_PREFIX: &str = "FEEDBACK_";

/// Whether a bare source tag follows the carry-over naming convention.
pub fn is_carry_over_source(source: &str) -> bool {
    source.starts_with(CARRY_OVER_PREFIX)
}

/// Abstract side a choice effect targets before it is bound to a team.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Player,
    Opponent,
}

/// Concrete teams behind the Player and Opponent sides of one match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perspective {
    pub player: TeamId,
    pub opponent: TeamId,
}

impl Perspective {
    /// The controlled team is the Player side when it plays in `m`;
    /// otherwise the home team is.
    pub fn for_match(m: &Match, controlled: Option<&TeamId>) -> Self {
        match controlled {
            Some(team) if m.involves(team) && *team != m.home => Self {
                player: m.away.clone(),
                opponent: m.home.clone(),
            },
            _ => Self {
                player: m.home.clone(),
                opponent: m.away.clone(),
            },
        }
    }

    pub fn resolve(&self, side: Side) -> &TeamId {
        match side {
            Side::Player => &self.player,
            Side::Opponent => &self.opponent,
        }
    }
}

/// Effect attached to a menu choice, still expressed in terms of [`Side`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModifierTemplate {
    pub side: Side,
    /// Signed percentage, e.g. `-5` for a 5% power penalty.
    pub value: Decimal,
    pub source: String,
    pub description: String,
    pub carries_to_next_set: bool,
}

impl ModifierTemplate {
    /// Re-target to a concrete team.
    pub fn bind(&self, perspective: &Perspective) -> WinRateModifier {
        WinRateModifier {
            team: perspective.resolve(self.side).clone(),
            value: self.value,
            source: self.source.clone(),
            description: self.description.clone(),
            carries_to_next_set: self.carries_to_next_set,
        }
    }
}

/// A live, team-scoped adjustment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WinRateModifier {
    pub team: TeamId,
    pub value: Decimal,
    /// Unique per causal event, `PHASE_CHOICEID[_SUFFIX]`.
    pub source: String,
    pub description: String,
    /// Survives the next set boundary.
    pub carries_to_next_set: bool,
}

/// Ordered collection of active modifiers for the current set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifierLedger {
    entries: Vec<WinRateModifier>,
}

impl ModifierLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append without merging. Source uniqueness is the caller's concern.
    pub fn add(&mut self, modifier: WinRateModifier) -> Result<(), EngineError> {
        if modifier.source.trim().is_empty() {
            return Err(EngineError::UnsourcedModifier);
        }
        self.entries.push(modifier);
        Ok(())
    }

    /// Append a batch; either every entry is added or none is.
    pub fn extend(&mut self, batch: Vec<WinRateModifier>) -> Result<(), EngineError> {
        if batch.iter().any(|m| m.source.trim().is_empty()) {
            return Err(EngineError::UnsourcedModifier);
        }
        self.entries.extend(batch);
        Ok(())
    }

    /// Remove every entry whose source equals `source`; returns how many went.
    pub fn remove_by_source(&mut self, source: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|m| m.source != source);
        before - self.entries.len()
    }

    /// Keep only entries matching `keep`.
    pub fn clear_all_except<F>(&mut self, keep: F)
    where
        F: Fn(&WinRateModifier) -> bool,
    {
        self.entries.retain(|m| keep(m));
    }

    /// Set-boundary clear: drops everything not flagged to carry over.
    pub fn clear_for_next_set(&mut self) {
        self.clear_all_except(|m| m.carries_to_next_set);
    }

    /// Called when the next set begins. Carried entries stay active for this
    /// set and lose their carry flag, so the following boundary removes them.
    pub fn carry_into_next_set(&mut self) {
        self.clear_for_next_set();
        for m in &mut self.entries {
            m.carries_to_next_set = false;
        }
    }

    /// Sum of values targeting `team`.
    pub fn total_for(&self, team: &TeamId) -> Decimal {
        self.entries
            .iter()
            .filter(|m| &m.team == team)
            .map(|m| m.value)
            .sum()
    }

    pub fn contains_source(&self, source: &str) -> bool {
        self.entries.iter().any(|m| m.source == source)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WinRateModifier> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{MatchId, MatchType};

    fn team(id: &str) -> TeamId {
        TeamId(id.to_string())
    }

    fn modifier(t: &str, value: i64, source: &str, carries: bool) -> WinRateModifier {
        WinRateModifier {
            team: team(t),
            value: Decimal::new(value, 0),
            source: source.to_string(),
            description: String::new(),
            carries_to_next_set: carries,
        }
    }

    #[test]
    fn totals_are_per_team() {
        let mut ledger = ModifierLedger::new();
        ledger.add(modifier("a", -5, "DRAFT_SCALE_EARLY", false)).unwrap();
        ledger.add(modifier("a", 10, "DRAFT_SCALE_LATE", false)).unwrap();
        ledger.add(modifier("b", -4, "MID_VISION", false)).unwrap();
        assert_eq!(ledger.total_for(&team("a")), Decimal::new(5, 0));
        assert_eq!(ledger.total_for(&team("b")), Decimal::new(-4, 0));
        assert_eq!(ledger.total_for(&team("c")), Decimal::ZERO);
    }

    #[test]
    fn empty_source_rejected() {
        let mut ledger = ModifierLedger::new();
        assert_eq!(
            ledger.add(modifier("a", 1, " ", false)),
            Err(EngineError::UnsourcedModifier)
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn batch_with_unsourced_entry_adds_nothing() {
        let mut ledger = ModifierLedger::new();
        let batch = vec![
            modifier("a", 3, "LATE_BARON", false),
            modifier("b", 2, "", false),
        ];
        assert_eq!(ledger.extend(batch), Err(EngineError::UnsourcedModifier));
        assert!(ledger.is_empty());
        ledger
            .extend(vec![modifier("a", 3, "LATE_BARON", false)])
            .unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn remove_by_source_is_exact() {
        let mut ledger = ModifierLedger::new();
        ledger.add(modifier("a", 8, "DRAFT_ENGAGE", false)).unwrap();
        ledger.add(modifier("a", -3, "DRAFT_ENGAGE_LATE", false)).unwrap();
        assert_eq!(ledger.remove_by_source("DRAFT_ENGAGE"), 1);
        assert!(ledger.contains_source("DRAFT_ENGAGE_LATE"));
        assert_eq!(ledger.remove_by_source("DRAFT_ENGAGE"), 0);
    }

    #[test]
    fn carry_over_lives_exactly_one_more_set() {
        let mut ledger = ModifierLedger::new();
        ledger.add(modifier("a", 8, "DRAFT_ENGAGE", false)).unwrap();
        ledger.clear_for_next_set();
        ledger.add(modifier("a", 5, "FEEDBACK_CRITICIZE", true)).unwrap();
        ledger.carry_into_next_set();
        assert!(ledger.contains_source("FEEDBACK_CRITICIZE"));
        assert!(!ledger.contains_source("DRAFT_ENGAGE"));
        ledger.clear_for_next_set();
        assert!(ledger.is_empty());
    }

    #[test]
    fn clear_all_except_with_prefix_predicate() {
        let mut ledger = ModifierLedger::new();
        ledger.add(modifier("a", 8, "DRAFT_ENGAGE", false)).unwrap();
        ledger.add(modifier("a", 3, "FEEDBACK_ENCOURAGE", false)).unwrap();
        ledger.clear_all_except(|m| is_carry_over_source(&m.source));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains_source("FEEDBACK_ENCOURAGE"));
    }

    #[test]
    fn perspective_follows_controlled_team() {
        let m = Match::scheduled(MatchId("m".into()), team("h"), team("a"), MatchType::Bo3);
        let home_side = Perspective::for_match(&m, None);
        assert_eq!(home_side.resolve(Side::Player), &team("h"));
        let away_side = Perspective::for_match(&m, Some(&team("a")));
        assert_eq!(away_side.resolve(Side::Player), &team("a"));
        assert_eq!(away_side.resolve(Side::Opponent), &team("h"));
        let outsider = Perspective::for_match(&m, Some(&team("x")));
        assert_eq!(outsider, home_side);
    }
}
