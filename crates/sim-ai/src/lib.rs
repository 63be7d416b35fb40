#![deny(warnings)]

//! Scripted controllers: policies that pick a phase choice in place of a
//! human, and a driver that plays a started series to completion.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sim_core::MatchResult;
use sim_engine::{EngineError, MatchController, Phase, PhaseChoice, Side, SubmitOutcome};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// What a policy sees at a decision point, from the Player side.
#[derive(Clone, Debug)]
pub struct DecisionView<'a> {
    pub phase: Phase,
    pub set_number: u8,
    pub player_score: u8,
    pub opponent_score: u8,
    pub choices: &'a [PhaseChoice],
    /// Player-side win probability under the current ledger, without noise.
    pub player_win_probability: f64,
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("no choices offered at {0:?}")]
    NoChoices(Phase),
    #[error("invalid plan: {0}")]
    Plan(String),
    #[error("policy script failed: {0}")]
    Script(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Picks one choice id from the menu in a [`DecisionView`].
pub trait ChoicePolicy {
    fn name(&self) -> &str;
    fn choose(&mut self, view: &DecisionView<'_>) -> Result<String, PolicyError>;
}

/// Trade-off score: net gain weighted against the downside a choice carries.
pub fn utility(net_effect: f32, downside: f32) -> f32 {
    (net_effect * 0.7) - (downside * 0.3)
}

/// Net effect and player-side penalties of a choice, in percent.
pub fn effect_profile(choice: &PhaseChoice) -> (f32, f32) {
    let downside: Decimal = choice
        .modifiers
        .iter()
        .filter(|m| m.side == Side::Player && m.value < Decimal::ZERO)
        .map(|m| -m.value)
        .sum();
    (
        choice.net_effect().to_f32().unwrap_or(0.0),
        downside.to_f32().unwrap_or(0.0),
    )
}

/// Always takes the highest-utility option; first listed wins ties.
#[derive(Debug, Default)]
pub struct GreedyPolicy;

impl ChoicePolicy for GreedyPolicy {
    fn name(&self) -> &str {
        "greedy"
    }

    fn choose(&mut self, view: &DecisionView<'_>) -> Result<String, PolicyError> {
        let mut best: Option<(&PhaseChoice, f32)> = None;
        for choice in view.choices {
            let (net, downside) = effect_profile(choice);
            let u = utility(net, downside);
            if best.map_or(true, |(_, b)| u > b) {
                best = Some((choice, u));
            }
        }
        best.map(|(c, _)| c.id.clone())
            .ok_or(PolicyError::NoChoices(view.phase))
    }
}

/// Uniformly random, seeded for reproducibility.
pub struct RandomPolicy {
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl ChoicePolicy for RandomPolicy {
    fn name(&self) -> &str {
        "random"
    }

    fn choose(&mut self, view: &DecisionView<'_>) -> Result<String, PolicyError> {
        if view.choices.is_empty() {
            return Err(PolicyError::NoChoices(view.phase));
        }
        let idx = self.rng.gen_range(0..view.choices.len());
        Ok(view.choices[idx].id.clone())
    }
}

/// Fixed phase → choice plan, e.g. loaded from YAML:
///
/// ```yaml
/// DRAFT: draft_scale
/// LATE: late_baron
/// ```
///
/// Phases missing from the plan take the first option.
#[derive(Debug, Clone, Default)]
pub struct PlanPolicy {
    plan: HashMap<Phase, String>,
}

impl PlanPolicy {
    pub fn new(plan: HashMap<Phase, String>) -> Self {
        Self { plan }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, PolicyError> {
        let plan: HashMap<Phase, String> =
            serde_yaml::from_str(text).map_err(|e| PolicyError::Plan(e.to_string()))?;
        Ok(Self::new(plan))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PolicyError> {
        let text = fs::read_to_string(path).map_err(|e| PolicyError::Plan(e.to_string()))?;
        Self::from_yaml_str(&text)
    }
}

impl ChoicePolicy for PlanPolicy {
    fn name(&self) -> &str {
        "plan"
    }

    fn choose(&mut self, view: &DecisionView<'_>) -> Result<String, PolicyError> {
        match self.plan.get(&view.phase) {
            Some(id) if view.choices.iter().any(|c| &c.id == id) => Ok(id.clone()),
            Some(id) => Err(PolicyError::Plan(format!(
                "{id} is not offered at {}",
                view.phase.tag()
            ))),
            None => view
                .choices
                .first()
                .map(|c| c.id.clone())
                .ok_or(PolicyError::NoChoices(view.phase)),
        }
    }
}

/// Snapshot the controller's pending decision, if any.
pub fn decision_view(ctl: &MatchController) -> Result<DecisionView<'_>, EngineError> {
    let state = ctl.state();
    let (Some(phase), true) = (state.current_phase, state.is_waiting_for_user) else {
        return Err(EngineError::NotWaitingForInput);
    };
    let perspective = ctl.perspective().ok_or(EngineError::NotWaitingForInput)?;
    let match_id = state.match_id.as_ref().ok_or(EngineError::NotWaitingForInput)?;
    let m = ctl.league().get_match(match_id)?;
    let player_is_home = perspective.player == m.home;
    let (player_score, opponent_score) = if player_is_home {
        (m.home_score, m.away_score)
    } else {
        (m.away_score, m.home_score)
    };
    let p_home = ctl.preview_probability().unwrap_or(0.5);
    Ok(DecisionView {
        phase,
        set_number: state.current_set,
        player_score,
        opponent_score,
        choices: &state.current_choices,
        player_win_probability: if player_is_home { p_home } else { 1.0 - p_home },
    })
}

/// Drive a started series to completion with `policy` making every decision.
pub fn play_out(
    ctl: &mut MatchController,
    policy: &mut dyn ChoicePolicy,
) -> Result<MatchResult, PolicyError> {
    loop {
        let choice = {
            let view = decision_view(ctl)?;
            policy.choose(&view)?
        };
        debug!(policy = policy.name(), %choice, "policy decision");
        if let SubmitOutcome::SetResolved(report) = ctl.submit_choice(&choice)? {
            if let Some(result) = report.final_result {
                return Ok(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sim_core::{Abilities, Division, MatchId, MatchType, Player, PlayerId, Position, Team, TeamId};
    use sim_engine::{choices_for, EngineConfig, League};

    fn team(id: &str, score: u8) -> Team {
        Team {
            id: TeamId(id.into()),
            name: id.into(),
            roster: Position::ALL
                .iter()
                .map(|&position| Player {
                    id: PlayerId(format!("{id}-{}", position.tag())),
                    name: position.tag().into(),
                    position,
                    abilities: Abilities::uniform(score),
                    division: Division::FirstTeam,
                })
                .collect(),
        }
    }

    fn controller(match_type: MatchType, seed: u64) -> MatchController {
        let mut league = League::new();
        league.add_team(team("h", 70)).unwrap();
        league.add_team(team("a", 70)).unwrap();
        league
            .schedule_match(MatchId("m".into()), TeamId("h".into()), TeamId("a".into()), match_type)
            .unwrap();
        let cfg = EngineConfig {
            rng_seed: seed,
            ..EngineConfig::default()
        };
        let mut ctl = MatchController::new(league, &cfg).unwrap();
        ctl.start(&MatchId("m".into())).unwrap();
        ctl
    }

    fn view(phase: Phase, choices: &[PhaseChoice]) -> DecisionView<'_> {
        DecisionView {
            phase,
            set_number: 1,
            player_score: 0,
            opponent_score: 0,
            choices,
            player_win_probability: 0.5,
        }
    }

    #[test]
    fn utility_monotonic() {
        assert!(utility(2.0, 1.0) < utility(3.0, 1.0));
        assert!(utility(2.0, 1.0) > utility(2.0, 2.0));
    }

    #[test]
    fn greedy_prefers_net_gain_with_little_downside() {
        let menu = choices_for(Phase::Draft);
        // engage: net 5, downside 3 -> 2.6; poke: net 6, downside 0 -> 4.2
        // scale: net 5, downside 5 -> 2.0
        assert_eq!(GreedyPolicy.choose(&view(Phase::Draft, &menu)).unwrap(), "draft_poke");
        let none: Vec<PhaseChoice> = Vec::new();
        assert!(matches!(
            GreedyPolicy.choose(&view(Phase::End, &none)),
            Err(PolicyError::NoChoices(Phase::End))
        ));
    }

    #[test]
    fn plan_policy_follows_yaml() {
        let mut plan = PlanPolicy::from_yaml_str("DRAFT: draft_scale\nLATE: late_baron\n").unwrap();
        let draft = choices_for(Phase::Draft);
        assert_eq!(plan.choose(&view(Phase::Draft, &draft)).unwrap(), "draft_scale");
        let mid = choices_for(Phase::Mid);
        assert_eq!(plan.choose(&view(Phase::Mid, &mid)).unwrap(), "mid_dragon");

        let mut wrong = PlanPolicy::from_yaml_str("EARLY: late_baron\n").unwrap();
        let early = choices_for(Phase::Early);
        assert!(matches!(
            wrong.choose(&view(Phase::Early, &early)),
            Err(PolicyError::Plan(_))
        ));
        assert!(PlanPolicy::from_yaml_str("NOT_A_PHASE: x\n").is_err());
    }

    #[test]
    fn bundled_plan_plays_a_series() {
        let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../assets/plans/late_game.yaml");
        let mut plan = PlanPolicy::load(path).unwrap();
        let mut ctl = controller(MatchType::Bo3, 3);
        play_out(&mut ctl, &mut plan).unwrap();
        assert!(ctl
            .event_log()
            .iter()
            .any(|line| line.contains("Scaling composition")));
    }

    #[test]
    fn view_reports_player_side() {
        let ctl = controller(MatchType::Bo3, 1);
        let v = decision_view(&ctl).unwrap();
        assert_eq!(v.phase, Phase::Draft);
        assert_eq!(v.choices.len(), 3);
        assert!((v.player_win_probability - 0.5).abs() < 1e-9);
    }

    #[test]
    fn greedy_plays_out_a_series() {
        let mut ctl = controller(MatchType::Bo5, 7);
        let result = play_out(&mut ctl, &mut GreedyPolicy).unwrap();
        assert_eq!(result.home_score.max(result.away_score), 3);
        assert!(!ctl.is_active());
        assert!(matches!(
            play_out(&mut ctl, &mut GreedyPolicy),
            Err(PolicyError::Engine(EngineError::NotWaitingForInput))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn random_policy_always_finishes(seed in any::<u64>()) {
            let mut ctl = controller(MatchType::Bo3, seed);
            let mut policy = RandomPolicy::new(seed);
            let result = play_out(&mut ctl, &mut policy).unwrap();
            prop_assert!(result.sets.len() == 2 || result.sets.len() == 3);
            prop_assert_eq!(
                usize::from(result.home_score + result.away_score),
                result.sets.len()
            );
        }
    }
}
