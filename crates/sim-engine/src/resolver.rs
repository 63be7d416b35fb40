//! Turns strength, form and ledger effects into a set outcome.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{SetResult, Team, TeamId};
use tracing::warn;

use crate::config::EngineConfig;
use crate::ledger::ModifierLedger;
use crate::strength::compute_strength;

/// Source of randomness for one set resolution.
pub trait SetDice: Send {
    /// Form offset `u` in `[-spread, spread]`; power is scaled by `1 + u`.
    fn condition(&mut self, spread: f64) -> f64;
    /// Outcome roll in `[0, 1)`.
    fn outcome(&mut self) -> f64;
    /// Extra minutes in `[0, spread)`.
    fn duration_offset(&mut self, spread: u32) -> u32;
}

/// Seeded ChaCha dice.
pub struct SeededDice {
    rng: ChaCha8Rng,
}

impl SeededDice {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SetDice for SeededDice {
    fn condition(&mut self, spread: f64) -> f64 {
        if spread <= 0.0 {
            return 0.0;
        }
        self.rng.gen_range(-spread..=spread)
    }

    fn outcome(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn duration_offset(&mut self, spread: u32) -> u32 {
        if spread == 0 {
            return 0;
        }
        self.rng.gen_range(0..spread)
    }
}

/// No form noise and a mid-point outcome roll: the stronger side always wins,
/// equal powers go to the away side.
pub struct NeutralDice;

impl SetDice for NeutralDice {
    fn condition(&mut self, _spread: f64) -> f64 {
        0.0
    }

    fn outcome(&mut self) -> f64 {
        0.5
    }

    fn duration_offset(&mut self, spread: u32) -> u32 {
        spread / 2
    }
}

/// Home-side win probability; `(0, 0)` is defined as a coin flip.
pub fn win_probability(home_power: f64, away_power: f64) -> f64 {
    let total = home_power + away_power;
    if !total.is_finite() || total <= 0.0 {
        return 0.5;
    }
    home_power / total
}

/// Power scale for a ledger total in percent, floored at zero.
pub fn modifier_factor(total_pct: Decimal) -> f64 {
    let pct = total_pct.to_f64().unwrap_or(0.0);
    (1.0 + pct / 100.0).max(0.0)
}

/// Everything computed while resolving one set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SetResolution {
    pub result: SetResult,
    pub home_power: f64,
    pub away_power: f64,
    pub home_win_probability: f64,
    /// Both sides had zero power and the 50/50 fallback applied.
    pub degenerate: bool,
}

/// Stochastic set resolver.
pub struct SetResolver {
    dice: Box<dyn SetDice>,
    condition_noise: f64,
    base_duration: u32,
    duration_spread: u32,
}

impl SetResolver {
    /// Seeded or neutral dice according to `cfg.deterministic`.
    pub fn from_config(cfg: &EngineConfig) -> Self {
        let dice: Box<dyn SetDice> = if cfg.deterministic {
            Box::new(NeutralDice)
        } else {
            Box::new(SeededDice::new(cfg.rng_seed))
        };
        Self::with_dice(cfg, dice)
    }

    pub fn with_dice(cfg: &EngineConfig, dice: Box<dyn SetDice>) -> Self {
        Self {
            dice,
            condition_noise: cfg.condition_noise,
            base_duration: cfg.base_duration_minutes,
            duration_spread: cfg.duration_spread_minutes,
        }
    }

    /// Resolve one set between `home` and `away` under `ledger`.
    pub fn resolve_set(&mut self, home: &Team, away: &Team, ledger: &ModifierLedger) -> SetResolution {
        let home_base = compute_strength(home).overall;
        let away_base = compute_strength(away).overall;
        self.resolve_powers(&home.id, home_base, &away.id, away_base, ledger)
    }

    /// Same as [`resolve_set`](Self::resolve_set) from precomputed base powers.
    pub fn resolve_powers(
        &mut self,
        home: &TeamId,
        home_base: f64,
        away: &TeamId,
        away_base: f64,
        ledger: &ModifierLedger,
    ) -> SetResolution {
        let home_form = 1.0 + self.dice.condition(self.condition_noise);
        let away_form = 1.0 + self.dice.condition(self.condition_noise);
        let home_power = home_base * home_form * modifier_factor(ledger.total_for(home));
        let away_power = away_base * away_form * modifier_factor(ledger.total_for(away));

        let degenerate = home_power <= 0.0 && away_power <= 0.0;
        if degenerate {
            warn!(%home, %away, "both sides have zero power; using 50/50");
        }
        let p_home = win_probability(home_power, away_power);
        let winner = if self.dice.outcome() < p_home {
            home.clone()
        } else {
            away.clone()
        };
        let duration_minutes = self.base_duration + self.dice.duration_offset(self.duration_spread);

        SetResolution {
            result: SetResult {
                winner,
                duration_minutes,
            },
            home_power,
            away_power,
            home_win_probability: p_home,
            degenerate,
        }
    }
}
