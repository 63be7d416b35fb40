//! Fixed choice menus, one per decision phase.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::{ModifierTemplate, Side};
use crate::phase::Phase;

/// A menu option offered at a decision phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseChoice {
    pub id: String,
    pub label: String,
    pub description: String,
    pub phase: Phase,
    pub modifiers: Vec<ModifierTemplate>,
}

impl PhaseChoice {
    /// Net percentage this choice moves toward the Player side
    /// (own buffs count positive, opponent debuffs count positive too).
    pub fn net_effect(&self) -> Decimal {
        self.modifiers
            .iter()
            .map(|m| match m.side {
                Side::Player => m.value,
                Side::Opponent => -m.value,
            })
            .sum()
    }
}

struct Effect {
    side: Side,
    value: i64,
    source: &'static str,
    description: &'static str,
}

struct ChoiceSpec {
    id: &'static str,
    label: &'static str,
    description: &'static str,
    effects: &'static [Effect],
}

const fn player(value: i64, source: &'static str, description: &'static str) -> Effect {
    Effect {
        side: Side::Player,
        value,
        source,
        description,
    }
}

const fn opponent(value: i64, source: &'static str, description: &'static str) -> Effect {
    Effect {
        side: Side::Opponent,
        value,
        source,
        description,
    }
}

const DRAFT: &[ChoiceSpec] = &[
    ChoiceSpec {
        id: "draft_engage",
        label: "Engage composition",
        description: "Hard engage and dive; wins early fights, weaker if the game drags.",
        effects: &[
            player(8, "DRAFT_ENGAGE", "Strong early teamfights"),
            player(-3, "DRAFT_ENGAGE_LATE", "Falls off late"),
        ],
    },
    ChoiceSpec {
        id: "draft_poke",
        label: "Poke composition",
        description: "Long-range siege; chips towers and denies clean fights.",
        effects: &[
            player(4, "DRAFT_POKE", "Safe mid-game pressure"),
            opponent(-2, "DRAFT_POKE_SIEGE", "Opponent worn down before fights"),
        ],
    },
    ChoiceSpec {
        id: "draft_scale",
        label: "Scaling composition",
        description: "Concede the early game to hit item spikes late.",
        effects: &[
            player(-5, "DRAFT_SCALE_EARLY", "Weak early game"),
            player(10, "DRAFT_SCALE_LATE", "Dominant late game"),
        ],
    },
];

const EARLY: &[ChoiceSpec] = &[
    ChoiceSpec {
        id: "early_top_gank",
        label: "Top-side jungle",
        description: "Path top and snowball the top lane.",
        effects: &[player(4, "EARLY_TOP_GANK", "Top lane snowball")],
    },
    ChoiceSpec {
        id: "early_bot_gank",
        label: "Bot-side jungle",
        description: "Dive the bot lane for drake control, leaving top on an island.",
        effects: &[
            player(6, "EARLY_BOT_GANK", "Bot lane lead"),
            player(-2, "EARLY_BOT_GANK_TOPSIDE", "Top side neglected"),
        ],
    },
    ChoiceSpec {
        id: "early_full_clear",
        label: "Full clear",
        description: "Farm efficiently and track the enemy jungler.",
        effects: &[
            player(2, "EARLY_FULL_CLEAR", "Jungle gold lead"),
            opponent(-1, "EARLY_FULL_CLEAR_TEMPO", "Enemy jungler tracked"),
        ],
    },
];

const MID: &[ChoiceSpec] = &[
    ChoiceSpec {
        id: "mid_dragon",
        label: "Dragon priority",
        description: "Stack drakes toward soul.",
        effects: &[player(5, "MID_DRAGON", "Dragon stacks")],
    },
    ChoiceSpec {
        id: "mid_herald",
        label: "Herald priority",
        description: "Take Herald and break the first towers.",
        effects: &[
            player(3, "MID_HERALD", "Tower plates"),
            opponent(-2, "MID_HERALD_PLATES", "Opponent map shrinks"),
        ],
    },
    ChoiceSpec {
        id: "mid_vision",
        label: "Vision control",
        description: "Sweep and deny the enemy jungle.",
        effects: &[opponent(-4, "MID_VISION", "Opponent plays blind")],
    },
];

const LATE: &[ChoiceSpec] = &[
    ChoiceSpec {
        id: "late_baron",
        label: "Force Baron",
        description: "Start Baron to bait a fight; a stolen Baron is costly.",
        effects: &[
            player(7, "LATE_BARON", "Baron buff push"),
            player(-3, "LATE_BARON_THROW", "Steal risk"),
        ],
    },
    ChoiceSpec {
        id: "late_split",
        label: "Split push",
        description: "1-4 side pressure to stretch the map.",
        effects: &[player(4, "LATE_SPLIT", "Side lane pressure")],
    },
    ChoiceSpec {
        id: "late_siege",
        label: "Grouped siege",
        description: "Group five and siege mid with vision.",
        effects: &[
            player(3, "LATE_SIEGE", "Grouped siege"),
            opponent(-2, "LATE_SIEGE_PRESSURE", "Opponent forced to defend"),
        ],
    },
];

const FEEDBACK: &[ChoiceSpec] = &[
    ChoiceSpec {
        id: "feedback_criticize",
        label: "Criticize",
        description: "Call out mistakes; sharper focus, some morale cost.",
        effects: &[
            player(5, "FEEDBACK_CRITICIZE", "Sharper focus"),
            player(-2, "FEEDBACK_CRITICIZE_MORALE", "Morale dip"),
        ],
    },
    ChoiceSpec {
        id: "feedback_encourage",
        label: "Encourage",
        description: "Keep spirits high going into the next game.",
        effects: &[player(3, "FEEDBACK_ENCOURAGE", "Team confidence")],
    },
    ChoiceSpec {
        id: "feedback_change_tactics",
        label: "Change tactics",
        description: "Adjust the game plan to counter the opponent.",
        effects: &[opponent(-4, "FEEDBACK_CHANGE_TACTICS", "Opponent read")],
    },
];

fn specs_for(phase: Phase) -> &'static [ChoiceSpec] {
    match phase {
        Phase::Draft => DRAFT,
        Phase::Early => EARLY,
        Phase::Mid => MID,
        Phase::Late => LATE,
        Phase::Feedback => FEEDBACK,
        Phase::End => &[],
    }
}

/// Menu for `phase`; empty for END.
pub fn choices_for(phase: Phase) -> Vec<PhaseChoice> {
    let carries = phase == Phase::Feedback;
    specs_for(phase)
        .iter()
        .map(|spec| PhaseChoice {
            id: spec.id.to_string(),
            label: spec.label.to_string(),
            description: spec.description.to_string(),
            phase,
            modifiers: spec
                .effects
                .iter()
                .map(|e| ModifierTemplate {
                    side: e.side,
                    value: Decimal::new(e.value, 0),
                    source: e.source.to_string(),
                    description: e.description.to_string(),
                    carries_to_next_set: carries,
                })
                .collect(),
        })
        .collect()
}
