#![deny(warnings)]

//! Headless CLI: play one series interactively or with a scripted policy.

use anyhow::{bail, Context, Result};
use sim_ai::{play_out, ChoicePolicy, GreedyPolicy, PlanPolicy, RandomPolicy};
use sim_core::*;
use sim_engine::{EngineConfig, League, MatchController, SubmitOutcome};
use std::io::{self, BufRead, Write};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    teams: Option<String>,
    seed: Option<u64>,
    bo5: bool,
    policy: Option<String>,
    controlled: Option<String>,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next(),
            "--teams" => args.teams = it.next(),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--bo5" => args.bo5 = true,
            "--policy" => args.policy = it.next(),
            "--as" => args.controlled = it.next(),
            "--json" => args.json = true,
            _ => {}
        }
    }
    args
}

fn player(team: &str, position: Position, name: &str, a: [u8; 6]) -> Player {
    Player {
        id: PlayerId(format!("{team}-{}", position.tag().to_lowercase())),
        name: name.to_string(),
        position,
        abilities: Abilities {
            laning: a[0],
            mechanics: a[1],
            teamfight: a[2],
            vision: a[3],
            macro_play: a[4],
            mental: a[5],
        },
        division: Division::FirstTeam,
    }
}

fn demo_teams() -> Vec<Team> {
    let mut comets = Team {
        id: TeamId("comets".to_string()),
        name: "Seoul Comets".to_string(),
        roster: vec![
            player("comets", Position::Top, "Anvil", [82, 78, 75, 60, 66, 70]),
            player("comets", Position::Jungle, "Moth", [60, 74, 72, 80, 84, 71]),
            player("comets", Position::Mid, "Quill", [85, 88, 76, 65, 74, 68]),
            player("comets", Position::Adc, "Ember", [80, 86, 79, 58, 62, 73]),
            player("comets", Position::Support, "Lantern", [55, 60, 74, 85, 81, 79]),
        ],
    };
    let mut sub = player("comets", Position::Mid, "Wisp", [70, 72, 66, 60, 64, 62]);
    sub.id = PlayerId("comets-mid2".to_string());
    sub.division = Division::Reserve;
    comets.roster.push(sub);

    let tides = Team {
        id: TeamId("tides".to_string()),
        name: "Harbor Tides".to_string(),
        roster: vec![
            player("tides", Position::Top, "Breaker", [76, 74, 80, 62, 70, 75]),
            player("tides", Position::Jungle, "Kelp", [62, 70, 76, 82, 80, 74]),
            player("tides", Position::Mid, "Current", [80, 82, 78, 66, 78, 72]),
            player("tides", Position::Adc, "Spray", [78, 80, 82, 60, 64, 70]),
            player("tides", Position::Support, "Buoy", [58, 62, 78, 80, 84, 82]),
        ],
    };
    vec![comets, tides]
}

fn load_teams(path: Option<&str>) -> Result<Vec<Team>> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p).with_context(|| format!("reading {p}"))?;
            let teams: Vec<Team> =
                serde_yaml::from_str(&text).with_context(|| format!("parsing {p}"))?;
            if teams.len() < 2 {
                bail!("{p} must define at least two teams");
            }
            Ok(teams)
        }
        None => Ok(demo_teams()),
    }
}

fn build_policy(spec: &str, seed: u64) -> Result<Box<dyn ChoicePolicy>> {
    let policy: Box<dyn ChoicePolicy> = match spec.split_once(':') {
        None if spec == "greedy" => Box::new(GreedyPolicy),
        None if spec == "random" => Box::new(RandomPolicy::new(seed)),
        Some(("plan", path)) => Box::new(PlanPolicy::load(path)?),
        Some(("script", dir)) => Box::new(modkit::ScriptPolicy::from_dir(dir)?),
        _ => bail!("unknown policy {spec:?}; expected greedy, random, plan:<yaml>, script:<dir> or interactive"),
    };
    Ok(policy)
}

fn print_menu(ctl: &MatchController) {
    let state = ctl.state();
    if let Some(phase) = state.current_phase {
        println!("-- set {} / {} --", state.current_set, phase.tag());
    }
    for (i, c) in state.current_choices.iter().enumerate() {
        println!("  {}) {:<22} {}", i + 1, c.label, c.description);
    }
    if let Some(p) = ctl.preview_probability() {
        println!("  home win chance now ~{:.0}%", p * 100.0);
    }
}

fn play_interactive(ctl: &mut MatchController) -> Result<MatchResult> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print_menu(ctl);
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            bail!("input closed before the series finished");
        };
        let line = line?;
        let input = line.trim();
        let choice_id = match input.parse::<usize>() {
            Ok(n) if n >= 1 => ctl
                .state()
                .current_choices
                .get(n - 1)
                .map(|c| c.id.clone())
                .unwrap_or_else(|| input.to_string()),
            _ => input.to_string(),
        };
        match ctl.submit_choice(&choice_id) {
            Ok(SubmitOutcome::SetResolved(report)) => {
                if let Some(line) = ctl.event_log().last() {
                    println!("{line}");
                }
                if let Some(result) = report.final_result {
                    return Ok(result);
                }
                println!(
                    "Series {}-{}",
                    report.series_score.home, report.series_score.away
                );
            }
            Ok(SubmitOutcome::NextPhase { .. }) => {}
            Err(e) => println!("! {e}"),
        }
    }
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(io::stderr)
        .init();

    let args = parse_args();
    info!(git_sha = env!("GIT_SHA"), ?args, "starting CLI");

    let mut cfg = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = args.seed {
        cfg.rng_seed = seed;
    }

    let teams = load_teams(args.teams.as_deref())?;
    let home = teams[0].id.clone();
    let away = teams[1].id.clone();
    let mut league = League::new();
    for t in teams {
        league.add_team(t)?;
    }
    let match_id = MatchId("cli-1".to_string());
    let match_type = if args.bo5 { MatchType::Bo5 } else { MatchType::Bo3 };
    league.schedule_match(match_id.clone(), home, away, match_type)?;

    let mut ctl = MatchController::new(league, &cfg)?;
    ctl.set_controlled_team(args.controlled.map(TeamId));
    ctl.start(&match_id)?;

    let result = match args.policy.as_deref().unwrap_or("interactive") {
        "interactive" => play_interactive(&mut ctl)?,
        spec => {
            let mut policy = build_policy(spec, cfg.rng_seed)?;
            let result = play_out(&mut ctl, policy.as_mut())?;
            for line in ctl.event_log() {
                println!("{line}");
            }
            result
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let pog = result
            .pog
            .as_ref()
            .map(|p| p.player_name.as_str())
            .unwrap_or("-");
        println!(
            "Final | {} {}-{} | winner: {} | POG: {} | sets: {}",
            match_id,
            result.home_score,
            result.away_score,
            result.winner,
            pog,
            result.sets.len()
        );
    }

    Ok(())
}
