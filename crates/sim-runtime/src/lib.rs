#![deny(warnings)]

//! Session registry for serving many live series at once.
//!
//! Each live match gets its own [`MatchController`] behind a mutex. A
//! submission that finds the match already locked is rejected as busy rather
//! than queued, so steps of one match never interleave.

use sim_core::{Match, MatchId, MatchStatus, TeamId};
use sim_engine::{
    EngineConfig, EngineError, League, MatchController, PhaseChoice, SimulationState,
    SubmitOutcome,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, TryLockError};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq)]
pub enum RuntimeError {
    #[error("no live session for match {0}")]
    NoSession(MatchId),
    #[error("a session for match {0} is already open")]
    SessionExists(MatchId),
    #[error("match {0} is busy")]
    Busy(MatchId),
    #[error("lock poisoned")]
    Poisoned,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Session = Arc<Mutex<MatchController>>;

/// Per-match RNG seed so sessions do not replay each other's dice.
pub fn session_seed(base: u64, match_id: &MatchId) -> u64 {
    match_id
        .0
        .bytes()
        .fold(base, |acc, b| acc.rotate_left(5) ^ u64::from(b))
}

/// Master league plus the live sessions keyed by match id.
pub struct SessionRegistry {
    config: EngineConfig,
    league: RwLock<League>,
    sessions: RwLock<HashMap<MatchId, Session>>,
}

impl SessionRegistry {
    pub fn new(league: League, config: EngineConfig) -> Result<Self, RuntimeError> {
        config.validate().map_err(EngineError::from)?;
        Ok(Self {
            config,
            league: RwLock::new(league),
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Read access to the master league.
    pub fn with_league<R>(&self, f: impl FnOnce(&League) -> R) -> Result<R, RuntimeError> {
        let league = self.league.read().map_err(|_| RuntimeError::Poisoned)?;
        Ok(f(&league))
    }

    /// Start a session for a scheduled match and return the DRAFT menu.
    pub fn open(
        &self,
        match_id: &MatchId,
        controlled_team: Option<TeamId>,
    ) -> Result<Vec<PhaseChoice>, RuntimeError> {
        let mut sessions = self.sessions.write().map_err(|_| RuntimeError::Poisoned)?;
        if sessions.contains_key(match_id) {
            return Err(RuntimeError::SessionExists(match_id.clone()));
        }

        let mut master = self.league.write().map_err(|_| RuntimeError::Poisoned)?;
        let m = master.get_match(match_id)?.clone();
        if m.status == MatchStatus::Completed {
            return Err(EngineError::AlreadyCompleted(match_id.clone()).into());
        }
        let mut local = League::new();
        local.add_team(master.team(&m.home)?.clone())?;
        local.add_team(master.team(&m.away)?.clone())?;
        local.schedule_match(m.id.clone(), m.home.clone(), m.away.clone(), m.match_type)?;

        let cfg = EngineConfig {
            rng_seed: session_seed(self.config.rng_seed, match_id),
            ..self.config.clone()
        };
        let mut ctl = MatchController::new(local, &cfg)?;
        ctl.set_controlled_team(controlled_team);
        let menu = ctl.start(match_id)?;

        master.live_match_mut(match_id)?.status = MatchStatus::InProgress;
        sessions.insert(match_id.clone(), Arc::new(Mutex::new(ctl)));
        info!(%match_id, "session opened");
        Ok(menu)
    }

    /// Handle to a live session.
    pub fn session(&self, match_id: &MatchId) -> Result<Session, RuntimeError> {
        let sessions = self.sessions.read().map_err(|_| RuntimeError::Poisoned)?;
        sessions
            .get(match_id)
            .cloned()
            .ok_or_else(|| RuntimeError::NoSession(match_id.clone()))
    }

    pub fn live_sessions(&self) -> Result<Vec<MatchId>, RuntimeError> {
        let sessions = self.sessions.read().map_err(|_| RuntimeError::Poisoned)?;
        let mut ids: Vec<MatchId> = sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Snapshot of a session's simulation state.
    pub fn state(&self, match_id: &MatchId) -> Result<SimulationState, RuntimeError> {
        let session = self.session(match_id)?;
        let ctl = session.lock().map_err(|_| RuntimeError::Poisoned)?;
        Ok(ctl.state().clone())
    }

    /// Submit a choice; completed matches are archived in the master league.
    pub fn submit(
        &self,
        match_id: &MatchId,
        choice_id: &str,
    ) -> Result<SubmitOutcome, RuntimeError> {
        let session = self.session(match_id)?;
        let mut ctl = match session.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(RuntimeError::Busy(match_id.clone())),
            Err(TryLockError::Poisoned(_)) => return Err(RuntimeError::Poisoned),
        };
        let outcome = ctl.submit_choice(choice_id)?;
        debug!(%match_id, choice_id, "choice submitted");

        if let SubmitOutcome::SetResolved(report) = &outcome {
            if report.match_complete {
                let finished = ctl.league().get_match(match_id)?.clone();
                drop(ctl);
                self.retire(&session, finished)?;
            }
        }
        Ok(outcome)
    }

    /// Drop a session without a result; the match can be opened again.
    /// Fails with [`RuntimeError::Busy`] while a submission holds the session.
    pub fn abandon(&self, match_id: &MatchId) -> Result<(), RuntimeError> {
        let mut sessions = self.sessions.write().map_err(|_| RuntimeError::Poisoned)?;
        let session = sessions
            .get(match_id)
            .ok_or_else(|| RuntimeError::NoSession(match_id.clone()))?;
        match session.try_lock() {
            Ok(_) => {}
            Err(TryLockError::WouldBlock) => return Err(RuntimeError::Busy(match_id.clone())),
            Err(TryLockError::Poisoned(_)) => return Err(RuntimeError::Poisoned),
        }
        sessions.remove(match_id);
        let mut master = self.league.write().map_err(|_| RuntimeError::Poisoned)?;
        master.live_match_mut(match_id)?.status = MatchStatus::Scheduled;
        info!(%match_id, "session abandoned");
        Ok(())
    }

    /// Archive `finished` if `session` is still the one registered for it.
    /// A session that was abandoned and replaced leaves no trace.
    fn retire(&self, session: &Session, finished: Match) -> Result<(), RuntimeError> {
        let match_id = finished.id.clone();
        let mut sessions = self.sessions.write().map_err(|_| RuntimeError::Poisoned)?;
        match sessions.get(&match_id) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(&match_id);
            }
            _ => {
                debug!(%match_id, "stale session finished, result dropped");
                return Ok(());
            }
        }
        let mut master = self.league.write().map_err(|_| RuntimeError::Poisoned)?;
        *master.live_match_mut(&match_id)? = finished;
        master.archive(&match_id)?;
        info!(%match_id, "session retired");
        Ok(())
    }
}
