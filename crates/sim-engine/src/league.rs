//! In-memory store of teams, live matches and the results archive.

use serde::{Deserialize, Serialize};
use sim_core::{validate_match, validate_team, Match, MatchId, MatchStatus, MatchType, Team, TeamId};
use std::collections::BTreeMap;

use crate::EngineError;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct League {
    teams: BTreeMap<TeamId, Team>,
    live: BTreeMap<MatchId, Match>,
    archive: BTreeMap<MatchId, Match>,
}

impl League {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a team after validating its roster.
    pub fn add_team(&mut self, team: Team) -> Result<(), EngineError> {
        validate_team(&team)?;
        self.teams.insert(team.id.clone(), team);
        Ok(())
    }

    pub fn team(&self, id: &TeamId) -> Result<&Team, EngineError> {
        self.teams
            .get(id)
            .ok_or_else(|| EngineError::TeamNotFound(id.clone()))
    }

    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    /// Create a scheduled series between two registered teams.
    pub fn schedule_match(
        &mut self,
        id: MatchId,
        home: TeamId,
        away: TeamId,
        match_type: MatchType,
    ) -> Result<&Match, EngineError> {
        if self.live.contains_key(&id) || self.archive.contains_key(&id) {
            return Err(EngineError::DuplicateMatch(id));
        }
        self.team(&home)?;
        self.team(&away)?;
        let m = Match::scheduled(id.clone(), home, away, match_type);
        validate_match(&m)?;
        Ok(self.live.entry(id).or_insert(m))
    }

    /// Look up a match, live or archived.
    pub fn get_match(&self, id: &MatchId) -> Result<&Match, EngineError> {
        self.live
            .get(id)
            .or_else(|| self.archive.get(id))
            .ok_or_else(|| EngineError::MatchNotFound(id.clone()))
    }

    /// Mutable access to a match that has not been archived.
    pub fn live_match_mut(&mut self, id: &MatchId) -> Result<&mut Match, EngineError> {
        if self.archive.contains_key(id) {
            return Err(EngineError::AlreadyCompleted(id.clone()));
        }
        let m = self
            .live
            .get_mut(id)
            .ok_or_else(|| EngineError::MatchNotFound(id.clone()))?;
        if m.status == MatchStatus::Completed {
            return Err(EngineError::AlreadyCompleted(id.clone()));
        }
        Ok(m)
    }

    /// Move a completed match from live to historical storage.
    pub fn archive(&mut self, id: &MatchId) -> Result<(), EngineError> {
        let m = self
            .live
            .remove(id)
            .ok_or_else(|| EngineError::MatchNotFound(id.clone()))?;
        self.archive.insert(id.clone(), m);
        Ok(())
    }

    pub fn live_matches(&self) -> impl Iterator<Item = &Match> {
        self.live.values()
    }

    pub fn archived_matches(&self) -> impl Iterator<Item = &Match> {
        self.archive.values()
    }
}
