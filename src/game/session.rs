//! Game Session
//!
//! Lobby / play / finish state machine for one round. Polled on its own
//! timer, independent of the tick rate. It never looks at the world
//! directly: registration, removal and kill events keep its counters.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Deserialize};
use tracing::info;

use super::actor::{ActorId, Team};

/// Session poll interval in milliseconds.
pub const SESSION_POLL_MS: u64 = 1000;

/// Match phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Waiting for both teams to have a living player.
    Lobby,
    /// Round in progress.
    Play,
    /// One team was wiped out.
    Finish,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Play => "play",
            Self::Finish => "finish",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase change produced by a poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionTransition {
    /// Lobby to play.
    Started,
    /// Play to finish, with the winning team.
    Finished { win_team: Team },
}

/// One round's lifecycle and scoring.
#[derive(Clone, Debug)]
pub struct GameSession {
    phase: SessionPhase,
    polling: bool,
    teams: BTreeMap<ActorId, Team>,
    scores: BTreeMap<ActorId, u32>,
    red_alive: u32,
    blue_alive: u32,
    win_team: Option<Team>,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GameSession {
    /// New session in the lobby with polling on.
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Lobby,
            polling: true,
            teams: BTreeMap::new(),
            scores: BTreeMap::new(),
            red_alive: 0,
            blue_alive: 0,
            win_team: None,
        }
    }

    /// A fresh lobby session for the next round.
    ///
    /// Registered players and their scores carry over; alive counts are
    /// recounted from the registrations.
    pub fn next_round(&self) -> Self {
        let mut next = Self {
            teams: self.teams.clone(),
            scores: self.scores.clone(),
            ..Self::new()
        };
        next.reset_alive();
        next
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Is the poll timer still meant to run.
    pub fn is_polling(&self) -> bool {
        self.polling
    }

    /// Stop polling. Idempotent.
    pub fn stop(&mut self) {
        self.polling = false;
    }

    pub fn alive(&self, team: Team) -> u32 {
        match team {
            Team::Red => self.red_alive,
            Team::Blue => self.blue_alive,
        }
    }

    fn alive_mut(&mut self, team: Team) -> &mut u32 {
        match team {
            Team::Red => &mut self.red_alive,
            Team::Blue => &mut self.blue_alive,
        }
    }

    /// Winner of the last finished round.
    pub fn win_team(&self) -> Option<Team> {
        self.win_team
    }

    pub fn scores(&self) -> &BTreeMap<ActorId, u32> {
        &self.scores
    }

    pub fn team_of(&self, id: &ActorId) -> Option<Team> {
        self.teams.get(id).copied()
    }

    pub fn is_registered(&self, id: &ActorId) -> bool {
        self.teams.contains_key(id)
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Register a living player. Re-registering moves the player.
    pub fn register_player(&mut self, id: ActorId, team: Team) {
        if let Some(previous) = self.teams.insert(id, team) {
            let alive = self.alive_mut(previous);
            *alive = alive.saturating_sub(1);
        }
        *self.alive_mut(team) += 1;
        self.scores.insert(id, 0);
    }

    /// Forget a player. The alive count only drops if the actor was alive.
    pub fn remove_player(&mut self, id: &ActorId, was_dead: bool) -> bool {
        let Some(team) = self.teams.remove(id) else {
            return false;
        };
        self.scores.remove(id);
        if !was_dead {
            let alive = self.alive_mut(team);
            *alive = alive.saturating_sub(1);
        }
        true
    }

    /// Record a kill: killer scores, target team loses a living player.
    pub fn handle_kill(&mut self, target: &ActorId, killer: Option<&ActorId>) {
        if let Some(score) = killer.and_then(|k| self.scores.get_mut(k)) {
            *score += 1;
        }
        if let Some(team) = self.team_of(target) {
            let alive = self.alive_mut(team);
            *alive = alive.saturating_sub(1);
        }
    }

    /// Recount alive players, treating every registered player as alive.
    pub fn reset_alive(&mut self) {
        self.red_alive = 0;
        self.blue_alive = 0;
        let teams: Vec<Team> = self.teams.values().copied().collect();
        for team in teams {
            *self.alive_mut(team) += 1;
        }
    }

    // =========================================================================
    // State machine
    // =========================================================================

    /// One poll of the state machine.
    pub fn poll(&mut self) -> Option<SessionTransition> {
        if !self.polling {
            return None;
        }

        match self.phase {
            SessionPhase::Lobby => {
                if self.red_alive > 0 && self.blue_alive > 0 {
                    self.phase = SessionPhase::Play;
                    info!(red = self.red_alive, blue = self.blue_alive, "session started");
                    return Some(SessionTransition::Started);
                }
                None
            }
            SessionPhase::Play => {
                if self.red_alive == 0 || self.blue_alive == 0 {
                    let win_team = if self.red_alive > 0 { Team::Red } else { Team::Blue };
                    self.win_team = Some(win_team);
                    self.phase = SessionPhase::Finish;
                    self.polling = false;
                    info!(win_team = %win_team, "session finished");
                    return Some(SessionTransition::Finished { win_team });
                }
                None
            }
            SessionPhase::Finish => {
                self.polling = false;
                None
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn id(n: u128) -> ActorId {
        ActorId(Uuid::from_u128(n))
    }

    fn two_player_session() -> GameSession {
        let mut session = GameSession::new();
        session.register_player(id(1), Team::Red);
        session.register_player(id(2), Team::Blue);
        session
    }

    #[test]
    fn test_lobby_waits_for_both_teams() {
        let mut session = GameSession::new();
        session.register_player(id(1), Team::Red);
        assert_eq!(session.poll(), None);
        assert_eq!(session.phase(), SessionPhase::Lobby);

        session.register_player(id(2), Team::Blue);
        assert_eq!(session.poll(), Some(SessionTransition::Started));
        assert_eq!(session.phase(), SessionPhase::Play);
    }

    #[test]
    fn test_kill_finishes_round() {
        let mut session = two_player_session();
        session.poll();

        session.handle_kill(&id(2), Some(&id(1)));
        assert_eq!(session.alive(Team::Blue), 0);
        assert_eq!(session.scores()[&id(1)], 1);

        assert_eq!(session.poll(), Some(SessionTransition::Finished { win_team: Team::Red }));
        assert_eq!(session.win_team(), Some(Team::Red));
        assert!(!session.is_polling());
        assert_eq!(session.poll(), None);
        assert_eq!(session.phase(), SessionPhase::Finish);
    }

    #[test]
    fn test_blue_wins_when_both_wiped() {
        let mut session = two_player_session();
        session.poll();
        session.handle_kill(&id(1), None);
        session.handle_kill(&id(2), None);
        assert_eq!(session.poll(), Some(SessionTransition::Finished { win_team: Team::Blue }));
    }

    #[test]
    fn test_remove_dead_player_keeps_count() {
        let mut session = two_player_session();
        session.register_player(id(3), Team::Red);
        session.handle_kill(&id(3), Some(&id(2)));
        assert_eq!(session.alive(Team::Red), 1);

        assert!(session.remove_player(&id(3), true));
        assert_eq!(session.alive(Team::Red), 1);
        assert!(session.remove_player(&id(1), false));
        assert_eq!(session.alive(Team::Red), 0);
        assert!(!session.remove_player(&id(1), false));
    }

    #[test]
    fn test_next_round_keeps_scores() {
        let mut session = two_player_session();
        session.poll();
        session.handle_kill(&id(2), Some(&id(1)));
        session.poll();

        let next = session.next_round();
        assert_eq!(next.phase(), SessionPhase::Lobby);
        assert!(next.is_polling());
        assert_eq!(next.alive(Team::Red), 1);
        assert_eq!(next.alive(Team::Blue), 1);
        assert_eq!(next.scores()[&id(1)], 1);
    }

    #[test]
    fn test_stopped_session_does_not_transition() {
        let mut session = two_player_session();
        session.stop();
        assert_eq!(session.poll(), None);
        assert_eq!(session.phase(), SessionPhase::Lobby);
    }

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(serde_json::to_string(&SessionPhase::Finish).unwrap(), "\"finish\"");
        assert_eq!(SessionPhase::Play.to_string(), "play");
    }
}
