//! Per-session game state.
//!
//! `Session` owns everything one game instance needs: its participants,
//! the round in progress, the running scores and the series
//! configuration. It enforces the local invariants (participant cap,
//! one pending move per participant, status transitions); cross-session
//! invariants live in [`crate::session::SessionStore`].

use crate::error::GameError;
use crate::rules::Move;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque session identifier.
///
/// Generated for ranked and bot sessions; supplied by the client for
/// direct-link sessions so both sides of a shared link land in the
/// same game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.to_string())
    }
}

/// Stable user identity resolved by the authentication boundary.
///
/// This is what sessions and the matchmaking queue key on; the live
/// connection for an identity is looked up through the connection
/// registry and never stored inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_string())
    }
}

/// A seat in a session: a real player or the synthetic bot opponent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Participant {
    Human(UserId),
    Bot,
}

impl Participant {
    /// The user identity behind this participant, if it is a human.
    pub fn user(&self) -> Option<&UserId> {
        match self {
            Participant::Human(user) => Some(user),
            Participant::Bot => None,
        }
    }
}

/// How a session came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    /// Paired through the single-slot ranked queue; stats persist.
    Ranked,
    /// Joined through a shared link; no stat persistence.
    CasualLink,
    /// One human against the bot opponent, with an optional wager.
    Bot,
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    WaitingForPlayers,
    InProgress,
    Finished,
}

/// Outcome of recording one move submission into the pending round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedMove {
    /// Resubmission within the same round; the first move wins and the
    /// pending round is unchanged.
    Ignored,
    /// First move of the round; waiting on the other participant.
    Waiting,
    /// Both moves are in, keyed by seat order: `(left, right)`.
    Complete(Move, Move),
}

/// One game instance.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    mode: SessionMode,
    /// Ordered seats; index 0 is the "left" player used for verdict
    /// personalization. At most 2 entries, at most 2 real players.
    players: Vec<Participant>,
    target_rounds: u32,
    required_wins: u32,
    scores: HashMap<Participant, u32>,
    /// Moves of the round in progress; absent between rounds.
    pending: HashMap<Participant, Move>,
    /// Credits at stake; only ever non-zero for bot sessions.
    wager: u64,
    status: SessionStatus,
}

impl Session {
    /// Creates an empty session.
    ///
    /// `target_rounds` must be an odd positive integer; the required
    /// win count is derived as `ceil(target_rounds / 2)`.
    pub fn new(
        id: SessionId,
        mode: SessionMode,
        target_rounds: u32,
        wager: u64,
    ) -> Result<Self, GameError> {
        if target_rounds == 0 || target_rounds % 2 == 0 {
            return Err(GameError::InvalidRounds(target_rounds));
        }
        Ok(Self {
            id,
            mode,
            players: Vec::with_capacity(2),
            target_rounds,
            required_wins: target_rounds.div_ceil(2),
            scores: HashMap::new(),
            pending: HashMap::new(),
            wager,
            status: SessionStatus::WaitingForPlayers,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn target_rounds(&self) -> u32 {
        self.target_rounds
    }

    pub fn required_wins(&self) -> u32 {
        self.required_wins
    }

    pub fn wager(&self) -> u64 {
        self.wager
    }

    pub fn players(&self) -> &[Participant] {
        &self.players
    }

    /// The user identities of all human seats, in seat order.
    pub fn human_players(&self) -> Vec<UserId> {
        self.players
            .iter()
            .filter_map(|p| p.user().cloned())
            .collect()
    }

    pub fn is_member(&self, participant: &Participant) -> bool {
        self.players.contains(participant)
    }

    pub fn score_of(&self, participant: &Participant) -> u32 {
        self.scores.get(participant).copied().unwrap_or(0)
    }

    /// The other seat, relative to `participant`.
    pub fn opponent_of(&self, participant: &Participant) -> Option<&Participant> {
        self.players.iter().find(|p| *p != participant)
    }

    /// Adds a participant to the session.
    ///
    /// A session holds at most two seats; adding a third, or the same
    /// participant twice, is rejected. Joining the second seat moves
    /// the session to `InProgress`.
    pub fn add_player(&mut self, participant: Participant) -> Result<(), GameError> {
        if self.is_member(&participant) || self.players.len() >= 2 {
            return Err(GameError::AlreadyInSession);
        }
        self.scores.insert(participant.clone(), 0);
        self.players.push(participant);
        if self.players.len() == 2 {
            self.status = SessionStatus::InProgress;
        }
        Ok(())
    }

    /// Removes a participant, dropping their score and pending move.
    pub fn remove_player(&mut self, participant: &Participant) {
        self.players.retain(|p| p != participant);
        self.scores.remove(participant);
        self.pending.remove(participant);
    }

    /// Records a move for the round in progress.
    ///
    /// First move wins: a resubmission by the same participant within
    /// an unresolved round never changes the pending round and never
    /// triggers resolution.
    pub fn record_move(&mut self, participant: &Participant, mv: Move) -> RecordedMove {
        if self.pending.contains_key(participant) {
            return RecordedMove::Ignored;
        }
        self.pending.insert(participant.clone(), mv);
        if self.players.len() == 2 && self.pending.len() == 2 {
            let left = self.pending[&self.players[0]];
            let right = self.pending[&self.players[1]];
            RecordedMove::Complete(left, right)
        } else {
            RecordedMove::Waiting
        }
    }

    /// Awards a round win and clears the pending round.
    ///
    /// Returns `true` if the series is now over, i.e. the winner's
    /// score has reached the required win count. The session moves to
    /// `Finished` in that case.
    pub fn award_round(&mut self, winner: Option<&Participant>) -> bool {
        self.pending.clear();
        let Some(winner) = winner else {
            return false; // draw
        };
        let score = self.scores.entry(winner.clone()).or_insert(0);
        *score += 1;
        if *score >= self.required_wins {
            self.status = SessionStatus::Finished;
            true
        } else {
            false
        }
    }

    /// Full reset for a rematch: scores to zero, pending cleared,
    /// status back to `InProgress`. The session id is preserved so
    /// link-based rematches keep working.
    pub fn reset(&mut self) {
        for score in self.scores.values_mut() {
            *score = 0;
        }
        self.pending.clear();
        self.status = SessionStatus::InProgress;
    }

    /// Whether a pending move exists for the participant.
    pub fn has_pending_move(&self, participant: &Participant) -> bool {
        self.pending.contains_key(participant)
    }
}
