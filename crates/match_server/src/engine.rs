//! Session lifecycle controller.
//!
//! `GameEngine` owns the session store and the ranked waiting slot and
//! is the only component that mutates them. Every inbound operation is
//! an async method returning a structured outcome; the messaging
//! router translates outcomes into pushes, which keeps the game logic
//! independent of any transport and directly testable.
//!
//! Concurrency discipline: all mutations of one session happen under
//! that session's lock, held across any persistence call whose result
//! feeds the emitted outcome. Distinct sessions proceed concurrently;
//! the waiting slot and the store indexes have their own locks.

use crate::bot::BotStrategy;
use crate::config::GameSettings;
use crate::error::GameError;
use crate::events::{RoundResultKind, ServerEvent};
use crate::matchmaking::{Matchmaker, Pairing};
use crate::rules::{self, Move, RoundVerdict};
use crate::services::{PersistenceService, PlayerSummary, SeriesLength, StatDelta};
use crate::session::state::RecordedMove;
use crate::session::{
    Participant, Session, SessionId, SessionMode, SessionStatus, SessionStore, UserId,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of a ranked enqueue request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOutcome {
    /// The caller now occupies the waiting slot.
    Waiting,
    /// A session was created; `players[0]` is the earlier occupant of
    /// the waiting slot (the "left" seat).
    Matched {
        session_id: SessionId,
        players: [UserId; 2],
    },
}

/// Outcome of a direct-link join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The session did not exist; the caller created it and waits.
    Created { session_id: SessionId },
    /// The caller filled the second seat; the session is in progress.
    Matched {
        session_id: SessionId,
        players: Vec<UserId>,
    },
    /// Idempotent no-op: the caller is already a member, or the
    /// session is full.
    AlreadyJoined { session_id: SessionId },
}

/// Outcome of a bot session request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotSessionStart {
    pub session_id: SessionId,
}

/// Credit movement applied when a bot series settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub user: UserId,
    /// The stored balance as returned by the persistence service.
    pub new_balance: i64,
    pub delta: i64,
}

/// Everything that follows from one resolved round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    pub session_id: SessionId,
    pub series_over: bool,
    /// Personalized `roundResult` event per human participant.
    pub reports: Vec<(UserId, ServerEvent)>,
    /// Wager settlement, present when a bot series ended and the
    /// credit update succeeded.
    pub settlement: Option<Settlement>,
    /// Refreshed leaderboard to broadcast after a ranked series.
    pub leaderboard: Option<Vec<PlayerSummary>>,
    /// Soft failure notices (persistence unavailable).
    pub notices: Vec<(UserId, String)>,
}

/// Outcome of a move submission.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// Resubmission within the round, or the session is not in
    /// progress: no state change, nothing to deliver.
    Ignored,
    /// First move of the round is pending; notify the opponent that a
    /// move was made (without revealing it).
    Pending { opponent: Option<UserId> },
    /// Both moves were present; the round resolved exactly once.
    Resolved(RoundReport),
}

/// Outcome of a play-again request on a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetOutcome {
    pub session_id: SessionId,
    pub players: Vec<UserId>,
}

/// Outcome of a participant disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// The participant held no queue slot and no session.
    Idle,
    /// The participant was waiting for a ranked match; slot cleared.
    QueueCleared,
    /// The participant's session was torn down (or left, if already
    /// finished). `notify` is the remaining participant to inform,
    /// exactly once, for sessions that were still running.
    SessionClosed {
        session_id: SessionId,
        notify: Option<UserId>,
    },
}

/// The session/matchmaking core.
///
/// Constructed once per server process and shared behind an `Arc`;
/// holds no ambient globals.
pub struct GameEngine {
    store: SessionStore,
    matchmaker: Matchmaker,
    persistence: Arc<dyn PersistenceService>,
    bot: Arc<dyn BotStrategy>,
    settings: GameSettings,
}

impl GameEngine {
    pub fn new(
        settings: GameSettings,
        persistence: Arc<dyn PersistenceService>,
        bot: Arc<dyn BotStrategy>,
    ) -> Self {
        Self {
            store: SessionStore::new(),
            matchmaker: Matchmaker::new(),
            persistence,
            bot,
            settings,
        }
    }

    /// The session table, exposed for diagnostics and tests.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// The ranked waiting slot, exposed for diagnostics and tests.
    pub fn matchmaker(&self) -> &Matchmaker {
        &self.matchmaker
    }

    fn validate_rounds(&self, target_rounds: Option<u32>) -> Result<u32, GameError> {
        let rounds = target_rounds.unwrap_or(self.settings.default_target_rounds);
        if rounds == 0 || rounds % 2 == 0 {
            Err(GameError::InvalidRounds(rounds))
        } else {
            Ok(rounds)
        }
    }

    /// Enforces the one-active-session invariant for `user`.
    ///
    /// A finished session releases its hold when the participant moves
    /// on; a running bot session is replaced when `replace_bot` is set
    /// (starting a fresh bot game discards the previous one); any
    /// other running session rejects the new activity.
    async fn ensure_free(&self, user: &UserId, replace_bot: bool) -> Result<(), GameError> {
        let Some(owner) = self.store.session_of(user).await else {
            return Ok(());
        };
        let Some(handle) = self.store.get(&owner).await else {
            // Stale index entry; release it.
            self.store.unbind_member(user).await;
            return Ok(());
        };

        let mut session = handle.lock().await;
        match session.status() {
            SessionStatus::Finished => {
                session.remove_player(&Participant::Human(user.clone()));
                let empty = session.human_players().is_empty();
                drop(session);
                self.store.unbind_member(user).await;
                if empty {
                    self.store.remove(&owner).await;
                }
                Ok(())
            }
            _ if replace_bot && session.mode() == SessionMode::Bot => {
                drop(session);
                self.store.remove(&owner).await;
                debug!("♻️ Replaced running bot session {} for {}", owner, user);
                Ok(())
            }
            _ => Err(GameError::AlreadyInSession),
        }
    }

    /// Requests ranked matchmaking for `user`.
    ///
    /// Returns immediately: either the caller occupies the waiting slot
    /// or it consumed the slot and a session was created with the
    /// earlier occupant in the left seat.
    pub async fn enqueue_ranked(
        &self,
        user: &UserId,
        target_rounds: Option<u32>,
    ) -> Result<QueueOutcome, GameError> {
        let rounds = self.validate_rounds(target_rounds)?;
        self.ensure_free(user, false).await?;

        match self.matchmaker.enqueue(user, rounds).await? {
            Pairing::Waiting => Ok(QueueOutcome::Waiting),
            Pairing::Matched {
                left,
                target_rounds,
            } => {
                let session_id = SessionId(Uuid::new_v4().to_string());
                let mut session =
                    Session::new(session_id.clone(), SessionMode::Ranked, target_rounds, 0)?;
                session.add_player(Participant::Human(left.clone()))?;
                session.add_player(Participant::Human(user.clone()))?;
                self.store.insert(session).await;
                info!("🎮 Ranked session {} created: {} vs {}", session_id, left, user);
                Ok(QueueOutcome::Matched {
                    session_id,
                    players: [left, user.clone()],
                })
            }
        }
    }

    /// Leaves the ranked waiting slot, if the caller occupies it.
    /// Only affects queue state, never an in-progress session.
    pub async fn cancel_queue(&self, user: &UserId) -> bool {
        self.matchmaker.cancel(user).await
    }

    /// Creates or joins a direct-link session.
    pub async fn join_by_link(
        &self,
        user: &UserId,
        session_id: SessionId,
        target_rounds: Option<u32>,
    ) -> Result<JoinOutcome, GameError> {
        // Switching to a link game abandons any ranked wait.
        self.matchmaker.cancel(user).await;

        if let Some(owner) = self.store.session_of(user).await {
            if owner == session_id {
                return Ok(JoinOutcome::AlreadyJoined { session_id });
            }
        }
        self.ensure_free(user, false).await?;

        match self.store.get(&session_id).await {
            None => {
                let rounds = self.validate_rounds(target_rounds)?;
                let mut session =
                    Session::new(session_id.clone(), SessionMode::CasualLink, rounds, 0)?;
                session.add_player(Participant::Human(user.clone()))?;
                self.store.insert(session).await;
                debug!("🔗 Link session {} created by {}", session_id, user);
                Ok(JoinOutcome::Created { session_id })
            }
            Some(handle) => {
                let mut session = handle.lock().await;
                let me = Participant::Human(user.clone());
                if session.is_member(&me) || session.players().len() >= 2 {
                    return Ok(JoinOutcome::AlreadyJoined { session_id });
                }
                session.add_player(me)?;
                let players = session.human_players();
                drop(session);
                self.store.bind_member(user, &session_id).await;
                info!("🔗 Link session {} filled, starting", session_id);
                Ok(JoinOutcome::Matched {
                    session_id,
                    players,
                })
            }
        }
    }

    /// Starts a session against the bot opponent.
    ///
    /// The wager is validated against the stored balance before the
    /// session exists; a running bot session owned by the caller is
    /// replaced.
    pub async fn start_bot_session(
        &self,
        user: &UserId,
        wager: u64,
    ) -> Result<BotSessionStart, GameError> {
        self.matchmaker.cancel(user).await;
        self.ensure_free(user, true).await?;

        let balance = self.persistence.credit_balance(user).await?;
        let stake = i64::try_from(wager).unwrap_or(i64::MAX);
        if stake > balance {
            return Err(GameError::InsufficientCredits { wager, balance });
        }

        let session_id = SessionId(format!("bot-{}", Uuid::new_v4()));
        let mut session = Session::new(
            session_id.clone(),
            SessionMode::Bot,
            self.settings.default_target_rounds,
            wager,
        )?;
        session.add_player(Participant::Human(user.clone()))?;
        session.add_player(Participant::Bot)?;
        self.store.insert(session).await;
        info!("🤖 Bot session {} started by {} (wager {})", session_id, user, wager);
        Ok(BotSessionStart { session_id })
    }

    /// Submits a move for the round in progress.
    ///
    /// First move pends; the opponent's second distinct move triggers
    /// exactly-once resolution under the session lock. In bot sessions
    /// the bot's move is generated independently once the human's move
    /// is in, and the round resolves synchronously.
    pub async fn submit_move(
        &self,
        user: &UserId,
        session_id: &SessionId,
        mv: Move,
    ) -> Result<MoveOutcome, GameError> {
        let handle = self
            .store
            .get(session_id)
            .await
            .ok_or_else(|| GameError::SessionNotFound(session_id.clone()))?;

        let mut session = handle.lock().await;
        let me = Participant::Human(user.clone());
        if !session.is_member(&me) {
            return Err(GameError::NotInSession(session_id.clone()));
        }
        if session.status() != SessionStatus::InProgress {
            return Ok(MoveOutcome::Ignored);
        }

        let recorded = match session.record_move(&me, mv) {
            RecordedMove::Ignored => return Ok(MoveOutcome::Ignored),
            RecordedMove::Waiting if session.mode() == SessionMode::Bot => {
                // Generated without looking at the human's submission.
                let bot_move = self.bot.pick();
                session.record_move(&Participant::Bot, bot_move)
            }
            other => other,
        };

        match recorded {
            RecordedMove::Complete(left, right) => {
                let report = self.resolve_round(&mut session, left, right).await;
                let mode = session.mode();
                drop(session);
                // Bot sessions are removed immediately after the series.
                if report.series_over && mode == SessionMode::Bot {
                    self.store.remove(session_id).await;
                }
                Ok(MoveOutcome::Resolved(report))
            }
            RecordedMove::Waiting => {
                let opponent = session.opponent_of(&me).and_then(|p| p.user().cloned());
                Ok(MoveOutcome::Pending { opponent })
            }
            RecordedMove::Ignored => Ok(MoveOutcome::Ignored),
        }
    }

    /// Resolves one round and applies every downstream effect that must
    /// be observed before the result events go out.
    async fn resolve_round(&self, session: &mut Session, left: Move, right: Move) -> RoundReport {
        let verdict = rules::resolve(left, right);
        let seats: Vec<Participant> = session.players().to_vec();
        let winner = match verdict {
            RoundVerdict::Left => Some(seats[0].clone()),
            RoundVerdict::Right => Some(seats[1].clone()),
            RoundVerdict::Draw => None,
        };

        let series_over = session.award_round(winner.as_ref());
        let required_wins = session.required_wins();
        let moves = [left, right];

        let mut reports = Vec::new();
        for (idx, seat) in seats.iter().enumerate() {
            let Some(player) = seat.user() else { continue };
            let opponent = &seats[1 - idx];
            let result = match &winner {
                None => RoundResultKind::Draw,
                Some(w) if w == seat => RoundResultKind::Win,
                Some(_) => RoundResultKind::Lose,
            };
            reports.push((
                player.clone(),
                ServerEvent::RoundResult {
                    result,
                    own_move: moves[idx],
                    opponent_move: moves[1 - idx],
                    own_score: session.score_of(seat),
                    opponent_score: session.score_of(opponent),
                    series_over,
                    required_wins,
                },
            ));
        }

        let mut report = RoundReport {
            session_id: session.id().clone(),
            series_over,
            reports,
            settlement: None,
            leaderboard: None,
            notices: Vec::new(),
        };

        if series_over {
            debug!("🏁 Series over in session {}", session.id());
            match session.mode() {
                SessionMode::Ranked => {
                    self.settle_ranked(session, winner.as_ref(), &mut report).await;
                }
                SessionMode::Bot => {
                    self.settle_bot(session, winner.as_ref(), &mut report).await;
                }
                SessionMode::CasualLink => {}
            }
        }
        report
    }

    /// Persists win/loss stats for a completed ranked series and
    /// prepares the leaderboard broadcast. Failures are soft: logged,
    /// surfaced as notices, never rolled back into session state.
    async fn settle_ranked(
        &self,
        session: &Session,
        winner: Option<&Participant>,
        report: &mut RoundReport,
    ) {
        let Some(winner) = winner else {
            // A series only ends on a win; a draw can never finish it.
            return;
        };
        let Some(loser) = session.opponent_of(winner).cloned() else {
            return;
        };
        let series = SeriesLength::from_target_rounds(session.target_rounds());

        for (seat, delta) in [
            (winner.clone(), StatDelta::win(series)),
            (loser, StatDelta::loss(series)),
        ] {
            let Some(user) = seat.user() else { continue };
            if let Err(e) = self.persistence.increment_stats(user, delta).await {
                warn!("⚠️ Failed to persist stats for {}: {}", user, e);
                report
                    .notices
                    .push((user.clone(), "Your match result could not be saved".to_string()));
            }
        }

        match self
            .persistence
            .top_players(self.settings.leaderboard_limit)
            .await
        {
            Ok(list) => report.leaderboard = Some(list),
            Err(e) => warn!("⚠️ Leaderboard refresh failed: {}", e),
        }
    }

    /// Applies wager settlement for a completed bot series, exactly
    /// once. The reported balance is whatever the persistence service
    /// returns, never a locally computed total.
    async fn settle_bot(
        &self,
        session: &Session,
        winner: Option<&Participant>,
        report: &mut RoundReport,
    ) {
        let Some(human) = session
            .players()
            .iter()
            .find_map(|p| p.user().cloned())
        else {
            return;
        };
        let human_won = winner == Some(&Participant::Human(human.clone()));
        let stake = i64::try_from(session.wager()).unwrap_or(i64::MAX);
        let delta = if human_won {
            2 * stake + self.settings.win_bonus
        } else {
            -stake
        };
        if delta == 0 {
            return; // zero-wager loss moves nothing
        }

        match self.persistence.adjust_credits(&human, delta).await {
            Ok(new_balance) => {
                info!("💰 Settled bot wager for {}: {:+} -> {}", human, delta, new_balance);
                report.settlement = Some(Settlement {
                    user: human,
                    new_balance,
                    delta,
                });
            }
            Err(e) => {
                warn!("⚠️ Failed to settle wager for {}: {}", human, e);
                report
                    .notices
                    .push((human, "Your credits could not be updated".to_string()));
            }
        }
    }

    /// Resets a finished session for a rematch. Scores return to zero,
    /// the pending round is cleared and the session id is preserved so
    /// link-based rematches keep working. Both seats must still be
    /// occupied; a session whose opponent already left is torn down
    /// instead.
    pub async fn request_play_again(
        &self,
        user: &UserId,
        session_id: &SessionId,
    ) -> Result<ResetOutcome, GameError> {
        let handle = self
            .store
            .get(session_id)
            .await
            .ok_or_else(|| GameError::SessionNotFound(session_id.clone()))?;

        let mut session = handle.lock().await;
        if !session.is_member(&Participant::Human(user.clone())) {
            return Err(GameError::NotInSession(session_id.clone()));
        }
        if session.status() != SessionStatus::Finished {
            return Err(GameError::SessionNotFinished(session_id.clone()));
        }
        if session.players().len() < 2 {
            // The opponent already left; there is nobody to rematch.
            // Tear the session down so the caller is free to move on.
            drop(session);
            self.store.remove(session_id).await;
            return Err(GameError::SessionNotFound(session_id.clone()));
        }
        session.reset();
        info!("🔄 Session {} reset for a rematch", session_id);
        Ok(ResetOutcome {
            session_id: session_id.clone(),
            players: session.human_players(),
        })
    }

    /// Handles a participant disconnect, at any state.
    ///
    /// Clears the waiting slot if held by the leaver. An unfinished
    /// session is deleted and the remaining participant is reported for
    /// a single `opponentDisconnected` push; no stats persist for an
    /// abandoned ranked series. A finished session merely drops the
    /// leaver and disappears once empty.
    pub async fn handle_disconnect(&self, user: &UserId) -> DisconnectOutcome {
        let queue_cleared = self.matchmaker.cancel(user).await;

        let Some(session_id) = self.store.session_of(user).await else {
            return if queue_cleared {
                DisconnectOutcome::QueueCleared
            } else {
                DisconnectOutcome::Idle
            };
        };
        let Some(handle) = self.store.get(&session_id).await else {
            self.store.unbind_member(user).await;
            return DisconnectOutcome::Idle;
        };

        let mut session = handle.lock().await;
        let me = Participant::Human(user.clone());

        if session.status() == SessionStatus::Finished {
            session.remove_player(&me);
            let empty = session.human_players().is_empty();
            drop(session);
            self.store.unbind_member(user).await;
            if empty {
                self.store.remove(&session_id).await;
            }
            return DisconnectOutcome::SessionClosed {
                session_id,
                notify: None,
            };
        }

        let notify = session.opponent_of(&me).and_then(|p| p.user().cloned());
        drop(session);
        self.store.remove(&session_id).await;
        info!("❌ Session {} closed after {} disconnected", session_id, user);
        DisconnectOutcome::SessionClosed { session_id, notify }
    }
}
