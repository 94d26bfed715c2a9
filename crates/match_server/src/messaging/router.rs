//! Message routing logic for dispatching client operations.
//!
//! This module parses incoming client frames, invokes the session core
//! and translates the structured outcomes into event pushes. The
//! router is the only place that knows both the wire names of the
//! operations and which participants each outcome must reach.

use crate::{
    connection::{ConnectionId, ConnectionManager},
    engine::{
        BotSessionStart, DisconnectOutcome, GameEngine, JoinOutcome, MoveOutcome, QueueOutcome,
        ResetOutcome, RoundReport,
    },
    error::{GameError, ServerError},
    events::ServerEvent,
    messaging::types::{
        AuthenticatePayload, BotPayload, ClientMessage, EnqueuePayload, JoinPayload, MovePayload,
        PlayAgainPayload,
    },
    rules::Move,
    services::AuthService,
    session::{SessionId, UserId},
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Dispatches client frames to the session core and fans outcomes
/// back out to the affected connections.
pub struct MessageRouter {
    engine: Arc<GameEngine>,
    auth: Arc<dyn AuthService>,
    connections: Arc<ConnectionManager>,
}

impl MessageRouter {
    pub fn new(
        engine: Arc<GameEngine>,
        auth: Arc<dyn AuthService>,
        connections: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            engine,
            auth,
            connections,
        }
    }

    /// Routes one raw client frame.
    ///
    /// Malformed JSON is a transport error and bubbles up; rejected
    /// operations are answered with an `error` event on the calling
    /// connection and are not errors at this level.
    pub async fn route(&self, text: &str, connection_id: ConnectionId) -> Result<(), ServerError> {
        let message: ClientMessage = serde_json::from_str(text)
            .map_err(|e| ServerError::Network(format!("Invalid JSON: {e}")))?;

        debug!(
            "📨 Routing '{}' from connection {}",
            message.event, connection_id
        );

        if message.event == "authenticate" {
            return self.handle_authenticate(connection_id, message.data).await;
        }

        // Every other operation requires a bound identity.
        let Some(user) = self.connections.identity_of(connection_id).await else {
            self.push_game_error(connection_id, &GameError::Unauthenticated)
                .await;
            return Ok(());
        };

        match message.event.as_str() {
            "enqueueRanked" => {
                self.handle_enqueue(connection_id, &user, message.data)
                    .await
            }
            "cancelQueue" => self.handle_cancel(connection_id, &user).await,
            "joinByLink" => self.handle_join(connection_id, &user, message.data).await,
            "startBotSession" => self.handle_bot(connection_id, &user, message.data).await,
            "submitMove" => self.handle_move(connection_id, &user, message.data).await,
            "requestPlayAgain" => {
                self.handle_play_again(connection_id, &user, message.data)
                    .await
            }
            other => {
                trace!("Unknown event '{}' from connection {}", other, connection_id);
                self.push(
                    connection_id,
                    &ServerEvent::Error {
                        code: "unknownEvent".to_string(),
                        message: format!("Unknown event: {other}"),
                    },
                )
                .await;
                Ok(())
            }
        }
    }

    /// Cleans up after a closed connection: clears any queue slot,
    /// tears down an unfinished session and notifies the remaining
    /// participant exactly once.
    pub async fn handle_disconnect(&self, connection_id: ConnectionId) {
        let Some(user) = self.connections.identity_of(connection_id).await else {
            return;
        };
        match self.engine.handle_disconnect(&user).await {
            DisconnectOutcome::SessionClosed {
                notify: Some(opponent),
                ..
            } => {
                self.push_to_user(&opponent, &ServerEvent::OpponentDisconnected)
                    .await;
            }
            DisconnectOutcome::SessionClosed { .. }
            | DisconnectOutcome::QueueCleared
            | DisconnectOutcome::Idle => {}
        }
    }

    async fn handle_authenticate(
        &self,
        connection_id: ConnectionId,
        data: serde_json::Value,
    ) -> Result<(), ServerError> {
        let payload: AuthenticatePayload = parse_payload(data)?;
        match self.auth.resolve_identity(&payload.username).await {
            Some(user) => {
                if let Some(displaced) = self
                    .connections
                    .bind_identity(connection_id, user.clone())
                    .await
                {
                    warn!(
                        "👥 Identity {} moved from connection {} to {}",
                        user, displaced, connection_id
                    );
                    self.connections
                        .kick_connection(displaced, Some("Signed in from another connection".into()))
                        .await;
                }
                info!("🔐 Connection {} authenticated as {}", connection_id, user);
                self.push(
                    connection_id,
                    &ServerEvent::Authenticated {
                        username: user.to_string(),
                    },
                )
                .await;
            }
            None => {
                self.push_game_error(connection_id, &GameError::Unauthenticated)
                    .await;
            }
        }
        Ok(())
    }

    async fn handle_enqueue(
        &self,
        connection_id: ConnectionId,
        user: &UserId,
        data: serde_json::Value,
    ) -> Result<(), ServerError> {
        let payload: EnqueuePayload = parse_payload(data)?;
        match self.engine.enqueue_ranked(user, payload.target_rounds).await {
            Ok(QueueOutcome::Waiting) => {
                self.push(
                    connection_id,
                    &ServerEvent::MatchWaiting {
                        message: "Waiting for an opponent".to_string(),
                    },
                )
                .await;
            }
            Ok(QueueOutcome::Matched {
                session_id,
                players,
            }) => {
                self.announce_session(&players, &session_id, false).await;
            }
            Err(e) => self.push_game_error(connection_id, &e).await,
        }
        Ok(())
    }

    async fn handle_cancel(
        &self,
        connection_id: ConnectionId,
        user: &UserId,
    ) -> Result<(), ServerError> {
        if self.engine.cancel_queue(user).await {
            self.push(
                connection_id,
                &ServerEvent::Notice {
                    message: "Left the matchmaking queue".to_string(),
                },
            )
            .await;
        }
        Ok(())
    }

    async fn handle_join(
        &self,
        connection_id: ConnectionId,
        user: &UserId,
        data: serde_json::Value,
    ) -> Result<(), ServerError> {
        let payload: JoinPayload = parse_payload(data)?;
        let session_id = SessionId(payload.session_id);
        match self
            .engine
            .join_by_link(user, session_id, payload.target_rounds)
            .await
        {
            Ok(JoinOutcome::Created { .. }) => {
                self.push(
                    connection_id,
                    &ServerEvent::MatchWaiting {
                        message: "Waiting for your opponent to join".to_string(),
                    },
                )
                .await;
            }
            Ok(JoinOutcome::Matched {
                session_id,
                players,
            }) => {
                self.announce_session(&players, &session_id, false).await;
            }
            Ok(JoinOutcome::AlreadyJoined { .. }) => {
                self.push(
                    connection_id,
                    &ServerEvent::Notice {
                        message: "You are already in this session".to_string(),
                    },
                )
                .await;
            }
            Err(e) => self.push_game_error(connection_id, &e).await,
        }
        Ok(())
    }

    async fn handle_bot(
        &self,
        connection_id: ConnectionId,
        user: &UserId,
        data: serde_json::Value,
    ) -> Result<(), ServerError> {
        let payload: BotPayload = parse_payload(data)?;
        match self.engine.start_bot_session(user, payload.wager).await {
            Ok(BotSessionStart { session_id }) => {
                self.push(
                    connection_id,
                    &ServerEvent::MatchFound {
                        session_id,
                        is_bot: true,
                    },
                )
                .await;
                self.push(connection_id, &ServerEvent::SessionStart).await;
            }
            Err(e) => self.push_game_error(connection_id, &e).await,
        }
        Ok(())
    }

    async fn handle_move(
        &self,
        connection_id: ConnectionId,
        user: &UserId,
        data: serde_json::Value,
    ) -> Result<(), ServerError> {
        let payload: MovePayload = parse_payload(data)?;
        let mv = match payload.choice.parse::<Move>() {
            Ok(mv) => mv,
            Err(e) => {
                self.push_game_error(connection_id, &e).await;
                return Ok(());
            }
        };
        let session_id = SessionId(payload.session_id);
        match self.engine.submit_move(user, &session_id, mv).await {
            Ok(MoveOutcome::Ignored) => {}
            Ok(MoveOutcome::Pending { opponent }) => {
                if let Some(opponent) = opponent {
                    self.push_to_user(&opponent, &ServerEvent::OpponentMoved)
                        .await;
                }
            }
            Ok(MoveOutcome::Resolved(report)) => self.deliver_round_report(report).await,
            Err(e) => self.push_game_error(connection_id, &e).await,
        }
        Ok(())
    }

    async fn handle_play_again(
        &self,
        connection_id: ConnectionId,
        user: &UserId,
        data: serde_json::Value,
    ) -> Result<(), ServerError> {
        let payload: PlayAgainPayload = parse_payload(data)?;
        let session_id = SessionId(payload.session_id);
        match self.engine.request_play_again(user, &session_id).await {
            Ok(ResetOutcome { players, .. }) => {
                for player in &players {
                    self.push_to_user(player, &ServerEvent::SessionReset).await;
                }
            }
            Err(e) => self.push_game_error(connection_id, &e).await,
        }
        Ok(())
    }

    /// `matchFound` followed by `sessionStart`, to every participant.
    async fn announce_session(&self, players: &[UserId], session_id: &SessionId, is_bot: bool) {
        for player in players {
            self.push_to_user(
                player,
                &ServerEvent::MatchFound {
                    session_id: session_id.clone(),
                    is_bot,
                },
            )
            .await;
            self.push_to_user(player, &ServerEvent::SessionStart).await;
        }
    }

    /// Fans a resolved round out: personalized results first, then the
    /// settlement and leaderboard effects that depend on it.
    async fn deliver_round_report(&self, report: RoundReport) {
        for (user, event) in &report.reports {
            self.push_to_user(user, event).await;
        }
        if let Some(settlement) = &report.settlement {
            self.push_to_user(
                &settlement.user,
                &ServerEvent::CreditsUpdated {
                    new_balance: settlement.new_balance,
                    delta: settlement.delta,
                },
            )
            .await;
        }
        if let Some(list) = report.leaderboard {
            if let Ok(frame) = serde_json::to_vec(&ServerEvent::LeaderboardUpdate { list }) {
                self.connections.broadcast_to_all(frame).await;
            }
        }
        for (user, message) in report.notices {
            self.push_to_user(&user, &ServerEvent::Notice { message })
                .await;
        }
    }

    async fn push(&self, connection_id: ConnectionId, event: &ServerEvent) {
        match serde_json::to_vec(event) {
            Ok(frame) => self.connections.send_to_connection(connection_id, frame).await,
            Err(e) => error!("Failed to serialize event: {}", e),
        }
    }

    async fn push_to_user(&self, user: &UserId, event: &ServerEvent) {
        match serde_json::to_vec(event) {
            Ok(frame) => {
                // A miss here is a disconnect race, not a fault.
                if !self.connections.send_to_user(user, frame).await {
                    trace!("Dropping event for offline user {}", user);
                }
            }
            Err(e) => error!("Failed to serialize event: {}", e),
        }
    }

    async fn push_game_error(&self, connection_id: ConnectionId, error: &GameError) {
        self.push(
            connection_id,
            &ServerEvent::Error {
                code: error.code().to_string(),
                message: error.to_string(),
            },
        )
        .await;
    }
}

fn parse_payload<T: DeserializeOwned>(data: serde_json::Value) -> Result<T, ServerError> {
    serde_json::from_value(data).map_err(|e| ServerError::Network(format!("Invalid payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::FixedBot;
    use crate::config::GameSettings;
    use crate::services::{HandleAuth, InMemoryPersistence};
    use std::net::SocketAddr;
    use tokio::sync::broadcast;

    fn addr() -> SocketAddr {
        "127.0.0.1:9999".parse().unwrap()
    }

    fn router() -> MessageRouter {
        let engine = Arc::new(GameEngine::new(
            GameSettings::default(),
            InMemoryPersistence::shared(100),
            Arc::new(FixedBot(Move::Rock)),
        ));
        MessageRouter::new(engine, Arc::new(HandleAuth), Arc::new(ConnectionManager::new()))
    }

    async fn next_event(rx: &mut broadcast::Receiver<(ConnectionId, Vec<u8>)>) -> serde_json::Value {
        let (_, frame) = rx.recv().await.unwrap();
        serde_json::from_slice(&frame).unwrap()
    }

    #[tokio::test]
    async fn operations_before_authentication_are_rejected() {
        let router = router();
        let conn = router.connections.add_connection(addr()).await;
        let mut rx = router.connections.subscribe();

        router
            .route(r#"{"event":"enqueueRanked","data":{}}"#, conn)
            .await
            .unwrap();

        let event = next_event(&mut rx).await;
        assert_eq!(event["event"], "error");
        assert_eq!(event["data"]["code"], "unauthenticated");
    }

    #[tokio::test]
    async fn authenticate_binds_the_identity() {
        let router = router();
        let conn = router.connections.add_connection(addr()).await;
        let mut rx = router.connections.subscribe();

        router
            .route(
                r#"{"event":"authenticate","data":{"username":"alice"}}"#,
                conn,
            )
            .await
            .unwrap();

        let event = next_event(&mut rx).await;
        assert_eq!(event["event"], "authenticated");
        assert_eq!(event["data"]["username"], "alice");
        assert_eq!(
            router.connections.identity_of(conn).await,
            Some(UserId::from("alice"))
        );
    }

    #[tokio::test]
    async fn malformed_frames_are_transport_errors() {
        let router = router();
        let conn = router.connections.add_connection(addr()).await;
        assert!(router.route("not json", conn).await.is_err());
    }

    #[tokio::test]
    async fn two_enqueues_produce_match_found_for_both() {
        let router = router();
        let a = router.connections.add_connection(addr()).await;
        let b = router.connections.add_connection(addr()).await;
        router
            .route(r#"{"event":"authenticate","data":{"username":"alice"}}"#, a)
            .await
            .unwrap();
        router
            .route(r#"{"event":"authenticate","data":{"username":"bob"}}"#, b)
            .await
            .unwrap();

        let mut rx = router.connections.subscribe();
        router
            .route(r#"{"event":"enqueueRanked","data":{}}"#, a)
            .await
            .unwrap();
        let event = next_event(&mut rx).await;
        assert_eq!(event["event"], "matchWaiting");

        router
            .route(r#"{"event":"enqueueRanked","data":{}}"#, b)
            .await
            .unwrap();
        // matchFound + sessionStart for each seat.
        let mut names = Vec::new();
        for _ in 0..4 {
            names.push(next_event(&mut rx).await["event"].as_str().unwrap().to_string());
        }
        assert_eq!(names.iter().filter(|n| *n == "matchFound").count(), 2);
        assert_eq!(names.iter().filter(|n| *n == "sessionStart").count(), 2);
    }
}
