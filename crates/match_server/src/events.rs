//! Outbound boundary events emitted by the session core.
//!
//! The payload fields are the contract; the transport layer serializes
//! each event as a `{ "event": ..., "data": ... }` JSON frame and
//! pushes it to the addressed participant. Keeping these as one tagged
//! enum means the router never hand-assembles JSON shapes.

use crate::rules::Move;
use crate::services::PlayerSummary;
use crate::session::SessionId;
use serde::Serialize;

/// Per-participant view of a resolved round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundResultKind {
    Win,
    Lose,
    Draw,
}

/// Events pushed from the server to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
#[serde(rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// The handshake succeeded and the connection now carries this
    /// identity.
    Authenticated { username: String },
    /// The caller occupies the waiting slot or a link session is
    /// waiting for its second player.
    MatchWaiting { message: String },
    /// A session was created or filled for the recipient.
    MatchFound { session_id: SessionId, is_bot: bool },
    /// Both seats are filled; rounds may begin.
    SessionStart,
    /// The opponent has locked in a move for the round in progress.
    /// The move itself is deliberately not included.
    OpponentMoved,
    /// Personalized outcome of a resolved round.
    RoundResult {
        result: RoundResultKind,
        own_move: Move,
        opponent_move: Move,
        own_score: u32,
        opponent_score: u32,
        series_over: bool,
        required_wins: u32,
    },
    /// Scores were reset for a rematch in the same session.
    SessionReset,
    /// The opponent disconnected; the session is gone.
    OpponentDisconnected,
    /// The stored credit balance changed (bot wager settlement).
    /// `new_balance` is the persistence service's authoritative value.
    CreditsUpdated { new_balance: i64, delta: i64 },
    /// Refreshed leaderboard after a ranked series completed.
    LeaderboardUpdate { list: Vec<PlayerSummary> },
    /// A rejected operation, with a stable machine-readable code.
    Error { code: String, message: String },
    /// Soft, non-fatal notification (e.g. persistence unavailable).
    Notice { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_camel_case_tags() {
        let event = ServerEvent::MatchFound {
            session_id: SessionId::from("abc"),
            is_bot: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "matchFound");
        assert_eq!(json["data"]["sessionId"], "abc");
        assert_eq!(json["data"]["isBot"], false);
    }

    #[test]
    fn round_result_payload_matches_the_wire_contract() {
        let event = ServerEvent::RoundResult {
            result: RoundResultKind::Win,
            own_move: Move::Rock,
            opponent_move: Move::Scissors,
            own_score: 1,
            opponent_score: 0,
            series_over: false,
            required_wins: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "roundResult");
        let data = &json["data"];
        assert_eq!(data["result"], "win");
        assert_eq!(data["ownMove"], "rock");
        assert_eq!(data["opponentMove"], "scissors");
        assert_eq!(data["ownScore"], 1);
        assert_eq!(data["opponentScore"], 0);
        assert_eq!(data["seriesOver"], false);
        assert_eq!(data["requiredWins"], 2);
    }

    #[test]
    fn unit_like_events_have_no_payload_requirements() {
        let json = serde_json::to_value(ServerEvent::SessionStart).unwrap();
        assert_eq!(json["event"], "sessionStart");
    }
}
