//! Message type definitions for client-server communication.
//!
//! This module defines the structure of messages exchanged between
//! clients and the server. Every inbound frame is an event name plus a
//! JSON payload; the payload structs here give each operation a typed
//! shape.

use serde::Deserialize;

/// A message sent from a client to the server.
///
/// # Examples
///
/// ```json
/// {
///   "event": "submitMove",
///   "data": { "sessionId": "4f7c...", "choice": "rock" }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    /// The operation to perform
    pub event: String,

    /// The message payload as a JSON value
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Payload of the `authenticate` handshake.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatePayload {
    pub username: String,
}

/// Payload of `enqueueRanked`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueuePayload {
    /// Rounds per series; the server default applies when omitted.
    #[serde(default)]
    pub target_rounds: Option<u32>,
}

/// Payload of `joinByLink`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub session_id: String,
    #[serde(default)]
    pub target_rounds: Option<u32>,
}

/// Payload of `submitMove`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    pub session_id: String,
    pub choice: String,
}

/// Payload of `requestPlayAgain`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayAgainPayload {
    pub session_id: String,
}

/// Payload of `startBotSession`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotPayload {
    /// Credits staked on the series; zero is a free game.
    #[serde(default)]
    pub wager: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_parse_with_camel_case_payloads() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"event":"submitMove","data":{"sessionId":"s1","choice":"rock"}}"#,
        )
        .unwrap();
        assert_eq!(msg.event, "submitMove");
        let payload: MovePayload = serde_json::from_value(msg.data).unwrap();
        assert_eq!(payload.session_id, "s1");
        assert_eq!(payload.choice, "rock");
    }

    #[test]
    fn omitted_optional_fields_default() {
        let payload: EnqueuePayload = serde_json::from_str("{}").unwrap();
        assert_eq!(payload.target_rounds, None);
        let payload: BotPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(payload.wager, 0);
    }
}
