//! Error types and handling for the match server.
//!
//! Two layers of errors exist: `GameError` covers rule and lifecycle
//! violations that are reported back to the offending client, while
//! `ServerError` covers transport and infrastructure failures.

use crate::session::SessionId;

/// Errors produced by game operations.
///
/// Every variant maps to a stable wire code (see [`GameError::code`])
/// so clients can react programmatically. None of these are fatal to
/// the server; they are reported to the caller and the session state
/// is left untouched unless documented otherwise.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// A seeker tried to match against another connection of their own
    /// identity. The waiting slot is left untouched.
    #[error("cannot match against your own account")]
    SelfMatch,

    /// A move outside the rock/paper/scissors whitelist. The submission
    /// is discarded; the sender may resubmit within the same round.
    #[error("invalid move: {0:?}")]
    InvalidMove(String),

    /// The connection has no resolved identity. Rejected before any
    /// session state is touched.
    #[error("not authenticated")]
    Unauthenticated,

    /// The requested wager exceeds the stored credit balance.
    #[error("wager {wager} exceeds credit balance {balance}")]
    InsufficientCredits { wager: u64, balance: i64 },

    /// Operation on an unknown or expired session id.
    #[error("unknown session: {0}")]
    SessionNotFound(SessionId),

    /// The caller is not a member of the addressed session.
    #[error("not a participant of session {0}")]
    NotInSession(SessionId),

    /// The caller already owns an in-progress session and cannot start
    /// or join another one.
    #[error("already in an active session")]
    AlreadyInSession,

    /// The requested round count is not an odd positive integer.
    #[error("target rounds must be an odd positive integer, got {0}")]
    InvalidRounds(u32),

    /// The operation requires a finished session (e.g. play-again).
    #[error("session {0} is not finished")]
    SessionNotFinished(SessionId),

    /// The external persistence service failed. Round outcomes are
    /// never rolled back because of this; it is surfaced as a soft
    /// notice to the affected participant.
    #[error("persistence unavailable: {0}")]
    Persistence(#[from] crate::services::PersistenceError),
}

impl GameError {
    /// Stable machine-readable code used in `error` events on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::SelfMatch => "selfMatch",
            GameError::InvalidMove(_) => "invalidMove",
            GameError::Unauthenticated => "unauthenticated",
            GameError::InsufficientCredits { .. } => "insufficientCredits",
            GameError::SessionNotFound(_) => "sessionNotFound",
            GameError::NotInSession(_) => "notInSession",
            GameError::AlreadyInSession => "alreadyInSession",
            GameError::InvalidRounds(_) => "invalidRounds",
            GameError::SessionNotFinished(_) => "sessionNotFinished",
            GameError::Persistence(_) => "persistenceUnavailable",
        }
    }
}

/// Enumeration of possible server errors.
///
/// Categorizes errors into network-related and internal server errors
/// to help with debugging and error handling.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures or connection issues
    #[error("Network error: {0}")]
    Network(String),

    /// Internal server errors such as channel or serialization failures
    #[error("Internal error: {0}")]
    Internal(String),
}
