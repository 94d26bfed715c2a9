//! Session state and the in-process session store.
//!
//! A session is one game instance between two participants (or one
//! human and the bot). All mutation goes through the lifecycle
//! controller in [`crate::engine`], which serializes access with a
//! per-session lock held by the store.

pub mod state;
pub mod store;

pub use state::{Participant, Session, SessionId, SessionMode, SessionStatus, UserId};
pub use store::SessionStore;
