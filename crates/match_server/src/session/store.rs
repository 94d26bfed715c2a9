//! The in-process session table.
//!
//! One `SessionStore` is constructed per server process and passed by
//! reference to the components that need it; there is no ambient
//! global. Each session sits behind its own `tokio::sync::Mutex` so
//! that all mutations of one session are serialized while distinct
//! sessions proceed fully concurrently.

use super::state::{Session, SessionId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Shared handle to a single session, serialized by its own lock.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Mapping from session identifier to session state, plus the reverse
/// index enforcing the one-active-session-per-identity invariant.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    /// Which session currently owns a given identity's active-game slot.
    membership: RwLock<HashMap<UserId, SessionId>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a session and claims the active-game slot of every human
    /// participant it already contains.
    pub async fn insert(&self, session: Session) -> SessionHandle {
        let id = session.id().clone();
        let humans = session.human_players();
        let handle = Arc::new(Mutex::new(session));

        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), handle.clone());
        drop(sessions);

        let mut membership = self.membership.write().await;
        for user in humans {
            membership.insert(user, id.clone());
        }
        debug!("🗂️ Session {} inserted", id);
        handle
    }

    /// Looks up a session by id.
    pub async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// The session currently owning `user`'s active-game slot, if any.
    pub async fn session_of(&self, user: &UserId) -> Option<SessionId> {
        let membership = self.membership.read().await;
        membership.get(user).cloned()
    }

    /// Claims the active-game slot of `user` for an existing session.
    /// Used when a second player joins a link session after creation.
    pub async fn bind_member(&self, user: &UserId, id: &SessionId) {
        let mut membership = self.membership.write().await;
        membership.insert(user.clone(), id.clone());
    }

    /// Releases `user`'s active-game slot without touching the session.
    pub async fn unbind_member(&self, user: &UserId) {
        let mut membership = self.membership.write().await;
        membership.remove(user);
    }

    /// Removes a session and releases the slots of all its members.
    pub async fn remove(&self, id: &SessionId) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let handle = sessions.remove(id)?;
        drop(sessions);

        let mut membership = self.membership.write().await;
        membership.retain(|_, owner| owner != id);
        debug!("🗑️ Session {} removed", id);
        Some(handle)
    }

    /// Number of live sessions, for diagnostics and tests.
    pub async fn len(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::{Participant, SessionMode};

    fn two_player_session(id: &str, a: &str, b: &str) -> Session {
        let mut s =
            Session::new(SessionId::from(id), SessionMode::Ranked, 3, 0).expect("valid session");
        s.add_player(Participant::Human(UserId::from(a))).unwrap();
        s.add_player(Participant::Human(UserId::from(b))).unwrap();
        s
    }

    #[tokio::test]
    async fn insert_claims_membership_for_all_humans() {
        let store = SessionStore::new();
        store.insert(two_player_session("s1", "alice", "bob")).await;

        assert_eq!(
            store.session_of(&UserId::from("alice")).await,
            Some(SessionId::from("s1"))
        );
        assert_eq!(
            store.session_of(&UserId::from("bob")).await,
            Some(SessionId::from("s1"))
        );
    }

    #[tokio::test]
    async fn remove_releases_all_membership_slots() {
        let store = SessionStore::new();
        store.insert(two_player_session("s1", "alice", "bob")).await;
        assert!(store.remove(&SessionId::from("s1")).await.is_some());

        assert!(store.session_of(&UserId::from("alice")).await.is_none());
        assert!(store.session_of(&UserId::from("bob")).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn distinct_sessions_have_independent_locks() {
        let store = SessionStore::new();
        store.insert(two_player_session("s1", "a", "b")).await;
        store.insert(two_player_session("s2", "c", "d")).await;

        let h1 = store.get(&SessionId::from("s1")).await.unwrap();
        let h2 = store.get(&SessionId::from("s2")).await.unwrap();

        // Holding one session's lock must not block the other's.
        let g1 = h1.lock().await;
        let g2 = h2.lock().await;
        assert_eq!(g1.id(), &SessionId::from("s1"));
        assert_eq!(g2.id(), &SessionId::from("s2"));
    }
}
