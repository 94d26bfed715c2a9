//! External service boundaries consumed by the session core.
//!
//! The core treats authentication and persistence as collaborators
//! behind traits: `AuthService` resolves a presented credential to a
//! stable user handle, and `PersistenceService` owns account stats and
//! the credit ledger. The in-memory implementations here back the
//! default server binary and the test suite; a durable store plugs in
//! by implementing the same traits.

use crate::session::UserId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Failure of the persistence boundary.
///
/// Stat and credit updates downstream of a resolved round are
/// best-effort: these errors are logged and surfaced as soft notices,
/// never rolled back into session state.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("persistence backend unavailable: {0}")]
    Unavailable(String),
    #[error("unknown account: {0}")]
    UnknownAccount(String),
}

/// Series length bucket used for per-mode stat counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesLength {
    BestOf3,
    BestOf5,
    /// Odd round counts other than 3 or 5; only the overall totals move.
    Other,
}

impl SeriesLength {
    pub fn from_target_rounds(target_rounds: u32) -> Self {
        match target_rounds {
            3 => SeriesLength::BestOf3,
            5 => SeriesLength::BestOf5,
            _ => SeriesLength::Other,
        }
    }
}

/// A stat increment applied when a ranked series completes.
#[derive(Debug, Clone, Copy)]
pub struct StatDelta {
    pub wins: u32,
    pub losses: u32,
    pub series: SeriesLength,
}

impl StatDelta {
    pub fn win(series: SeriesLength) -> Self {
        Self {
            wins: 1,
            losses: 0,
            series,
        }
    }

    pub fn loss(series: SeriesLength) -> Self {
        Self {
            wins: 0,
            losses: 1,
            series,
        }
    }
}

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub username: String,
    pub wins: u32,
    pub losses: u32,
    pub wins_bo3: u32,
    pub wins_bo5: u32,
    pub losses_bo3: u32,
    pub losses_bo5: u32,
    pub credits: i64,
}

/// Resolves a presented credential to a stable user handle.
///
/// Credential storage and verification are outside this crate; the
/// core only needs the mapping to an identity it can key sessions on.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn resolve_identity(&self, credential: &str) -> Option<UserId>;
}

/// Accepts any non-empty handle as its own identity.
///
/// Stands in for a real token-verifying service; adequate for local
/// play and tests where the handle itself is the credential.
#[derive(Debug, Default)]
pub struct HandleAuth;

#[async_trait]
impl AuthService for HandleAuth {
    async fn resolve_identity(&self, credential: &str) -> Option<UserId> {
        let handle = credential.trim();
        if handle.is_empty() {
            None
        } else {
            Some(UserId(handle.to_string()))
        }
    }
}

/// Account stats and credit ledger operations the core consumes.
///
/// Calls for the same participant are issued in order and awaited
/// before any event that depends on their outcome is emitted; the
/// returned balance from `adjust_credits` is authoritative and is what
/// gets reported to the client, never a locally computed delta.
#[async_trait]
pub trait PersistenceService: Send + Sync {
    /// Applies a win/loss increment, including the per-series-length
    /// buckets.
    async fn increment_stats(&self, user: &UserId, delta: StatDelta)
        -> Result<(), PersistenceError>;

    /// Adjusts the credit balance by `delta` (may be negative) and
    /// returns the new stored balance.
    async fn adjust_credits(&self, user: &UserId, delta: i64) -> Result<i64, PersistenceError>;

    /// Reads the current credit balance without changing it.
    async fn credit_balance(&self, user: &UserId) -> Result<i64, PersistenceError>;

    /// The top `limit` players ordered by total wins.
    async fn top_players(&self, limit: usize) -> Result<Vec<PlayerSummary>, PersistenceError>;
}

#[derive(Debug, Clone, Default)]
struct PlayerRecord {
    wins: u32,
    losses: u32,
    wins_bo3: u32,
    wins_bo5: u32,
    losses_bo3: u32,
    losses_bo5: u32,
    credits: i64,
}

/// Process-local persistence backing the default binary and the tests.
///
/// Fresh accounts are created lazily with the configured starting
/// credit balance, mirroring how the original account store seeded new
/// users.
#[derive(Debug)]
pub struct InMemoryPersistence {
    accounts: RwLock<HashMap<UserId, PlayerRecord>>,
    starting_credits: i64,
}

impl InMemoryPersistence {
    pub fn new(starting_credits: i64) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            starting_credits,
        }
    }

    /// Convenience constructor used throughout the tests.
    pub fn shared(starting_credits: i64) -> Arc<Self> {
        Arc::new(Self::new(starting_credits))
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl PersistenceService for InMemoryPersistence {
    async fn increment_stats(
        &self,
        user: &UserId,
        delta: StatDelta,
    ) -> Result<(), PersistenceError> {
        let mut accounts = self.accounts.write().await;
        let record = accounts.entry(user.clone()).or_insert_with(|| PlayerRecord {
            credits: self.starting_credits,
            ..PlayerRecord::default()
        });
        record.wins += delta.wins;
        record.losses += delta.losses;
        match delta.series {
            SeriesLength::BestOf3 => {
                record.wins_bo3 += delta.wins;
                record.losses_bo3 += delta.losses;
            }
            SeriesLength::BestOf5 => {
                record.wins_bo5 += delta.wins;
                record.losses_bo5 += delta.losses;
            }
            SeriesLength::Other => {}
        }
        debug!("📊 Stats updated for {}: +{}W/+{}L", user, delta.wins, delta.losses);
        Ok(())
    }

    async fn adjust_credits(&self, user: &UserId, delta: i64) -> Result<i64, PersistenceError> {
        let mut accounts = self.accounts.write().await;
        let record = accounts.entry(user.clone()).or_insert_with(|| PlayerRecord {
            credits: self.starting_credits,
            ..PlayerRecord::default()
        });
        record.credits += delta;
        Ok(record.credits)
    }

    async fn credit_balance(&self, user: &UserId) -> Result<i64, PersistenceError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .get(user)
            .map(|r| r.credits)
            .unwrap_or(self.starting_credits))
    }

    async fn top_players(&self, limit: usize) -> Result<Vec<PlayerSummary>, PersistenceError> {
        let accounts = self.accounts.read().await;
        let mut rows: Vec<PlayerSummary> = accounts
            .iter()
            .map(|(user, r)| PlayerSummary {
                username: user.0.clone(),
                wins: r.wins,
                losses: r.losses,
                wins_bo3: r.wins_bo3,
                wins_bo5: r.wins_bo5,
                losses_bo3: r.losses_bo3,
                losses_bo5: r.losses_bo5,
                credits: r.credits,
            })
            .collect();
        rows.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.username.cmp(&b.username)));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_accounts_start_with_the_seed_balance() {
        let store = InMemoryPersistence::new(100);
        let user = UserId::from("alice");
        assert_eq!(store.credit_balance(&user).await.unwrap(), 100);
        assert_eq!(store.adjust_credits(&user, -30).await.unwrap(), 70);
        assert_eq!(store.credit_balance(&user).await.unwrap(), 70);
    }

    #[tokio::test]
    async fn stat_buckets_follow_the_series_length() {
        let store = InMemoryPersistence::new(0);
        let user = UserId::from("alice");
        store
            .increment_stats(&user, StatDelta::win(SeriesLength::BestOf3))
            .await
            .unwrap();
        store
            .increment_stats(&user, StatDelta::loss(SeriesLength::BestOf5))
            .await
            .unwrap();

        let rows = store.top_players(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].wins, 1);
        assert_eq!(rows[0].losses, 1);
        assert_eq!(rows[0].wins_bo3, 1);
        assert_eq!(rows[0].losses_bo5, 1);
        assert_eq!(rows[0].wins_bo5, 0);
    }

    #[tokio::test]
    async fn leaderboard_is_ordered_by_wins_and_truncated() {
        let store = InMemoryPersistence::new(0);
        for (name, wins) in [("a", 1), ("b", 3), ("c", 2)] {
            let user = UserId::from(name);
            for _ in 0..wins {
                store
                    .increment_stats(&user, StatDelta::win(SeriesLength::BestOf3))
                    .await
                    .unwrap();
            }
        }
        let rows = store.top_players(2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].username, "b");
        assert_eq!(rows[1].username, "c");
    }

    #[tokio::test]
    async fn blank_credentials_do_not_resolve() {
        let auth = HandleAuth;
        assert!(auth.resolve_identity("  ").await.is_none());
        assert_eq!(
            auth.resolve_identity("alice").await,
            Some(UserId::from("alice"))
        );
    }
}
