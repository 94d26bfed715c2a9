//! Ranked matchmaking via a single waiting slot.
//!
//! The queue holds at most one waiting seeker: a newly arriving seeker
//! either pairs with the occupant or becomes the new occupant. The
//! slot sits behind one mutex so enqueue and match-consume are a
//! single atomic check-and-set; two near-simultaneous seekers can
//! never both claim the same occupant or both become "the" waiting
//! player while a match was possible.

use crate::error::GameError;
use crate::session::UserId;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// The occupant of the waiting slot.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Seeker {
    user: UserId,
    target_rounds: u32,
}

/// Result of an enqueue attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pairing {
    /// No partner available; the caller now occupies the slot.
    Waiting,
    /// The caller consumed the slot. `left` is the earlier occupant and
    /// keeps the left seat of the created session; `target_rounds` is
    /// the round count the occupant asked for (first come, first
    /// served, like the seat order).
    Matched { left: UserId, target_rounds: u32 },
}

/// Single-slot ranked queue.
#[derive(Debug, Default)]
pub struct Matchmaker {
    slot: Mutex<Option<Seeker>>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a seeker, pairing it with the current occupant if one
    /// exists.
    ///
    /// A seeker whose identity matches the occupant (even from a
    /// different connection) is rejected with [`GameError::SelfMatch`]
    /// and the slot is left untouched.
    pub async fn enqueue(&self, user: &UserId, target_rounds: u32) -> Result<Pairing, GameError> {
        let mut slot = self.slot.lock().await;
        match slot.take() {
            None => {
                *slot = Some(Seeker {
                    user: user.clone(),
                    target_rounds,
                });
                debug!("⌛ {} occupies the ranked waiting slot", user);
                Ok(Pairing::Waiting)
            }
            Some(occupant) if occupant.user == *user => {
                // Put the occupant back exactly as it was.
                *slot = Some(occupant);
                Err(GameError::SelfMatch)
            }
            Some(occupant) => {
                info!("✨ Pairing {} with waiting player {}", user, occupant.user);
                Ok(Pairing::Matched {
                    left: occupant.user,
                    target_rounds: occupant.target_rounds,
                })
            }
        }
    }

    /// Clears the slot iff it is occupied by `user`. Returns whether
    /// anything was cleared. Used for explicit cancellation and for
    /// disconnects while waiting.
    pub async fn cancel(&self, user: &UserId) -> bool {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|s| s.user == *user) {
            *slot = None;
            debug!("🚪 {} left the ranked waiting slot", user);
            true
        } else {
            false
        }
    }

    /// The identity currently waiting, if any.
    pub async fn waiting(&self) -> Option<UserId> {
        let slot = self.slot.lock().await;
        slot.as_ref().map(|s| s.user.clone())
    }
}
