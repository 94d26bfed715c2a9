//! Round resolution rules for rock/paper/scissors.
//!
//! This module is deliberately pure: it knows nothing about sessions,
//! scores or connections. The lifecycle controller feeds it the two
//! moves of a round and applies the verdict to the session state.

use crate::error::GameError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three legal moves.
///
/// Anything outside this whitelist is rejected with
/// [`GameError::InvalidMove`] before it reaches session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    /// All legal moves, in the canonical cycle order.
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    /// The move this move defeats under the standard cycle:
    /// rock beats scissors, scissors beats paper, paper beats rock.
    pub fn beats(self) -> Move {
        match self {
            Move::Rock => Move::Scissors,
            Move::Scissors => Move::Paper,
            Move::Paper => Move::Rock,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Rock => "rock",
            Move::Paper => "paper",
            Move::Scissors => "scissors",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Move {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rock" => Ok(Move::Rock),
            "paper" => Ok(Move::Paper),
            "scissors" => Ok(Move::Scissors),
            other => Err(GameError::InvalidMove(other.to_string())),
        }
    }
}

/// Verdict of a single round, expressed in seat terms.
///
/// "Left" is always the first participant of the session (for ranked
/// sessions, the player who occupied the waiting slot first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundVerdict {
    /// The left seat won the round.
    Left,
    /// The right seat won the round.
    Right,
    /// Equal moves; no score changes.
    Draw,
}

/// Resolves one exchange of simultaneous moves.
///
/// Pure function over the fixed cycle; symmetric under swapping the
/// seats (the winner assignment mirrors).
pub fn resolve(left: Move, right: Move) -> RoundVerdict {
    if left == right {
        RoundVerdict::Draw
    } else if left.beats() == right {
        RoundVerdict::Left
    } else {
        RoundVerdict::Right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_moves_always_draw() {
        for mv in Move::ALL {
            assert_eq!(resolve(mv, mv), RoundVerdict::Draw);
        }
    }

    #[test]
    fn cycle_holds_for_all_moves() {
        // Each move beats exactly one other and loses to exactly one other.
        for mv in Move::ALL {
            let beaten: Vec<Move> = Move::ALL
                .into_iter()
                .filter(|&other| resolve(mv, other) == RoundVerdict::Left)
                .collect();
            let lost_to: Vec<Move> = Move::ALL
                .into_iter()
                .filter(|&other| resolve(mv, other) == RoundVerdict::Right)
                .collect();
            assert_eq!(beaten.len(), 1, "{mv} must beat exactly one move");
            assert_eq!(lost_to.len(), 1, "{mv} must lose to exactly one move");
            assert_eq!(beaten[0], mv.beats());
        }
    }

    #[test]
    fn resolution_is_symmetric_under_seat_swap() {
        for a in Move::ALL {
            for b in Move::ALL {
                let forward = resolve(a, b);
                let mirrored = resolve(b, a);
                match forward {
                    RoundVerdict::Left => assert_eq!(mirrored, RoundVerdict::Right),
                    RoundVerdict::Right => assert_eq!(mirrored, RoundVerdict::Left),
                    RoundVerdict::Draw => assert_eq!(mirrored, RoundVerdict::Draw),
                }
            }
        }
    }

    #[test]
    fn standard_cycle_is_canonical() {
        assert_eq!(resolve(Move::Rock, Move::Scissors), RoundVerdict::Left);
        assert_eq!(resolve(Move::Scissors, Move::Paper), RoundVerdict::Left);
        assert_eq!(resolve(Move::Paper, Move::Rock), RoundVerdict::Left);
    }

    #[test]
    fn moves_parse_from_whitelist_only() {
        assert_eq!("rock".parse::<Move>().unwrap(), Move::Rock);
        assert_eq!("paper".parse::<Move>().unwrap(), Move::Paper);
        assert_eq!("scissors".parse::<Move>().unwrap(), Move::Scissors);
        assert!("lizard".parse::<Move>().is_err());
        assert!("Rock".parse::<Move>().is_err());
        assert!("".parse::<Move>().is_err());
    }
}
