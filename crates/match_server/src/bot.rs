//! The synthetic bot opponent for single-player sessions.
//!
//! The bot's move is generated independently of the human's
//! submission; it never sees the human move, so it cannot telegraph or
//! exploit it. The strategy sits behind a trait so tests can pin the
//! bot to a fixed move and drive a series deterministically.

use crate::rules::Move;
use rand::Rng;

/// Produces the bot's move for one round.
pub trait BotStrategy: Send + Sync {
    fn pick(&self) -> Move;
}

/// Uniformly random move selection; the production strategy.
#[derive(Debug, Default)]
pub struct RandomBot;

impl BotStrategy for RandomBot {
    fn pick(&self) -> Move {
        match rand::thread_rng().gen_range(0..3) {
            0 => Move::Rock,
            1 => Move::Paper,
            _ => Move::Scissors,
        }
    }
}

/// Always plays the same move. A test seam for scripting series
/// outcomes against the bot.
#[derive(Debug)]
pub struct FixedBot(pub Move);

impl BotStrategy for FixedBot {
    fn pick(&self) -> Move {
        self.0
    }
}
