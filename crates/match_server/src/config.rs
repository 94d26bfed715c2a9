//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default
//! values used to initialize and customize the match server behavior.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Configuration structure for the match server.
///
/// Contains the network parameters plus the game defaults the session
/// core consults when a request leaves a value unspecified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Connection timeout in seconds
    pub connection_timeout: u64,

    /// Game rule defaults and reward constants
    pub game: GameSettings,
}

/// Tunable game constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSettings {
    /// Rounds per series when a request does not specify one; must be
    /// an odd positive integer.
    pub default_target_rounds: u32,

    /// Flat credit bonus granted for winning a bot series, on top of
    /// the doubled wager.
    pub win_bonus: i64,

    /// Number of rows in leaderboard broadcasts.
    pub leaderboard_limit: usize,

    /// Credit balance seeded into fresh accounts by the in-memory
    /// persistence backend.
    pub starting_credits: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".parse().expect("Invalid default bind address"),
            max_connections: 1000,
            connection_timeout: 60,
            game: GameSettings::default(),
        }
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            default_target_rounds: 3,
            win_bonus: 10,
            leaderboard_limit: 50,
            starting_credits: 100,
        }
    }
}
