//! # Match Server - Real-Time Rock/Paper/Scissors Sessions
//!
//! A WebSocket game server for two-player rock/paper/scissors series:
//! ranked matchmaking, shareable direct-link games, and single-player
//! sessions against a bot opponent with credit wagers.
//!
//! ## Architecture Overview
//!
//! * **Connection Manager** - WebSocket lifecycle and identity mapping
//! * **Message Router** - Parses `{event, data}` frames and fans
//!   outcomes back out to the affected connections
//! * **Game Engine** - The session core: matchmaking slot, session
//!   store, round resolution and settlement
//! * **Services** - Authentication and persistence behind traits, with
//!   in-memory defaults
//!
//! ## Message Flow
//!
//! 1. Client sends a WebSocket text frame with `{event, data}`
//! 2. The router parses it and invokes the matching engine operation
//! 3. The engine mutates session state under the session's lock and
//!    returns a structured outcome
//! 4. The router translates the outcome into event pushes delivered
//!    through the connection manager
//!
//! ## Concurrency
//!
//! Each session lives behind its own async mutex, so a round resolves
//! exactly once no matter how submissions interleave; the ranked
//! waiting slot is a single mutex-guarded `Option`, so two concurrent
//! seekers can never both wait or both match the same occupant.
//!
//! ## Error Handling
//!
//! Rejected operations surface as [`GameError`] values with stable
//! machine-readable codes, pushed to the offending client; transport
//! failures use [`ServerError`] and tear down only the one connection.

// Re-export core types and functions for easy access
pub use config::{GameSettings, ServerConfig};
pub use engine::GameEngine;
pub use error::{GameError, ServerError};
pub use server::GameServer;
pub use utils::{create_server, create_server_with_config};

// Public module declarations
pub mod bot;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod events;
pub mod matchmaking;
pub mod messaging;
pub mod rules;
pub mod server;
pub mod services;
pub mod session;
pub mod utils;

// Scenario tests exercising the engine end to end
mod tests;
