//! Utility functions for server creation.

use crate::{config::ServerConfig, server::GameServer};

/// Creates a server with default configuration.
pub fn create_server() -> GameServer {
    GameServer::new(ServerConfig::default())
}

/// Creates a server with the specified configuration.
pub fn create_server_with_config(config: ServerConfig) -> GameServer {
    GameServer::new(config)
}
