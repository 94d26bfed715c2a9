//! Core match server implementation.
//!
//! This module contains the main `GameServer` struct and its
//! implementation, wiring together the connection manager, the message
//! router and the session core behind a single accept loop.

use crate::{
    bot::{BotStrategy, RandomBot},
    config::ServerConfig,
    connection::ConnectionManager,
    engine::GameEngine,
    error::ServerError,
    messaging::MessageRouter,
    server::handlers::handle_connection,
    services::{AuthService, HandleAuth, InMemoryPersistence, PersistenceService},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// The core match server structure.
///
/// `GameServer` orchestrates networking and the session core: the
/// accept loop hands each socket to a connection handler, the handler
/// feeds frames to the [`MessageRouter`], and the router drives the
/// [`GameEngine`]. All state lives behind `Arc`s so handlers share one
/// engine and one connection table.
pub struct GameServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Manager for client connections and messaging
    connection_manager: Arc<ConnectionManager>,

    /// The session/matchmaking core
    engine: Arc<GameEngine>,

    /// Frame dispatch and outcome delivery
    router: Arc<MessageRouter>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl GameServer {
    /// Creates a server with the default collaborators: handle-based
    /// authentication, in-memory persistence and the random bot.
    pub fn new(config: ServerConfig) -> Self {
        let persistence = InMemoryPersistence::shared(config.game.starting_credits);
        Self::with_services(config, Arc::new(HandleAuth), persistence, Arc::new(RandomBot))
    }

    /// Creates a server with explicit service implementations.
    ///
    /// This is the seam for plugging in a durable persistence backend,
    /// a real credential verifier, or a scripted bot in tests.
    pub fn with_services(
        config: ServerConfig,
        auth: Arc<dyn AuthService>,
        persistence: Arc<dyn PersistenceService>,
        bot: Arc<dyn BotStrategy>,
    ) -> Self {
        let connection_manager = Arc::new(ConnectionManager::new());
        let engine = Arc::new(GameEngine::new(config.game.clone(), persistence, bot));
        let router = Arc::new(MessageRouter::new(
            engine.clone(),
            auth,
            connection_manager.clone(),
        ));
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            config,
            connection_manager,
            engine,
            router,
            shutdown_sender,
        }
    }

    /// The session core, exposed for diagnostics and tests.
    pub fn engine(&self) -> &Arc<GameEngine> {
        &self.engine
    }

    /// The connection table, exposed for diagnostics and tests.
    pub fn connection_manager(&self) -> &Arc<ConnectionManager> {
        &self.connection_manager
    }

    /// Returns a handle that can request server shutdown.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_sender.clone()
    }

    /// Starts the server and begins accepting connections.
    ///
    /// Binds the configured address and runs the accept loop until a
    /// shutdown signal arrives through [`Self::shutdown_handle`]. Each
    /// accepted socket is handled on its own task; a failed handshake
    /// or handler error never takes the loop down.
    pub async fn start(&self) -> Result<(), ServerError> {
        info!("🚀 Starting match server on {}", self.config.bind_address);

        let listener = TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| {
                ServerError::Network(format!(
                    "Failed to bind {}: {e}",
                    self.config.bind_address
                ))
            })?;

        info!("✅ Listening for WebSocket connections");

        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            if self.connection_manager.connection_count().await
                                >= self.config.max_connections
                            {
                                warn!("🚫 Connection limit reached, refusing {}", addr);
                                drop(stream);
                                continue;
                            }
                            let connection_manager = self.connection_manager.clone();
                            let router = self.router.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(
                                    stream,
                                    addr,
                                    connection_manager,
                                    router,
                                )
                                .await
                                {
                                    error!("Connection error from {}: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_receiver.recv() => {
                    info!("🛑 Shutdown signal received, stopping accept loop");
                    break;
                }
            }
        }

        info!("👋 Match server stopped");
        Ok(())
    }

    /// Requests a graceful stop of the accept loop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_sender.send(());
    }
}
