//! Connection manager for tracking and managing client connections.
//!
//! This module provides the central management system for all client
//! connections, handling connection lifecycle, identity binding, and
//! message delivery.

use super::{client::ClientConnection, ConnectionId};
use crate::session::UserId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::info;
use futures_util::sink::SinkExt;
use futures_util::stream::SplitSink;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};

/// Central manager for all client connections.
///
/// The `ConnectionManager` tracks active connections, assigns unique
/// IDs, maintains the bidirectional identity/connection mapping, and
/// provides message delivery to specific users or all clients.
///
/// # Architecture
///
/// * Uses `RwLock<HashMap>` for thread-safe connection storage
/// * Implements atomic connection ID generation
/// * Provides a broadcast channel for outgoing messages; each
///   connection handler filters for its own ID
#[derive(Debug)]
pub struct ConnectionManager {
    /// Map of connection ID to client connection information
    connections: Arc<RwLock<HashMap<ConnectionId, ClientConnection>>>,

    /// Reverse index from authenticated identity to connection ID
    users: Arc<RwLock<HashMap<UserId, ConnectionId>>>,

    ws_senders: Arc<RwLock<HashMap<ConnectionId, Arc<tokio::sync::Mutex<SplitSink<WebSocketStream<tokio::net::TcpStream>, Message>>>>>>,

    /// Atomic counter for generating unique connection IDs
    next_id: Arc<std::sync::atomic::AtomicUsize>,

    /// Broadcast sender for outgoing messages to specific connections
    sender: broadcast::Sender<(ConnectionId, Vec<u8>)>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    /// Creates a new connection manager with an empty connection table
    /// and a broadcast channel sized for message bursts.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            users: Arc::new(RwLock::new(HashMap::new())),
            ws_senders: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(std::sync::atomic::AtomicUsize::new(1)),
            sender,
        }
    }

    /// Adds a new connection and returns its unique ID.
    pub async fn add_connection(&self, remote_addr: SocketAddr) -> ConnectionId {
        let connection_id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let connection = ClientConnection::new(remote_addr);
        let mut connections = self.connections.write().await;
        connections.insert(connection_id, connection);
        info!("🔗 Connection {} from {}", connection_id, remote_addr);
        connection_id
    }

    /// Register the WebSocket sender for a connection.
    pub async fn register_ws_sender(
        &self,
        connection_id: ConnectionId,
        ws_sender: Arc<tokio::sync::Mutex<SplitSink<WebSocketStream<tokio::net::TcpStream>, Message>>>,
    ) {
        let mut senders = self.ws_senders.write().await;
        senders.insert(connection_id, ws_sender);
    }

    /// Remove the WebSocket sender for a connection.
    pub async fn remove_ws_sender(&self, connection_id: ConnectionId) {
        let mut senders = self.ws_senders.write().await;
        senders.remove(&connection_id);
    }

    /// Removes a connection from the manager, releasing its identity
    /// binding if one exists.
    pub async fn remove_connection(&self, connection_id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.remove(&connection_id) {
            if let Some(user_id) = &connection.user_id {
                let mut users = self.users.write().await;
                if users.get(user_id) == Some(&connection_id) {
                    users.remove(user_id);
                }
            }
            info!(
                "❌ Connection {} from {} disconnected",
                connection_id, connection.remote_addr
            );
        }
    }

    /// Binds an authenticated identity to a connection.
    ///
    /// Called after a successful `authenticate` handshake. If the
    /// identity was already bound to a different live connection, that
    /// earlier binding is displaced and its connection ID is returned
    /// so the caller can close it.
    pub async fn bind_identity(
        &self,
        connection_id: ConnectionId,
        user_id: UserId,
    ) -> Option<ConnectionId> {
        let mut connections = self.connections.write().await;
        let mut users = self.users.write().await;

        let displaced = users.insert(user_id.clone(), connection_id).filter(|prev| *prev != connection_id);
        if let Some(connection) = connections.get_mut(&connection_id) {
            connection.user_id = Some(user_id);
        }
        displaced
    }

    /// Retrieves the identity bound to a connection, if authenticated.
    pub async fn identity_of(&self, connection_id: ConnectionId) -> Option<UserId> {
        let connections = self.connections.read().await;
        connections
            .get(&connection_id)
            .and_then(|c| c.user_id.clone())
    }

    /// Finds the connection ID bound to an identity, if connected.
    pub async fn connection_of(&self, user_id: &UserId) -> Option<ConnectionId> {
        let users = self.users.read().await;
        users.get(user_id).copied()
    }

    /// Sends a message to a specific connection.
    ///
    /// Queues the message on the internal broadcast channel; the
    /// target's outgoing task picks it up and writes the frame.
    pub async fn send_to_connection(&self, connection_id: ConnectionId, message: Vec<u8>) {
        if let Err(e) = self.sender.send((connection_id, message)) {
            tracing::error!(
                "Failed to send message to connection {}: {:?}",
                connection_id,
                e
            );
        }
    }

    /// Sends a message to the connection bound to `user_id`, if any.
    ///
    /// Returns whether a live connection was found. A miss is normal
    /// during disconnect races and is not an error.
    pub async fn send_to_user(&self, user_id: &UserId, message: Vec<u8>) -> bool {
        match self.connection_of(user_id).await {
            Some(connection_id) => {
                self.send_to_connection(connection_id, message).await;
                true
            }
            None => false,
        }
    }

    /// Broadcasts a message to all currently connected clients.
    ///
    /// # Returns
    ///
    /// The number of connections that the message was queued for.
    pub async fn broadcast_to_all(&self, message: Vec<u8>) -> usize {
        let connections = self.connections.read().await;
        let connection_count = connections.len();

        for &connection_id in connections.keys() {
            if let Err(e) = self.sender.send((connection_id, message.clone())) {
                tracing::error!(
                    "Failed to broadcast message to connection {}: {:?}",
                    connection_id,
                    e
                );
            }
        }

        tracing::debug!("📡 Broadcasted message to {} connections", connection_count);
        connection_count
    }

    /// Creates a new receiver for outgoing messages.
    ///
    /// Each connection handler calls this to get a receiver for
    /// messages targeted at its specific connection.
    pub fn subscribe(&self) -> broadcast::Receiver<(ConnectionId, Vec<u8>)> {
        self.sender.subscribe()
    }

    /// Disconnects a connection by ID, sending a close frame first.
    pub async fn kick_connection(&self, connection_id: ConnectionId, reason: Option<String>) {
        let senders = self.ws_senders.read().await;
        if let Some(ws_sender) = senders.get(&connection_id) {
            let mut ws_sender = ws_sender.lock().await;
            use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
            let close_msg =
                Message::Close(Some(tokio_tungstenite::tungstenite::protocol::CloseFrame {
                    code: CloseCode::Normal,
                    reason: reason
                        .unwrap_or_else(|| "Replaced by a newer session".into())
                        .into(),
                }));
            let _ = ws_sender.send(close_msg).await;
        }
        drop(senders);
        self.remove_connection(connection_id).await;
        self.remove_ws_sender(connection_id).await;
    }

    /// The number of currently tracked connections.
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }
}
