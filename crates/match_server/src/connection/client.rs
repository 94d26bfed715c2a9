//! Client connection representation.

use crate::session::UserId;
use std::net::SocketAddr;
use std::time::SystemTime;

/// Represents an individual client connection to the server.
///
/// Tracks the essential information about a connected client: the
/// authenticated identity (once the handshake completes), network
/// address and connection timing.
#[derive(Debug)]
pub struct ClientConnection {
    /// The authenticated identity bound to this connection
    /// (`None` until the `authenticate` handshake succeeds)
    pub user_id: Option<UserId>,

    /// The remote network address of the client
    pub remote_addr: SocketAddr,

    /// When this connection was established
    pub connected_at: SystemTime,
}

impl ClientConnection {
    /// Creates a new, not yet authenticated connection record.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            user_id: None,
            remote_addr,
            connected_at: SystemTime::now(),
        }
    }
}
