//! Message handling and routing for client-server communication.
//!
//! This module provides the infrastructure for parsing inbound frames
//! and routing them to the session core, and for serializing the
//! resulting events back to clients.

pub mod router;
pub mod types;

pub use router::MessageRouter;
pub use types::ClientMessage;
