//! Server core functionality and connection handling.

pub mod core;
pub mod handlers;

pub use core::GameServer;
