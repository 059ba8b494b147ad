//! Connection management for the server uplink
//!
//! This module handles:
//! - Persistent TCP connections with automatic reconnection
//! - Uplink failover (primary, then fallback)
//! - Periodic heartbeats, plus an immediate one on every local status change
//! - Delivering server commands to the main loop

mod heartbeat;
mod manager;

pub use heartbeat::HeartbeatSource;
pub use manager::{ConnectionEvent, ConnectionManager, Uplink};
