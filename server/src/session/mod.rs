//! Session management for connected vehicles
//!
//! This module handles:
//! - Reading framed envelopes from each vehicle connection
//! - Stamping receipt time on every frame
//! - Routing outbound commands to the vehicle's current connection

mod connection;
mod manager;

pub use connection::{DeviceSession, Inbound, SessionHandle};
pub use manager::SessionManager;
