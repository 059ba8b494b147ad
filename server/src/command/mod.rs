//! Command dispatch and expiry for the server
//!
//! This module handles:
//! - Admitting operator intents against current vehicle state
//! - Queuing admitted commands for delivery to the vehicle session
//! - Acknowledging commands from heartbeat evidence
//! - Expiring commands nobody confirmed

mod dispatcher;
mod timeout;

pub use dispatcher::{CommandDispatcher, OutboundCommand, Reconciliation};
pub use timeout::TimeoutTracker;
