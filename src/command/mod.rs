//! Command execution for the edge device
//!
//! This module handles:
//! - Receiving and validating commands from the server
//! - Dispatching them to the streaming handlers
//!
//! Devices never answer a command directly. The outcome shows up in the next
//! heartbeat, which the supervisor triggers as soon as the local status moves.

mod executor;
pub mod handlers;

pub use executor::{CommandExecutor, CommandResult};
