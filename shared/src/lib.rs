//! RaceCast Shared Protocol Types
//!
//! This crate provides the wire protocol, the frame codec and the pure stream
//! coordination logic shared by the on-vehicle edge device and the control
//! server.

pub mod codec;
pub mod health;
pub mod proto;
pub mod state_machine;

use std::time::{SystemTime, UNIX_EPOCH};

// Re-export commonly used types at crate root
pub use health::{classify, ConnectionHealth, HealthThresholds};
pub use proto::*;
pub use state_machine::{ErrorCause, StreamEvent, StreamState};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Timing defaults for the coordination protocol.
///
/// Every value here is only a default; both binaries allow overriding them
/// from their configuration.
pub mod timing {
    /// Interval between periodic device heartbeats
    pub const HEARTBEAT_INTERVAL_MS: u64 = 5_000;

    /// A vehicle heard from more recently than this is online
    pub const FRESH_THRESHOLD_MS: u64 = 15_000;

    /// A vehicle silent for at least this long is offline
    pub const OFFLINE_THRESHOLD_MS: u64 = 60_000;

    /// Time-to-live for start and stop commands
    pub const START_STOP_TTL_MS: u64 = 30_000;

    /// Time-to-live for camera switches (never leaves STREAMING, so tighter)
    pub const SWITCH_CAMERA_TTL_MS: u64 = 15_000;

    /// How often the server sweeps for expired commands and silent vehicles
    pub const SWEEP_INTERVAL_MS: u64 = 1_000;

    /// Crash-loop guard window
    pub const RESTART_INTERVAL_MS: u64 = 60_000;

    /// Pipeline failures tolerated inside the window before giving up
    pub const RESTART_BURST_COUNT: usize = 3;
}

/// Marker the edge device puts in `streaming_error` once its crash-loop guard
/// has stopped relaunching the pipeline.
pub const RESTART_LIMIT_MARKER: &str = "restart limit hit";

impl Header {
    /// Create a new header with the given device ID and message type
    pub fn new(device_id: impl Into<String>, msg_type: MessageType, sequence_id: u64) -> Self {
        Self {
            device_id: device_id.into(),
            sequence_id,
            timestamp_ms: now_ms(),
            msg_type: msg_type.into(),
        }
    }
}

impl Envelope {
    /// Wrap a heartbeat for the given vehicle
    pub fn heartbeat(vehicle_id: &str, sequence_id: u64, heartbeat: Heartbeat) -> Self {
        Self {
            header: Some(Header::new(vehicle_id, MessageType::MsgHeartbeat, sequence_id)),
            payload: Some(envelope::Payload::Heartbeat(heartbeat)),
        }
    }

    /// Wrap a command addressed from the server
    pub fn command(sequence_id: u64, command: Command) -> Self {
        Self {
            header: Some(Header::new("server", MessageType::MsgCommand, sequence_id)),
            payload: Some(envelope::Payload::Command(command)),
        }
    }
}

impl Command {
    /// Check if this command has expired
    pub fn is_expired(&self) -> bool {
        if self.expires_at_ms == 0 {
            return false; // No expiry set
        }
        now_ms() > self.expires_at_ms
    }
}

impl CameraInfo {
    pub fn new(name: impl Into<String>, status: CameraStatus) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
        }
    }
}
