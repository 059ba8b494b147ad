//! Per-vehicle records held by the store

use racecast_shared::{
    state_machine::next_state, CameraStatus, Command, CommandKind, ErrorCause, StreamEvent,
    StreamState, StreamingStatus,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraEntry {
    pub name: String,
    pub status: CameraStatus,
}

/// Latest validated status report from a vehicle.
///
/// `None` fields mean the device did not report them. They are never filled in
/// with defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHeartbeat {
    pub vehicle_id: String,
    pub received_at_ms: u64,
    pub reported_status: StreamingStatus,
    pub reported_camera: Option<String>,
    pub reported_error: Option<String>,
    pub camera_inventory: Vec<CameraEntry>,
    pub destination_configured: bool,
    /// Last command the device executed, if it has executed any
    pub last_command_id: Option<String>,
}

impl DeviceHeartbeat {
    pub fn camera(&self, name: &str) -> Option<&CameraEntry> {
        self.camera_inventory.iter().find(|c| c.name == name)
    }

    /// The device is signalling a failure, with or without detail
    pub fn reports_error(&self) -> bool {
        self.reported_error.is_some() || self.reported_status == StreamingStatus::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Acked,
    Expired,
    /// Resolved by a device-reported error
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCommand {
    pub command_id: String,
    pub vehicle_id: String,
    pub kind: CommandKind,
    pub camera: Option<String>,
    pub created_at_ms: u64,
    pub ttl_s: u64,
    pub status: CommandStatus,
}

impl PendingCommand {
    pub fn expires_at_ms(&self) -> u64 {
        self.created_at_ms.saturating_add(self.ttl_s.saturating_mul(1000))
    }

    pub fn is_overdue(&self, now_ms: u64) -> bool {
        self.status == CommandStatus::Pending && self.expires_at_ms() < now_ms
    }

    /// Whether a heartbeat was produced before the device could have acted on
    /// this command: it arrived before the command was issued, or the device
    /// names a different command as the last one it executed.
    pub fn predates(&self, heartbeat: &DeviceHeartbeat) -> bool {
        heartbeat.received_at_ms < self.created_at_ms
            || heartbeat
                .last_command_id
                .as_ref()
                .is_some_and(|id| *id != self.command_id)
    }

    /// Whether a heartbeat shows the outcome this command asked for
    pub fn is_satisfied_by(&self, heartbeat: &DeviceHeartbeat) -> bool {
        match self.kind {
            CommandKind::Start | CommandKind::SwitchCamera => {
                heartbeat.reported_status == StreamingStatus::Live
                    && heartbeat.reported_camera.is_some()
                    && heartbeat.reported_camera == self.camera
            }
            CommandKind::Stop => heartbeat.reported_status == StreamingStatus::Idle,
            CommandKind::Unspecified => false,
        }
    }

    pub fn to_wire(&self) -> Command {
        Command {
            command_id: self.command_id.clone(),
            kind: self.kind.into(),
            camera: self.camera.clone(),
            expires_at_ms: self.expires_at_ms(),
        }
    }
}

/// What caused the latest state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTrigger {
    FirstHeartbeat,
    Command,
    Acknowledgement,
    CommandTimeout,
    DeviceError,
    OfflineTimeout,
}

impl From<StreamEvent> for TransitionTrigger {
    fn from(event: StreamEvent) -> Self {
        match event {
            StreamEvent::HeartbeatReceived => TransitionTrigger::FirstHeartbeat,
            StreamEvent::Issued(_) => TransitionTrigger::Command,
            StreamEvent::Acknowledged(_) => TransitionTrigger::Acknowledgement,
            StreamEvent::CommandTimedOut => TransitionTrigger::CommandTimeout,
            StreamEvent::DeviceError => TransitionTrigger::DeviceError,
            StreamEvent::OfflineTimeout => TransitionTrigger::OfflineTimeout,
        }
    }
}

/// Authoritative stream state of one vehicle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatus {
    pub state: StreamState,
    pub camera: Option<String>,
    pub command_id: Option<String>,
    pub error_message: Option<String>,
    pub trigger: Option<TransitionTrigger>,
    pub updated_at_ms: u64,
}

impl StreamStatus {
    /// Public "is this vehicle live" projection
    pub fn is_live(&self) -> bool {
        self.state == StreamState::Streaming
    }

    /// Apply an event through the state machine.
    ///
    /// Entering ERROR always sets the translated message for `cause`; every
    /// other state clears it. Returns the new state, or `None` if the event
    /// does not apply.
    pub fn transition(
        &mut self,
        event: StreamEvent,
        cause: Option<ErrorCause>,
        now_ms: u64,
    ) -> Option<StreamState> {
        let next = next_state(self.state, event)?;

        self.state = next;
        self.trigger = Some(event.into());
        self.updated_at_ms = now_ms;
        if next != StreamState::Streaming {
            self.camera = None;
        }
        self.error_message = match next {
            StreamState::Error => Some(cause.unwrap_or(ErrorCause::Unknown).user_message().to_string()),
            _ => None,
        };

        Some(next)
    }

    /// Whether a heartbeat disagrees with what this state expects the device
    /// to be doing
    pub fn diverges_from(&self, heartbeat: &DeviceHeartbeat) -> bool {
        let expected = match self.state {
            StreamState::Disconnected => return true,
            StreamState::Idle => StreamingStatus::Idle,
            StreamState::Starting => StreamingStatus::Starting,
            StreamState::Streaming => StreamingStatus::Live,
            StreamState::Stopping => StreamingStatus::Stopping,
            StreamState::Error => return !heartbeat.reports_error(),
        };

        heartbeat.reports_error()
            || heartbeat.reported_status != expected
            || (self.state == StreamState::Streaming && heartbeat.reported_camera != self.camera)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub vehicle_id: String,
    pub stream: StreamStatus,
    /// At most one command awaiting acknowledgement
    pub pending: Option<PendingCommand>,
    /// Most recently resolved command
    pub last_command: Option<PendingCommand>,
    pub heartbeat: Option<DeviceHeartbeat>,
}

impl VehicleRecord {
    pub fn new(vehicle_id: impl Into<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            stream: StreamStatus::default(),
            pending: None,
            last_command: None,
            heartbeat: None,
        }
    }

    pub fn last_heartbeat_at_ms(&self) -> Option<u64> {
        self.heartbeat.as_ref().map(|hb| hb.received_at_ms)
    }

    /// Move the pending command to `last_command` with its final status
    pub fn resolve_pending(&mut self, status: CommandStatus) -> Option<&PendingCommand> {
        let mut cmd = self.pending.take()?;
        cmd.status = status;
        self.last_command = Some(cmd);
        self.last_command.as_ref()
    }
}
