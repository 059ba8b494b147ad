use racecast_shared::{CommandKind, StreamState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Update of vehicle {vehicle_id} still conflicting after {attempts} attempts")]
    Contention { vehicle_id: String, attempts: usize },

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Synchronous rejections of an operator command. None of them mutate state.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Vehicle {0} is offline")]
    DeviceOffline(String),

    #[error("Vehicle {vehicle_id} already has command {command_id} in flight")]
    CommandInFlight {
        vehicle_id: String,
        command_id: String,
    },

    #[error("Camera {camera} is not available on vehicle {vehicle_id}")]
    CameraUnavailable { vehicle_id: String, camera: String },

    #[error("{0:?} needs a camera")]
    MissingCamera(CommandKind),

    #[error("Cannot {kind:?} while {state:?}")]
    InvalidState {
        kind: CommandKind,
        state: StreamState,
    },

    #[error("Vehicle {0} has no stream destination configured")]
    DestinationNotConfigured(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error("Heartbeat without vehicle id")]
    EmptyVehicleId,

    #[error("Unknown streaming status {0}")]
    InvalidStatus(i32),

    #[error("Camera {name} has unknown status {status}")]
    InvalidCameraStatus { name: String, status: i32 },

    #[error("Camera {0} listed more than once")]
    DuplicateCamera(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
