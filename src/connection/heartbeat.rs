//! Heartbeat construction from local device state

use crate::camera::{self, CameraConfig};
use crate::pipeline::DeviceStatus;
use racecast_shared::Heartbeat;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

/// Everything a heartbeat reports, read fresh for every send
#[derive(Clone)]
pub struct HeartbeatSource {
    status: watch::Receiver<DeviceStatus>,
    last_command: watch::Receiver<Option<String>>,
    cameras: Arc<[CameraConfig]>,
    destination_configured: bool,
    started: Instant,
}

impl HeartbeatSource {
    pub fn new(
        status: watch::Receiver<DeviceStatus>,
        last_command: watch::Receiver<Option<String>>,
        cameras: Arc<[CameraConfig]>,
        destination_configured: bool,
    ) -> Self {
        Self {
            status,
            last_command,
            cameras,
            destination_configured,
            started: Instant::now(),
        }
    }

    pub fn build(&self) -> Heartbeat {
        let status = self.status.borrow().clone();
        Heartbeat {
            streaming_status: status.status.into(),
            cameras: camera::inventory(&self.cameras, status.camera.as_deref()),
            streaming_camera: status.camera,
            streaming_error: status.error,
            destination_configured: self.destination_configured,
            uptime_ms: self.started.elapsed().as_millis() as u64,
            last_command_id: self.last_command.borrow().clone(),
        }
    }

    /// Resolves when the local status changes. Never resolves once the
    /// status publisher is gone.
    pub async fn changed(&mut self) {
        if self.status.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
