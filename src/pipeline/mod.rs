//! Streaming pipeline management for the edge device
//!
//! This module handles:
//! - Launching the video pipeline for a chosen camera
//! - Relaunching it after crashes, up to the crash-loop limit
//! - Publishing the local streaming status that heartbeats report

mod guard;
pub mod launcher;
mod supervisor;

pub use guard::CrashLoopGuard;
pub use launcher::ProcessLauncher;
pub use supervisor::PipelineSupervisor;

use racecast_shared::StreamingStatus;

/// What the device itself believes it is doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub status: StreamingStatus,
    /// Set only while live
    pub camera: Option<String>,
    /// Set only in `Error`
    pub error: Option<String>,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            status: StreamingStatus::Idle,
            camera: None,
            error: None,
        }
    }
}
