//! Command handlers for each command kind

mod start;
mod stop;
mod switch_camera;

pub use start::handle_start;
pub use stop::handle_stop;
pub use switch_camera::handle_switch_camera;

use crate::camera::{self, CameraConfig};
use crate::command::CommandResult;
use crate::pipeline::{DeviceStatus, PipelineSupervisor};
use racecast_shared::Command;

/// Context passed to command handlers
#[derive(Clone)]
pub struct HandlerContext {
    pub supervisor: PipelineSupervisor,
    pub cameras: std::sync::Arc<[CameraConfig]>,
    pub destination_configured: bool,
    pub current: DeviceStatus,
}

/// Resolve the camera a command names. A missing node is reported as a
/// streaming error so the operator sees why nothing started.
async fn resolve_camera(
    ctx: &HandlerContext,
    command: &Command,
) -> Result<CameraConfig, CommandResult> {
    let Some(name) = command.camera.as_deref() else {
        return Err(CommandResult::Rejected {
            message: "command names no camera".into(),
        });
    };
    let Some(camera) = camera::find(&ctx.cameras, name) else {
        return Err(CommandResult::Rejected {
            message: format!("camera {name} is not configured"),
        });
    };

    if !camera.is_present() {
        let message = format!(
            "camera {} not found at {}",
            camera.name,
            camera.device.display()
        );
        if let Err(e) = ctx.supervisor.report_error(message.clone()).await {
            return Err(CommandResult::Failed {
                message: e.to_string(),
            });
        }
        return Err(CommandResult::Failed { message });
    }

    Ok(camera.clone())
}
