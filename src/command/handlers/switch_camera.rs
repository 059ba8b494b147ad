//! Switch the live stream to another camera

use super::{resolve_camera, HandlerContext};
use crate::command::CommandResult;
use racecast_shared::{Command, StreamingStatus};

pub async fn handle_switch_camera(ctx: &HandlerContext, command: &Command) -> CommandResult {
    if ctx.current.status != StreamingStatus::Live {
        return CommandResult::Rejected {
            message: format!("cannot switch camera while {:?}", ctx.current.status),
        };
    }

    let camera = match resolve_camera(ctx, command).await {
        Ok(camera) => camera,
        Err(result) => return result,
    };

    match ctx.supervisor.switch_camera(camera.clone()).await {
        Ok(()) => CommandResult::Completed {
            message: format!("switched to {}", camera.name),
        },
        Err(e) => CommandResult::Failed {
            message: e.to_string(),
        },
    }
}
