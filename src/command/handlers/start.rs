//! Start streaming

use super::{resolve_camera, HandlerContext};
use crate::command::CommandResult;
use racecast_shared::{Command, StreamingStatus};

pub async fn handle_start(ctx: &HandlerContext, command: &Command) -> CommandResult {
    let camera = match resolve_camera(ctx, command).await {
        Ok(camera) => camera,
        Err(result) => return result,
    };

    if ctx.current.status == StreamingStatus::Live
        && ctx.current.camera.as_deref() == Some(camera.name.as_str())
    {
        return CommandResult::Completed {
            message: format!("already streaming {}", camera.name),
        };
    }

    if !ctx.destination_configured {
        let message = "stream destination not configured".to_string();
        if let Err(e) = ctx.supervisor.report_error(message.clone()).await {
            return CommandResult::Failed {
                message: e.to_string(),
            };
        }
        return CommandResult::Failed { message };
    }

    match ctx.supervisor.start(camera.clone()).await {
        Ok(()) => CommandResult::Completed {
            message: format!("streaming {}", camera.name),
        },
        // The supervisor has already published the failure
        Err(e) => CommandResult::Failed {
            message: e.to_string(),
        },
    }
}
