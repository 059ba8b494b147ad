//! Stop streaming

use super::HandlerContext;
use crate::command::CommandResult;
use racecast_shared::{Command, StreamingStatus};

pub async fn handle_stop(ctx: &HandlerContext, _command: &Command) -> CommandResult {
    if ctx.current.status == StreamingStatus::Idle {
        return CommandResult::Completed {
            message: "already idle".into(),
        };
    }

    match ctx.supervisor.stop().await {
        Ok(()) => CommandResult::Completed {
            message: "stream stopped".into(),
        },
        Err(e) => CommandResult::Failed {
            message: e.to_string(),
        },
    }
}
