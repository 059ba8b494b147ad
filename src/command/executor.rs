//! Command executor - validates and dispatches incoming commands

use super::handlers::{self, HandlerContext};
use crate::camera::CameraConfig;
use crate::pipeline::PipelineSupervisor;
use racecast_shared::{Command, CommandKind};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Result of command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Command carried out
    Completed { message: String },
    /// Command accepted but execution failed
    Failed { message: String },
    /// Command rejected (expired, wrong state, unknown camera)
    Rejected { message: String },
}

/// Executes commands received from the server
pub struct CommandExecutor {
    supervisor: PipelineSupervisor,
    cameras: Arc<[CameraConfig]>,
    destination_configured: bool,
    /// Echoed in heartbeats so the server can tell which command a report follows
    last_command: watch::Sender<Option<String>>,
}

impl CommandExecutor {
    pub fn new(
        supervisor: PipelineSupervisor,
        cameras: Arc<[CameraConfig]>,
        destination_configured: bool,
    ) -> Self {
        Self {
            supervisor,
            cameras,
            destination_configured,
            last_command: watch::channel(None).0,
        }
    }

    /// ID of the most recently received command
    pub fn last_command(&self) -> watch::Receiver<Option<String>> {
        self.last_command.subscribe()
    }

    /// Execute a command. The result is only logged; the server learns the
    /// outcome from heartbeats.
    pub async fn execute(&self, command: &Command) -> CommandResult {
        let kind = CommandKind::try_from(command.kind).unwrap_or(CommandKind::Unspecified);

        info!(
            command_id = %command.command_id,
            ?kind,
            camera = ?command.camera,
            "Executing command"
        );
        // Recorded before acting, so no status it causes goes out under an older ID
        self.last_command.send_replace(Some(command.command_id.clone()));

        if command.is_expired() {
            let result = CommandResult::Rejected {
                message: "command expired before execution".into(),
            };
            log_result(&command.command_id, &result);
            return result;
        }

        let ctx = HandlerContext {
            supervisor: self.supervisor.clone(),
            cameras: self.cameras.clone(),
            destination_configured: self.destination_configured,
            current: self.supervisor.status(),
        };

        let result = match kind {
            CommandKind::Start => handlers::handle_start(&ctx, command).await,
            CommandKind::Stop => handlers::handle_stop(&ctx, command).await,
            CommandKind::SwitchCamera => handlers::handle_switch_camera(&ctx, command).await,
            CommandKind::Unspecified => CommandResult::Rejected {
                message: format!("unknown command kind {}", command.kind),
            },
        };

        log_result(&command.command_id, &result);
        result
    }
}

fn log_result(command_id: &str, result: &CommandResult) {
    match result {
        CommandResult::Completed { message } => info!(command_id, "Command completed: {}", message),
        CommandResult::Failed { message } => warn!(command_id, "Command failed: {}", message),
        CommandResult::Rejected { message } => warn!(command_id, "Command rejected: {}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::launcher::{PipelineLauncher, PipelineProcess};
    use crate::pipeline::CrashLoopGuard;
    use anyhow::Result;
    use async_trait::async_trait;
    use racecast_shared::{now_ms, StreamingStatus};
    use std::time::Duration;

    struct IdleProcess;

    #[async_trait]
    impl PipelineProcess for IdleProcess {
        async fn wait(&mut self) -> Result<String> {
            std::future::pending().await
        }

        async fn kill(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct StubLauncher;

    #[async_trait]
    impl PipelineLauncher for StubLauncher {
        async fn launch(&self, _camera: &CameraConfig) -> Result<Box<dyn PipelineProcess>> {
            Ok(Box::new(IdleProcess))
        }
    }

    fn executor(destination_configured: bool) -> CommandExecutor {
        let supervisor = PipelineSupervisor::spawn(
            Arc::new(StubLauncher),
            CrashLoopGuard::new(Duration::from_secs(60), 3),
            Duration::ZERO,
        );
        // temp_dir always exists, so "main" counts as present
        let cameras: Arc<[CameraConfig]> = vec![
            CameraConfig::new("main", std::env::temp_dir()),
            CameraConfig::new("cockpit", std::env::temp_dir()),
            CameraConfig::new("rear", "/nonexistent/video9"),
        ]
        .into();
        CommandExecutor::new(supervisor, cameras, destination_configured)
    }

    fn command(kind: CommandKind, camera: Option<&str>) -> Command {
        Command {
            command_id: "c-1".into(),
            kind: kind.into(),
            camera: camera.map(String::from),
            expires_at_ms: now_ms() + 30_000,
        }
    }

    #[tokio::test]
    async fn test_start_switch_stop() {
        let exec = executor(true);

        let result = exec.execute(&command(CommandKind::Start, Some("main"))).await;
        assert!(matches!(result, CommandResult::Completed { .. }));
        assert_eq!(exec.supervisor.status().status, StreamingStatus::Live);

        let result = exec
            .execute(&command(CommandKind::SwitchCamera, Some("cockpit")))
            .await;
        assert!(matches!(result, CommandResult::Completed { .. }));
        assert_eq!(exec.supervisor.status().camera.as_deref(), Some("cockpit"));

        exec.execute(&command(CommandKind::Stop, None)).await;
        assert_eq!(exec.supervisor.status().status, StreamingStatus::Idle);
    }

    #[tokio::test]
    async fn test_expired_command_is_rejected() {
        let exec = executor(true);
        let mut cmd = command(CommandKind::Start, Some("main"));
        cmd.expires_at_ms = 1;

        assert!(matches!(exec.execute(&cmd).await, CommandResult::Rejected { .. }));
        assert_eq!(exec.supervisor.status().status, StreamingStatus::Idle);
    }

    #[tokio::test]
    async fn test_last_command_is_recorded() {
        let exec = executor(true);
        let last = exec.last_command();
        assert!(last.borrow().is_none());

        let mut cmd = command(CommandKind::Start, Some("main"));
        cmd.command_id = "c-7".into();
        exec.execute(&cmd).await;
        assert_eq!(last.borrow().as_deref(), Some("c-7"));

        // Rejected commands still count as seen
        let mut cmd = command(CommandKind::SwitchCamera, Some("roof"));
        cmd.command_id = "c-8".into();
        assert!(matches!(exec.execute(&cmd).await, CommandResult::Rejected { .. }));
        assert_eq!(last.borrow().as_deref(), Some("c-8"));
    }

    #[tokio::test]
    async fn test_missing_camera_surfaces_as_streaming_error() {
        let exec = executor(true);
        let result = exec.execute(&command(CommandKind::Start, Some("rear"))).await;
        assert!(matches!(result, CommandResult::Failed { .. }));

        let mut rx = exec.supervisor.subscribe();
        let status = rx
            .wait_for(|s| s.status == StreamingStatus::Error)
            .await
            .unwrap()
            .clone();
        assert!(status.error.unwrap().contains("camera rear not found"));
    }

    #[tokio::test]
    async fn test_start_without_destination_fails() {
        let exec = executor(false);
        let result = exec.execute(&command(CommandKind::Start, Some("main"))).await;
        assert_eq!(
            result,
            CommandResult::Failed {
                message: "stream destination not configured".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_camera_and_idle_switch_are_rejected() {
        let exec = executor(true);
        let result = exec.execute(&command(CommandKind::Start, Some("roof"))).await;
        assert!(matches!(result, CommandResult::Rejected { .. }));

        let result = exec
            .execute(&command(CommandKind::SwitchCamera, Some("cockpit")))
            .await;
        assert!(matches!(result, CommandResult::Rejected { .. }));
    }
}
