mod camera;
mod command;
mod config;
mod connection;
mod pipeline;

use command::CommandExecutor;
use config::EdgeConfig;
use connection::{ConnectionEvent, ConnectionManager, HeartbeatSource};
use pipeline::{CrashLoopGuard, PipelineSupervisor, ProcessLauncher};
use racecast_shared::{envelope, Envelope};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Pause before relaunching a crashed pipeline
const RESTART_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = EdgeConfig::from_env()?;

    info!("Edge device starting: {}", config.connection.device_id);
    info!("  primary uplink: {}", config.connection.primary_server);
    if let Some(fallback) = &config.connection.fallback_server {
        info!("  fallback uplink: {}", fallback);
    }
    for camera in &config.cameras {
        info!("  camera {} at {}", camera.name, camera.device.display());
    }
    if config.pipeline.destination.is_none() {
        warn!("No stream destination configured, start commands will fail");
    }

    let cameras: Arc<[camera::CameraConfig]> = config.cameras.clone().into();
    let destination_configured = config.pipeline.destination.is_some();

    let launcher = Arc::new(ProcessLauncher::new(
        config.pipeline.command.clone(),
        config.pipeline.destination.clone(),
    ));
    let supervisor = PipelineSupervisor::spawn(
        launcher,
        CrashLoopGuard::new(config.pipeline.restart_interval, config.pipeline.restart_burst),
        RESTART_DELAY,
    );

    let status = supervisor.subscribe();
    let executor = Arc::new(CommandExecutor::new(
        supervisor,
        cameras.clone(),
        destination_configured,
    ));
    let heartbeats = HeartbeatSource::new(
        status,
        executor.last_command(),
        cameras,
        destination_configured,
    );
    let mut conn = ConnectionManager::new(config.connection.clone(), heartbeats);

    // Main event loop
    loop {
        match conn.recv().await {
            Some(ConnectionEvent::Connected { uplink }) => {
                info!("Connected via {} uplink", uplink);
            }
            Some(ConnectionEvent::Disconnected { reason }) => {
                warn!("Disconnected: {}", reason);
            }
            Some(ConnectionEvent::UplinkSwitched { from, to }) => {
                info!("Uplink switched: {} -> {}", from, to);
            }
            Some(ConnectionEvent::ConnectionFailed { reason }) => {
                error!("Connection failed: {}", reason);
            }
            Some(ConnectionEvent::Received(envelope)) => {
                handle_server_message(envelope, &executor);
            }
            None => {
                error!("Connection manager closed");
                break;
            }
        }
    }

    Ok(())
}

fn handle_server_message(envelope: Envelope, executor: &Arc<CommandExecutor>) {
    match envelope.payload {
        Some(envelope::Payload::Command(cmd)) => {
            // Pipeline launches can take a while; keep reading the socket meanwhile
            let executor = executor.clone();
            tokio::spawn(async move {
                executor.execute(&cmd).await;
            });
        }
        Some(envelope::Payload::Heartbeat(_)) => {
            debug!("Ignoring heartbeat from server");
        }
        None => debug!("Envelope without payload"),
    }
}
