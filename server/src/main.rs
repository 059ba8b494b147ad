mod command;
mod config;
mod diagnostics;
mod error;
mod heartbeat;
mod http;
mod model;
mod session;
mod store;

use command::{CommandDispatcher, OutboundCommand, TimeoutTracker};
use config::ServerConfig;
use diagnostics::DiagnosticsReporter;
use heartbeat::HeartbeatReceiver;
use racecast_shared::envelope::Payload;
use session::{DeviceSession, SessionManager};
use std::sync::Arc;
use store::{MemoryStore, VehicleLedger};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ServerConfig::from_env()?;

    let ledger = Arc::new(VehicleLedger::new(Arc::new(MemoryStore::new())));
    let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue);
    let dispatcher = Arc::new(CommandDispatcher::new(
        ledger.clone(),
        config.health,
        config.ttls,
        outbound_tx,
    ));
    let receiver = Arc::new(HeartbeatReceiver::new(
        ledger.clone(),
        dispatcher.clone(),
        config.health,
    ));
    let diagnostics = Arc::new(DiagnosticsReporter::new(ledger.clone(), config.health));
    let sessions = Arc::new(SessionManager::new());

    let tracker = TimeoutTracker::new(dispatcher.clone(), receiver.clone(), config.sweep_interval);
    tokio::spawn(async move { tracker.run().await });

    tokio::spawn(forward_commands(outbound_rx, sessions.clone()));

    let device_listener = TcpListener::bind(&config.device_listen).await?;
    info!("Device listener on {}", config.device_listen);
    tokio::spawn(accept_devices(device_listener, sessions, receiver));

    let app = http::build_router(http::AppState {
        dispatcher,
        diagnostics,
    });
    let api_listener = TcpListener::bind(&config.api_listen).await?;
    info!("Operator API on {}", config.api_listen);
    axum::serve(api_listener, app).await?;

    Ok(())
}

/// Drain the dispatcher's delivery queue into device sessions
async fn forward_commands(
    mut outbound: mpsc::Receiver<OutboundCommand>,
    sessions: Arc<SessionManager>,
) {
    while let Some(OutboundCommand {
        vehicle_id,
        command,
    }) = outbound.recv().await
    {
        let sessions = sessions.clone();
        // One slow socket must not hold up delivery to other vehicles
        tokio::spawn(async move {
            let command_id = command.command_id.clone();
            match sessions.send_to(&vehicle_id, command).await {
                Ok(()) => debug!(%vehicle_id, %command_id, "command delivered"),
                Err(e) => warn!(%vehicle_id, %command_id, "command not delivered: {}", e),
            }
        });
    }
}

async fn accept_devices(
    listener: TcpListener,
    sessions: Arc<SessionManager>,
    receiver: Arc<HeartbeatReceiver>,
) {
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                info!("Connection from: {}", addr);
                let sessions = sessions.clone();
                let receiver = receiver.clone();
                tokio::spawn(async move {
                    handle_device(socket, addr, sessions, receiver).await;
                });
            }
            Err(e) => error!("Accept failed: {}", e),
        }
    }
}

async fn handle_device(
    socket: TcpStream,
    addr: std::net::SocketAddr,
    sessions: Arc<SessionManager>,
    receiver: Arc<HeartbeatReceiver>,
) {
    let mut session = DeviceSession::new(socket, addr);
    let mut registered = false;

    while let Some(inbound) = session.recv().await {
        if !registered && !session.device_id().is_empty() {
            sessions.register(session.get_handle()).await;
            registered = true;
            let connected = sessions.connected_devices().await.len();
            info!(vehicle_id = session.device_id(), %addr, connected, "session registered");
        }

        match &inbound.envelope.payload {
            Some(Payload::Heartbeat(hb)) => {
                if let Err(e) = receiver
                    .ingest(session.device_id(), hb, inbound.received_at_ms)
                    .await
                {
                    warn!(vehicle_id = session.device_id(), "heartbeat rejected: {}", e);
                }
            }
            Some(Payload::Command(_)) => {
                warn!(%addr, "device sent a command, ignoring");
            }
            None => debug!(%addr, "envelope without payload"),
        }
    }

    if registered {
        sessions.unregister(&session.get_handle()).await;
    }
    info!(vehicle_id = session.device_id(), %addr, "device disconnected");
}
