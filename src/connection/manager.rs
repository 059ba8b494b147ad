//! Connection manager with persistent connections and automatic reconnection

use super::heartbeat::HeartbeatSource;
use crate::config::ConnectionConfig;
use anyhow::{anyhow, Result};
use racecast_shared::{codec::{self, FrameDecoder}, Envelope};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::debug;

/// Events emitted by the connection manager
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Successfully connected to server
    Connected { uplink: Uplink },
    /// Disconnected from server
    Disconnected { reason: String },
    /// Received an envelope from server
    Received(Envelope),
    /// Every uplink failed on this attempt
    ConnectionFailed { reason: String },
    /// Primary unreachable, trying the fallback
    UplinkSwitched { from: Uplink, to: Uplink },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uplink {
    Primary,
    Fallback,
}

impl std::fmt::Display for Uplink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Uplink::Primary => write!(f, "primary"),
            Uplink::Fallback => write!(f, "fallback"),
        }
    }
}

/// Manages persistent connection to server with failover
pub struct ConnectionManager {
    event_rx: mpsc::Receiver<ConnectionEvent>,
}

impl ConnectionManager {
    /// Create a new connection manager and start the connection loop
    pub fn new(config: ConnectionConfig, heartbeats: HeartbeatSource) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<ConnectionEvent>(100);

        tokio::spawn(async move {
            connection_loop(config, heartbeats, event_tx).await;
        });

        Self { event_rx }
    }

    /// Receive the next connection event
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.event_rx.recv().await
    }
}

/// Main connection loop with reconnection logic
async fn connection_loop(
    config: ConnectionConfig,
    mut heartbeats: HeartbeatSource,
    event_tx: mpsc::Sender<ConnectionEvent>,
) {
    let sequence_id = AtomicU64::new(0);
    let mut uplink = Uplink::Primary;
    let mut reconnect_delay = config.reconnect_delay;

    loop {
        if event_tx.is_closed() {
            return;
        }

        let addr = match (uplink, &config.fallback_server) {
            (Uplink::Fallback, Some(fallback)) => fallback.as_str(),
            _ => config.primary_server.as_str(),
        };

        let failure = match timeout(config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                reconnect_delay = config.reconnect_delay;
                let _ = event_tx.send(ConnectionEvent::Connected { uplink }).await;

                if let Err(reason) =
                    handle_connection(stream, &config, &sequence_id, &mut heartbeats, &event_tx)
                        .await
                {
                    let _ = event_tx
                        .send(ConnectionEvent::Disconnected {
                            reason: reason.to_string(),
                        })
                        .await;
                }
                None
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("connect to {addr} timed out")),
        };

        if let Some(reason) = failure {
            if uplink == Uplink::Primary && config.fallback_server.is_some() {
                let _ = event_tx
                    .send(ConnectionEvent::UplinkSwitched {
                        from: Uplink::Primary,
                        to: Uplink::Fallback,
                    })
                    .await;
                uplink = Uplink::Fallback;
                continue;
            }
            let _ = event_tx
                .send(ConnectionEvent::ConnectionFailed {
                    reason: format!("All uplinks failed: {}", reason),
                })
                .await;
        }

        tokio::time::sleep(reconnect_delay).await;
        reconnect_delay = std::cmp::min(reconnect_delay * 2, config.max_reconnect_delay);

        // Always prefer the primary on the next attempt
        uplink = Uplink::Primary;
    }
}

/// Handle an active connection
async fn handle_connection(
    stream: TcpStream,
    config: &ConnectionConfig,
    sequence_id: &AtomicU64,
    heartbeats: &mut HeartbeatSource,
    event_tx: &mpsc::Sender<ConnectionEvent>,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    let mut decoder = FrameDecoder::new();
    let mut read_buf = vec![0u8; 4096];

    let mut heartbeat_interval = interval(config.heartbeat_interval);
    heartbeat_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = heartbeat_interval.tick() => {}

            // Report status changes right away instead of waiting for the tick
            _ = heartbeats.changed() => {
                debug!("local status changed, sending heartbeat");
                heartbeat_interval.reset();
            }

            result = reader.read(&mut read_buf) => {
                match result {
                    Ok(0) => return Err(anyhow!("Server closed connection")),
                    Ok(n) => {
                        decoder.extend(&read_buf[..n]);
                        while let Some(envelope) = decoder.decode_next()? {
                            let _ = event_tx.send(ConnectionEvent::Received(envelope)).await;
                        }
                    }
                    Err(e) => return Err(anyhow!("Read error: {}", e)),
                }
                continue;
            }
        }

        let seq = sequence_id.fetch_add(1, Ordering::SeqCst) + 1;
        let envelope = Envelope::heartbeat(&config.device_id, seq, heartbeats.build());
        let encoded = codec::encode(&envelope)?;
        writer.write_all(&encoded).await?;
    }
}
