//! Edge device configuration
//!
//! Defaults target a development setup on localhost. Every field can be
//! overridden from `RACECAST_*` environment variables.

use crate::camera::CameraConfig;
use anyhow::{bail, Context, Result};
use racecast_shared::timing;
use std::str::FromStr;
use std::time::Duration;

/// Uplink addresses and reconnection policy
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Vehicle ID reported in every header
    pub device_id: String,
    /// Preferred uplink (e.g. cellular modem)
    pub primary_server: String,
    /// Used when the primary cannot be reached
    pub fallback_server: Option<String>,
    /// Reconnection delay (initial)
    pub reconnect_delay: Duration,
    /// Maximum reconnection delay
    pub max_reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            device_id: "car-001".into(),
            primary_server: "127.0.0.1:8080".into(),
            fallback_server: None,
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_millis(timing::HEARTBEAT_INTERVAL_MS),
        }
    }
}

/// Streaming pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Program and arguments; `{device}`, `{camera}` and `{destination}` are
    /// substituted per launch
    pub command: Vec<String>,
    /// Ingest URL, `None` when the vehicle has not been provisioned
    pub destination: Option<String>,
    pub restart_interval: Duration,
    pub restart_burst: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            command: [
                "ffmpeg", "-nostdin", "-f", "v4l2", "-i", "{device}", "-c:v", "libx264",
                "-preset", "veryfast", "-tune", "zerolatency", "-f", "flv", "{destination}",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            destination: None,
            restart_interval: Duration::from_millis(timing::RESTART_INTERVAL_MS),
            restart_burst: timing::RESTART_BURST_COUNT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EdgeConfig {
    pub connection: ConnectionConfig,
    pub pipeline: PipelineConfig,
    pub cameras: Vec<CameraConfig>,
}

impl EdgeConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(id) = env_value::<String>("RACECAST_VEHICLE_ID")? {
            config.connection.device_id = id;
        }
        if let Some(addr) = env_value::<String>("RACECAST_SERVER")? {
            config.connection.primary_server = addr;
        }
        if let Some(addr) = env_value::<String>("RACECAST_FALLBACK_SERVER")? {
            config.connection.fallback_server = Some(addr);
        }
        if let Some(ms) = env_value::<u64>("RACECAST_HEARTBEAT_INTERVAL_MS")? {
            config.connection.heartbeat_interval = Duration::from_millis(ms);
        }
        if let Some(raw) = env_value::<String>("RACECAST_CAMERAS")? {
            config.cameras = parse_cameras(&raw)?;
        }
        if let Some(url) = env_value::<String>("RACECAST_DESTINATION")? {
            config.pipeline.destination = Some(url);
        }
        if let Some(cmd) = env_value::<String>("RACECAST_PIPELINE")? {
            config.pipeline.command = cmd.split_whitespace().map(String::from).collect();
        }
        if let Some(secs) = env_value::<u64>("RACECAST_RESTART_INTERVAL_SECS")? {
            config.pipeline.restart_interval = Duration::from_secs(secs);
        }
        if let Some(burst) = env_value::<usize>("RACECAST_RESTART_BURST")? {
            config.pipeline.restart_burst = burst;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection.device_id.trim().is_empty() {
            bail!("vehicle id must not be empty");
        }
        if self.pipeline.command.is_empty() {
            bail!("pipeline command must not be empty");
        }
        if self.pipeline.restart_burst == 0 {
            bail!("restart burst must be at least 1");
        }
        if self.connection.heartbeat_interval.is_zero() {
            bail!("heartbeat interval must be non-zero");
        }
        Ok(())
    }
}

/// Parse `name=/dev/videoN` pairs separated by commas
pub fn parse_cameras(raw: &str) -> Result<Vec<CameraConfig>> {
    let mut cameras: Vec<CameraConfig> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((name, device)) = entry.split_once('=') else {
            bail!("camera entry {entry:?} is not name=device");
        };
        let (name, device) = (name.trim(), device.trim());
        if name.is_empty() || device.is_empty() {
            bail!("camera entry {entry:?} is not name=device");
        }
        if cameras.iter().any(|c| c.name == name) {
            bail!("camera {name} configured twice");
        }
        cameras.push(CameraConfig::new(name, device));
    }
    Ok(cameras)
}

fn env_value<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        _ => Ok(None),
    }
}
