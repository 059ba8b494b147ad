//! Server configuration
//!
//! Defaults cover a typical event; every value can be overridden through
//! `RACECAST_*` environment variables (a `.env` file is honoured).

use anyhow::{bail, Context, Result};
use racecast_shared::{timing, CommandKind, HealthThresholds};
use std::str::FromStr;
use std::time::Duration;

/// Command time-to-live per kind, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTtls {
    pub start_stop_s: u64,
    pub switch_camera_s: u64,
}

impl Default for CommandTtls {
    fn default() -> Self {
        Self {
            start_stop_s: timing::START_STOP_TTL_MS / 1000,
            switch_camera_s: timing::SWITCH_CAMERA_TTL_MS / 1000,
        }
    }
}

impl CommandTtls {
    pub fn for_kind(&self, kind: CommandKind) -> u64 {
        match kind {
            CommandKind::SwitchCamera => self.switch_camera_s,
            CommandKind::Start | CommandKind::Stop | CommandKind::Unspecified => self.start_stop_s,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Where edge devices connect
    pub device_listen: String,
    /// Operator HTTP surface
    pub api_listen: String,
    pub health: HealthThresholds,
    pub ttls: CommandTtls,
    /// Period of the expiry and offline sweeps
    pub sweep_interval: Duration,
    /// Commands buffered for delivery before `issue` starts dropping them
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            device_listen: "0.0.0.0:8080".into(),
            api_listen: "0.0.0.0:8090".into(),
            health: HealthThresholds::default(),
            ttls: CommandTtls::default(),
            sweep_interval: Duration::from_millis(timing::SWEEP_INTERVAL_MS),
            outbound_queue: 256,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = env_value::<String>("RACECAST_DEVICE_LISTEN")? {
            config.device_listen = addr;
        }
        if let Some(addr) = env_value::<String>("RACECAST_API_LISTEN")? {
            config.api_listen = addr;
        }
        if let Some(secs) = env_value::<u64>("RACECAST_FRESH_SECS")? {
            config.health.fresh_ms = secs_to_ms("RACECAST_FRESH_SECS", secs)?;
        }
        if let Some(secs) = env_value::<u64>("RACECAST_OFFLINE_SECS")? {
            config.health.offline_ms = secs_to_ms("RACECAST_OFFLINE_SECS", secs)?;
        }
        if let Some(secs) = env_value::<u64>("RACECAST_START_STOP_TTL_SECS")? {
            config.ttls.start_stop_s = secs;
        }
        if let Some(secs) = env_value::<u64>("RACECAST_SWITCH_TTL_SECS")? {
            config.ttls.switch_camera_s = secs;
        }
        if let Some(ms) = env_value::<u64>("RACECAST_SWEEP_INTERVAL_MS")? {
            config.sweep_interval = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.health.fresh_ms == 0 || self.health.fresh_ms >= self.health.offline_ms {
            bail!(
                "fresh threshold ({}ms) must be non-zero and below the offline threshold ({}ms)",
                self.health.fresh_ms,
                self.health.offline_ms
            );
        }
        if self.ttls.start_stop_s == 0 || self.ttls.switch_camera_s == 0 {
            bail!("command TTLs must be non-zero");
        }
        if self.sweep_interval.is_zero() {
            bail!("sweep interval must be non-zero");
        }
        Ok(())
    }
}

fn secs_to_ms(key: &str, secs: u64) -> Result<u64> {
    match secs.checked_mul(1000) {
        Some(ms) => Ok(ms),
        None => bail!("{key} is out of range: {secs}s"),
    }
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
