//! Connection health classification
//!
//! Health is derived from heartbeat recency on demand and never stored. It is
//! reported independently of stream state: a silent vehicle that was streaming
//! is offline *and* still last known as streaming.

use crate::timing;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionHealth {
    Online,
    Stale,
    Offline,
}

/// Age boundaries for [`classify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Below this age a vehicle is online
    pub fresh_ms: u64,
    /// At or above this age a vehicle is offline
    pub offline_ms: u64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            fresh_ms: timing::FRESH_THRESHOLD_MS,
            offline_ms: timing::OFFLINE_THRESHOLD_MS,
        }
    }
}

/// Classify a vehicle by the age of its last heartbeat.
///
/// A vehicle never heard from is offline. A heartbeat stamped in the future
/// (clock skew between service instances) counts as age zero.
pub fn classify(
    now_ms: u64,
    last_heartbeat_at_ms: Option<u64>,
    thresholds: &HealthThresholds,
) -> ConnectionHealth {
    let Some(last) = last_heartbeat_at_ms else {
        return ConnectionHealth::Offline;
    };

    let age = now_ms.saturating_sub(last);
    if age < thresholds.fresh_ms {
        ConnectionHealth::Online
    } else if age < thresholds.offline_ms {
        ConnectionHealth::Stale
    } else {
        ConnectionHealth::Offline
    }
}
