//! Read-only views of vehicle state for operators and support.
//!
//! Nothing here takes the per-vehicle lock or writes to the store.

use crate::error::StoreError;
use crate::model::{DeviceHeartbeat, PendingCommand, StreamStatus, VehicleRecord};
use crate::store::VehicleLedger;
use racecast_shared::state_machine::StatusDisplay;
use racecast_shared::{classify, ConnectionHealth, HealthThresholds, StreamState};
use serde::Serialize;
use std::sync::Arc;

/// Full picture of one vehicle
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsSnapshot {
    pub vehicle_id: String,
    pub connection_health: ConnectionHealth,
    /// `None` for a vehicle never heard from
    pub last_heartbeat_age_s: Option<u64>,
    pub stream_state: StreamState,
    pub display: StatusDisplay,
    pub is_live: bool,
    pub stream: StreamStatus,
    pub pending_command: Option<PendingCommand>,
    pub last_command: Option<PendingCommand>,
    pub raw_heartbeat: Option<DeviceHeartbeat>,
}

/// Connection view, independent of stream state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionView {
    pub connection_status: ConnectionHealth,
    pub last_heartbeat_ago_s: Option<u64>,
}

/// One row of the fleet overview
#[derive(Debug, Clone, Serialize)]
pub struct FleetEntry {
    pub vehicle_id: String,
    pub connection_status: ConnectionHealth,
    pub stream_state: StreamState,
    pub display: StatusDisplay,
    pub camera: Option<String>,
    pub error_message: Option<String>,
}

pub struct DiagnosticsReporter {
    ledger: Arc<VehicleLedger>,
    thresholds: HealthThresholds,
}

impl DiagnosticsReporter {
    pub fn new(ledger: Arc<VehicleLedger>, thresholds: HealthThresholds) -> Self {
        Self { ledger, thresholds }
    }

    pub async fn snapshot(
        &self,
        vehicle_id: &str,
        now_ms: u64,
    ) -> Result<DiagnosticsSnapshot, StoreError> {
        let record = self.ledger.read(vehicle_id).await?;
        let connection = self.connection_of(&record, now_ms);

        Ok(DiagnosticsSnapshot {
            vehicle_id: record.vehicle_id,
            connection_health: connection.connection_status,
            last_heartbeat_age_s: connection.last_heartbeat_ago_s,
            stream_state: record.stream.state,
            display: record.stream.state.display(),
            is_live: record.stream.is_live(),
            stream: record.stream,
            pending_command: record.pending,
            last_command: record.last_command,
            raw_heartbeat: record.heartbeat,
        })
    }

    pub async fn connection(
        &self,
        vehicle_id: &str,
        now_ms: u64,
    ) -> Result<ConnectionView, StoreError> {
        let record = self.ledger.read(vehicle_id).await?;
        Ok(self.connection_of(&record, now_ms))
    }

    pub async fn stream(&self, vehicle_id: &str) -> Result<StreamStatus, StoreError> {
        Ok(self.ledger.read(vehicle_id).await?.stream)
    }

    /// Every vehicle the store knows about, sorted by id
    pub async fn fleet(&self, now_ms: u64) -> Result<Vec<FleetEntry>, StoreError> {
        let mut entries = Vec::new();
        for vehicle_id in self.ledger.vehicle_ids().await? {
            let record = self.ledger.read(&vehicle_id).await?;
            let connection = self.connection_of(&record, now_ms);
            entries.push(FleetEntry {
                vehicle_id,
                connection_status: connection.connection_status,
                stream_state: record.stream.state,
                display: record.stream.state.display(),
                camera: record.stream.camera,
                error_message: record.stream.error_message,
            });
        }
        Ok(entries)
    }

    fn connection_of(&self, record: &VehicleRecord, now_ms: u64) -> ConnectionView {
        let last = record.last_heartbeat_at_ms();
        ConnectionView {
            connection_status: classify(now_ms, last, &self.thresholds),
            last_heartbeat_ago_s: last.map(|at| now_ms.saturating_sub(at) / 1000),
        }
    }
}
