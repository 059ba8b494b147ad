//! Heartbeat receiver
//!
//! Validates device reports and hands them to the dispatcher, which stores
//! and reconciles each one in a single per-vehicle update. Also owns the
//! offline sweep, the only path by which silence changes stream state.

use crate::command::{CommandDispatcher, Reconciliation};
use crate::error::{HeartbeatError, StoreError};
use crate::model::{CameraEntry, DeviceHeartbeat, StreamStatus};
use crate::store::VehicleLedger;
use futures::future::join_all;
use racecast_shared::{
    classify, CameraStatus, ConnectionHealth, HealthThresholds, Heartbeat, StreamEvent,
    StreamingStatus,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub struct HeartbeatReceiver {
    ledger: Arc<VehicleLedger>,
    dispatcher: Arc<CommandDispatcher>,
    thresholds: HealthThresholds,
}

/// Turn a wire heartbeat into a stored one, rejecting malformed reports
pub fn validate(
    vehicle_id: &str,
    heartbeat: &Heartbeat,
    received_at_ms: u64,
) -> Result<DeviceHeartbeat, HeartbeatError> {
    if vehicle_id.trim().is_empty() {
        return Err(HeartbeatError::EmptyVehicleId);
    }

    let reported_status = match StreamingStatus::try_from(heartbeat.streaming_status) {
        Ok(StreamingStatus::Unspecified) | Err(_) => {
            return Err(HeartbeatError::InvalidStatus(heartbeat.streaming_status))
        }
        Ok(status) => status,
    };

    let mut seen = HashSet::new();
    let mut camera_inventory = Vec::with_capacity(heartbeat.cameras.len());
    for camera in &heartbeat.cameras {
        if !seen.insert(camera.name.as_str()) {
            return Err(HeartbeatError::DuplicateCamera(camera.name.clone()));
        }
        let status = match CameraStatus::try_from(camera.status) {
            Ok(CameraStatus::Unspecified) | Err(_) => {
                return Err(HeartbeatError::InvalidCameraStatus {
                    name: camera.name.clone(),
                    status: camera.status,
                })
            }
            Ok(status) => status,
        };
        camera_inventory.push(CameraEntry {
            name: camera.name.clone(),
            status,
        });
    }

    Ok(DeviceHeartbeat {
        vehicle_id: vehicle_id.to_string(),
        received_at_ms,
        reported_status,
        reported_camera: heartbeat.streaming_camera.clone(),
        reported_error: heartbeat.streaming_error.clone(),
        camera_inventory,
        destination_configured: heartbeat.destination_configured,
        last_command_id: heartbeat.last_command_id.clone(),
    })
}

impl HeartbeatReceiver {
    pub fn new(
        ledger: Arc<VehicleLedger>,
        dispatcher: Arc<CommandDispatcher>,
        thresholds: HealthThresholds,
    ) -> Self {
        Self {
            ledger,
            dispatcher,
            thresholds,
        }
    }

    /// Ingest one heartbeat. `received_at_ms` is stamped when the frame was
    /// read, before any lock is taken, so it reflects receipt order.
    pub async fn ingest(
        &self,
        vehicle_id: &str,
        heartbeat: &Heartbeat,
        received_at_ms: u64,
    ) -> Result<StreamStatus, HeartbeatError> {
        let report = validate(vehicle_id, heartbeat, received_at_ms)?;
        let outcome = self.dispatcher.acknowledge(vehicle_id, &report).await?;
        if outcome != Reconciliation::NoChange {
            debug!(vehicle_id, ?outcome, "heartbeat reconciled");
        }
        Ok(self.ledger.read(vehicle_id).await?.stream)
    }

    /// Move silent, non-streaming vehicles to DISCONNECTED. Vehicles with a
    /// command still pending are left for the expiry sweep. Returns the
    /// vehicles that changed.
    pub async fn sweep_offline(&self, now_ms: u64) -> Result<Vec<String>, StoreError> {
        let ids = self.ledger.vehicle_ids().await?;
        let results = join_all(ids.iter().map(|id| self.sweep_vehicle(id, now_ms))).await;

        let mut disconnected = Vec::new();
        for (id, result) in ids.iter().zip(results) {
            if result? {
                disconnected.push(id.clone());
            }
        }
        Ok(disconnected)
    }

    async fn sweep_vehicle(&self, vehicle_id: &str, now_ms: u64) -> Result<bool, StoreError> {
        let thresholds = self.thresholds;
        let changed = self
            .ledger
            .update(vehicle_id, |record| {
                let health = classify(now_ms, record.last_heartbeat_at_ms(), &thresholds);
                if health != ConnectionHealth::Offline || record.pending.is_some() {
                    return Ok::<_, StoreError>(false);
                }
                Ok(record
                    .stream
                    .transition(StreamEvent::OfflineTimeout, None, now_ms)
                    .is_some())
            })
            .await?;

        if changed {
            info!(vehicle_id, "vehicle went offline");
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommandTtls;
    use crate::store::MemoryStore;
    use racecast_shared::{CameraInfo, CommandKind, StreamState};
    use tokio::sync::mpsc;

    const T0: u64 = 5_000_000;

    struct Harness {
        receiver: HeartbeatReceiver,
        dispatcher: Arc<CommandDispatcher>,
        ledger: Arc<VehicleLedger>,
        _outbound: mpsc::Receiver<crate::command::OutboundCommand>,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(VehicleLedger::new(Arc::new(MemoryStore::new())));
        let thresholds = HealthThresholds {
            fresh_ms: 15_000,
            offline_ms: 60_000,
        };
        let (tx, rx) = mpsc::channel(16);
        let dispatcher = Arc::new(CommandDispatcher::new(
            ledger.clone(),
            thresholds,
            CommandTtls::default(),
            tx,
        ));
        Harness {
            receiver: HeartbeatReceiver::new(ledger.clone(), dispatcher.clone(), thresholds),
            dispatcher,
            ledger,
            _outbound: rx,
        }
    }

    fn wire(status: StreamingStatus, camera: Option<&str>) -> Heartbeat {
        Heartbeat {
            streaming_status: status.into(),
            streaming_camera: camera.map(String::from),
            streaming_error: None,
            destination_configured: true,
            cameras: vec![
                CameraInfo::new("main", CameraStatus::Available),
                CameraInfo::new("chase", CameraStatus::Available),
            ],
            uptime_ms: 1,
            last_command_id: None,
        }
    }

    #[test]
    fn test_validation_rejects_malformed_reports() {
        let hb = wire(StreamingStatus::Idle, None);
        assert!(matches!(validate("", &hb, 1), Err(HeartbeatError::EmptyVehicleId)));

        let mut bad_status = hb.clone();
        bad_status.streaming_status = 42;
        assert!(matches!(
            validate("car-1", &bad_status, 1),
            Err(HeartbeatError::InvalidStatus(42))
        ));

        let mut duplicate = hb.clone();
        duplicate.cameras.push(CameraInfo::new("main", CameraStatus::Unavailable));
        assert!(matches!(
            validate("car-1", &duplicate, 1),
            Err(HeartbeatError::DuplicateCamera(name)) if name == "main"
        ));
    }

    #[test]
    fn test_missing_fields_stay_unknown() {
        let hb = wire(StreamingStatus::Idle, None);
        let report = validate("car-1", &hb, 7).unwrap();
        assert!(report.reported_camera.is_none());
        assert!(report.reported_error.is_none());
        assert_eq!(report.received_at_ms, 7);
    }

    #[tokio::test]
    async fn test_first_heartbeat_connects_vehicle() {
        let h = harness();
        let stream = h
            .receiver
            .ingest("car-1", &wire(StreamingStatus::Idle, None), T0)
            .await
            .unwrap();
        assert_eq!(stream.state, StreamState::Idle);
    }

    #[tokio::test]
    async fn test_older_heartbeat_does_not_overwrite_newer() {
        let h = harness();
        h.receiver
            .ingest("car-1", &wire(StreamingStatus::Idle, None), T0 + 100)
            .await
            .unwrap();
        h.receiver
            .ingest("car-1", &wire(StreamingStatus::Starting, None), T0)
            .await
            .unwrap();

        let hb = h.ledger.read("car-1").await.unwrap().heartbeat.unwrap();
        assert_eq!(hb.received_at_ms, T0 + 100);
        assert_eq!(hb.reported_status, StreamingStatus::Idle);
    }

    #[tokio::test]
    async fn test_streaming_vehicle_keeps_state_when_silent() {
        let h = harness();
        h.receiver
            .ingest("car-1", &wire(StreamingStatus::Idle, None), T0)
            .await
            .unwrap();
        h.dispatcher
            .issue_at("car-1", CommandKind::Start, Some("chase".into()), T0 + 10)
            .await
            .unwrap();
        h.receiver
            .ingest("car-1", &wire(StreamingStatus::Live, Some("chase")), T0 + 1_000)
            .await
            .unwrap();

        let swept = h.receiver.sweep_offline(T0 + 1_000 + 120_000).await.unwrap();
        assert!(swept.is_empty());

        let record = h.ledger.read("car-1").await.unwrap();
        assert_eq!(record.stream.state, StreamState::Streaming);
        assert_eq!(record.stream.camera.as_deref(), Some("chase"));
        assert_eq!(
            classify(T0 + 121_000, record.last_heartbeat_at_ms(), &h.receiver.thresholds),
            ConnectionHealth::Offline
        );
    }

    #[tokio::test]
    async fn test_idle_vehicle_disconnects_and_reconnects() {
        let h = harness();
        h.receiver
            .ingest("car-1", &wire(StreamingStatus::Idle, None), T0)
            .await
            .unwrap();

        assert!(h.receiver.sweep_offline(T0 + 59_999).await.unwrap().is_empty());
        assert_eq!(
            h.receiver.sweep_offline(T0 + 60_000).await.unwrap(),
            vec!["car-1".to_string()]
        );
        let record = h.ledger.read("car-1").await.unwrap();
        assert_eq!(record.stream.state, StreamState::Disconnected);

        let stream = h
            .receiver
            .ingest("car-1", &wire(StreamingStatus::Idle, None), T0 + 70_000)
            .await
            .unwrap();
        assert_eq!(stream.state, StreamState::Idle);
    }

    #[tokio::test]
    async fn test_pending_command_is_left_to_expiry() {
        let h = harness();
        h.receiver
            .ingest("car-1", &wire(StreamingStatus::Idle, None), T0)
            .await
            .unwrap();
        h.dispatcher
            .issue_at("car-1", CommandKind::Start, Some("main".into()), T0 + 1)
            .await
            .unwrap();

        // Sweep lags far behind: the command must expire before the vehicle disconnects
        assert!(h.receiver.sweep_offline(T0 + 90_000).await.unwrap().is_empty());
        assert_eq!(h.dispatcher.expire(T0 + 90_000).await.unwrap().len(), 1);
        assert_eq!(
            h.ledger.read("car-1").await.unwrap().stream.state,
            StreamState::Error
        );

        h.receiver.sweep_offline(T0 + 90_001).await.unwrap();
        let record = h.ledger.read("car-1").await.unwrap();
        assert_eq!(record.stream.state, StreamState::Disconnected);
        assert!(record.stream.error_message.is_none());
    }

    #[tokio::test]
    async fn test_device_error_without_command_enters_error() {
        let h = harness();
        h.receiver
            .ingest("car-1", &wire(StreamingStatus::Idle, None), T0)
            .await
            .unwrap();

        let mut failing = wire(StreamingStatus::Error, None);
        failing.streaming_error = Some("rtmp handshake: connection reset by peer".into());
        let stream = h.receiver.ingest("car-1", &failing, T0 + 5_000).await.unwrap();

        assert_eq!(stream.state, StreamState::Error);
        assert_eq!(stream.error_message.as_deref(), Some("stream connection failed"));
    }

    #[tokio::test]
    async fn test_late_error_report_cannot_undo_newer_ack() {
        let h = harness();
        h.receiver
            .ingest("car-1", &wire(StreamingStatus::Idle, None), T0)
            .await
            .unwrap();
        h.dispatcher
            .issue_at("car-1", CommandKind::Start, Some("main".into()), T0 + 10)
            .await
            .unwrap();

        // Read off one uplink but applied only after a newer report from another
        let mut failing = wire(StreamingStatus::Error, None);
        failing.streaming_error = Some("x264enc pipeline failed to preroll".into());
        let late = validate("car-1", &failing, T0 + 2_000).unwrap();

        let stream = h
            .receiver
            .ingest("car-1", &wire(StreamingStatus::Live, Some("main")), T0 + 3_000)
            .await
            .unwrap();
        assert_eq!(stream.state, StreamState::Streaming);

        let outcome = h.dispatcher.acknowledge("car-1", &late).await.unwrap();
        assert_eq!(outcome, Reconciliation::Superseded);

        let stream = h.receiver.ingest("car-1", &failing, T0 + 2_000).await.unwrap();
        assert_eq!(stream.state, StreamState::Streaming);
        assert_eq!(stream.camera.as_deref(), Some("main"));
        assert!(stream.error_message.is_none());

        let record = h.ledger.read("car-1").await.unwrap();
        assert_eq!(record.last_heartbeat_at_ms(), Some(T0 + 3_000));
    }
}
