//! Command dispatcher: admits operator intents, correlates them with device
//! heartbeats and expires the ones nobody confirms.

use crate::config::CommandTtls;
use crate::error::{CommandError, StoreError};
use crate::model::{CommandStatus, DeviceHeartbeat, PendingCommand, VehicleRecord};
use crate::store::VehicleLedger;
use futures::future::join_all;
use racecast_shared::{
    classify, now_ms, state_machine::next_state, CameraStatus, Command, CommandKind,
    ConnectionHealth, ErrorCause, HealthThresholds, StreamEvent,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A command waiting to be written to the vehicle's session
#[derive(Debug, Clone)]
pub struct OutboundCommand {
    pub vehicle_id: String,
    pub command: Command,
}

/// Outcome of reconciling one heartbeat against a vehicle record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Nothing changed
    NoChange,
    /// The heartbeat was sent before the device saw the pending command and
    /// was not used as evidence
    StaleEvidence,
    /// The pending command reached its target
    Acked(String),
    /// The device reported an error; carries the resolved command, if any
    DeviceError(Option<String>),
    /// A newer heartbeat is already stored; nothing was applied
    Superseded,
}

pub struct CommandDispatcher {
    ledger: Arc<VehicleLedger>,
    thresholds: HealthThresholds,
    ttls: CommandTtls,
    outbound: mpsc::Sender<OutboundCommand>,
}

impl CommandDispatcher {
    pub fn new(
        ledger: Arc<VehicleLedger>,
        thresholds: HealthThresholds,
        ttls: CommandTtls,
        outbound: mpsc::Sender<OutboundCommand>,
    ) -> Self {
        Self {
            ledger,
            thresholds,
            ttls,
            outbound,
        }
    }

    /// Accept an operator intent for a vehicle
    pub async fn issue(
        &self,
        vehicle_id: &str,
        kind: CommandKind,
        camera: Option<String>,
    ) -> Result<PendingCommand, CommandError> {
        self.issue_at(vehicle_id, kind, camera, now_ms()).await
    }

    pub async fn issue_at(
        &self,
        vehicle_id: &str,
        kind: CommandKind,
        camera: Option<String>,
        now_ms: u64,
    ) -> Result<PendingCommand, CommandError> {
        let command_id = Uuid::new_v4().to_string();
        let ttl_s = self.ttls.for_kind(kind);

        let issued = self
            .ledger
            .update(vehicle_id, |record| {
                self.admit(record, kind, camera.as_deref(), now_ms)?;

                let cmd = PendingCommand {
                    command_id: command_id.clone(),
                    vehicle_id: vehicle_id.to_string(),
                    kind,
                    camera: if kind.needs_camera() { camera.clone() } else { None },
                    created_at_ms: now_ms,
                    ttl_s,
                    status: CommandStatus::Pending,
                };

                let from = record.stream.state;
                // A switch keeps the old camera until the device confirms
                record.stream.transition(StreamEvent::Issued(kind), None, now_ms);
                record.stream.command_id = Some(command_id.clone());
                record.pending = Some(cmd.clone());

                debug!(vehicle_id, ?from, to = ?record.stream.state, "command admitted");
                Ok::<_, CommandError>(cmd)
            })
            .await?;

        info!(
            vehicle_id,
            command_id = %issued.command_id,
            kind = ?issued.kind,
            camera = ?issued.camera,
            ttl_s = issued.ttl_s,
            "command issued"
        );
        self.deliver(&issued);

        Ok(issued)
    }

    /// Check an intent against the current record without mutating it
    fn admit(
        &self,
        record: &VehicleRecord,
        kind: CommandKind,
        camera: Option<&str>,
        now_ms: u64,
    ) -> Result<(), CommandError> {
        let vehicle_id = record.vehicle_id.as_str();

        let health = classify(now_ms, record.last_heartbeat_at_ms(), &self.thresholds);
        let heartbeat = match (&record.heartbeat, health) {
            (Some(hb), h) if h != ConnectionHealth::Offline => hb,
            _ => return Err(CommandError::DeviceOffline(vehicle_id.to_string())),
        };

        if let Some(pending) = &record.pending {
            return Err(CommandError::CommandInFlight {
                vehicle_id: vehicle_id.to_string(),
                command_id: pending.command_id.clone(),
            });
        }

        if next_state(record.stream.state, StreamEvent::Issued(kind)).is_none() {
            return Err(CommandError::InvalidState {
                kind,
                state: record.stream.state,
            });
        }

        if kind.needs_camera() {
            let camera = camera.ok_or(CommandError::MissingCamera(kind))?;
            let usable = heartbeat.camera(camera).is_some_and(|c| {
                matches!(c.status, CameraStatus::Available | CameraStatus::Active)
            });
            if !usable {
                return Err(CommandError::CameraUnavailable {
                    vehicle_id: vehicle_id.to_string(),
                    camera: camera.to_string(),
                });
            }
        }

        if kind == CommandKind::Start && !heartbeat.destination_configured {
            return Err(CommandError::DestinationNotConfigured(vehicle_id.to_string()));
        }

        Ok(())
    }

    /// Hand the command to the session layer without waiting on the network
    fn deliver(&self, cmd: &PendingCommand) {
        let outbound = OutboundCommand {
            vehicle_id: cmd.vehicle_id.clone(),
            command: cmd.to_wire(),
        };
        if let Err(e) = self.outbound.try_send(outbound) {
            // The command stays pending and will expire if never delivered
            warn!(
                vehicle_id = %cmd.vehicle_id,
                command_id = %cmd.command_id,
                "could not queue command for delivery: {}",
                e
            );
        }
    }

    /// Store a validated heartbeat and reconcile it with the pending command.
    ///
    /// The upsert, the first-heartbeat transition and the reconciliation run
    /// inside one per-vehicle update, so a heartbeat older than the stored one
    /// can never act on state a newer one already settled.
    pub async fn acknowledge(
        &self,
        vehicle_id: &str,
        heartbeat: &DeviceHeartbeat,
    ) -> Result<Reconciliation, StoreError> {
        let (connected, outcome) = self
            .ledger
            .update(vehicle_id, |record| {
                if Self::is_superseded(record, heartbeat) {
                    return Ok::<_, StoreError>((false, Reconciliation::Superseded));
                }
                record.heartbeat = Some(heartbeat.clone());

                let connected = record
                    .stream
                    .transition(StreamEvent::HeartbeatReceived, None, heartbeat.received_at_ms)
                    .is_some();
                Ok((connected, Self::reconcile(record, heartbeat)))
            })
            .await?;

        if connected {
            info!(vehicle_id, "vehicle connected");
        }
        match &outcome {
            Reconciliation::Acked(command_id) => {
                info!(vehicle_id, %command_id, "command acknowledged by heartbeat");
            }
            Reconciliation::DeviceError(command_id) => {
                warn!(vehicle_id, ?command_id, "device reported a streaming error");
            }
            Reconciliation::StaleEvidence => {
                debug!(vehicle_id, "heartbeat predates pending command, ignored for ack");
            }
            Reconciliation::Superseded => {
                debug!(
                    vehicle_id,
                    received_at_ms = heartbeat.received_at_ms,
                    "out-of-order heartbeat dropped"
                );
            }
            Reconciliation::NoChange => {}
        }

        Ok(outcome)
    }

    fn is_superseded(record: &VehicleRecord, heartbeat: &DeviceHeartbeat) -> bool {
        record
            .last_heartbeat_at_ms()
            .is_some_and(|last| last > heartbeat.received_at_ms)
    }

    fn reconcile(record: &mut VehicleRecord, heartbeat: &DeviceHeartbeat) -> Reconciliation {
        if Self::is_superseded(record, heartbeat) {
            return Reconciliation::Superseded;
        }
        let now = heartbeat.received_at_ms;

        let Some(pending) = record.pending.clone() else {
            // No intent in flight: only a reported failure moves the state
            if heartbeat.reports_error() && record.stream.diverges_from(heartbeat) {
                let cause = Self::error_cause(heartbeat);
                if record.stream.transition(StreamEvent::DeviceError, Some(cause), now).is_some() {
                    return Reconciliation::DeviceError(None);
                }
            }
            return Reconciliation::NoChange;
        };

        if pending.predates(heartbeat) {
            return Reconciliation::StaleEvidence;
        }

        if heartbeat.reports_error() {
            let cause = Self::error_cause(heartbeat);
            record.stream.transition(StreamEvent::DeviceError, Some(cause), now);
            record.resolve_pending(CommandStatus::Failed);
            return Reconciliation::DeviceError(Some(pending.command_id));
        }

        if !record.stream.diverges_from(heartbeat) || !pending.is_satisfied_by(heartbeat) {
            return Reconciliation::NoChange;
        }

        record
            .stream
            .transition(StreamEvent::Acknowledged(pending.kind), None, now);
        if pending.kind.needs_camera() {
            record.stream.camera = pending.camera.clone();
        }
        record.resolve_pending(CommandStatus::Acked);

        Reconciliation::Acked(pending.command_id)
    }

    fn error_cause(heartbeat: &DeviceHeartbeat) -> ErrorCause {
        heartbeat
            .reported_error
            .as_deref()
            .map_or(ErrorCause::Unknown, ErrorCause::classify)
    }

    /// Expire every pending command past its TTL. Returns the expired IDs.
    pub async fn expire(&self, now_ms: u64) -> Result<Vec<String>, StoreError> {
        let ids = self.ledger.vehicle_ids().await?;
        let results = join_all(ids.iter().map(|id| self.expire_vehicle(id, now_ms))).await;

        let mut expired = Vec::new();
        for result in results {
            if let Some(command_id) = result? {
                expired.push(command_id);
            }
        }
        Ok(expired)
    }

    async fn expire_vehicle(
        &self,
        vehicle_id: &str,
        now_ms: u64,
    ) -> Result<Option<String>, StoreError> {
        let expired = self
            .ledger
            .update(vehicle_id, |record| {
                let Some(pending) = &record.pending else {
                    return Ok::<_, StoreError>(None);
                };
                if !pending.is_overdue(now_ms) {
                    return Ok(None);
                }

                let command_id = pending.command_id.clone();
                record.stream.transition(
                    StreamEvent::CommandTimedOut,
                    Some(ErrorCause::Timeout),
                    now_ms,
                );
                record.resolve_pending(CommandStatus::Expired);
                Ok(Some(command_id))
            })
            .await?;

        if let Some(command_id) = &expired {
            warn!(vehicle_id, %command_id, "command expired without acknowledgement");
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CameraEntry;
    use crate::store::MemoryStore;
    use racecast_shared::{StreamState, StreamingStatus, RESTART_LIMIT_MARKER};

    const T0: u64 = 1_000_000;

    struct Harness {
        ledger: Arc<VehicleLedger>,
        dispatcher: CommandDispatcher,
        outbound: mpsc::Receiver<OutboundCommand>,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(VehicleLedger::new(Arc::new(MemoryStore::new())));
        let (tx, rx) = mpsc::channel(16);
        let dispatcher = CommandDispatcher::new(
            ledger.clone(),
            HealthThresholds {
                fresh_ms: 15_000,
                offline_ms: 60_000,
            },
            CommandTtls::default(),
            tx,
        );
        Harness {
            ledger,
            dispatcher,
            outbound: rx,
        }
    }

    fn heartbeat(at: u64, status: StreamingStatus, camera: Option<&str>) -> DeviceHeartbeat {
        DeviceHeartbeat {
            vehicle_id: "car-9".into(),
            received_at_ms: at,
            reported_status: status,
            reported_camera: camera.map(String::from),
            reported_error: None,
            camera_inventory: vec![
                CameraEntry {
                    name: "main".into(),
                    status: CameraStatus::Available,
                },
                CameraEntry {
                    name: "cockpit".into(),
                    status: CameraStatus::Available,
                },
                CameraEntry {
                    name: "rear".into(),
                    status: CameraStatus::Unavailable,
                },
            ],
            destination_configured: true,
            last_command_id: None,
        }
    }

    async fn deliver(h: &Harness, hb: DeviceHeartbeat) -> Reconciliation {
        h.dispatcher.acknowledge("car-9", &hb).await.unwrap()
    }

    async fn state(h: &Harness) -> VehicleRecord {
        h.ledger.read("car-9").await.unwrap()
    }

    #[tokio::test]
    async fn test_never_seen_vehicle_is_offline() {
        let h = harness();
        let err = h
            .dispatcher
            .issue_at("car-9", CommandKind::Start, Some("main".into()), T0)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::DeviceOffline(_)));
        assert_eq!(state(&h).await.stream.state, StreamState::Disconnected);
    }

    #[tokio::test]
    async fn test_start_then_live_heartbeat_streams() {
        let mut h = harness();
        deliver(&h, heartbeat(T0, StreamingStatus::Idle, None)).await;

        let cmd = h
            .dispatcher
            .issue_at("car-9", CommandKind::Start, Some("main".into()), T0 + 10)
            .await
            .unwrap();
        assert_eq!(cmd.ttl_s, 30);
        assert_eq!(state(&h).await.stream.state, StreamState::Starting);

        let sent = h.outbound.try_recv().expect("command queued for delivery");
        assert_eq!(sent.command.command_id, cmd.command_id);

        let outcome = deliver(&h, heartbeat(T0 + 2_000, StreamingStatus::Live, Some("main"))).await;
        assert_eq!(outcome, Reconciliation::Acked(cmd.command_id.clone()));

        let record = state(&h).await;
        assert_eq!(record.stream.state, StreamState::Streaming);
        assert_eq!(record.stream.camera.as_deref(), Some("main"));
        assert_eq!(record.stream.command_id.as_deref(), Some(cmd.command_id.as_str()));
        assert!(record.pending.is_none());
        assert_eq!(record.last_command.unwrap().status, CommandStatus::Acked);
    }

    #[tokio::test]
    async fn test_unknown_camera_is_rejected_without_side_effects() {
        let h = harness();
        deliver(&h, heartbeat(T0, StreamingStatus::Idle, None)).await;
        let before = state(&h).await;

        for camera in ["roof", "rear"] {
            let err = h
                .dispatcher
                .issue_at("car-9", CommandKind::Start, Some(camera.into()), T0 + 10)
                .await
                .unwrap_err();
            assert!(matches!(err, CommandError::CameraUnavailable { .. }), "{camera}");
        }
        assert_eq!(state(&h).await, before);
    }

    #[tokio::test]
    async fn test_second_command_is_rejected_while_one_is_in_flight() {
        let h = harness();
        deliver(&h, heartbeat(T0, StreamingStatus::Idle, None)).await;
        h.dispatcher
            .issue_at("car-9", CommandKind::Start, Some("main".into()), T0 + 10)
            .await
            .unwrap();

        let err = h
            .dispatcher
            .issue_at("car-9", CommandKind::Stop, None, T0 + 20)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::CommandInFlight { .. }));

        let err = h
            .dispatcher
            .issue_at("car-9", CommandKind::SwitchCamera, Some("cockpit".into()), T0 + 30)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::CommandInFlight { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_issues_admit_exactly_one() {
        let h = harness();
        deliver(&h, heartbeat(T0, StreamingStatus::Idle, None)).await;
        let dispatcher = Arc::new(h.dispatcher);

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let d = dispatcher.clone();
                tokio::spawn(async move {
                    d.issue_at("car-9", CommandKind::Start, Some("main".into()), T0 + 5)
                        .await
                })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(CommandError::CommandInFlight { .. }) => {}
                Err(e) => panic!("unexpected rejection: {e}"),
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn test_stale_heartbeat_cannot_ack_newer_command() {
        let h = harness();
        deliver(&h, heartbeat(T0, StreamingStatus::Idle, None)).await;
        h.dispatcher
            .issue_at("car-9", CommandKind::Start, Some("main".into()), T0 + 1_000)
            .await
            .unwrap();

        let late = heartbeat(T0 + 500, StreamingStatus::Live, Some("main"));
        let outcome = h.dispatcher.acknowledge("car-9", &late).await.unwrap();
        assert_eq!(outcome, Reconciliation::StaleEvidence);
        assert_eq!(state(&h).await.stream.state, StreamState::Starting);
    }

    #[tokio::test]
    async fn test_expiry_fires_exactly_once() {
        let h = harness();
        deliver(&h, heartbeat(T0, StreamingStatus::Idle, None)).await;
        let cmd = h
            .dispatcher
            .issue_at("car-9", CommandKind::Start, Some("main".into()), T0)
            .await
            .unwrap();

        assert!(h.dispatcher.expire(T0 + 30_000).await.unwrap().is_empty());
        assert_eq!(h.dispatcher.expire(T0 + 30_001).await.unwrap(), vec![cmd.command_id]);

        let record = state(&h).await;
        assert_eq!(record.stream.state, StreamState::Error);
        assert_eq!(
            record.stream.error_message.as_deref(),
            Some("device did not respond in time")
        );
        let updated_at = record.stream.updated_at_ms;

        for later in [T0 + 31_000, T0 + 90_000] {
            assert!(h.dispatcher.expire(later).await.unwrap().is_empty());
        }
        let record = state(&h).await;
        assert_eq!(record.stream.updated_at_ms, updated_at);
        assert_eq!(record.last_command.unwrap().status, CommandStatus::Expired);
    }

    #[tokio::test]
    async fn test_switch_camera_stays_streaming() {
        let h = harness();
        deliver(&h, heartbeat(T0, StreamingStatus::Idle, None)).await;
        h.dispatcher
            .issue_at("car-9", CommandKind::Start, Some("main".into()), T0 + 1)
            .await
            .unwrap();
        deliver(&h, heartbeat(T0 + 100, StreamingStatus::Live, Some("main"))).await;

        let switch = h
            .dispatcher
            .issue_at("car-9", CommandKind::SwitchCamera, Some("cockpit".into()), T0 + 200)
            .await
            .unwrap();
        assert_eq!(switch.ttl_s, 15);

        let record = state(&h).await;
        assert_eq!(record.stream.state, StreamState::Streaming);
        assert_eq!(record.stream.camera.as_deref(), Some("main"));

        // Still on the old camera: not an ack
        let outcome = deliver(&h, heartbeat(T0 + 300, StreamingStatus::Live, Some("main"))).await;
        assert_eq!(outcome, Reconciliation::NoChange);

        deliver(&h, heartbeat(T0 + 400, StreamingStatus::Live, Some("cockpit"))).await;
        let record = state(&h).await;
        assert_eq!(record.stream.state, StreamState::Streaming);
        assert_eq!(record.stream.camera.as_deref(), Some("cockpit"));
        assert!(record.pending.is_none());
    }

    #[tokio::test]
    async fn test_stop_returns_to_idle() {
        let h = harness();
        deliver(&h, heartbeat(T0, StreamingStatus::Idle, None)).await;
        h.dispatcher
            .issue_at("car-9", CommandKind::Start, Some("main".into()), T0 + 1)
            .await
            .unwrap();
        deliver(&h, heartbeat(T0 + 100, StreamingStatus::Live, Some("main"))).await;

        let err = h
            .dispatcher
            .issue_at("car-9", CommandKind::Start, Some("main".into()), T0 + 150)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidState { .. }));

        h.dispatcher
            .issue_at("car-9", CommandKind::Stop, None, T0 + 200)
            .await
            .unwrap();
        assert_eq!(state(&h).await.stream.state, StreamState::Stopping);

        deliver(&h, heartbeat(T0 + 300, StreamingStatus::Idle, None)).await;
        let record = state(&h).await;
        assert_eq!(record.stream.state, StreamState::Idle);
        assert!(record.stream.camera.is_none());
    }

    #[tokio::test]
    async fn test_restart_limit_needs_operator_start() {
        let h = harness();
        deliver(&h, heartbeat(T0, StreamingStatus::Idle, None)).await;
        let cmd = h
            .dispatcher
            .issue_at("car-9", CommandKind::Start, Some("main".into()), T0 + 1)
            .await
            .unwrap();

        let mut crashed = heartbeat(T0 + 5_000, StreamingStatus::Error, None);
        crashed.reported_error = Some(format!("{RESTART_LIMIT_MARKER}: 3 failures in 60s"));
        let outcome = deliver(&h, crashed.clone()).await;
        assert_eq!(outcome, Reconciliation::DeviceError(Some(cmd.command_id)));

        let record = state(&h).await;
        assert_eq!(record.stream.state, StreamState::Error);
        assert_eq!(
            record.stream.error_message.as_deref(),
            Some(ErrorCause::RestartLimit.user_message())
        );
        assert!(record.pending.is_none());

        // Repeating heartbeats neither retry nor re-translate
        crashed.received_at_ms = T0 + 10_000;
        assert_eq!(deliver(&h, crashed).await, Reconciliation::NoChange);
        assert!(h.dispatcher.expire(T0 + 120_000).await.unwrap().is_empty());

        h.dispatcher
            .issue_at("car-9", CommandKind::Start, Some("main".into()), T0 + 20_000)
            .await
            .unwrap();
        let record = state(&h).await;
        assert_eq!(record.stream.state, StreamState::Starting);
        assert!(record.stream.error_message.is_none());
    }

    #[tokio::test]
    async fn test_start_requires_camera_and_destination() {
        let h = harness();
        let mut hb = heartbeat(T0, StreamingStatus::Idle, None);
        hb.destination_configured = false;
        deliver(&h, hb).await;

        let err = h
            .dispatcher
            .issue_at("car-9", CommandKind::Start, None, T0 + 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::MissingCamera(CommandKind::Start)));

        let err = h
            .dispatcher
            .issue_at("car-9", CommandKind::Start, Some("main".into()), T0 + 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::DestinationNotConfigured(_)));
    }

    #[tokio::test]
    async fn test_stale_vehicle_still_accepts_commands() {
        let h = harness();
        deliver(&h, heartbeat(T0, StreamingStatus::Idle, None)).await;
        assert!(h
            .dispatcher
            .issue_at("car-9", CommandKind::Start, Some("main".into()), T0 + 30_000)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_error_sent_before_recovery_start_is_stale() {
        let h = harness();
        deliver(&h, heartbeat(T0, StreamingStatus::Idle, None)).await;
        let first = h
            .dispatcher
            .issue_at("car-9", CommandKind::Start, Some("main".into()), T0 + 1)
            .await
            .unwrap();

        let mut crashed = heartbeat(T0 + 5_000, StreamingStatus::Error, None);
        crashed.reported_error = Some(format!("{RESTART_LIMIT_MARKER}: 3 failures in 60s"));
        crashed.last_command_id = Some(first.command_id.clone());
        deliver(&h, crashed.clone()).await;
        assert_eq!(state(&h).await.stream.state, StreamState::Error);

        let retry = h
            .dispatcher
            .issue_at("car-9", CommandKind::Start, Some("main".into()), T0 + 20_000)
            .await
            .unwrap();

        // Still in flight when the retry was issued, so it names the old command
        crashed.received_at_ms = T0 + 20_500;
        assert_eq!(deliver(&h, crashed).await, Reconciliation::StaleEvidence);
        let record = state(&h).await;
        assert_eq!(record.stream.state, StreamState::Starting);
        assert_eq!(record.pending.unwrap().command_id, retry.command_id);

        let mut live = heartbeat(T0 + 21_000, StreamingStatus::Live, Some("main"));
        live.last_command_id = Some(retry.command_id.clone());
        assert_eq!(deliver(&h, live).await, Reconciliation::Acked(retry.command_id));
        assert_eq!(state(&h).await.stream.state, StreamState::Streaming);
    }

    #[test]
    fn test_reconcile_ignores_report_older_than_stored() {
        let mut record = VehicleRecord::new("car-9");
        record.heartbeat = Some(heartbeat(T0 + 3_000, StreamingStatus::Live, Some("main")));

        let mut older = heartbeat(T0 + 2_000, StreamingStatus::Error, None);
        older.reported_error = Some("encoder crashed".into());
        let before = record.clone();
        assert_eq!(
            CommandDispatcher::reconcile(&mut record, &older),
            Reconciliation::Superseded
        );
        assert_eq!(record, before);
    }
}
