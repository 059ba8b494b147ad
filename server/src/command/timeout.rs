//! Periodic sweeps for overdue commands and silent vehicles

use super::dispatcher::CommandDispatcher;
use crate::heartbeat::HeartbeatReceiver;
use racecast_shared::now_ms;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error};

/// Drives command expiry and the offline sweep on a fixed tick
pub struct TimeoutTracker {
    dispatcher: Arc<CommandDispatcher>,
    receiver: Arc<HeartbeatReceiver>,
    check_interval: Duration,
}

impl TimeoutTracker {
    pub fn new(
        dispatcher: Arc<CommandDispatcher>,
        receiver: Arc<HeartbeatReceiver>,
        check_interval: Duration,
    ) -> Self {
        Self {
            dispatcher,
            receiver,
            check_interval,
        }
    }

    /// Start the sweep loop
    pub async fn run(&self) {
        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.sweep(now_ms()).await;
        }
    }

    /// One pass. Expiry runs first so a vehicle that went silent mid-command
    /// ends in ERROR before it can be marked DISCONNECTED.
    pub async fn sweep(&self, now_ms: u64) {
        match self.dispatcher.expire(now_ms).await {
            Ok(expired) if !expired.is_empty() => {
                debug!(count = expired.len(), "expired pending commands");
            }
            Ok(_) => {}
            Err(e) => error!("command expiry sweep failed: {}", e),
        }

        match self.receiver.sweep_offline(now_ms).await {
            Ok(offline) if !offline.is_empty() => {
                debug!(vehicles = ?offline, "marked vehicles disconnected");
            }
            Ok(_) => {}
            Err(e) => error!("offline sweep failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommandTtls;
    use crate::store::{MemoryStore, VehicleLedger};
    use racecast_shared::{
        CameraInfo, CameraStatus, CommandKind, HealthThresholds, Heartbeat, StreamState,
        StreamingStatus,
    };
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_sweep_expires_before_disconnecting() {
        let ledger = Arc::new(VehicleLedger::new(Arc::new(MemoryStore::new())));
        let thresholds = HealthThresholds::default();
        let (tx, _rx) = mpsc::channel(4);
        let dispatcher = Arc::new(CommandDispatcher::new(
            ledger.clone(),
            thresholds,
            CommandTtls::default(),
            tx,
        ));
        let receiver = Arc::new(HeartbeatReceiver::new(
            ledger.clone(),
            dispatcher.clone(),
            thresholds,
        ));
        let tracker = TimeoutTracker::new(dispatcher.clone(), receiver.clone(), Duration::from_secs(1));

        let hb = Heartbeat {
            streaming_status: StreamingStatus::Idle.into(),
            destination_configured: true,
            cameras: vec![CameraInfo::new("main", CameraStatus::Available)],
            ..Default::default()
        };
        receiver.ingest("car-2", &hb, 1_000).await.unwrap();
        dispatcher
            .issue_at("car-2", CommandKind::Start, Some("main".into()), 2_000)
            .await
            .unwrap();

        // One late sweep covers both the TTL and the offline threshold
        tracker.sweep(200_000).await;
        let record = ledger.read("car-2").await.unwrap();
        assert!(record.pending.is_none());
        assert_eq!(record.stream.state, StreamState::Disconnected);
        assert_eq!(
            record.last_command.map(|c| c.status),
            Some(crate::model::CommandStatus::Expired)
        );
    }
}
