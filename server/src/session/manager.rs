//! Session manager for tracking all connected vehicles

use super::connection::SessionHandle;
use anyhow::{anyhow, Result};
use racecast_shared::{Command, Envelope};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Maps each vehicle to its most recent connection
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    sequence: AtomicU64,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session, replacing any older connection of the same vehicle
    pub async fn register(&self, handle: SessionHandle) {
        if handle.device_id.is_empty() {
            return;
        }
        self.sessions
            .write()
            .await
            .insert(handle.device_id.clone(), handle);
    }

    /// Remove a session, unless the vehicle has already reconnected on a newer one
    pub async fn unregister(&self, handle: &SessionHandle) {
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(&handle.device_id)
            .is_some_and(|current| current.session_id == handle.session_id)
        {
            sessions.remove(&handle.device_id);
        }
    }

    pub async fn get(&self, device_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(device_id).cloned()
    }

    /// Write a command to a vehicle's current connection
    pub async fn send_to(&self, device_id: &str, command: Command) -> Result<()> {
        let handle = self
            .get(device_id)
            .await
            .ok_or_else(|| anyhow!("vehicle not connected: {}", device_id))?;
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        handle.send(&Envelope::command(seq, command)).await
    }

    pub async fn connected_devices(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
