//! Keyed vehicle store
//!
//! Backends only promise atomic per-key compare-and-swap. [`VehicleLedger`]
//! builds the single-writer discipline on top: a FIFO lock per vehicle keeps
//! receipt order within this instance, and the CAS retry loop makes several
//! instances sharing one backend converge without lost updates.

mod memory;

pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::model::VehicleRecord;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Attempts before an update gives up on a contended key
const MAX_CAS_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

#[async_trait]
pub trait VehicleStore: Send + Sync {
    async fn load(&self, vehicle_id: &str) -> Result<Option<Versioned<VehicleRecord>>, StoreError>;

    /// Write `record` only if the stored version still equals `expected`
    /// (`None` meaning "absent"). Returns whether the write happened.
    async fn compare_and_swap(
        &self,
        vehicle_id: &str,
        expected: Option<u64>,
        record: VehicleRecord,
    ) -> Result<bool, StoreError>;

    async fn vehicle_ids(&self) -> Result<Vec<String>, StoreError>;
}

pub struct VehicleLedger {
    store: Arc<dyn VehicleStore>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl VehicleLedger {
    pub fn new(store: Arc<dyn VehicleStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Current record, or a fresh DISCONNECTED one for a vehicle never stored
    pub async fn read(&self, vehicle_id: &str) -> Result<VehicleRecord, StoreError> {
        Ok(self
            .store
            .load(vehicle_id)
            .await?
            .map(|v| v.value)
            .unwrap_or_else(|| VehicleRecord::new(vehicle_id)))
    }

    pub async fn vehicle_ids(&self) -> Result<Vec<String>, StoreError> {
        self.store.vehicle_ids().await
    }

    /// Atomically apply `apply` to one vehicle's record.
    ///
    /// `apply` may run more than once if another writer wins the race, so it
    /// must be a pure function of the record it is handed. An `Err` from
    /// `apply` aborts without writing; an unchanged record is not written.
    pub async fn update<T, E, F>(&self, vehicle_id: &str, mut apply: F) -> Result<T, E>
    where
        F: FnMut(&mut VehicleRecord) -> Result<T, E> + Send,
        T: Send,
        E: From<StoreError>,
    {
        let lock = self.lock_for(vehicle_id);
        let _guard = lock.lock().await;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let (expected, current) = match self.store.load(vehicle_id).await? {
                Some(v) => (Some(v.version), v.value),
                None => (None, VehicleRecord::new(vehicle_id)),
            };

            let mut next = current.clone();
            let out = apply(&mut next)?;
            if next == current {
                return Ok(out);
            }

            if self.store.compare_and_swap(vehicle_id, expected, next).await? {
                return Ok(out);
            }
            debug!(vehicle_id, attempt, "concurrent write detected, retrying");
        }

        Err(StoreError::Contention {
            vehicle_id: vehicle_id.to_string(),
            attempts: MAX_CAS_ATTEMPTS,
        }
        .into())
    }

    fn lock_for(&self, vehicle_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(vehicle_id.to_string())
            .or_default()
            .clone()
    }
}
