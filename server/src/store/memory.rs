//! In-process store backend

use super::{Versioned, VehicleStore};
use crate::error::StoreError;
use crate::model::VehicleRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Versioned<VehicleRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VehicleStore for MemoryStore {
    async fn load(&self, vehicle_id: &str) -> Result<Option<Versioned<VehicleRecord>>, StoreError> {
        Ok(self.records.read().await.get(vehicle_id).cloned())
    }

    async fn compare_and_swap(
        &self,
        vehicle_id: &str,
        expected: Option<u64>,
        record: VehicleRecord,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let current = records.get(vehicle_id).map(|v| v.version);

        if current != expected {
            return Ok(false);
        }

        let version = current.map_or(1, |v| v + 1);
        records.insert(
            vehicle_id.to_string(),
            Versioned {
                version,
                value: record,
            },
        );
        Ok(true)
    }

    async fn vehicle_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.records.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
