//! Latest sensor readings pushed through `POST /api/ingest`.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::models::UserContext;
use crate::store::StoreError;

#[derive(Debug, Clone)]
struct Reading {
    value: String,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ContextStore {
    readings: RwLock<BTreeMap<String, Reading>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert every key of `data`. Scalars are stored as their plain text,
    /// nested values as compact JSON. Returns the number of keys written.
    pub fn ingest(
        &self,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut readings = self.readings.write().map_err(|_| StoreError::Poisoned)?;
        for (key, value) in data {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            readings.insert(
                key.clone(),
                Reading {
                    value,
                    updated_at: now,
                },
            );
        }
        tracing::info!(keys = data.len(), "Context readings ingested");
        Ok(data.len())
    }

    /// Context for the next status query; the simulated context until a
    /// sensor has reported.
    pub fn snapshot(&self) -> UserContext {
        let readings = match self.readings.read() {
            Ok(r) => r,
            Err(poisoned) => poisoned.into_inner(),
        };
        if readings.is_empty() {
            return UserContext::simulated();
        }
        let mut ctx = UserContext::from_readings(
            readings
                .iter()
                .map(|(k, r)| (k.as_str(), r.value.as_str())),
        );
        ctx.updated_at = readings.values().map(|r| r.updated_at).max();
        ctx
    }
}
