use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::Utc;

use crate::models::{HistoryEntry, StatusOutcome};

/// Bounded log of past analyses, oldest first.
#[derive(Debug)]
pub struct HistoryLog {
    capacity: usize,
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl HistoryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn record(&self, outcome: &StatusOutcome) {
        let result = outcome.result();
        let entry = HistoryEntry {
            recorded_at: Utc::now(),
            score: result.score.clone(),
            insight: result.insight.clone(),
            degraded: outcome.is_degraded(),
        };
        let mut entries = match self.entries.lock() {
            Ok(e) => e,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Up to `limit` most recent entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        let entries = match self.entries.lock() {
            Ok(e) => e,
            Err(poisoned) => poisoned.into_inner(),
        };
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

}
