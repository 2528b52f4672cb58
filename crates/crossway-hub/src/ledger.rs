//! In-memory causal ledger
//!
//! Append-only. Readers get copies sorted by Lamport stamp, raw entries last.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use parking_lot::Mutex;

use crossway_core::{CausalEvent, CrosswayResult};

#[derive(Debug, Default)]
struct Inner {
    events: Vec<CausalEvent>,
    /// Vehicle id -> positions in `events`
    by_vehicle: HashMap<String, Vec<usize>>,
}

#[derive(Debug, Default)]
pub struct EventLedger {
    inner: Mutex<Inner>,
}

impl EventLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, event: CausalEvent) {
        let mut inner = self.inner.lock();
        let pos = inner.events.len();
        if let Some(vehicle) = &event.vehicle_id {
            inner.by_vehicle.entry(vehicle.clone()).or_default().push(pos);
        }
        inner.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every event ordered by stamp; ties keep arrival order
    pub fn snapshot(&self) -> Vec<CausalEvent> {
        let mut events = self.inner.lock().events.clone();
        events.sort_by_key(|e| e.seq);
        events
    }

    /// Events mentioning `vehicle_id`, ordered by stamp
    pub fn history(&self, vehicle_id: &str) -> Vec<CausalEvent> {
        let mut events: Vec<CausalEvent> = {
            let inner = self.inner.lock();
            inner
                .by_vehicle
                .get(vehicle_id)
                .map(|positions| positions.iter().map(|&i| inner.events[i].clone()).collect())
                .unwrap_or_default()
        };
        events.sort_by_key(|e| e.seq);
        events
    }

    /// Write the ordered ledger as a JSON array
    pub fn export_json(&self, path: &Path) -> CrosswayResult<usize> {
        let events = self.snapshot();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(&events)?)?;
        tracing::info!(path = %path.display(), events = events.len(), "ledger exported");
        Ok(events.len())
    }
}
