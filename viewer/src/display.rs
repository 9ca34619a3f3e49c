use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// What one tile of the dashboard grid currently shows.
#[derive(Debug, Clone)]
pub enum Slot {
    /// Placeholder shown before the first frame and after any fetch error.
    NoSignal,
    Live {
        frame: Bytes,
        received_at: DateTime<Utc>,
    },
}

/// In-memory stand-in for the dashboard grid: one slot per agent,
/// flipped between live and "no signal" by the feed tasks.
pub struct DisplayGrid {
    slots: Mutex<HashMap<String, Slot>>,
}

impl DisplayGrid {
    pub fn new(roster: &[String]) -> Self {
        let slots = roster
            .iter()
            .map(|id| (id.clone(), Slot::NoSignal))
            .collect();
        Self {
            slots: Mutex::new(slots),
        }
    }

    pub fn update_live(&self, agent_id: &str, frame: Bytes) {
        let mut slots = self.lock();
        let slot = slots.entry(agent_id.to_string()).or_insert(Slot::NoSignal);
        if matches!(slot, Slot::NoSignal) {
            info!(agent_id, bytes = frame.len(), "signal acquired");
        } else {
            debug!(agent_id, bytes = frame.len(), "frame updated");
        }
        *slot = Slot::Live {
            frame,
            received_at: Utc::now(),
        };
    }

    pub fn mark_no_signal(&self, agent_id: &str) {
        let mut slots = self.lock();
        let slot = slots.entry(agent_id.to_string()).or_insert(Slot::NoSignal);
        if matches!(slot, Slot::Live { .. }) {
            warn!(agent_id, "signal lost, showing placeholder");
        }
        *slot = Slot::NoSignal;
    }

    pub fn latest_frame(&self, agent_id: &str) -> Option<Bytes> {
        match self.lock().get(agent_id) {
            Some(Slot::Live { frame, .. }) => Some(frame.clone()),
            _ => None,
        }
    }

    /// (live, total) tile counts for the periodic summary line.
    pub fn counts(&self) -> (usize, usize) {
        let slots = self.lock();
        let live = slots
            .values()
            .filter(|slot| matches!(slot, Slot::Live { .. }))
            .count();
        (live, slots.len())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}
