use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use swarm_relay_common::telemetry::Telemetry;
use tracing::debug;

/// Central store of the latest frame per agent plus the shared broadcast
/// slot, guarded as one unit so a mode toggle and a frame write never
/// interleave on the underlying map.
///
/// Not a process global: each instance is independent, callers share it
/// behind an `Arc`.
pub struct FrameBuffer {
    inner: Mutex<Inner>,
}

struct Inner {
    frames: HashMap<String, Bytes>,
    telemetry: HashMap<String, Telemetry>,
    broadcast_frame: Option<Bytes>,
    broadcast_enabled: bool,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                frames: HashMap::new(),
                telemetry: HashMap::new(),
                broadcast_frame: None,
                broadcast_enabled: false,
            }),
        }
    }

    /// Set the global broadcast flag. The broadcast slot is cleared in both
    /// directions, so the next upload after a toggle repopulates it; a
    /// repeated call with the same value is a harmless wasted clear.
    pub fn set_mode(&self, enabled: bool) {
        let mut inner = self.lock();
        inner.broadcast_enabled = enabled;
        inner.broadcast_frame = None;
        debug!(enabled, "broadcast mode set, shared slot cleared");
    }

    pub fn get_mode(&self) -> bool {
        self.lock().broadcast_enabled
    }

    /// Overwrite the per-agent entry unconditionally; any payload is
    /// accepted, including empty. With broadcast enabled the shared slot is
    /// overwritten with the same bytes.
    pub fn put_frame(&self, agent_id: &str, frame: Bytes) {
        let mut inner = self.lock();
        if inner.broadcast_enabled {
            inner.broadcast_frame = Some(frame.clone());
        }
        inner.frames.insert(agent_id.to_string(), frame);
    }

    /// Latest frame for an agent. With broadcast enabled the shared slot is
    /// preferred when populated, falling back to the per-agent entry.
    /// `None` is a normal transient (nothing uploaded yet), not an error.
    pub fn get_frame(&self, agent_id: &str) -> Option<Bytes> {
        let inner = self.lock();
        if inner.broadcast_enabled {
            if let Some(frame) = &inner.broadcast_frame {
                return Some(frame.clone());
            }
        }
        inner.frames.get(agent_id).cloned()
    }

    pub fn put_telemetry(&self, agent_id: &str, telemetry: Telemetry) {
        self.lock().telemetry.insert(agent_id.to_string(), telemetry);
    }

    pub fn get_telemetry(&self, agent_id: &str) -> Option<Telemetry> {
        self.lock().telemetry.get(agent_id).cloned()
    }

    /// Number of agents that have uploaded at least one frame.
    pub fn agents_connected(&self) -> usize {
        self.lock().frames.len()
    }

    /// True when broadcast mode is on and the shared slot is populated.
    pub fn broadcast_active(&self) -> bool {
        let inner = self.lock();
        inner.broadcast_enabled && inner.broadcast_frame.is_some()
    }

    /// Sorted ids of agents that have uploaded at least one frame.
    pub fn roster(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().frames.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-update; the buffer holds no
        // invariants a half-written frame map can break, so keep serving.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(byte: u8) -> Bytes {
        Bytes::from(vec![byte; 16])
    }

    #[test]
    fn absent_before_first_upload() {
        let buffer = FrameBuffer::new();
        assert!(buffer.get_frame("drone_1").is_none());
        assert_eq!(buffer.agents_connected(), 0);
    }

    #[test]
    fn independent_entries_per_agent() {
        let buffer = FrameBuffer::new();
        let x = frame(0x0A);
        let y = frame(0x0B);
        buffer.put_frame("drone_1", x.clone());
        buffer.put_frame("drone_2", y.clone());

        assert_eq!(buffer.get_frame("drone_1").unwrap(), x);
        assert_eq!(buffer.get_frame("drone_2").unwrap(), y);
        assert!(buffer.get_frame("drone_3").is_none());
        assert_eq!(buffer.agents_connected(), 2);
    }

    #[test]
    fn upload_overwrites_previous_entry() {
        let buffer = FrameBuffer::new();
        buffer.put_frame("drone_1", frame(0x01));
        buffer.put_frame("drone_1", frame(0x02));
        assert_eq!(buffer.get_frame("drone_1").unwrap(), frame(0x02));
        assert_eq!(buffer.agents_connected(), 1);
    }

    #[test]
    fn set_mode_is_idempotent() {
        let buffer = FrameBuffer::new();
        buffer.set_mode(true);
        buffer.put_frame("drone_1", frame(0x01));
        assert!(buffer.broadcast_active());

        // Same value again still clears the shared slot
        buffer.set_mode(true);
        assert!(buffer.get_mode());
        assert!(!buffer.broadcast_active());
    }

    #[test]
    fn broadcast_overrides_all_agents() {
        let buffer = FrameBuffer::new();
        buffer.put_frame("drone_1", frame(0x0A));
        buffer.set_mode(true);

        let z = frame(0x0C);
        buffer.put_frame("drone_3", z.clone());

        // Any agent's upload is now what everyone sees
        assert_eq!(buffer.get_frame("drone_1").unwrap(), z);
        assert_eq!(buffer.get_frame("drone_3").unwrap(), z);
        assert_eq!(buffer.get_frame("never_uploaded").unwrap(), z);
    }

    #[test]
    fn enabled_mode_without_broadcast_falls_back_to_per_agent() {
        let buffer = FrameBuffer::new();
        let x = frame(0x0A);
        buffer.put_frame("drone_1", x.clone());
        buffer.set_mode(true);

        // Shared slot is empty until the next upload
        assert_eq!(buffer.get_frame("drone_1").unwrap(), x);
        assert!(buffer.get_frame("drone_2").is_none());
    }

    #[test]
    fn toggle_roundtrip_preserves_per_agent_entries() {
        let buffer = FrameBuffer::new();
        let x = frame(0x0A);
        let y = frame(0x0B);
        buffer.put_frame("drone_1", x.clone());
        buffer.put_frame("drone_2", y.clone());

        buffer.set_mode(true);
        buffer.set_mode(false);

        assert_eq!(buffer.get_frame("drone_1").unwrap(), x);
        assert_eq!(buffer.get_frame("drone_2").unwrap(), y);
    }

    #[test]
    fn disable_restores_per_agent_view_after_broadcast() {
        let buffer = FrameBuffer::new();
        let x = frame(0x0A);
        buffer.put_frame("drone_1", x.clone());

        buffer.set_mode(true);
        buffer.put_frame("drone_3", frame(0x0C));
        assert_eq!(buffer.get_frame("drone_1").unwrap(), frame(0x0C));

        buffer.set_mode(false);
        // The broadcast interlude never touched drone_1's own entry
        assert_eq!(buffer.get_frame("drone_1").unwrap(), x);
    }

    #[test]
    fn empty_payload_accepted_verbatim() {
        let buffer = FrameBuffer::new();
        buffer.put_frame("drone_1", Bytes::new());
        let got = buffer.get_frame("drone_1").unwrap();
        assert!(got.is_empty());
        assert_eq!(buffer.agents_connected(), 1);
    }

    #[test]
    fn telemetry_overwrite_and_lookup() {
        use chrono::Utc;
        use swarm_relay_common::telemetry::Telemetry;

        let buffer = FrameBuffer::new();
        assert!(buffer.get_telemetry("drone_1").is_none());

        let t = Telemetry {
            altitude_m: 90.0,
            speed_mps: 10.0,
            battery_pct: 80.0,
            gps_lost: false,
            keypoints: 120,
            updated_at: Utc::now(),
        };
        buffer.put_telemetry("drone_1", t.clone());
        assert_eq!(buffer.get_telemetry("drone_1").unwrap(), t);
    }

    #[test]
    fn instances_do_not_interfere() {
        let a = FrameBuffer::new();
        let b = FrameBuffer::new();
        a.set_mode(true);
        a.put_frame("drone_1", frame(0x01));

        assert!(!b.get_mode());
        assert!(b.get_frame("drone_1").is_none());
    }
}
