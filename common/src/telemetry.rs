use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Simulated flight telemetry for one agent, overwritten on every report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub altitude_m: f64,
    pub speed_mps: f64,
    pub battery_pct: f64,
    pub gps_lost: bool,
    /// Keypoints detected in the last processed frame.
    pub keypoints: u32,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrip() {
        let t = Telemetry {
            altitude_m: 87.5,
            speed_mps: 12.2,
            battery_pct: 64.0,
            gps_lost: true,
            keypoints: 211,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&t).unwrap();
        let back: Telemetry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
