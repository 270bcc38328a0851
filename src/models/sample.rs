use serde::{Deserialize, Serialize};

/// One location fix as delivered by the location adapter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    pub lat: f64,
    pub lon: f64,
    /// Wall-clock capture time in milliseconds since the epoch.
    pub captured_at_ms: i64,
    /// Reported horizontal accuracy in meters.
    pub accuracy_m: f64,
}

/// One acceleration reading from the motion adapter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionSample {
    /// Vertical acceleration including gravity (m/s^2).
    pub accel_y: f64,
    pub captured_at_ms: i64,
}
