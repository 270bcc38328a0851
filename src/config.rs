/// Configuration for the position fusion filters with tunable thresholds.
///
/// Distances are kilometers, durations milliseconds, matching the units the
/// fusion engine works in internally.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Minimum movement between fixes; anything below is GPS drift
    pub min_distance_km: f64,

    /// Maximum plausible running speed; faster implies a GPS teleport
    pub max_speed_kph: f64,

    /// Maximum distance a single accepted fix may add
    pub max_jump_km: f64,

    /// Fixes arriving closer together than this are dropped unevaluated
    pub throttle_interval_ms: i64,

    /// Reported accuracy above this rejects the fix outright (meters)
    pub max_accuracy_m: f64,

    /// Distance covered by one detected step
    pub step_length_km: f64,

    /// Age of the newest accepted fix beyond which step blending kicks in
    pub gps_stale_after_ms: i64,

    /// Blend weights: gps share and step share (policy constants, not calibrated)
    pub blend_gps_weight: f64,
    pub blend_step_weight: f64,

    /// A blended estimate must beat the accumulator by this much to apply
    pub blend_noise_floor_km: f64,

    /// Retained position window capacity, oldest evicted first
    pub window_capacity: usize,

    /// Vertical acceleration band that counts as a step (m/s^2)
    pub step_accel_min: f64,
    pub step_accel_max: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_distance_km: 0.005,
            max_speed_kph: 25.0,
            max_jump_km: 0.1,
            throttle_interval_ms: 2000,
            max_accuracy_m: 100.0,
            step_length_km: 0.00075,
            gps_stale_after_ms: 5000,
            blend_gps_weight: 0.7,
            blend_step_weight: 0.3,
            blend_noise_floor_km: 0.001,
            window_capacity: 20,
            step_accel_min: 10.5,
            step_accel_max: 15.0,
        }
    }
}
