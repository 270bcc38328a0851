use std::collections::VecDeque;

use log::{debug, info};
use tokio::sync::watch;

use crate::config::FilterConfig;
use crate::models::{MotionSample, PositionSample};

use super::geo::haversine_km;

/// Filters raw location fixes and blends in step estimation when GPS goes
/// stale. Owns the distance accumulator; every applied update is published on
/// a watch channel so the session layer can react without polling.
///
/// The accumulator only ever grows. Fixes that fail a gate are dropped
/// silently; that is a filter decision, not an error.
pub struct FusionEngine {
    config: FilterConfig,
    /// Bounded recent-position window, oldest evicted first.
    window: VecDeque<PositionSample>,
    distance_km: f64,
    step_count: u64,
    /// Capture time of the last fix that passed the throttle, accepted or not.
    last_considered_ms: Option<i64>,
    distance_tx: watch::Sender<f64>,
}

impl FusionEngine {
    pub fn new(config: FilterConfig) -> (Self, watch::Receiver<f64>) {
        let (distance_tx, distance_rx) = watch::channel(0.0);
        let engine = Self {
            window: VecDeque::with_capacity(config.window_capacity),
            config,
            distance_km: 0.0,
            step_count: 0,
            last_considered_ms: None,
            distance_tx,
        };
        (engine, distance_rx)
    }

    /// Reset accumulators and seed the window with the session's anchor fix.
    pub fn reset(&mut self, anchor: PositionSample) {
        self.window.clear();
        self.window.push_back(anchor);
        self.distance_km = 0.0;
        self.step_count = 0;
        self.last_considered_ms = Some(anchor.captured_at_ms);
        let _ = self.distance_tx.send(0.0);
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    #[cfg(test)]
    fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Feed one location fix through the filter chain. Returns true if the
    /// fix was accepted and the accumulator advanced.
    pub fn handle_fix(&mut self, sample: PositionSample) -> bool {
        // Throttle before anything else; battery conservation.
        if let Some(last_ms) = self.last_considered_ms {
            if sample.captured_at_ms - last_ms < self.config.throttle_interval_ms {
                return false;
            }
        }
        self.last_considered_ms = Some(sample.captured_at_ms);

        if sample.accuracy_m > self.config.max_accuracy_m {
            debug!(
                "dropping fix: accuracy {:.0}m exceeds {:.0}m gate",
                sample.accuracy_m, self.config.max_accuracy_m
            );
            return false;
        }

        let Some(last) = self.window.back().copied() else {
            // First fix anchors the window; no distance yet.
            self.window.push_back(sample);
            return false;
        };

        let delta_km = haversine_km(last.lat, last.lon, sample.lat, sample.lon);
        let elapsed_hours = (sample.captured_at_ms - last.captured_at_ms) as f64 / 3_600_000.0;
        let implied_kph = if elapsed_hours > 0.0 {
            delta_km / elapsed_hours
        } else {
            f64::INFINITY
        };

        // Drift / teleport filter: too small, too fast, or too far in one hop.
        let accepted = delta_km > self.config.min_distance_km
            && implied_kph < self.config.max_speed_kph
            && delta_km < self.config.max_jump_km;

        if !accepted {
            debug!(
                "dropping fix: delta {:.4}km implied {:.1}kph",
                delta_km, implied_kph
            );
            return false;
        }

        self.distance_km += delta_km;
        self.window.push_back(sample);
        if self.window.len() > self.config.window_capacity {
            self.window.pop_front();
        }

        let _ = self.distance_tx.send(self.distance_km);
        true
    }

    /// Feed one motion sample. Counts a step when the vertical acceleration
    /// falls inside the configured band, and blends step distance into the
    /// accumulator while GPS is stale. Returns true if the accumulator moved.
    pub fn handle_step(&mut self, sample: &MotionSample) -> bool {
        let vertical = sample.accel_y.abs();
        if vertical <= self.config.step_accel_min || vertical >= self.config.step_accel_max {
            return false;
        }

        self.step_count += 1;
        let step_distance_km = self.step_count as f64 * self.config.step_length_km;

        let last_fix_ms = self.window.back().map(|p| p.captured_at_ms).unwrap_or(0);
        if sample.captured_at_ms - last_fix_ms <= self.config.gps_stale_after_ms {
            return false;
        }

        let blended = self.distance_km * self.config.blend_gps_weight
            + step_distance_km * self.config.blend_step_weight;

        // Only apply a meaningful increase; keeps the accumulator monotone
        // under blending oscillation.
        if blended > self.distance_km + self.config.blend_noise_floor_km {
            info!(
                "GPS stale for {}ms, blending step estimate: {:.3}km -> {:.3}km",
                sample.captured_at_ms - last_fix_ms,
                self.distance_km,
                blended
            );
            self.distance_km = blended;
            let _ = self.distance_tx.send(self.distance_km);
            return true;
        }

        false
    }
}
