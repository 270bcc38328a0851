use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Idle,
    Running,
    Stopped,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "Idle",
            SessionStatus::Running => "Running",
            SessionStatus::Stopped => "Stopped",
        }
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Idle
    }
}

/// Summary row persisted to history when a run stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub date: DateTime<Utc>,
    pub distance_km: f64,
    pub elapsed_ms: u64,
    pub pace_label: String,
}

/// Live snapshot published every tick for consumers that answer questions
/// about the current run (voice pipeline, UI layer).
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub status: SessionStatus,
    pub distance_km: f64,
    pub elapsed_ms: u64,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            distance_km: 0.0,
            elapsed_ms: 0,
        }
    }
}

/// Distance below which pace is undefined; avoids division blow-up.
const MIN_PACE_DISTANCE_KM: f64 = 0.01;

/// Pace in minutes per kilometer as "M:SS", or the "0:00" sentinel when the
/// distance is too small for the figure to mean anything.
pub fn format_pace(distance_km: f64, elapsed_ms: u64) -> String {
    if distance_km < MIN_PACE_DISTANCE_KM {
        return "0:00".to_string();
    }
    let min_per_km = elapsed_ms as f64 / 60_000.0 / distance_km;
    let min = min_per_km.floor();
    let sec = ((min_per_km - min) * 60.0).round() as u64;
    format!("{}:{:02}", min as u64, sec)
}

/// Elapsed time as "MM:SS".
pub fn format_time(elapsed_ms: u64) -> String {
    let total_seconds = elapsed_ms / 1000;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}", minutes, seconds)
}

pub fn speed_kph(distance_km: f64, elapsed_ms: u64) -> f64 {
    let hours = elapsed_ms as f64 / 3_600_000.0;
    if hours > 0.0 {
        distance_km / hours
    } else {
        0.0
    }
}

/// Fixed linear calorie model (~60 kcal per kilometer); explicitly approximate.
pub fn calories_estimate(distance_km: f64) -> u64 {
    (distance_km * 60.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pace_sentinel_below_distance_floor() {
        assert_eq!(format_pace(0.0, 60_000), "0:00");
        assert_eq!(format_pace(0.009, 600_000), "0:00");
    }

    #[test]
    fn pace_five_minutes_per_km() {
        // 5 km in 25 minutes
        assert_eq!(format_pace(5.0, 1_500_000), "5:00");
    }

    #[test]
    fn pace_pads_seconds() {
        // 2 km in 8 minutes 10 seconds -> 4:05 per km
        assert_eq!(format_pace(2.0, 490_000), "4:05");
    }

    #[test]
    fn time_formats_minutes_and_seconds() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(83_000), "01:23");
        assert_eq!(format_time(3_600_000), "60:00");
    }

    #[test]
    fn speed_handles_zero_elapsed() {
        assert_eq!(speed_kph(1.0, 0), 0.0);
        let v = speed_kph(5.0, 1_800_000);
        assert!((v - 10.0).abs() < 1e-9);
    }

    #[test]
    fn calories_are_linear_in_distance() {
        assert_eq!(calories_estimate(0.0), 0);
        assert_eq!(calories_estimate(5.0), 300);
        assert_eq!(calories_estimate(2.51), 151);
    }
}
