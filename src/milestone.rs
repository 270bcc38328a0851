//! Whole-kilometer milestone detection.
//!
//! Stateless comparison between the floored distance and the last announced
//! unit. When several units are crossed in one update only the latest is
//! announced; skipped units are never replayed.

use crate::models::format_pace;

/// Returns the new unit to announce, if the floored distance moved past
/// `last_announced_km`.
pub fn milestone_crossed(last_announced_km: u32, distance_km: f64) -> Option<u32> {
    let current = distance_km.floor() as u32;
    if current > last_announced_km && current > 0 {
        Some(current)
    } else {
        None
    }
}

/// Fixed-template announcement used when the assistant is unavailable.
pub fn template_announcement(km: u32, distance_km: f64, elapsed_ms: u64) -> String {
    let pace = format_pace(distance_km, elapsed_ms);
    let plural = if km > 1 { "s" } else { "" };
    format!("{km} kilometer{plural} completed! Current pace: {pace}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_crossing_below_first_unit() {
        assert_eq!(milestone_crossed(0, 0.0), None);
        assert_eq!(milestone_crossed(0, 0.95), None);
    }

    #[test]
    fn fires_once_per_crossed_unit() {
        // 0.95 -> 1.2 crosses unit 1 exactly once
        let hit = milestone_crossed(0, 1.2);
        assert_eq!(hit, Some(1));
        // after advancing, the same distance fires nothing
        assert_eq!(milestone_crossed(1, 1.2), None);
    }

    #[test]
    fn skipped_units_collapse_to_latest() {
        // 1.2 -> 2.3 announces 2 once, never a catch-up for any skipped unit
        assert_eq!(milestone_crossed(1, 2.3), Some(2));
        assert_eq!(milestone_crossed(2, 2.3), None);
        // a wild jump still announces only the latest unit
        assert_eq!(milestone_crossed(2, 7.9), Some(7));
    }

    #[test]
    fn template_pluralizes_and_carries_pace() {
        let one = template_announcement(1, 1.01, 300_000);
        assert!(one.starts_with("1 kilometer completed!"), "{one}");
        let three = template_announcement(3, 3.2, 960_000);
        assert!(three.starts_with("3 kilometers completed!"), "{three}");
        assert!(three.contains("5:00"), "{three}");
    }
}
