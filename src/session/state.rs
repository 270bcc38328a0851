use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

use crate::models::SessionStatus;

/// The single owned run session record. All mutation goes through the
/// transition methods below; there is no ambient session state anywhere else
/// in the crate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub distance_km: f64,
    pub step_count: u64,
    pub last_announced_km: u32,
    /// Monotonic anchor for elapsed time while running.
    #[serde(skip)]
    pub started_instant: Option<Instant>,
    /// Elapsed time frozen at stop.
    #[serde(skip)]
    final_elapsed_ms: u64,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            session_id: None,
            started_at: None,
            distance_km: 0.0,
            step_count: 0,
            last_announced_km: 0,
            started_instant: None,
            final_elapsed_ms: 0,
        }
    }
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset everything and enter `Running`.
    pub fn begin_session(&mut self, session_id: String, started_at: DateTime<Utc>, now: Instant) {
        *self = Self {
            status: SessionStatus::Running,
            session_id: Some(session_id),
            started_at: Some(started_at),
            distance_km: 0.0,
            step_count: 0,
            last_announced_km: 0,
            started_instant: Some(now),
            final_elapsed_ms: 0,
        };
    }

    /// Apply a distance update from the fusion engine. The accumulator never
    /// goes backwards while running; updates outside `Running` are ignored.
    pub fn apply_distance(&mut self, distance_km: f64) {
        if self.status == SessionStatus::Running && distance_km > self.distance_km {
            self.distance_km = distance_km;
        }
    }

    pub fn record_steps(&mut self, step_count: u64) {
        if self.status == SessionStatus::Running {
            self.step_count = step_count;
        }
    }

    /// Advance the milestone cursor after an announcement went out.
    pub fn record_announcement(&mut self, km: u32) {
        if km > self.last_announced_km {
            self.last_announced_km = km;
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        match (self.status, self.started_instant) {
            (SessionStatus::Running, Some(anchor)) => anchor.elapsed().as_millis() as u64,
            _ => self.final_elapsed_ms,
        }
    }

    /// Freeze elapsed time and enter `Stopped`.
    pub fn stop(&mut self) {
        self.final_elapsed_ms = self.elapsed_ms();
        self.status = SessionStatus::Stopped;
        self.started_instant = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> RunState {
        let mut state = RunState::new();
        state.begin_session("s-1".to_string(), Utc::now(), Instant::now());
        state
    }

    #[test]
    fn begin_session_resets_everything() {
        let mut state = running();
        state.apply_distance(4.2);
        state.record_announcement(4);
        state.record_steps(1000);
        state.begin_session("s-2".to_string(), Utc::now(), Instant::now());
        assert_eq!(state.distance_km, 0.0);
        assert_eq!(state.last_announced_km, 0);
        assert_eq!(state.step_count, 0);
        assert_eq!(state.session_id.as_deref(), Some("s-2"));
    }

    #[test]
    fn distance_never_decreases_while_running() {
        let mut state = running();
        state.apply_distance(1.5);
        state.apply_distance(1.2);
        assert_eq!(state.distance_km, 1.5);
        state.apply_distance(1.6);
        assert_eq!(state.distance_km, 1.6);
    }

    #[test]
    fn distance_updates_ignored_after_stop() {
        let mut state = running();
        state.apply_distance(1.0);
        state.stop();
        state.apply_distance(5.0);
        assert_eq!(state.distance_km, 1.0);
        assert_eq!(state.status, SessionStatus::Stopped);
    }

    #[test]
    fn elapsed_is_frozen_at_stop() {
        let mut state = running();
        state.stop();
        let frozen = state.elapsed_ms();
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(state.elapsed_ms(), frozen);
    }
}
